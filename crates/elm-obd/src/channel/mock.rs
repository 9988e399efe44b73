//! Scripted channel for deterministic testing without an adapter.
//!
//! # Example
//!
//! ```
//! use elm_obd::MockChannel;
//!
//! let mock = MockChannel::new();
//! // When "010C" is written, answer with an RPM frame and the prompt.
//! mock.expect("010C", "7E8 04 41 0C 1A F8");
//! ```

use super::ByteChannel;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MockState {
    /// One-shot request/response pairs, consumed in order
    expectations: VecDeque<(String, Vec<u8>)>,
    /// Standing replies used when the next expectation does not match
    fallbacks: Vec<(String, Vec<u8>)>,
    /// Bytes waiting to be read
    pending: VecDeque<u8>,
    /// Every command written, without the trailing carriage return
    sent: Vec<String>,
    /// Fail every write with a broken-pipe error
    fail_writes: bool,
}

/// Scripted [`ByteChannel`].
///
/// Clones share state, so a test can keep one handle for inspection while
/// the transport owns another. Commands that match neither the next
/// expectation nor a fallback are answered with `?`, as a real adapter
/// answers an unknown command.
#[derive(Debug, Clone, Default)]
pub struct MockChannel {
    state: Arc<Mutex<MockState>>,
}

/// Terminates scripted text responses like an ELM327 does
const PROMPT_SUFFIX: &str = "\r\r>";

impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Answer the next write of `command` with `response` followed by the prompt
    pub fn expect(&self, command: &str, response: &str) {
        let bytes = format!("{}{}", response, PROMPT_SUFFIX).into_bytes();
        self.expect_raw(command, &bytes);
    }

    /// Answer the next write of `command` with exactly `response`
    pub fn expect_raw(&self, command: &str, response: &[u8]) {
        self.state()
            .expectations
            .push_back((command.to_string(), response.to_vec()));
    }

    /// Answer every write of `command` with `response` and the prompt,
    /// whenever no one-shot expectation is queued for it
    pub fn always(&self, command: &str, response: &str) {
        let bytes = format!("{}{}", response, PROMPT_SUFFIX).into_bytes();
        self.state().fallbacks.push((command.to_string(), bytes));
    }

    /// Make every subsequent write fail
    pub fn fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }

    /// Commands written so far
    pub fn sent(&self) -> Vec<String> {
        self.state().sent.clone()
    }

    /// One-shot expectations not yet consumed
    pub fn remaining_expectations(&self) -> usize {
        self.state().expectations.len()
    }
}

impl ByteChannel for MockChannel {
    fn bytes_to_read(&mut self) -> io::Result<usize> {
        Ok(self.state().pending.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state();
        let n = buf.len().min(state.pending.len());
        for (slot, byte) in buf.iter_mut().zip(state.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let mut state = self.state();
        if state.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock write failure"));
        }

        let command = String::from_utf8_lossy(data).trim_end_matches('\r').to_string();
        state.sent.push(command.clone());

        let next_matches = state
            .expectations
            .front()
            .map_or(false, |(expected, _)| *expected == command);

        let response = if next_matches {
            state.expectations.pop_front().map(|(_, response)| response)
        } else {
            state
                .fallbacks
                .iter()
                .find(|(expected, _)| *expected == command)
                .map(|(_, response)| response.clone())
        };

        let response =
            response.unwrap_or_else(|| format!("?{}", PROMPT_SUFFIX).into_bytes());
        state.pending.extend(response);
        Ok(())
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.state().pending.clear();
        Ok(())
    }
}
