//! Payload extraction from hex-encoded response lines
//!
//! With headers on (`ATH1`) and CAN formatting off (`ATCAF0`) a standard
//! reply to `010C` looks like:
//!
//! ```text
//! 7E8 04 41 0C 1A F8
//! ```
//!
//! - `7E8` - responding ECU's CAN ID (absent when headers are off)
//! - `04` - number of bytes that follow
//! - `41` - response type (service 0x01 + 0x40)
//! - `0C` - echoed PID
//! - `1A F8` - data
//!
//! The response-type byte is used as a self-synchronizing marker instead of
//! a fixed offset, because the CAN ID may or may not be present and stale
//! echo or status text may share the burst.
//!
//! Known fragility: the marker search takes the *first* byte equal to the
//! header anywhere in a line, so a CAN ID or length byte that happens to
//! equal the header value misplaces the payload start.

use crate::service;

/// Header of a vendor (UDS 0x22) positive response; followed by a two-byte DID echo
pub const VENDOR_RESPONSE: u8 = service::response(service::READ_DATA_BY_ID);

/// Header of a standard (service 0x01) positive response; followed by a one-byte PID echo
pub const STANDARD_RESPONSE: u8 = service::response(service::CURRENT_DATA);

/// Lines shorter than this cannot hold header, identifier and data
const MIN_FRAME_LEN: usize = 4;

/// Decode one line of adapter text into bytes.
///
/// Every maximal run of hex digits is decoded in pairs; anything else is a
/// separator. A run of odd length is read as if it had a leading `0`, which
/// is how the 3-digit 11-bit CAN ID (`7E8`) lines up with the bytes after
/// it whether or not the adapter prints spaces (`ATS0`).
pub fn decode_hex_line(line: &str) -> Vec<u8> {
    let mut bytes = Vec::new();

    for run in line
        .split(|c: char| !c.is_ascii_hexdigit())
        .filter(|run| !run.is_empty())
    {
        let digits: Vec<u8> = run.bytes().map(nibble).collect();
        let (head, pairs) = if digits.len() % 2 == 1 {
            (Some(digits[0]), &digits[1..])
        } else {
            (None, &digits[..])
        };

        bytes.extend(head);
        bytes.extend(pairs.chunks_exact(2).map(|pair| (pair[0] << 4) | pair[1]));
    }

    bytes
}

/// Decode every line of a response and concatenate the bytes
pub fn decode_hex(response: &str) -> Vec<u8> {
    response.lines().flat_map(decode_hex_line).collect()
}

/// Extract the data bytes that follow `header` in a response.
///
/// Lines are tried independently; the first line of at least four bytes
/// that contains `header` wins. The echoed identifier after the header is
/// skipped: two bytes for vendor responses (`0x62`), one byte otherwise.
/// Returns `None` if no line carries the header, which includes adapter
/// status text such as `NO DATA`.
pub fn extract_data(response: &str, header: u8) -> Option<Vec<u8>> {
    let echo_len = if header == VENDOR_RESPONSE { 2 } else { 1 };

    response
        .lines()
        .map(decode_hex_line)
        .filter(|bytes| bytes.len() >= MIN_FRAME_LEN)
        .find_map(|bytes| {
            let position = bytes.iter().position(|&b| b == header)?;
            let start = position + 1 + echo_len;
            Some(bytes.get(start..).map(<[u8]>::to_vec).unwrap_or_default())
        })
}

/// Find a negative response (`7F <service> <code>`) and return its code
pub fn find_negative_response(response: &str, request_service: u8) -> Option<u8> {
    response.lines().map(decode_hex_line).find_map(|bytes| {
        bytes
            .windows(3)
            .find(|w| w[0] == service::NEGATIVE_RESPONSE && w[1] == request_service)
            .map(|w| w[2])
    })
}

fn nibble(digit: u8) -> u8 {
    (digit as char).to_digit(16).unwrap_or(0) as u8
}
