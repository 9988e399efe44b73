//! Byte channel to the adapter
//!
//! The [`ByteChannel`] trait abstracts over the physical link to an ELM327.
//! [`SerialChannel`] drives a real serial port (USB, Bluetooth SPP);
//! [`MockChannel`] replays scripted responses so the transport and scan
//! engine can be exercised without hardware.

mod mock;
mod serial;

pub use mock::MockChannel;
pub use serial::SerialChannel;

use std::io;

/// Blocking duplex byte stream to an adapter.
///
/// The [`Elm327`](crate::Elm327) transport owns exactly one channel and
/// never issues a new command before the previous one has returned.
pub trait ByteChannel: Send {
    /// Number of bytes that can be read without blocking
    fn bytes_to_read(&mut self) -> io::Result<usize>;

    /// Read available bytes into `buf`, returning how many were read
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write all bytes and flush them to the device
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Discard anything left in the receive buffer
    fn clear_input(&mut self) -> io::Result<()>;
}
