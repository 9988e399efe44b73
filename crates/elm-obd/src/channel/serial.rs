//! Serial port channel (USB virtual COM ports, Bluetooth SPP, RS-232)

use super::ByteChannel;
use crate::error::ObdError;
use std::io::{self, Read, Write};
use std::time::Duration;
use tokio_serial::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, info};

/// Serial port opened 8N1 without flow control.
pub struct SerialChannel {
    /// The underlying blocking serial port
    port: Box<dyn SerialPort>,
    /// Port name for logging
    name: String,
}

impl SerialChannel {
    /// Open a serial port
    ///
    /// # Arguments
    /// * `path` - Serial port path (e.g. "/dev/rfcomm0" or "COM3")
    /// * `baud_rate` - Baud rate
    /// * `timeout` - Timeout of a single read
    pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> Result<Self, ObdError> {
        debug!("Opening serial port {} at {} baud", path, baud_rate);

        let port = tokio_serial::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()?;

        info!("Serial port {} open", path);

        Ok(Self {
            port,
            name: path.to_string(),
        })
    }
}

impl ByteChannel for SerialChannel {
    fn bytes_to_read(&mut self) -> io::Result<usize> {
        Ok(self.port.bytes_to_read()? as usize)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(&mut self.port, buf)
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        Write::write_all(&mut self.port, data)?;
        Write::flush(&mut self.port)
    }

    fn clear_input(&mut self) -> io::Result<()> {
        Ok(self.port.clear(ClearBuffer::Input)?)
    }
}

impl std::fmt::Debug for SerialChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialChannel")
            .field("name", &self.name)
            .finish()
    }
}
