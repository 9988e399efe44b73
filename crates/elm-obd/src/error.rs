//! Connection-level Error Types
//!
//! Only opening the channel, adapter initialization and raw command
//! exchange fail with [`ObdError`]. Parameter reads never do: their
//! failures are carried inside a [`Reading`](crate::Reading).

use thiserror::Error;

/// Errors that can occur while managing the adapter connection
#[derive(Debug, Error)]
pub enum ObdError {
    /// No open byte channel
    #[error("Not connected to adapter")]
    NotConnected,

    /// Serial port could not be opened, written or read
    #[error("Serial port error: {0}")]
    SerialError(String),

    /// An adapter configuration command reported an error keyword
    #[error("Adapter rejected {command}: {response}")]
    InitFailed { command: String, response: String },

    /// Adapter configured, but the ECU did not answer the liveness probe
    #[error("ECU not responding (is the ignition on?): {0}")]
    EcuNotResponding(String),

    /// Invalid connection settings
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for ObdError {
    fn from(err: std::io::Error) -> Self {
        ObdError::SerialError(err.to_string())
    }
}

impl From<tokio_serial::Error> for ObdError {
    fn from(err: tokio_serial::Error) -> Self {
        ObdError::SerialError(err.to_string())
    }
}
