//! Connection configuration

use crate::protocol::ObdProtocol;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Serial link and adapter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Serial port (e.g. "/dev/rfcomm0", "/dev/ttyUSB0", "COM3")
    pub port: String,

    /// Baud rate (OBDLink MX+ uses 115200, cheap ELM327 clones often 38400)
    pub baud_rate: u32,

    /// Timeout of a single serial read (milliseconds)
    pub timeout_ms: u64,

    /// How long to wait for the `>` prompt before returning what arrived (milliseconds)
    pub response_timeout_ms: u64,

    /// Bus protocol selected during initialization
    pub protocol: ObdProtocol,

    /// Settle delays between writing a command and reading its response
    pub timing: Timing,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port: "/dev/rfcomm0".to_string(),
            baud_rate: 115_200,
            timeout_ms: 1000,
            response_timeout_ms: 2000,
            protocol: ObdProtocol::default(),
            timing: Timing::default(),
        }
    }
}

impl ConnectionConfig {
    /// Default settings for the given serial port
    pub fn new(port: &str) -> Self {
        Self {
            port: port.to_string(),
            ..Default::default()
        }
    }

    /// Per-read serial timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Prompt wait for one command
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

/// Settle delays, in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// After opening the port
    pub open_settle_ms: u64,
    /// After `ATZ`
    pub reset_ms: u64,
    /// After other AT configuration commands
    pub command_ms: u64,
    /// After the `0100` liveness probe
    pub probe_ms: u64,
    /// After a standard PID request
    pub pid_ms: u64,
    /// After a vendor DID or session request
    pub did_ms: u64,
    /// After the stored-DTC request
    pub dtc_ms: u64,
    /// After adapter information queries (`ATI`, `ATRV`, ...)
    pub info_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            open_settle_ms: 500,
            reset_ms: 1500,
            command_ms: 100,
            probe_ms: 500,
            pid_ms: 300,
            did_ms: 500,
            dtc_ms: 1000,
            info_ms: 300,
        }
    }
}

impl Timing {
    /// No settle delays at all, for scripted channels
    pub fn immediate() -> Self {
        Self {
            open_settle_ms: 0,
            reset_ms: 0,
            command_ms: 0,
            probe_ms: 0,
            pid_ms: 0,
            did_ms: 0,
            dtc_ms: 0,
            info_ms: 0,
        }
    }

    pub fn open_settle(&self) -> Duration {
        Duration::from_millis(self.open_settle_ms)
    }

    pub fn reset(&self) -> Duration {
        Duration::from_millis(self.reset_ms)
    }

    pub fn command(&self) -> Duration {
        Duration::from_millis(self.command_ms)
    }

    pub fn probe(&self) -> Duration {
        Duration::from_millis(self.probe_ms)
    }

    pub fn pid(&self) -> Duration {
        Duration::from_millis(self.pid_ms)
    }

    pub fn did(&self) -> Duration {
        Duration::from_millis(self.did_ms)
    }

    pub fn dtc(&self) -> Duration {
        Duration::from_millis(self.dtc_ms)
    }

    pub fn info(&self) -> Duration {
        Duration::from_millis(self.info_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConnectionConfig::new("/dev/ttyUSB0");
        assert_eq!(config.port, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.response_timeout(), Duration::from_secs(2));
        assert_eq!(config.protocol, ObdProtocol::Iso15765_4Can11bit500);
        assert_eq!(config.timing.reset(), Duration::from_millis(1500));
    }

    #[test]
    fn test_immediate_timing() {
        let timing = Timing::immediate();
        assert!(timing.reset().is_zero());
        assert!(timing.dtc().is_zero());
    }
}
