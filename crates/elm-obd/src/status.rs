//! ELM327 status keywords that replace data in a response

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error keywords an ELM327 prints instead of (or alongside) bus data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdapterStatus {
    /// `UNABLE TO CONNECT` - no protocol could talk to the vehicle
    UnableToConnect,
    /// `NO DATA` - request sent, nothing came back before the adapter timeout
    NoData,
    /// `CAN ERROR` - CAN controller fault (wiring, bitrate mismatch)
    CanError,
    /// `BUS INIT` - slow-init protocols failed to wake the bus
    BusInit,
    /// `STOPPED` - request interrupted by incoming serial data
    Stopped,
    /// `ERROR` - generic adapter error
    Error,
    /// `?` - unknown or malformed command
    UnknownCommand,
}

impl AdapterStatus {
    /// Detection precedence: more specific keywords first, since several
    /// of them also contain `ERROR`
    const ALL: [AdapterStatus; 7] = [
        AdapterStatus::UnableToConnect,
        AdapterStatus::NoData,
        AdapterStatus::CanError,
        AdapterStatus::BusInit,
        AdapterStatus::Stopped,
        AdapterStatus::Error,
        AdapterStatus::UnknownCommand,
    ];

    /// Keyword as printed by the adapter
    pub fn keyword(&self) -> &'static str {
        match self {
            AdapterStatus::UnableToConnect => "UNABLE TO CONNECT",
            AdapterStatus::NoData => "NO DATA",
            AdapterStatus::CanError => "CAN ERROR",
            AdapterStatus::BusInit => "BUS INIT",
            AdapterStatus::Stopped => "STOPPED",
            AdapterStatus::Error => "ERROR",
            AdapterStatus::UnknownCommand => "?",
        }
    }

    /// Find the first error keyword in a response, case-insensitively
    pub fn detect(response: &str) -> Option<Self> {
        let upper = response.to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|status| upper.contains(status.keyword()))
    }
}

impl fmt::Display for AdapterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            AdapterStatus::UnableToConnect => "Unable to connect to vehicle bus",
            AdapterStatus::NoData => "No data",
            AdapterStatus::CanError => "CAN bus error",
            AdapterStatus::BusInit => "Bus initialization failed",
            AdapterStatus::Stopped => "Request stopped",
            AdapterStatus::Error => "Adapter error",
            AdapterStatus::UnknownCommand => "Unknown command",
        };
        f.write_str(text)
    }
}
