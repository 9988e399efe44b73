//! Decoded result of a single parameter read

use crate::nrc::NegativeResponse;
use crate::registry::{Parameter, ParameterId};
use crate::status::AdapterStatus;
use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;

/// Why a read produced no value
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum ReadError {
    /// Empty or timed-out response: the ECU stayed silent
    #[error("No response from ECU")]
    NoResponse,

    /// Adapter printed an error keyword instead of data
    #[error("{0}")]
    Adapter(AdapterStatus),

    /// Something came back, but no payload could be located
    #[error("Invalid response format")]
    InvalidFormat,

    /// ECU refused a vendor read
    #[error("{0}")]
    Negative(NegativeResponse),

    /// Payload present but the formula could not produce a value
    #[error("Could not decode value")]
    Decode,

    /// The byte channel failed; the connection is now closed
    #[error("Link error: {0}")]
    Link(String),
}

/// A single sensor reading
#[derive(Debug, Clone, Serialize)]
pub struct Reading {
    /// Identifier that was read
    pub id: ParameterId,
    pub name: String,
    pub short_name: String,
    pub unit: String,
    /// Decoded value; present exactly when `error` is absent
    pub value: Option<f64>,
    /// Response text as received, for diagnostics
    pub raw: String,
    pub error: Option<ReadError>,
    pub timestamp: DateTime<Local>,
}

impl Reading {
    /// Successful reading
    pub fn with_value(definition: &Parameter, value: f64, raw: String) -> Self {
        Self::new(definition, Some(value), raw, None)
    }

    /// Failed reading
    pub fn failed(definition: &Parameter, error: ReadError, raw: String) -> Self {
        Self::new(definition, None, raw, Some(error))
    }

    fn new(
        definition: &Parameter,
        value: Option<f64>,
        raw: String,
        error: Option<ReadError>,
    ) -> Self {
        Self {
            id: definition.id,
            name: definition.name.to_string(),
            short_name: definition.short_name.to_string(),
            unit: definition.unit.to_string(),
            value,
            raw,
            error,
            timestamp: Local::now(),
        }
    }

    /// Check if the reading carries a value
    pub fn is_valid(&self) -> bool {
        self.value.is_some() && self.error.is_none()
    }

    /// Format value with unit, or "N/A"
    pub fn format_value(&self, precision: usize) -> String {
        match self.value {
            None => "N/A".to_string(),
            Some(value) if self.unit.is_empty() => format!("{:.*}", precision, value),
            Some(value) => format!("{:.*} {}", precision, value, self.unit),
        }
    }
}
