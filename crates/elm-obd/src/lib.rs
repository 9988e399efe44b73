//! OBD-II Protocol Core for ELM327 Adapters
//!
//! This crate talks to a vehicle's diagnostic bus through an ELM327-family
//! adapter over a serial byte stream. It covers the AT-command transport,
//! extraction of payload bytes from hex-encoded response lines, the PID/DID
//! parameter registry with its decode formulas, and the scan/session engine
//! (support discovery, extended diagnostic session, stored trouble codes).
//!
//! All I/O is blocking and every operation takes `&mut self`, so at most one
//! request is ever outstanding on the half-duplex, prompt-delimited link.

pub mod channel;
mod config;
pub mod dtc;
mod elm327;
mod error;
pub mod frame;
mod nrc;
mod protocol;
mod reader;
mod reading;
pub mod registry;
mod status;

pub use channel::{ByteChannel, MockChannel, SerialChannel};
pub use config::{ConnectionConfig, Timing};
pub use dtc::{Dtc, DtcCategory};
pub use elm327::{AdapterInfo, ConnectionState, Elm327};
pub use error::ObdError;
pub use nrc::NegativeResponse;
pub use protocol::ObdProtocol;
pub use reader::{DiagnosticSession, ObdReader};
pub use reading::{ReadError, Reading};
pub use registry::{Category, Formula, Parameter, ParameterId};
pub use status::AdapterStatus;

/// OBD-II / UDS service identifiers
pub mod service {
    /// Current data (standard PIDs)
    pub const CURRENT_DATA: u8 = 0x01;
    /// Stored diagnostic trouble codes
    pub const READ_DTC: u8 = 0x03;
    /// UDS diagnostic session control
    pub const SESSION_CONTROL: u8 = 0x10;
    /// UDS read data by identifier (vendor DIDs)
    pub const READ_DATA_BY_ID: u8 = 0x22;
    /// UDS negative response marker
    pub const NEGATIVE_RESPONSE: u8 = 0x7F;

    /// Positive response header for a request service (service + 0x40)
    pub const fn response(service: u8) -> u8 {
        service + 0x40
    }
}
