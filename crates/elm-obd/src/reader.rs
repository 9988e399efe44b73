//! Scan & Session Engine
//!
//! Reads standard PIDs and vendor DIDs into [`Reading`]s, discovers what
//! the ECU supports, switches to the extended diagnostic session and reads
//! stored trouble codes. Nothing here fails with an `Err`: every problem
//! ends up in a Reading, an empty list or `false`.

use crate::dtc::{self, Dtc};
use crate::elm327::Elm327;
use crate::frame;
use crate::nrc::NegativeResponse;
use crate::reading::{ReadError, Reading};
use crate::registry::{self, ParameterId};
use crate::service;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::{debug, info};

/// Standard PIDs whose data is a support bitmap for the following 32 PIDs
const SUPPORT_ANCHORS: [u8; 7] = [0x00, 0x20, 0x40, 0x60, 0x80, 0xA0, 0xC0];

/// Sub-function of service 0x10 selecting the extended diagnostic session
const EXTENDED_SESSION: u8 = 0x03;

/// Positive response header for session control
const SESSION_RESPONSE: u8 = service::response(service::SESSION_CONTROL);

/// UDS diagnostic session the ECU was last confirmed to be in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum DiagnosticSession {
    #[default]
    Default,
    /// Unlocks vendor DIDs that are hidden in the default session
    Extended,
}

/// OBD-II reader on top of an ELM327 connection
#[derive(Debug)]
pub struct ObdReader {
    connection: Elm327,
    session: DiagnosticSession,
    supported_pids: BTreeSet<u8>,
    supported_dids: BTreeSet<u16>,
}

impl ObdReader {
    pub fn new(connection: Elm327) -> Self {
        Self {
            connection,
            session: DiagnosticSession::Default,
            supported_pids: BTreeSet::new(),
            supported_dids: BTreeSet::new(),
        }
    }

    pub fn connection(&self) -> &Elm327 {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut Elm327 {
        &mut self.connection
    }

    pub fn into_inner(self) -> Elm327 {
        self.connection
    }

    /// Read one parameter.
    ///
    /// Unknown identifiers are read with a placeholder definition. Vendor
    /// reads check for a `7F 22 <code>` negative response before looking
    /// for the `0x62` header.
    pub fn read_parameter(&mut self, id: ParameterId) -> Reading {
        let definition = registry::definition(id);
        let settle = self.settle_for(id);

        let response = match self.query(&definition.command(), settle) {
            Ok(response) => response,
            Err(error) => {
                debug!("{} not read: {}", id, error);
                return Reading::failed(&definition, error, String::new());
            }
        };

        if let ParameterId::Vendor(_) = id {
            if let Some(code) = frame::find_negative_response(&response, service::READ_DATA_BY_ID)
            {
                let nrc = NegativeResponse::from(code);
                debug!("{} refused with 0x{:02X}: {}", id, code, nrc);
                return Reading::failed(&definition, ReadError::Negative(nrc), response);
            }
        }

        let data = match frame::extract_data(&response, id.response_header()) {
            Some(data) if data.len() >= definition.bytes => data,
            _ => return Reading::failed(&definition, ReadError::InvalidFormat, response),
        };

        match definition.decode(&data) {
            Some(value) => Reading::with_value(&definition, value, response),
            None => Reading::failed(&definition, ReadError::Decode, response),
        }
    }

    /// Read a standard PID (service 0x01)
    pub fn read_pid(&mut self, pid: u8) -> Reading {
        self.read_parameter(ParameterId::Standard(pid))
    }

    /// Read a vendor DID (service 0x22)
    pub fn read_did(&mut self, did: u16) -> Reading {
        self.read_parameter(ParameterId::Vendor(did))
    }

    /// Read several PIDs one after another
    pub fn read_multiple_pids(&mut self, pids: &[u8]) -> BTreeMap<u8, Reading> {
        pids.iter().map(|&pid| (pid, self.read_pid(pid))).collect()
    }

    /// Walk the support bitmaps of PIDs 0x00, 0x20 .. 0xC0.
    ///
    /// Anchors that return no usable bitmap are skipped. Scanning stops
    /// after a bitmap whose last bit (support for the next anchor) is clear.
    pub fn scan_supported_pids(&mut self) -> Vec<u8> {
        let settle = self.connection.config().timing.pid();
        let mut found = Vec::new();

        for anchor in SUPPORT_ANCHORS {
            let command = ParameterId::Standard(anchor).command();
            let mask = self
                .query(&command, settle)
                .ok()
                .and_then(|response| frame::extract_data(&response, frame::STANDARD_RESPONSE))
                .and_then(|data| <[u8; 4]>::try_from(data.get(..4)?).ok());

            let Some(mask) = mask else {
                debug!("No support bitmap for PID 0x{:02X}", anchor);
                continue;
            };

            found.extend(supported_in_block(anchor, mask));

            if mask[3] & 0x01 == 0 {
                break;
            }
        }

        self.supported_pids.extend(found.iter().copied());
        info!("Found {} supported PIDs", found.len());
        found
    }

    /// Probe vendor DIDs one by one, defaulting to every DID in the catalog
    pub fn scan_dids(&mut self, candidates: Option<&[u16]>) -> Vec<u16> {
        let candidates: Vec<u16> = match candidates {
            Some(dids) => dids.to_vec(),
            None => registry::vendor_dids()
                .iter()
                .filter_map(|parameter| match parameter.id {
                    ParameterId::Vendor(did) => Some(did),
                    ParameterId::Standard(_) => None,
                })
                .collect(),
        };

        let mut found = Vec::new();
        for did in candidates {
            let reading = self.read_did(did);
            if reading.is_valid() {
                info!("Found supported DID 0x{:04X}: {}", did, reading.format_value(1));
                found.push(did);
            }
        }

        self.supported_dids.extend(found.iter().copied());
        found
    }

    /// PIDs confirmed by scans so far
    pub fn supported_pids(&self) -> &BTreeSet<u8> {
        &self.supported_pids
    }

    /// DIDs confirmed by scans so far
    pub fn supported_dids(&self) -> &BTreeSet<u16> {
        &self.supported_dids
    }

    /// Request the extended diagnostic session (`1003`).
    ///
    /// Succeeds when a reply line carries the positive response `50 03`
    /// and no line is a `7F 10` refusal. Calling it again while already
    /// extended simply re-confirms.
    pub fn enter_extended_session(&mut self) -> bool {
        let command = format!("{:02X}{:02X}", service::SESSION_CONTROL, EXTENDED_SESSION);
        let settle = self.connection.config().timing.did();

        let confirmed = match self.query(&command, settle) {
            Ok(response) => session_confirmed(&response),
            Err(error) => {
                debug!("Session request failed: {}", error);
                false
            }
        };

        if confirmed {
            if self.session != DiagnosticSession::Extended {
                info!("Extended diagnostic session active");
            }
            self.session = DiagnosticSession::Extended;
        }
        confirmed
    }

    pub fn session(&self) -> DiagnosticSession {
        self.session
    }

    /// Read stored trouble codes (service 0x03)
    pub fn read_dtcs(&mut self) -> Vec<Dtc> {
        let command = format!("{:02X}", service::READ_DTC);
        let settle = self.connection.config().timing.dtc();

        match self.query(&command, settle) {
            Ok(response) => dtc::decode_stored_dtcs(&response),
            Err(error) => {
                debug!("No trouble codes read: {}", error);
                Vec::new()
            }
        }
    }

    /// The ECU falls back to the default session once the link is gone
    fn query(&mut self, command: &str, settle: Duration) -> Result<String, ReadError> {
        let result = self.connection.query(command, settle);
        if !self.connection.is_connected() && self.session != DiagnosticSession::Default {
            debug!("Link lost, diagnostic session reset");
            self.session = DiagnosticSession::Default;
        }
        result
    }

    fn settle_for(&self, id: ParameterId) -> Duration {
        let timing = &self.connection.config().timing;
        match id {
            ParameterId::Standard(_) => timing.pid(),
            ParameterId::Vendor(_) => timing.did(),
        }
    }
}

fn session_confirmed(response: &str) -> bool {
    if frame::find_negative_response(response, service::SESSION_CONTROL).is_some() {
        return false;
    }
    response.lines().map(frame::decode_hex_line).any(|bytes| {
        bytes
            .windows(2)
            .any(|pair| pair[0] == SESSION_RESPONSE && pair[1] == EXTENDED_SESSION)
    })
}

/// PIDs flagged in one support bitmap.
///
/// Bit 7 of byte 0 stands for `anchor + 1`, bit 0 of byte 3 for `anchor + 32`.
pub fn supported_in_block(anchor: u8, mask: [u8; 4]) -> Vec<u8> {
    (0u8..32)
        .filter(|&bit| mask[usize::from(bit / 8)] & (0x80 >> (bit % 8)) != 0)
        .filter_map(|bit| anchor.checked_add(bit + 1))
        .collect()
}
