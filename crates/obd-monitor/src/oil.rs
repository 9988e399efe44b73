//! Engine oil temperature search
//!
//! Oil temperature is not reported the same way by every ECU. Try the
//! standard PID, then each known vendor DID, then enter the extended
//! diagnostic session and try the DIDs again.

use elm_obd::registry::OIL_TEMPERATURE_DIDS;
use elm_obd::{ObdReader, Reading};
use tracing::{debug, info};

/// Standard PID for engine oil temperature
const OIL_TEMPERATURE_PID: u8 = 0x5C;

/// Where the reading was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OilSource {
    Pid(u8),
    Did(u16),
    /// Only readable after entering the extended session
    ExtendedDid(u16),
}

#[derive(Debug, Clone)]
pub struct OilTemperature {
    pub source: OilSource,
    pub reading: Reading,
}

pub fn find_oil_temperature(reader: &mut ObdReader) -> Option<OilTemperature> {
    let reading = reader.read_pid(OIL_TEMPERATURE_PID);
    if reading.is_valid() {
        return Some(OilTemperature {
            source: OilSource::Pid(OIL_TEMPERATURE_PID),
            reading,
        });
    }
    debug!("PID 0x{:02X} unavailable: {:?}", OIL_TEMPERATURE_PID, reading.error);

    if let Some((did, reading)) = first_valid_did(reader) {
        return Some(OilTemperature {
            source: OilSource::Did(did),
            reading,
        });
    }

    info!("Trying extended diagnostic session");
    if !reader.enter_extended_session() {
        return None;
    }

    first_valid_did(reader).map(|(did, reading)| OilTemperature {
        source: OilSource::ExtendedDid(did),
        reading,
    })
}

fn first_valid_did(reader: &mut ObdReader) -> Option<(u16, Reading)> {
    OIL_TEMPERATURE_DIDS.iter().find_map(|&did| {
        let reading = reader.read_did(did);
        if reading.is_valid() {
            Some((did, reading))
        } else {
            debug!("DID 0x{:04X} unavailable: {:?}", did, reading.error);
            None
        }
    })
}
