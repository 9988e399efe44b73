//! Stored Diagnostic Trouble Codes (service 0x03)
//!
//! The reply has a fixed shape, so it is decoded directly from the hex byte
//! stream rather than through header-based payload extraction:
//!
//! ```text
//! 7E8 06 43 02 01 71 03 00
//!        |  |  '---.--' '---.--'
//!        |  |   P0171    P0300
//!        |  '-- number of stored codes
//!        '----- response type (0x43)
//! ```

use crate::{frame, service};
use serde::{Serialize, Serializer};
use std::fmt;

/// Response header for stored DTCs
pub const READ_DTC_RESPONSE: u8 = service::response(service::READ_DTC);

/// System a trouble code belongs to, from the top two bits of its first byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DtcCategory {
    /// P codes - Powertrain (engine, transmission)
    Powertrain,
    /// C codes - Chassis (ABS, suspension)
    Chassis,
    /// B codes - Body (airbags, climate control)
    Body,
    /// U codes - Network (communication)
    Network,
}

impl DtcCategory {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => DtcCategory::Powertrain,
            1 => DtcCategory::Chassis,
            2 => DtcCategory::Body,
            _ => DtcCategory::Network,
        }
    }

    /// Letter prefix of the code
    pub fn letter(&self) -> char {
        match self {
            DtcCategory::Powertrain => 'P',
            DtcCategory::Chassis => 'C',
            DtcCategory::Body => 'B',
            DtcCategory::Network => 'U',
        }
    }
}

/// A decoded trouble code such as `P0171`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dtc {
    pub category: DtcCategory,
    /// Remaining 14 bits, printed as four hex digits
    pub code: u16,
}

impl Dtc {
    /// Decode a two-byte record; `00 00` is padding and yields `None`
    pub fn from_bytes(high: u8, low: u8) -> Option<Self> {
        if high == 0 && low == 0 {
            return None;
        }
        Some(Self {
            category: DtcCategory::from_bits(high >> 6),
            code: (u16::from(high & 0x3F) << 8) | u16::from(low),
        })
    }
}

impl fmt::Display for Dtc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:04X}", self.category.letter(), self.code)
    }
}

impl Serialize for Dtc {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Decode a stored-DTC response.
///
/// Locates the 0x43 response byte, reads the declared count, then decodes
/// two-byte records until that many codes are found or the bytes run out.
/// Padding records do not count towards the declared total.
pub fn decode_stored_dtcs(response: &str) -> Vec<Dtc> {
    let bytes = frame::decode_hex(response);

    let Some(start) = bytes.iter().position(|&b| b == READ_DTC_RESPONSE) else {
        return Vec::new();
    };

    let count = usize::from(bytes.get(start + 1).copied().unwrap_or(0));
    let records = bytes.get(start + 2..).unwrap_or_default();

    records
        .chunks_exact(2)
        .filter_map(|record| Dtc::from_bytes(record[0], record[1]))
        .take(count)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(response: &str) -> Vec<String> {
        decode_stored_dtcs(response)
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn test_decode_record() {
        assert_eq!(Dtc::from_bytes(0x01, 0x71).unwrap().to_string(), "P0171");
        assert_eq!(Dtc::from_bytes(0x41, 0x71).unwrap().to_string(), "C0171");
        assert_eq!(Dtc::from_bytes(0x81, 0x71).unwrap().to_string(), "B0171");
        assert_eq!(Dtc::from_bytes(0xC1, 0x00).unwrap().to_string(), "U0100");
        assert_eq!(Dtc::from_bytes(0x00, 0x00), None);
    }

    #[test]
    fn test_decode_response() {
        assert_eq!(codes("7E8 06 43 02 01 71 03 00"), vec!["P0171", "P0300"]);
        assert_eq!(codes("43020171 4171"), vec!["P0171", "C0171"]);
    }

    #[test]
    fn test_padding_not_counted() {
        assert_eq!(codes("43 02 00 00 01 71 00 00 03 00"), vec!["P0171", "P0300"]);
    }

    #[test]
    fn test_count_limits_records() {
        assert_eq!(codes("43 01 01 71 03 00"), vec!["P0171"]);
    }

    #[test]
    fn test_no_codes() {
        assert!(codes("7E8 02 43 00").is_empty());
        assert!(codes("NO DATA").is_empty());
        assert!(codes("").is_empty());
        assert!(codes("43").is_empty());
    }

    #[test]
    fn test_truncated_response() {
        assert_eq!(codes("43 03 01 71 03"), vec!["P0171"]);
    }

    #[test]
    fn test_multi_line_response() {
        assert_eq!(codes("7E8 06 43 02 01 71\n03 00"), vec!["P0171", "P0300"]);
    }
}
