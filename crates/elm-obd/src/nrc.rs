//! UDS negative response codes reported for vendor DID reads

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reason an ECU gave in a `7F 22 <code>` negative response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NegativeResponse {
    /// 0x12
    SubFunctionNotSupported,
    /// 0x14
    ResponseTooLong,
    /// 0x31 - DID not supported (in this session)
    RequestOutOfRange,
    /// 0x33 - DID protected; security access is not performed here
    SecurityAccessDenied,
    /// Any other code
    Unknown(u8),
}

impl NegativeResponse {
    /// Raw negative response code
    pub fn code(&self) -> u8 {
        match self {
            NegativeResponse::SubFunctionNotSupported => 0x12,
            NegativeResponse::ResponseTooLong => 0x14,
            NegativeResponse::RequestOutOfRange => 0x31,
            NegativeResponse::SecurityAccessDenied => 0x33,
            NegativeResponse::Unknown(code) => *code,
        }
    }
}

impl From<u8> for NegativeResponse {
    fn from(code: u8) -> Self {
        match code {
            0x12 => NegativeResponse::SubFunctionNotSupported,
            0x14 => NegativeResponse::ResponseTooLong,
            0x31 => NegativeResponse::RequestOutOfRange,
            0x33 => NegativeResponse::SecurityAccessDenied,
            other => NegativeResponse::Unknown(other),
        }
    }
}

impl fmt::Display for NegativeResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            NegativeResponse::SubFunctionNotSupported => "Sub-function not supported",
            NegativeResponse::ResponseTooLong => "Response too long",
            NegativeResponse::RequestOutOfRange => "Request out of range",
            NegativeResponse::SecurityAccessDenied => "Security access denied",
            NegativeResponse::Unknown(_) => "Unknown error",
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes() {
        assert_eq!(NegativeResponse::from(0x33), NegativeResponse::SecurityAccessDenied);
        assert_eq!(NegativeResponse::from(0x31), NegativeResponse::RequestOutOfRange);
        assert_eq!(NegativeResponse::from(0x14).to_string(), "Response too long");
        assert_eq!(NegativeResponse::from(0x12).to_string(), "Sub-function not supported");
    }

    #[test]
    fn test_unknown_code() {
        let nrc = NegativeResponse::from(0x22);
        assert_eq!(nrc, NegativeResponse::Unknown(0x22));
        assert_eq!(nrc.to_string(), "Unknown error");
        assert_eq!(nrc.code(), 0x22);
    }
}
