//! OBD-II Bus Protocol Selection

use serde::de::{self, Deserializer, Unexpected, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bus protocols selectable on an ELM327 with `ATSP<code>`
///
/// Serialized as the adapter's single-character protocol code, so
/// configuration files and `ATDPN` replies use the same spelling.
/// Deserializes from that code or from an integer 0-9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ObdProtocol {
    /// Automatic protocol detection
    #[serde(rename = "0")]
    Auto,
    /// SAE J1850 PWM (41.6 kbaud)
    #[serde(rename = "1")]
    J1850Pwm,
    /// SAE J1850 VPW (10.4 kbaud)
    #[serde(rename = "2")]
    J1850Vpw,
    /// ISO 9141-2 (10.4 kbaud, 5 baud init)
    #[serde(rename = "3")]
    Iso9141_2,
    /// ISO 14230-4 KWP (slow init, 10.4 kbaud)
    #[serde(rename = "4")]
    Iso14230_4Kwp,
    /// ISO 14230-4 KWP (fast init, 10.4 kbaud)
    #[serde(rename = "5")]
    Iso14230_4KwpFast,
    /// ISO 15765-4 CAN (11 bit ID, 500 kbaud)
    #[serde(rename = "6")]
    Iso15765_4Can11bit500,
    /// ISO 15765-4 CAN (29 bit ID, 500 kbaud)
    #[serde(rename = "7")]
    Iso15765_4Can29bit500,
    /// ISO 15765-4 CAN (11 bit ID, 250 kbaud)
    #[serde(rename = "8")]
    Iso15765_4Can11bit250,
    /// ISO 15765-4 CAN (29 bit ID, 250 kbaud)
    #[serde(rename = "9")]
    Iso15765_4Can29bit250,
    /// SAE J1939 CAN (29 bit ID, 250 kbaud)
    #[serde(rename = "A")]
    SaeJ1939Can,
    /// User-defined CAN 1
    #[serde(rename = "B")]
    User1Can,
    /// User-defined CAN 2
    #[serde(rename = "C")]
    User2Can,
}

impl ObdProtocol {
    /// Get the ELM327 AT command for this protocol
    pub fn to_elm_command(&self) -> &'static str {
        match self {
            ObdProtocol::Auto => "ATSP0",
            ObdProtocol::J1850Pwm => "ATSP1",
            ObdProtocol::J1850Vpw => "ATSP2",
            ObdProtocol::Iso9141_2 => "ATSP3",
            ObdProtocol::Iso14230_4Kwp => "ATSP4",
            ObdProtocol::Iso14230_4KwpFast => "ATSP5",
            ObdProtocol::Iso15765_4Can11bit500 => "ATSP6",
            ObdProtocol::Iso15765_4Can29bit500 => "ATSP7",
            ObdProtocol::Iso15765_4Can11bit250 => "ATSP8",
            ObdProtocol::Iso15765_4Can29bit250 => "ATSP9",
            ObdProtocol::SaeJ1939Can => "ATSPA",
            ObdProtocol::User1Can => "ATSPB",
            ObdProtocol::User2Can => "ATSPC",
        }
    }

    /// Single-character protocol code (the digit after `ATSP`)
    pub fn code(&self) -> char {
        self.to_elm_command()
            .chars()
            .last()
            .unwrap_or('0')
    }

    /// Parse a protocol code as printed by `ATDPN` (an `A` prefix marks auto-detected)
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim().to_ascii_uppercase();
        let code = match code.len() {
            2 => code.strip_prefix('A')?.to_string(),
            _ => code,
        };
        match code.as_str() {
            "0" => Some(ObdProtocol::Auto),
            "1" => Some(ObdProtocol::J1850Pwm),
            "2" => Some(ObdProtocol::J1850Vpw),
            "3" => Some(ObdProtocol::Iso9141_2),
            "4" => Some(ObdProtocol::Iso14230_4Kwp),
            "5" => Some(ObdProtocol::Iso14230_4KwpFast),
            "6" => Some(ObdProtocol::Iso15765_4Can11bit500),
            "7" => Some(ObdProtocol::Iso15765_4Can29bit500),
            "8" => Some(ObdProtocol::Iso15765_4Can11bit250),
            "9" => Some(ObdProtocol::Iso15765_4Can29bit250),
            "A" => Some(ObdProtocol::SaeJ1939Can),
            "B" => Some(ObdProtocol::User1Can),
            "C" => Some(ObdProtocol::User2Can),
            _ => None,
        }
    }
}

impl Default for ObdProtocol {
    fn default() -> Self {
        ObdProtocol::Iso15765_4Can11bit500
    }
}

impl<'de> Deserialize<'de> for ObdProtocol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(CodeVisitor)
    }
}

struct CodeVisitor;

impl Visitor<'_> for CodeVisitor {
    type Value = ObdProtocol;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an ELM327 protocol code (0-9 or A-C)")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<ObdProtocol, E> {
        ObdProtocol::from_code(value).ok_or_else(|| E::invalid_value(Unexpected::Str(value), &self))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<ObdProtocol, E> {
        match value {
            0..=9 => self.visit_str(&value.to_string()),
            _ => Err(E::invalid_value(Unexpected::Unsigned(value), &self)),
        }
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<ObdProtocol, E> {
        match u64::try_from(value) {
            Ok(value) => self.visit_u64(value),
            Err(_) => Err(E::invalid_value(Unexpected::Signed(value), &self)),
        }
    }
}

impl fmt::Display for ObdProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}

impl FromStr for ObdProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObdProtocol::from_code(s).ok_or_else(|| format!("unknown protocol code '{}'", s))
    }
}
