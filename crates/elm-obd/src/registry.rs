//! OBD-II PID and vendor DID Definitions
//!
//! Static, read-only catalog of the parameters this system knows how to
//! decode. Standard PIDs are read with service 0x01, vendor DIDs (VAG, as
//! found on EA113 / Bosch MED9.1 engine ECUs) with UDS service 0x22.
//!
//! Identifiers missing from the catalog are still readable: [`definition`]
//! falls back to a placeholder with no unit that reports the first data
//! byte as-is.

use crate::service;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Identifier of a readable parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ParameterId {
    /// One-byte PID under service 0x01
    Standard(u8),
    /// Two-byte DID under service 0x22
    Vendor(u16),
}

impl ParameterId {
    /// Request service for this identifier
    pub fn service(&self) -> u8 {
        match self {
            ParameterId::Standard(_) => service::CURRENT_DATA,
            ParameterId::Vendor(_) => service::READ_DATA_BY_ID,
        }
    }

    /// Positive response header expected back
    pub fn response_header(&self) -> u8 {
        service::response(self.service())
    }

    /// Request string: `01PP` for PIDs, `22DDDD` for DIDs
    pub fn command(&self) -> String {
        match self {
            ParameterId::Standard(pid) => format!("{:02X}{:02X}", self.service(), pid),
            ParameterId::Vendor(did) => format!("{:02X}{:04X}", self.service(), did),
        }
    }
}

impl fmt::Display for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterId::Standard(pid) => write!(f, "PID 0x{:02X}", pid),
            ParameterId::Vendor(did) => write!(f, "DID 0x{:04X}", did),
        }
    }
}

/// Grouping used for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Engine,
    Fuel,
    Temperature,
    Pressure,
    Electrical,
    Emissions,
    Speed,
    VendorSpecific,
}

/// Decode formula. `A` is the first data byte, `B` the second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Formula {
    /// No formula: the first byte as-is (ASCII identifiers, unknown parameters)
    None,
    /// A
    Raw,
    /// A - 40 (°C)
    Temperature,
    /// A * 100 / 255 (%)
    Percent,
    /// (A - 128) * 100 / 128 (%)
    PercentCentered,
    /// ((A * 256) + B) / 4 (rpm)
    Rpm,
    /// A / 2 - 64 (° before TDC)
    TimingAdvance,
    /// ((A * 256) + B) / 100 (g/s)
    Maf,
    /// A * 3 (kPa)
    FuelPressure,
    /// ((A * 256) + B) * 10 (kPa)
    FuelRailPressure,
    /// A / 200 (V)
    O2Voltage,
    /// ((A * 256) + B) / 1000 (V)
    ModuleVoltage,
    /// ((A * 256) + B) / 10 - 40 (°C)
    CatalystTemperature,
    /// ((A * 256) + B) / 20 (L/h)
    FuelRate,
    /// A - 125 (%)
    EngineTorque,
    /// ((A * 256) + B) * 100 / 255 (%)
    AbsoluteLoad,
    /// (A * 256) + B (s)
    Runtime,
    /// ((A * 256) + B) / 4 - 8192 (Pa)
    EvapPressure,
    /// (A * 256) + B
    Word,
    /// ((A * 256) + B) * 0.1 (mbar)
    BoostPressure,
    /// A * 0.75 - 48 (°)
    IgnitionTiming,
}

impl Formula {
    /// Apply the formula. `None` if the bytes it reads are missing or the
    /// result is not finite.
    pub fn apply(&self, data: &[u8]) -> Option<f64> {
        let a = f64::from(*data.first()?);
        let word = || data.get(1).map(|&b| a * 256.0 + f64::from(b));

        let value = match self {
            Formula::None | Formula::Raw => a,
            Formula::Temperature => a - 40.0,
            Formula::Percent => a * 100.0 / 255.0,
            Formula::PercentCentered => (a - 128.0) * 100.0 / 128.0,
            Formula::Rpm => word()? / 4.0,
            Formula::TimingAdvance => a / 2.0 - 64.0,
            Formula::Maf => word()? / 100.0,
            Formula::FuelPressure => a * 3.0,
            Formula::FuelRailPressure => word()? * 10.0,
            Formula::O2Voltage => a / 200.0,
            Formula::ModuleVoltage => word()? / 1000.0,
            Formula::CatalystTemperature => word()? / 10.0 - 40.0,
            Formula::FuelRate => word()? / 20.0,
            Formula::EngineTorque => a - 125.0,
            Formula::AbsoluteLoad => word()? * 100.0 / 255.0,
            Formula::Runtime | Formula::Word => word()?,
            Formula::EvapPressure => word()? / 4.0 - 8192.0,
            Formula::BoostPressure => word()? * 0.1,
            Formula::IgnitionTiming => a * 0.75 - 48.0,
        };

        value.is_finite().then_some(value)
    }
}

/// Definition of a readable parameter including its decode formula
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    /// PID or DID
    pub id: ParameterId,
    /// Human-readable name
    pub name: Cow<'static, str>,
    /// Short display name
    pub short_name: Cow<'static, str>,
    /// Unit of measurement (empty if unitless or unknown)
    pub unit: &'static str,
    /// Display grouping; `None` for placeholders
    pub category: Option<Category>,
    /// Number of data bytes the ECU returns
    pub bytes: usize,
    /// Minimum possible value
    pub min: Option<f64>,
    /// Maximum possible value
    pub max: Option<f64>,
    /// Decode formula
    pub formula: Formula,
    /// Detailed description
    pub description: &'static str,
    /// VCDS measuring block, for vendor DIDs where known
    pub measuring_block: Option<u16>,
}

impl Parameter {
    /// Placeholder for an identifier missing from the catalog
    pub fn placeholder(id: ParameterId) -> Self {
        let (name, short_name) = match id {
            ParameterId::Standard(pid) => {
                (format!("Unknown PID 0x{:02X}", pid), format!("0x{:02X}", pid))
            }
            ParameterId::Vendor(did) => {
                (format!("Unknown DID 0x{:04X}", did), format!("0x{:04X}", did))
            }
        };

        Self {
            id,
            name: Cow::Owned(name),
            short_name: Cow::Owned(short_name),
            unit: "",
            category: None,
            bytes: 1,
            min: None,
            max: None,
            formula: Formula::None,
            description: "",
            measuring_block: None,
        }
    }

    /// Request string for this parameter
    pub fn command(&self) -> String {
        self.id.command()
    }

    /// Decode data bytes to an engineering value.
    ///
    /// Returns `None` when fewer than [`bytes`](Self::bytes) bytes are
    /// supplied or the formula cannot produce a finite value.
    pub fn decode(&self, data: &[u8]) -> Option<f64> {
        if data.len() < self.bytes {
            return None;
        }
        self.formula.apply(data)
    }
}

/// Look up a catalog entry (tables are sorted by identifier)
pub fn lookup(id: ParameterId) -> Option<&'static Parameter> {
    let table: &'static [Parameter] = match id {
        ParameterId::Standard(_) => &STANDARD_PIDS,
        ParameterId::Vendor(_) => &VENDOR_DIDS,
    };
    table
        .binary_search_by_key(&id, |parameter| parameter.id)
        .ok()
        .map(|index| &table[index])
}

/// Catalog entry, or a placeholder for an unknown identifier
pub fn definition(id: ParameterId) -> Cow<'static, Parameter> {
    match lookup(id) {
        Some(parameter) => Cow::Borrowed(parameter),
        None => Cow::Owned(Parameter::placeholder(id)),
    }
}

/// All standard PIDs in the catalog
pub fn standard_pids() -> &'static [Parameter] {
    &STANDARD_PIDS
}

/// All vendor DIDs in the catalog
pub fn vendor_dids() -> &'static [Parameter] {
    &VENDOR_DIDS
}

/// Load, coolant, MAP, RPM, speed, IAT, MAF, throttle
pub const COMMON_PIDS: [u8; 8] = [0x04, 0x05, 0x0B, 0x0C, 0x0D, 0x0F, 0x10, 0x11];

/// Vendor DIDs known to carry engine oil temperature
pub const OIL_TEMPERATURE_DIDS: [u16; 4] = [0xF486, 0xF40E, 0x2028, 0x1040];

#[allow(clippy::too_many_arguments)]
const fn pid(
    pid: u8,
    name: &'static str,
    short_name: &'static str,
    unit: &'static str,
    category: Category,
    bytes: usize,
    range: (f64, f64),
    formula: Formula,
    description: &'static str,
) -> Parameter {
    Parameter {
        id: ParameterId::Standard(pid),
        name: Cow::Borrowed(name),
        short_name: Cow::Borrowed(short_name),
        unit,
        category: Some(category),
        bytes,
        min: Some(range.0),
        max: Some(range.1),
        formula,
        description,
        measuring_block: None,
    }
}

#[allow(clippy::too_many_arguments)]
const fn did(
    did: u16,
    name: &'static str,
    short_name: &'static str,
    unit: &'static str,
    category: Category,
    bytes: usize,
    formula: Formula,
    measuring_block: Option<u16>,
    description: &'static str,
) -> Parameter {
    Parameter {
        id: ParameterId::Vendor(did),
        name: Cow::Borrowed(name),
        short_name: Cow::Borrowed(short_name),
        unit,
        category: Some(category),
        bytes,
        min: None,
        max: None,
        formula,
        description,
        measuring_block,
    }
}

#[rustfmt::skip]
static STANDARD_PIDS: [Parameter; 25] = [
    // 0x00-0x1F: basic engine data
    pid(0x04, "Calculated Engine Load", "Load", "%", Category::Engine, 1,
        (0.0, 100.0), Formula::Percent, "Calculated engine load value"),
    pid(0x05, "Engine Coolant Temperature", "Coolant", "°C", Category::Temperature, 1,
        (-40.0, 215.0), Formula::Temperature, "Engine coolant temperature"),
    pid(0x06, "Short Term Fuel Trim Bank 1", "STFT B1", "%", Category::Fuel, 1,
        (-100.0, 99.21875), Formula::PercentCentered, "Short term fuel trim for bank 1"),
    pid(0x07, "Long Term Fuel Trim Bank 1", "LTFT B1", "%", Category::Fuel, 1,
        (-100.0, 99.21875), Formula::PercentCentered, "Long term fuel trim for bank 1"),
    pid(0x0B, "Intake Manifold Pressure", "MAP", "kPa", Category::Pressure, 1,
        (0.0, 255.0), Formula::Raw, "Intake manifold absolute pressure"),
    pid(0x0C, "Engine RPM", "RPM", "rpm", Category::Engine, 2,
        (0.0, 16383.75), Formula::Rpm, "Engine revolutions per minute"),
    pid(0x0D, "Vehicle Speed", "Speed", "km/h", Category::Speed, 1,
        (0.0, 255.0), Formula::Raw, "Vehicle speed sensor"),
    pid(0x0E, "Timing Advance", "Timing", "°", Category::Engine, 1,
        (-64.0, 63.5), Formula::TimingAdvance, "Timing advance relative to cylinder 1"),
    pid(0x0F, "Intake Air Temperature", "IAT", "°C", Category::Temperature, 1,
        (-40.0, 215.0), Formula::Temperature, "Intake air temperature"),
    pid(0x10, "MAF Air Flow Rate", "MAF", "g/s", Category::Engine, 2,
        (0.0, 655.35), Formula::Maf, "Mass air flow sensor reading"),
    pid(0x11, "Throttle Position", "TPS", "%", Category::Engine, 1,
        (0.0, 100.0), Formula::Percent, "Absolute throttle position"),
    pid(0x1F, "Run Time Since Engine Start", "Runtime", "s", Category::Engine, 2,
        (0.0, 65535.0), Formula::Runtime, "Run time since engine start"),
    // 0x20-0x3F: fuel system and emissions
    pid(0x23, "Fuel Rail Gauge Pressure", "FRP", "kPa", Category::Fuel, 2,
        (0.0, 655350.0), Formula::FuelRailPressure, "Fuel rail gauge pressure (diesel/GDI)"),
    pid(0x2F, "Fuel Tank Level", "Fuel", "%", Category::Fuel, 1,
        (0.0, 100.0), Formula::Percent, "Fuel tank level input"),
    pid(0x32, "Evap System Vapor Pressure", "EVAP", "Pa", Category::Emissions, 2,
        (-8192.0, 8191.75), Formula::EvapPressure, "Evaporative system vapor pressure"),
    pid(0x3C, "Catalyst Temp Bank 1 Sensor 1", "Cat B1S1", "°C", Category::Emissions, 2,
        (-40.0, 6513.5), Formula::CatalystTemperature, "Catalyst temperature bank 1, sensor 1"),
    pid(0x3D, "Catalyst Temp Bank 2 Sensor 1", "Cat B2S1", "°C", Category::Emissions, 2,
        (-40.0, 6513.5), Formula::CatalystTemperature, "Catalyst temperature bank 2, sensor 1"),
    pid(0x3E, "Catalyst Temp Bank 1 Sensor 2", "Cat B1S2", "°C", Category::Emissions, 2,
        (-40.0, 6513.5), Formula::CatalystTemperature, "Catalyst temperature bank 1, sensor 2"),
    pid(0x3F, "Catalyst Temp Bank 2 Sensor 2", "Cat B2S2", "°C", Category::Emissions, 2,
        (-40.0, 6513.5), Formula::CatalystTemperature, "Catalyst temperature bank 2, sensor 2"),
    // 0x40-0x5F: vehicle info
    pid(0x42, "Control Module Voltage", "Voltage", "V", Category::Electrical, 2,
        (0.0, 65.535), Formula::ModuleVoltage, "Control module voltage"),
    pid(0x46, "Ambient Air Temperature", "Ambient", "°C", Category::Temperature, 1,
        (-40.0, 215.0), Formula::Temperature, "Ambient air temperature"),
    pid(0x5C, "Engine Oil Temperature", "Oil Temp", "°C", Category::Temperature, 1,
        (-40.0, 215.0), Formula::Temperature, "Engine oil temperature (if supported)"),
    pid(0x5E, "Engine Fuel Rate", "Fuel Rate", "L/h", Category::Fuel, 2,
        (0.0, 3276.75), Formula::FuelRate, "Engine fuel rate"),
    // 0x60-0x7F: torque
    pid(0x62, "Actual Engine Torque", "Torque %", "%", Category::Engine, 1,
        (-125.0, 130.0), Formula::EngineTorque, "Actual engine percent torque"),
    pid(0x63, "Engine Reference Torque", "Ref Torque", "Nm", Category::Engine, 2,
        (0.0, 65535.0), Formula::Word, "Engine reference torque"),
];

#[rustfmt::skip]
static VENDOR_DIDS: [Parameter; 7] = [
    did(0x2028, "Oil Temperature (2028)", "Oil Temp", "°C", Category::Temperature, 1,
        Formula::Temperature, None, "Oil temperature via DID 0x2028"),
    // ECU identification (ASCII)
    did(0xF189, "ECU Software Version", "SW Ver", "", Category::VendorSpecific, 16,
        Formula::None, None, "ECU software version identifier"),
    did(0xF190, "VIN", "VIN", "", Category::VendorSpecific, 17,
        Formula::None, None, "Vehicle Identification Number"),
    // Measuring blocks
    did(0xF406, "Boost Pressure Actual", "Boost", "mbar", Category::Pressure, 2,
        Formula::BoostPressure, Some(6), "Actual boost pressure"),
    did(0xF40E, "Oil Temperature (Alt)", "Oil Temp", "°C", Category::Temperature, 1,
        Formula::Temperature, None, "Alternative oil temperature DID"),
    did(0xF41F, "Ignition Timing Cylinder 1", "Ign Cyl1", "°", Category::Engine, 1,
        Formula::IgnitionTiming, Some(31), "Ignition timing for cylinder 1"),
    did(0xF486, "Engine Oil Temperature", "Oil Temp", "°C", Category::Temperature, 1,
        Formula::Temperature, Some(134), "Engine oil temperature (VCDS Block 134, Field 1)"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn decode(id: ParameterId, data: &[u8]) -> Option<f64> {
        lookup(id).and_then(|parameter| parameter.decode(data))
    }

    #[test]
    fn test_catalog_sorted_and_unique() {
        for table in [standard_pids(), vendor_dids()] {
            assert!(table.windows(2).all(|pair| pair[0].id < pair[1].id));
        }
    }

    #[test]
    fn test_rpm_decode() {
        // 1A F8 => ((26 * 256) + 248) / 4 = 1726
        let rpm = decode(ParameterId::Standard(0x0C), &[0x1A, 0xF8]).unwrap();
        assert!((rpm - 1726.0).abs() < 1e-9);
    }

    #[test]
    fn test_temperature_decode() {
        // 0x73 = 115, so temp = 115 - 40 = 75°C
        let coolant = decode(ParameterId::Standard(0x05), &[0x73]).unwrap();
        assert!((coolant - 75.0).abs() < 1e-9);
        let oil = decode(ParameterId::Vendor(0xF486), &[0x00]).unwrap();
        assert!((oil + 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_fuel_trim_decode() {
        let trim = decode(ParameterId::Standard(0x06), &[0x80]).unwrap();
        assert!(trim.abs() < 1e-9);
        let trim = decode(ParameterId::Standard(0x07), &[0x90]).unwrap();
        assert!((trim - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_two_byte_formulas() {
        let cases = [
            (0x10, [0x01, 0x2C], 3.0),      // MAF 300/100
            (0x42, [0x31, 0x2A], 12.586),   // 12586/1000 V
            (0x3C, [0x11, 0x94], 410.0),    // 4500/10 - 40
            (0x5E, [0x00, 0xC8], 10.0),     // 200/20
            (0x23, [0x00, 0x64], 1000.0),   // 100*10
            (0x32, [0x80, 0x00], 0.0),      // 32768/4 - 8192
            (0x63, [0x01, 0x5E], 350.0),    // 256 + 94
        ];
        for (pid, data, expected) in cases {
            let value = decode(ParameterId::Standard(pid), &data).unwrap();
            assert!((value - expected).abs() < 1e-9, "PID {:02X}: {}", pid, value);
        }
    }

    #[test]
    fn test_one_byte_formulas() {
        let cases = [
            (0x04, 0xFF, 100.0),
            (0x0E, 0x80, 0.0),
            (0x62, 0x7D, 0.0),
            (0x0B, 0x65, 101.0),
            (0x0D, 0x55, 85.0),
        ];
        for (pid, byte, expected) in cases {
            let value = decode(ParameterId::Standard(pid), &[byte]).unwrap();
            assert!((value - expected).abs() < 1e-9, "PID {:02X}: {}", pid, value);
        }
    }

    #[test]
    fn test_vendor_formulas() {
        let boost = decode(ParameterId::Vendor(0xF406), &[0x27, 0x10]).unwrap();
        assert!((boost - 1000.0).abs() < 1e-9);
        let timing = decode(ParameterId::Vendor(0xF41F), &[0x40]).unwrap();
        assert!((timing - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_input_fails() {
        assert_eq!(decode(ParameterId::Standard(0x0C), &[0x1A]), None);
        assert_eq!(decode(ParameterId::Standard(0x05), &[]), None);
        assert_eq!(decode(ParameterId::Vendor(0xF190), b"WVWZZZ1KZ"), None);
    }

    #[test]
    fn test_shared_formula_entries_stay_distinct() {
        let stft = lookup(ParameterId::Standard(0x06)).unwrap();
        let ltft = lookup(ParameterId::Standard(0x07)).unwrap();
        assert_eq!(stft.formula, ltft.formula);
        assert_eq!(stft.bytes, ltft.bytes);
        assert_ne!(stft.name, ltft.name);

        let catalysts: Vec<_> = (0x3C..=0x3F)
            .filter_map(|pid| lookup(ParameterId::Standard(pid)))
            .collect();
        assert_eq!(catalysts.len(), 4);
    }

    #[test]
    fn test_unknown_identifier_placeholder() {
        assert!(lookup(ParameterId::Standard(0x99)).is_none());

        let placeholder = definition(ParameterId::Standard(0x99));
        assert_eq!(placeholder.name, "Unknown PID 0x99");
        assert_eq!(placeholder.short_name, "0x99");
        assert_eq!(placeholder.unit, "");
        assert_eq!(placeholder.decode(&[0x2A]), Some(42.0));

        let placeholder = definition(ParameterId::Vendor(0x1040));
        assert_eq!(placeholder.name, "Unknown DID 0x1040");
        assert!(matches!(placeholder, Cow::Owned(_)));
    }

    #[test]
    fn test_known_definition_is_borrowed() {
        assert!(matches!(definition(ParameterId::Standard(0x0C)), Cow::Borrowed(_)));
    }

    #[test]
    fn test_commands() {
        assert_eq!(ParameterId::Standard(0x0C).command(), "010C");
        assert_eq!(ParameterId::Vendor(0xF486).command(), "22F486");
        assert_eq!(ParameterId::Vendor(0x2028).command(), "222028");
        assert_eq!(ParameterId::Standard(0x05).response_header(), 0x41);
        assert_eq!(ParameterId::Vendor(0xF486).response_header(), 0x62);
    }

    #[test]
    fn test_catalog_identifiers_unique() {
        for table in [standard_pids(), vendor_dids()] {
            for (i, parameter) in table.iter().enumerate() {
                assert!(table[i + 1..].iter().all(|other| other.id != parameter.id));
            }
        }
    }

    proptest! {
        #[test]
        fn prop_decode_total_on_full_width(data in proptest::collection::vec(any::<u8>(), 17..24)) {
            for parameter in standard_pids().iter().chain(vendor_dids()) {
                let value = parameter.decode(&data);
                prop_assert!(value.is_some(), "{} failed", parameter.id);
                prop_assert!(value.unwrap().is_finite());
            }
        }

        #[test]
        fn prop_decode_fails_on_short_input(data in proptest::collection::vec(any::<u8>(), 0..17)) {
            for parameter in standard_pids().iter().chain(vendor_dids()) {
                if data.len() < parameter.bytes {
                    prop_assert_eq!(parameter.decode(&data), None);
                }
            }
        }

        #[test]
        fn prop_decoded_values_within_range(a in any::<u8>(), b in any::<u8>()) {
            for parameter in standard_pids() {
                let value = parameter.decode(&[a, b]).unwrap();
                if let (Some(min), Some(max)) = (parameter.min, parameter.max) {
                    prop_assert!(value >= min - 1e-9 && value <= max + 1e-9,
                        "{} = {} outside [{}, {}]", parameter.id, value, min, max);
                }
            }
        }
    }
}
