//! Subcommand implementations
//!
//! Plain text on stdout; diagnostics go through `tracing` to stderr.

use anyhow::{ensure, Result};
use elm_obd::registry::{self, COMMON_PIDS};
use elm_obd::{ObdReader, ParameterId, Reading};
use std::thread;
use std::time::Duration;
use tracing::info;

use crate::oil::{self, OilSource};

/// Vendor DIDs shown next to the common PIDs on every monitor refresh
const MONITOR_DIDS: [u16; 2] = [0xF486, 0x2028];

/// Show adapter identification
pub fn info(reader: &mut ObdReader) -> Result<()> {
    let info = reader.connection_mut().adapter_info()?;

    println!("Adapter:  {}", info.device_id.lines().next().unwrap_or(""));
    match info.voltage {
        Some(voltage) => println!("Battery:  {:.1} V", voltage),
        None => println!("Battery:  unknown"),
    }
    println!("Protocol: {}", info.protocol_name);
    Ok(())
}

/// Read the given parameters once
pub fn read(reader: &mut ObdReader, pids: &[u8], dids: &[u16]) {
    let pids = if pids.is_empty() && dids.is_empty() {
        &COMMON_PIDS[..]
    } else {
        pids
    };

    let mut readings: Vec<Reading> = pids.iter().map(|&pid| reader.read_pid(pid)).collect();
    readings.extend(dids.iter().map(|&did| reader.read_did(did)));

    for reading in &readings {
        println!("{}", format_row(reading));
    }
}

/// Scan for supported PIDs, then probe vendor DIDs
pub fn scan(reader: &mut ObdReader) {
    let pids = reader.scan_supported_pids();
    println!("Supported standard PIDs ({}):", pids.len());
    for pid in pids {
        match registry::lookup(ParameterId::Standard(pid)) {
            Some(_) => println!("{}", format_row(&reader.read_pid(pid))),
            None => println!("  0x{:02X}  {:<32}", pid, "Unknown"),
        }
    }

    if reader.enter_extended_session() {
        println!("Extended diagnostic session active");
    }

    let dids = reader.scan_dids(None);
    println!("Supported vendor DIDs ({}):", dids.len());
    for did in dids {
        let definition = registry::definition(ParameterId::Vendor(did));
        println!("  0x{:04X}  {}", did, definition.name);
    }
}

/// List stored trouble codes
pub fn dtc(reader: &mut ObdReader) {
    let codes = reader.read_dtcs();
    if codes.is_empty() {
        println!("No stored trouble codes");
        return;
    }

    println!("Stored trouble codes ({}):", codes.len());
    for code in codes {
        println!("  {}", code);
    }
}

/// Search for an oil temperature reading and explain where it was found
pub fn oil_temp(reader: &mut ObdReader) {
    match oil::find_oil_temperature(reader) {
        Some(found) => {
            let how = match found.source {
                OilSource::Pid(pid) => format!("standard PID 0x{:02X}", pid),
                OilSource::Did(did) => format!("DID 0x{:04X}", did),
                OilSource::ExtendedDid(did) => {
                    format!("DID 0x{:04X} in the extended session", did)
                }
            };
            println!("Oil temperature: {} (via {})", found.reading.format_value(1), how);
        }
        None => {
            println!("Could not find an oil temperature reading");
            println!("The ECU may need other DIDs or security access; try `scan`");
        }
    }
}

/// Print common PIDs and the monitored vendor DIDs every `interval` seconds
pub fn monitor(reader: &mut ObdReader, interval: f64, count: Option<u64>) -> Result<()> {
    ensure!(
        interval.is_finite() && interval >= 0.0,
        "Invalid refresh interval: {}",
        interval
    );
    let interval = Duration::from_secs_f64(interval);

    info!(
        "Monitoring {} PIDs and {} DIDs every {:?}",
        COMMON_PIDS.len(),
        MONITOR_DIDS.len(),
        interval
    );

    let mut refreshes = 0u64;
    while count.map_or(true, |count| refreshes < count) {
        let mut readings: Vec<Reading> =
            reader.read_multiple_pids(&COMMON_PIDS).into_values().collect();
        readings.extend(MONITOR_DIDS.iter().map(|&did| reader.read_did(did)));

        let stamp = readings
            .first()
            .map(|reading| reading.timestamp.format("%H:%M:%S").to_string())
            .unwrap_or_default();

        println!("--- {} ---", stamp);
        for reading in &readings {
            println!("{}", format_row(reading));
        }

        ensure!(
            reader.connection().is_connected(),
            "Connection to the adapter was lost"
        );

        refreshes += 1;
        thread::sleep(interval);
    }

    Ok(())
}

/// One output line: identifier, name, value or error
pub fn format_row(reading: &Reading) -> String {
    let status = match &reading.error {
        Some(error) => format!("({})", error),
        None => reading.format_value(1),
    };
    format!("  {:<10} {:<32} {}", reading.id.to_string(), reading.name, status)
}

/// Parse a PID given as hex, with or without `0x`
pub fn parse_pid(text: &str) -> Result<u8, String> {
    u8::from_str_radix(strip_hex_prefix(text), 16)
        .map_err(|err| format!("invalid PID {:?}: {}", text, err))
}

/// Parse a DID given as hex, with or without `0x`
pub fn parse_did(text: &str) -> Result<u16, String> {
    u16::from_str_radix(strip_hex_prefix(text), 16)
        .map_err(|err| format!("invalid DID {:?}: {}", text, err))
}

fn strip_hex_prefix(text: &str) -> &str {
    let text = text.trim();
    text.strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text)
}
