//! OBD-II Monitor - Main Entry Point
//!
//! Connects to an ELM327 adapter, initializes it and runs one command:
//! adapter info, one-shot reads, support scans, trouble codes, the oil
//! temperature search or a live monitor.

mod commands;
mod oil;
mod settings;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use elm_obd::{Elm327, ObdError, ObdProtocol, ObdReader};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::settings::Overrides;

#[derive(Parser)]
#[command(name = "obd-monitor")]
#[command(author, version, about = "ELM327 OBD-II reader and monitor")]
#[command(propagate_version = true)]
struct Cli {
    /// Serial port of the adapter (e.g. /dev/rfcomm0, /dev/ttyUSB0, COM3)
    #[arg(short, long, env = "OBD_PORT")]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long)]
    baud: Option<u32>,

    /// Bus protocol code (0 = auto, 6 = CAN 11 bit 500 kbaud, ...)
    #[arg(long)]
    protocol: Option<ObdProtocol>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging (every command and response)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show adapter identification, battery voltage and protocol
    Info,

    /// Read PIDs and vendor DIDs once (common PIDs if none given)
    Read {
        /// Standard PID(s) in hex, e.g. 0C or 0x0C
        #[arg(long = "pid", value_parser = commands::parse_pid)]
        pids: Vec<u8>,

        /// Vendor DID(s) in hex, e.g. F486
        #[arg(long = "did", value_parser = commands::parse_did)]
        dids: Vec<u16>,
    },

    /// Discover supported PIDs and vendor DIDs
    Scan,

    /// List stored trouble codes
    Dtc,

    /// Search for an engine oil temperature reading
    OilTemp,

    /// Read common PIDs repeatedly
    Monitor {
        /// Seconds between refreshes
        #[arg(long, default_value = "1.0")]
        interval: f64,

        /// Stop after this many refreshes
        #[arg(long)]
        count: Option<u64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let overrides = Overrides {
        port: cli.port.clone(),
        baud_rate: cli.baud,
        protocol: cli.protocol,
    };
    let config = settings::load(cli.config.as_deref(), &overrides)?;
    let protocol = config.protocol;
    let port = config.port.clone();

    info!("=== OBD Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    let mut connection = Elm327::new(config);
    connection
        .connect()
        .with_context(|| format!("Failed to open serial port {}", port))?;

    match connection.initialize(protocol) {
        Ok(()) => {}
        Err(err @ ObdError::EcuNotResponding(_)) => {
            return Err(err)
                .context("Adapter ready but the ECU is silent; check that the ignition is on");
        }
        Err(err) => return Err(err).context("Failed to initialize adapter"),
    }

    let mut reader = ObdReader::new(connection);

    match &cli.command {
        Commands::Info => commands::info(&mut reader)?,
        Commands::Read { pids, dids } => commands::read(&mut reader, pids, dids),
        Commands::Scan => commands::scan(&mut reader),
        Commands::Dtc => commands::dtc(&mut reader),
        Commands::OilTemp => commands::oil_temp(&mut reader),
        Commands::Monitor { interval, count } => {
            commands::monitor(&mut reader, *interval, *count)?
        }
    }

    reader.connection_mut().disconnect();
    Ok(())
}

/// Log to stderr; `RUST_LOG` applies unless `--verbose` is given
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
