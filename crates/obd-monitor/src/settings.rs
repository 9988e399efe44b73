//! Layered connection settings
//!
//! Precedence, lowest first: built-in defaults, `obd-monitor.toml` in the
//! working directory, the `--config` file, `OBD_*` environment variables
//! (`OBD_BAUD_RATE`, `OBD_TIMING__RESET_MS`, ...), command-line flags.

use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use elm_obd::{ConnectionConfig, ObdProtocol};
use std::path::Path;
use tracing::debug;

/// Settings given directly on the command line
#[derive(Debug, Default)]
pub struct Overrides {
    pub port: Option<String>,
    pub baud_rate: Option<u32>,
    pub protocol: Option<ObdProtocol>,
}

impl Overrides {
    fn apply(&self, config: &mut ConnectionConfig) {
        if let Some(port) = &self.port {
            config.port = port.clone();
        }
        if let Some(baud_rate) = self.baud_rate {
            config.baud_rate = baud_rate;
        }
        if let Some(protocol) = self.protocol {
            config.protocol = protocol;
        }
    }
}

/// Load connection settings from every source
pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<ConnectionConfig> {
    let mut builder = Config::builder().add_source(File::with_name("obd-monitor").required(false));

    if let Some(path) = path {
        builder = builder.add_source(File::from(path));
    }

    resolve(builder.add_source(environment()), overrides)
}

/// `OBD_*` variables; numbers are parsed, so `OBD_PROTOCOL=6` arrives as an integer
fn environment() -> Environment {
    Environment::with_prefix("OBD")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn resolve(
    builder: ConfigBuilder<DefaultState>,
    overrides: &Overrides,
) -> Result<ConnectionConfig> {
    let mut config: ConnectionConfig = builder
        .build()
        .context("Failed to read configuration")?
        .try_deserialize()
        .context("Invalid configuration")?;

    overrides.apply(&mut config);
    debug!("Connection settings: {:?}", config);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{FileFormat, Map};

    fn from_toml(toml: &str, overrides: &Overrides) -> Result<ConnectionConfig> {
        let builder = Config::builder().add_source(File::from_str(toml, FileFormat::Toml));
        resolve(builder, overrides)
    }

    #[test]
    fn test_defaults_when_empty() {
        let config = from_toml("", &Overrides::default()).unwrap();
        assert_eq!(config.port, "/dev/rfcomm0");
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.protocol, ObdProtocol::Iso15765_4Can11bit500);
    }

    #[test]
    fn test_file_values() {
        let toml = r#"
            port = "/dev/ttyUSB0"
            baud_rate = 38400
            protocol = "0"

            [timing]
            reset_ms = 2000
        "#;
        let config = from_toml(toml, &Overrides::default()).unwrap();
        assert_eq!(config.port, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, 38_400);
        assert_eq!(config.protocol, ObdProtocol::Auto);
        assert_eq!(config.timing.reset_ms, 2000);
        assert_eq!(config.timing.command_ms, 100);
    }

    #[test]
    fn test_flags_win() {
        let overrides = Overrides {
            port: Some("COM3".to_string()),
            baud_rate: None,
            protocol: Some(ObdProtocol::Iso15765_4Can29bit500),
        };
        let config = from_toml("port = \"/dev/ttyUSB0\"\nbaud_rate = 38400", &overrides).unwrap();
        assert_eq!(config.port, "COM3");
        assert_eq!(config.baud_rate, 38_400);
        assert_eq!(config.protocol, ObdProtocol::Iso15765_4Can29bit500);
    }

    #[test]
    fn test_numeric_protocol_codes() {
        let config = from_toml("protocol = 7", &Overrides::default()).unwrap();
        assert_eq!(config.protocol, ObdProtocol::Iso15765_4Can29bit500);

        let variables: Map<String, String> = [
            ("OBD_PROTOCOL", "0"),
            ("OBD_BAUD_RATE", "38400"),
            ("OBD_TIMING__RESET_MS", "2500"),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
        let builder = Config::builder()
            .add_source(File::from_str("protocol = \"6\"", FileFormat::Toml))
            .add_source(environment().source(Some(variables)));

        let config = resolve(builder, &Overrides::default()).unwrap();
        assert_eq!(config.protocol, ObdProtocol::Auto);
        assert_eq!(config.baud_rate, 38_400);
        assert_eq!(config.timing.reset_ms, 2500);
    }

    #[test]
    fn test_invalid_value() {
        assert!(from_toml("baud_rate = \"fast\"", &Overrides::default()).is_err());
        assert!(from_toml("protocol = 12", &Overrides::default()).is_err());
    }
}
