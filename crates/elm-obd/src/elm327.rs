//! ELM327 Transport
//!
//! Owns the byte channel and turns one command string into one response
//! string. The ELM327 is half-duplex: it reads a command terminated by `\r`,
//! runs it, prints the reply and finishes with the `>` prompt. A new command
//! must never be written before the prompt of the previous one arrived.

use crate::channel::{ByteChannel, SerialChannel};
use crate::config::ConnectionConfig;
use crate::error::ObdError;
use crate::protocol::ObdProtocol;
use crate::reading::ReadError;
use crate::status::AdapterStatus;
use serde::Serialize;
use std::io;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Prompt byte printed when the adapter is ready for the next command
const PROMPT: u8 = b'>';

/// Interval between checks for incoming bytes while waiting for the prompt
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Configuration commands sent after the reset, in order
const SETUP_COMMANDS: [&str; 6] = [
    "ATE0",   // echo off
    "ATL0",   // linefeeds off
    "ATS0",   // spaces off
    "ATH1",   // headers on
    "ATCAF0", // CAN auto-formatting off
    "ATAT1",  // adaptive timing
];

/// Substrings of the `ATZ` banner of supported adapter families
const KNOWN_BANNERS: [&str; 3] = ["ELM", "OBDLINK", "STN"];

/// Lifecycle of the adapter link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    /// No open channel
    Disconnected,
    /// Channel open, adapter not configured
    Connected,
    /// Adapter configured and the ECU answered the liveness probe
    Initialized,
}

/// Adapter identification and status
#[derive(Debug, Clone, Serialize)]
pub struct AdapterInfo {
    /// `ATI` reply, e.g. "ELM327 v1.5"
    pub device_id: String,
    /// Battery voltage from `ATRV`
    pub voltage: Option<f64>,
    /// Active protocol from `ATDPN`
    pub protocol: Option<ObdProtocol>,
    /// Active protocol description from `ATDP`
    pub protocol_name: String,
}

/// ELM327 adapter connection
pub struct Elm327 {
    config: ConnectionConfig,
    channel: Option<Box<dyn ByteChannel>>,
    state: ConnectionState,
    /// Protocol selected by the last successful initialization
    protocol: Option<ObdProtocol>,
}

impl Elm327 {
    /// Create a disconnected transport
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            channel: None,
            state: ConnectionState::Disconnected,
            protocol: None,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Open the configured serial port
    pub fn connect(&mut self) -> Result<(), ObdError> {
        if self.channel.is_some() {
            debug!("Already connected to {}", self.config.port);
            return Ok(());
        }

        if self.config.port.trim().is_empty() {
            return Err(ObdError::Config("serial port is empty".to_string()));
        }
        if self.config.baud_rate == 0 {
            return Err(ObdError::Config("baud rate must be positive".to_string()));
        }

        info!(
            "Connecting to {} at {} baud",
            self.config.port, self.config.baud_rate
        );

        let channel =
            SerialChannel::open(&self.config.port, self.config.baud_rate, self.config.timeout())?;
        thread::sleep(self.config.timing.open_settle());

        self.attach(channel);
        Ok(())
    }

    /// Adopt an already-open channel
    pub fn attach(&mut self, channel: impl ByteChannel + 'static) {
        self.channel = Some(Box::new(channel));
        self.state = ConnectionState::Connected;
        self.protocol = None;
    }

    /// Close the channel. Safe to call repeatedly.
    pub fn disconnect(&mut self) {
        if self.channel.take().is_some() {
            info!("Disconnected from {}", self.config.port);
        }
        self.state = ConnectionState::Disconnected;
        self.protocol = None;
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state != ConnectionState::Disconnected
    }

    pub fn is_initialized(&self) -> bool {
        self.state == ConnectionState::Initialized
    }

    /// Protocol selected during initialization
    pub fn protocol(&self) -> Option<ObdProtocol> {
        self.protocol
    }

    /// Send a command and return the normalized response.
    ///
    /// Clears stale input, writes `command` followed by `\r`, waits `settle`,
    /// then collects bytes until the prompt arrives or the response timeout
    /// elapses. A timeout is not an error: whatever arrived is returned.
    ///
    /// The response keeps only ASCII text, has the prompt removed and holds
    /// one trimmed, non-empty line per adapter line. The first line is
    /// dropped only when it is an exact echo of `command`.
    ///
    /// Any channel fault closes the connection.
    pub fn send(&mut self, command: &str, settle: Duration) -> Result<String, ObdError> {
        let timeout = self.config.response_timeout();
        let channel = self.channel.as_mut().ok_or(ObdError::NotConnected)?;

        debug!("TX: {}", command);

        match exchange(&mut **channel, command, settle, timeout) {
            Ok(raw) => {
                let response = normalize(&raw, command);
                debug!("RX: {:?}", response);
                Ok(response)
            }
            Err(err) => {
                error!("Channel fault on {}: {}", command, err);
                self.channel = None;
                self.state = ConnectionState::Disconnected;
                self.protocol = None;
                Err(err.into())
            }
        }
    }

    /// Send a data request and classify what came back.
    ///
    /// An adapter error keyword becomes [`ReadError::Adapter`], a reply
    /// without a single hex digit becomes [`ReadError::NoResponse`].
    pub fn query(&mut self, command: &str, settle: Duration) -> Result<String, ReadError> {
        let response = self
            .send(command, settle)
            .map_err(|err| ReadError::Link(err.to_string()))?;

        if let Some(status) = AdapterStatus::detect(&response) {
            debug!("{} answered {}", command, status.keyword());
            return Err(ReadError::Adapter(status));
        }

        if !response.chars().any(|c| c.is_ascii_hexdigit()) {
            return Err(ReadError::NoResponse);
        }

        Ok(response)
    }

    /// Send a data request and keep only hex digits and line breaks.
    ///
    /// Returns `None` on adapter errors, silence or a channel fault.
    pub fn send_obd_command(&mut self, command: &str, settle: Duration) -> Option<String> {
        let response = self.query(command, settle).ok()?;
        Some(
            response
                .chars()
                .filter(|c| c.is_ascii_hexdigit() || *c == '\n')
                .collect(),
        )
    }

    /// Configure the adapter and verify the ECU answers.
    ///
    /// Runs `ATZ`, `ATE0`, `ATL0`, `ATS0`, `ATH1`, `ATCAF0`, `ATAT1` and
    /// `ATSP<protocol>`, then probes with `0100`. The connection stays
    /// `Connected` if any step fails.
    pub fn initialize(&mut self, protocol: ObdProtocol) -> Result<(), ObdError> {
        match self.state {
            ConnectionState::Disconnected => return Err(ObdError::NotConnected),
            ConnectionState::Initialized => {
                debug!("Adapter already initialized");
                return Ok(());
            }
            ConnectionState::Connected => {}
        }

        info!("Initializing adapter on {} ({})", self.config.port, protocol);
        let timing = self.config.timing.clone();

        let banner = self.configure("ATZ", timing.reset())?;
        let upper = banner.to_ascii_uppercase();
        if KNOWN_BANNERS.iter().any(|known| upper.contains(known)) {
            info!("Adapter: {}", banner.replace('\n', " "));
        } else {
            warn!("Unrecognized reset banner: {:?}", banner);
        }

        for command in SETUP_COMMANDS {
            self.configure(command, timing.command())?;
        }
        self.configure(protocol.to_elm_command(), timing.command())?;

        let probe = self.send("0100", timing.probe())?;
        if probe.is_empty() || AdapterStatus::detect(&probe).is_some() {
            error!("ECU did not answer 0100: {:?}", probe);
            return Err(ObdError::EcuNotResponding(probe));
        }

        self.protocol = Some(protocol);
        self.state = ConnectionState::Initialized;
        info!("Adapter initialized");
        Ok(())
    }

    fn configure(&mut self, command: &str, settle: Duration) -> Result<String, ObdError> {
        let response = self.send(command, settle)?;
        if AdapterStatus::detect(&response).is_some() {
            error!("Adapter rejected {}: {:?}", command, response);
            return Err(ObdError::InitFailed {
                command: command.to_string(),
                response,
            });
        }
        Ok(response)
    }

    /// Query adapter identification, battery voltage and active protocol
    pub fn adapter_info(&mut self) -> Result<AdapterInfo, ObdError> {
        let settle = self.config.timing.info();

        let device_id = self.send("ATI", settle)?;
        let voltage = parse_voltage(&self.send("ATRV", settle)?);
        let protocol_name = self.send("ATDP", settle)?;
        let protocol = ObdProtocol::from_code(self.send("ATDPN", settle)?.trim());

        Ok(AdapterInfo {
            device_id,
            voltage,
            protocol,
            protocol_name,
        })
    }

    /// Set the CAN ID requests are sent to (`ATSH`)
    pub fn set_header(&mut self, can_id: u16) -> Result<bool, ObdError> {
        let settle = self.config.timing.command();
        let response = self.send(&format!("ATSH{:03X}", can_id), settle)?;
        Ok(is_ok(&response))
    }

    /// Only accept replies from this CAN ID (`ATCRA`)
    pub fn set_receive_filter(&mut self, can_id: u16) -> Result<bool, ObdError> {
        let settle = self.config.timing.command();
        let response = self.send(&format!("ATCRA{:03X}", can_id), settle)?;
        Ok(is_ok(&response))
    }
}

impl Drop for Elm327 {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for Elm327 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Elm327")
            .field("port", &self.config.port)
            .field("state", &self.state)
            .field("protocol", &self.protocol)
            .finish()
    }
}

/// One command/response cycle on the raw channel
fn exchange(
    channel: &mut dyn ByteChannel,
    command: &str,
    settle: Duration,
    timeout: Duration,
) -> io::Result<Vec<u8>> {
    channel.clear_input()?;
    channel.write_all(format!("{}\r", command).as_bytes())?;
    if !settle.is_zero() {
        thread::sleep(settle);
    }

    let deadline = Instant::now() + timeout;
    let mut raw = Vec::new();
    let mut buf = [0u8; 256];

    loop {
        let available = channel.bytes_to_read()?;
        if available > 0 {
            let len = available.min(buf.len());
            let n = match channel.read(&mut buf[..len]) {
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::TimedOut => 0,
                Err(err) => return Err(err),
            };
            raw.extend_from_slice(&buf[..n]);
            if raw.contains(&PROMPT) {
                break;
            }
        }

        if Instant::now() >= deadline {
            debug!("No prompt after {:?} for {}", timeout, command);
            break;
        }
        if available == 0 {
            thread::sleep(POLL_INTERVAL);
        }
    }

    Ok(raw)
}

/// Turn raw adapter bytes into newline-separated response lines
fn normalize(raw: &[u8], command: &str) -> String {
    let text: String = raw
        .iter()
        .filter(|b| b.is_ascii() && **b != PROMPT)
        .map(|&b| if b == b'\r' { '\n' } else { b as char })
        .collect();

    let mut lines: Vec<&str> = text
        .lines()
        .map(|line| line.trim_matches(|c: char| c.is_whitespace() || c.is_ascii_control()))
        .filter(|line| !line.is_empty())
        .collect();

    if lines.first() == Some(&command) {
        lines.remove(0);
    }

    lines.join("\n")
}

/// First decimal number in an `ATRV` reply such as "12.6V"
fn parse_voltage(response: &str) -> Option<f64> {
    let start = response.find(|c: char| c.is_ascii_digit())?;
    let number: String = response[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    number.parse().ok()
}

fn is_ok(response: &str) -> bool {
    response.lines().any(|line| line.eq_ignore_ascii_case("OK"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MockChannel;
    use crate::config::Timing;

    fn test_config() -> ConnectionConfig {
        ConnectionConfig {
            response_timeout_ms: 50,
            timing: Timing::immediate(),
            ..ConnectionConfig::new("mock")
        }
    }

    fn attached(mock: &MockChannel) -> Elm327 {
        let mut elm = Elm327::new(test_config());
        elm.attach(mock.clone());
        elm
    }

    fn script_setup(mock: &MockChannel) {
        mock.expect("ATZ", "\r\rELM327 v1.5");
        mock.expect("ATE0", "ATE0\rOK");
        for command in &SETUP_COMMANDS[1..] {
            mock.expect(command, "OK");
        }
        mock.expect("ATSP6", "OK");
    }

    #[test]
    fn test_send_strips_prompt_and_blank_lines() {
        let mock = MockChannel::new();
        mock.expect("010C", "7E8 04 41 0C 1A F8\r");
        let mut elm = attached(&mock);

        let response = elm.send("010C", Duration::ZERO).unwrap();
        assert_eq!(response, "7E8 04 41 0C 1A F8");
    }

    #[test]
    fn test_send_drops_exact_echo_only() {
        let mock = MockChannel::new();
        mock.expect("0105", "0105\r7E8 03 41 05 7B");
        mock.expect("0105", "0106\r7E8 03 41 05 7B");
        let mut elm = attached(&mock);

        assert_eq!(elm.send("0105", Duration::ZERO).unwrap(), "7E8 03 41 05 7B");
        assert_eq!(
            elm.send("0105", Duration::ZERO).unwrap(),
            "0106\n7E8 03 41 05 7B"
        );
    }

    #[test]
    fn test_send_timeout_returns_partial() {
        let mock = MockChannel::new();
        mock.expect_raw("010D", b"7E8 03 41 0D 32");
        let mut elm = attached(&mock);

        let response = elm.send("010D", Duration::ZERO).unwrap();
        assert_eq!(response, "7E8 03 41 0D 32");
        assert!(elm.is_connected());
    }

    #[test]
    fn test_send_drops_non_ascii() {
        let mock = MockChannel::new();
        mock.expect_raw("ATI", b"\xffELM327 v1.5\r\r>");
        let mut elm = attached(&mock);
        assert_eq!(elm.send("ATI", Duration::ZERO).unwrap(), "ELM327 v1.5");
    }

    #[test]
    fn test_send_reads_long_reply_in_chunks() {
        let mock = MockChannel::new();
        let lines: Vec<String> = (0..40)
            .map(|i| format!("7E8 21 {:02X} 00 11 22 33 44 55", i))
            .collect();
        mock.expect("0902", &lines.join("\r"));
        let mut elm = attached(&mock);

        let response = elm.send("0902", Duration::ZERO).unwrap();
        assert!(lines.join("\r").len() > 256);
        assert_eq!(response.lines().count(), 40);
        assert_eq!(response.lines().last(), Some("7E8 21 27 00 11 22 33 44 55"));
    }

    #[test]
    fn test_connect_rejects_invalid_settings() {
        let mut elm = Elm327::new(ConnectionConfig {
            port: "  ".to_string(),
            ..test_config()
        });
        assert!(matches!(elm.connect(), Err(ObdError::Config(_))));

        let mut elm = Elm327::new(ConnectionConfig {
            baud_rate: 0,
            ..test_config()
        });
        assert!(matches!(elm.connect(), Err(ObdError::Config(_))));
        assert_eq!(elm.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_send_requires_connection() {
        let mut elm = Elm327::new(test_config());
        assert!(matches!(
            elm.send("ATI", Duration::ZERO),
            Err(ObdError::NotConnected)
        ));
    }

    #[test]
    fn test_write_fault_disconnects() {
        let mock = MockChannel::new();
        let mut elm = attached(&mock);
        mock.fail_writes(true);

        assert!(matches!(
            elm.send("0100", Duration::ZERO),
            Err(ObdError::SerialError(_))
        ));
        assert_eq!(elm.state(), ConnectionState::Disconnected);
        assert!(matches!(
            elm.send("0100", Duration::ZERO),
            Err(ObdError::NotConnected)
        ));
    }

    #[test]
    fn test_query_classifies_replies() {
        let mock = MockChannel::new();
        mock.expect("0146", "SEARCHING...\rNO DATA");
        mock.expect("015C", "");
        mock.expect("ATXX", "?");
        mock.expect("010D", "7E8 03 41 0D 32");
        let mut elm = attached(&mock);

        assert_eq!(
            elm.query("0146", Duration::ZERO),
            Err(ReadError::Adapter(AdapterStatus::NoData))
        );
        assert_eq!(elm.query("015C", Duration::ZERO), Err(ReadError::NoResponse));
        assert_eq!(
            elm.query("ATXX", Duration::ZERO),
            Err(ReadError::Adapter(AdapterStatus::UnknownCommand))
        );
        assert_eq!(elm.query("010D", Duration::ZERO).unwrap(), "7E8 03 41 0D 32");
    }

    #[test]
    fn test_send_obd_command_keeps_hex_only() {
        let mock = MockChannel::new();
        mock.expect("010D", "7E8 03 41 0D 32\r7E9 03 41 0D 31");
        mock.expect("010D", "NO DATA");
        let mut elm = attached(&mock);

        assert_eq!(
            elm.send_obd_command("010D", Duration::ZERO).unwrap(),
            "7E803410D32\n7E903410D31"
        );
        assert_eq!(elm.send_obd_command("010D", Duration::ZERO), None);
    }

    #[test]
    fn test_initialize_sequence() {
        let mock = MockChannel::new();
        script_setup(&mock);
        mock.expect("0100", "7E8 06 41 00 BE 3F A8 13");
        let mut elm = attached(&mock);

        elm.initialize(ObdProtocol::Iso15765_4Can11bit500).unwrap();

        assert!(elm.is_initialized());
        assert_eq!(elm.protocol(), Some(ObdProtocol::Iso15765_4Can11bit500));
        assert_eq!(
            mock.sent(),
            vec!["ATZ", "ATE0", "ATL0", "ATS0", "ATH1", "ATCAF0", "ATAT1", "ATSP6", "0100"]
        );

        // Already initialized: nothing is sent
        elm.initialize(ObdProtocol::Iso15765_4Can11bit500).unwrap();
        assert_eq!(mock.sent().len(), 9);
    }

    #[test]
    fn test_initialize_ecu_silent() {
        let mock = MockChannel::new();
        script_setup(&mock);
        mock.expect("0100", "SEARCHING...\rUNABLE TO CONNECT");
        let mut elm = attached(&mock);

        let err = elm.initialize(ObdProtocol::Iso15765_4Can11bit500).unwrap_err();
        assert!(matches!(err, ObdError::EcuNotResponding(_)));
        assert_eq!(elm.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_initialize_rejected_command() {
        let mock = MockChannel::new();
        mock.expect("ATZ", "ELM327 v2.1");
        mock.expect("ATE0", "OK");
        mock.expect("ATL0", "?");
        let mut elm = attached(&mock);

        match elm.initialize(ObdProtocol::Auto) {
            Err(ObdError::InitFailed { command, response }) => {
                assert_eq!(command, "ATL0");
                assert_eq!(response, "?");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(elm.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_initialize_requires_connection() {
        let mut elm = Elm327::new(test_config());
        assert!(matches!(
            elm.initialize(ObdProtocol::Auto),
            Err(ObdError::NotConnected)
        ));
    }

    #[test]
    fn test_adapter_info() {
        let mock = MockChannel::new();
        mock.expect("ATI", "ELM327 v1.5");
        mock.expect("ATRV", "12.6V");
        mock.expect("ATDP", "ISO 15765-4 (CAN 11/500)");
        mock.expect("ATDPN", "A6");
        let mut elm = attached(&mock);

        let info = elm.adapter_info().unwrap();
        assert_eq!(info.device_id, "ELM327 v1.5");
        assert_eq!(info.voltage, Some(12.6));
        assert_eq!(info.protocol, Some(ObdProtocol::Iso15765_4Can11bit500));
        assert_eq!(info.protocol_name, "ISO 15765-4 (CAN 11/500)");
    }

    #[test]
    fn test_header_and_filter() {
        let mock = MockChannel::new();
        mock.expect("ATSH7E0", "OK");
        mock.expect("ATCRA7E8", "?");
        let mut elm = attached(&mock);

        assert!(elm.set_header(0x7E0).unwrap());
        assert!(!elm.set_receive_filter(0x7E8).unwrap());
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let mock = MockChannel::new();
        let mut elm = attached(&mock);
        elm.disconnect();
        elm.disconnect();
        assert_eq!(elm.state(), ConnectionState::Disconnected);
        assert!(!elm.is_connected());
    }

    #[test]
    fn test_parse_voltage() {
        assert_eq!(parse_voltage("12.6V"), Some(12.6));
        assert_eq!(parse_voltage("V 14.1"), Some(14.1));
        assert_eq!(parse_voltage("?"), None);
    }
}
