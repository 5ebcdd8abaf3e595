//! Application settings and connection configuration

use crate::core::error::SessionError;
use crate::core::reader::ReaderConfig;
use crate::core::selector::PortSelector;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Standard baud rates offered for selection
pub const STANDARD_BAUD_RATES: [u32; 18] = [
    300, 600, 1200, 2400, 4800, 9600, 14400, 19200, 28800, 38400, 57600, 115200, 230400, 460800,
    921600, 1843200, 3000000, 3686400,
];

/// Default baud rate
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// A validated baud rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct BaudRate(u32);

impl BaudRate {
    /// Accept any positive rate; non-standard rates are caller overrides
    pub fn new(rate: u32) -> Result<Self, SessionError> {
        if rate == 0 {
            return Err(SessionError::InvalidBaudRate(rate));
        }
        Ok(Self(rate))
    }

    /// Bits per second
    pub fn value(self) -> u32 {
        self.0
    }

    /// Whether the rate is one of [`STANDARD_BAUD_RATES`]
    pub fn is_standard(self) -> bool {
        STANDARD_BAUD_RATES.contains(&self.0)
    }
}

impl Default for BaudRate {
    fn default() -> Self {
        Self(DEFAULT_BAUD_RATE)
    }
}

impl TryFrom<u32> for BaudRate {
    type Error = SessionError;

    fn try_from(rate: u32) -> Result<Self, Self::Error> {
        Self::new(rate)
    }
}

impl From<BaudRate> for u32 {
    fn from(rate: BaudRate) -> Self {
        rate.0
    }
}

impl fmt::Display for BaudRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rates to offer: the standard set plus `current` if it is an override
pub fn available_baud_rates(current: BaudRate) -> Vec<u32> {
    let mut rates = STANDARD_BAUD_RATES.to_vec();
    if !current.is_standard() {
        rates.push(current.value());
    }
    rates
}

/// Byte sequence appended to every sent message
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineTerminator {
    /// Line Feed only
    #[default]
    Lf,
    /// Carriage Return only
    Cr,
    /// Both CR and LF
    CrLf,
    /// Nothing appended
    None,
    /// Arbitrary sequence
    Custom(String),
}

impl LineTerminator {
    /// Get the byte sequence for this terminator
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Lf => b"\n",
            Self::Cr => b"\r",
            Self::CrLf => b"\r\n",
            Self::None => b"",
            Self::Custom(s) => s.as_bytes(),
        }
    }
}

/// Everything a session needs to know at construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Port to open; `None` means "the only port present"
    pub port_selector: Option<PortSelector>,
    /// Link speed
    pub baud_rate: BaudRate,
    /// Appended to every sent message
    pub line_terminator: LineTerminator,
    /// Connect once right after construction
    pub auto_connect: bool,
    /// Close when the last external view is released
    pub auto_disconnect: bool,
    /// Poll the port list in the background
    pub auto_refresh: bool,
    /// Port poll interval
    pub poll_interval: Duration,
    /// Line reader timing
    #[serde(skip)]
    pub reader: ReaderConfig,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port_selector: None,
            baud_rate: BaudRate::default(),
            line_terminator: LineTerminator::default(),
            auto_connect: false,
            auto_disconnect: true,
            auto_refresh: true,
            poll_interval: Duration::from_secs(1),
            reader: ReaderConfig::default(),
        }
    }
}

impl ConnectionConfig {
    /// Config selecting `selector`
    pub fn new(selector: Option<PortSelector>) -> Self {
        Self {
            port_selector: selector,
            ..Self::default()
        }
    }

    /// Set baud rate
    #[must_use]
    pub fn baud_rate(mut self, rate: BaudRate) -> Self {
        self.baud_rate = rate;
        self
    }

    /// Set line terminator
    #[must_use]
    pub fn line_terminator(mut self, terminator: LineTerminator) -> Self {
        self.line_terminator = terminator;
        self
    }

    /// Enable auto-connect
    #[must_use]
    pub fn auto_connect(mut self, enable: bool) -> Self {
        self.auto_connect = enable;
        self
    }

    /// Enable auto-disconnect
    #[must_use]
    pub fn auto_disconnect(mut self, enable: bool) -> Self {
        self.auto_disconnect = enable;
        self
    }

    /// Enable background port polling
    #[must_use]
    pub fn auto_refresh(mut self, enable: bool) -> Self {
        self.auto_refresh = enable;
        self
    }

    /// Set the port poll interval
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set reader timing
    #[must_use]
    pub fn reader(mut self, reader: ReaderConfig) -> Self {
        self.reader = reader;
        self
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Connection defaults
    pub connection: ConnectionSettings,
    /// Polling intervals
    pub polling: PollingSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

impl AppConfig {
    /// Load config from the default location, falling back to defaults
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = super::config_file().ok_or("Could not determine config directory")?;
        Self::load_from(&config_path)
    }

    /// Load config from `path`, falling back to defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let config_path = super::config_file().ok_or("Could not determine config directory")?;
        self.save_to(&config_path)
    }

    /// Save config to `path`
    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Session configuration derived from these settings
    pub fn connection_config(
        &self,
        selector: Option<PortSelector>,
    ) -> Result<ConnectionConfig, SessionError> {
        Ok(ConnectionConfig {
            port_selector: selector,
            baud_rate: BaudRate::new(self.connection.baud_rate)?,
            line_terminator: self.connection.line_terminator.clone(),
            auto_connect: self.connection.auto_connect,
            auto_disconnect: self.connection.auto_disconnect,
            auto_refresh: self.connection.auto_refresh,
            poll_interval: seconds(self.polling.port_interval_secs)?.max(MIN_PORT_INTERVAL),
            reader: ReaderConfig {
                read_timeout: Duration::from_millis(self.polling.read_timeout_ms.max(1)),
                poll_interval: Duration::from_millis(self.polling.reader_interval_ms),
            },
        })
    }
}

/// Floor for the port poll interval
const MIN_PORT_INTERVAL: Duration = Duration::from_millis(10);

/// Duration from a seconds value, rejecting negative, NaN and infinite input
pub fn seconds(value: f64) -> Result<Duration, SessionError> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| SessionError::InvalidInterval(format!("{} seconds: {}", value, e)))
}

/// Connection defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Baud rate
    pub baud_rate: u32,
    /// Line terminator
    pub line_terminator: LineTerminator,
    /// Connect on startup
    pub auto_connect: bool,
    /// Close when the last view goes away
    pub auto_disconnect: bool,
    /// Poll the port list
    pub auto_refresh: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            line_terminator: LineTerminator::Lf,
            auto_connect: false,
            auto_disconnect: true,
            auto_refresh: true,
        }
    }
}

/// Polling intervals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    /// Port list poll interval (seconds)
    pub port_interval_secs: f64,
    /// Upper bound of one blocking read (milliseconds)
    pub read_timeout_ms: u64,
    /// Pause between reads (milliseconds)
    pub reader_interval_ms: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            port_interval_secs: 1.0,
            read_timeout_ms: 100,
            reader_interval_ms: 1,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Also write logs to a daily rolling file
    pub file: bool,
    /// Log directory (defaults to the data directory)
    pub directory: Option<PathBuf>,
    /// Filter directive used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            file: false,
            directory: None,
            filter: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baud_rate_validation() {
        assert!(BaudRate::new(0).is_err());
        assert!(BaudRate::new(115200).unwrap().is_standard());
        assert!(!BaudRate::new(250000).unwrap().is_standard());
        assert_eq!(BaudRate::default().value(), 9600);
    }

    #[test]
    fn test_override_rate_is_offered() {
        let rates = available_baud_rates(BaudRate::new(250000).unwrap());
        assert_eq!(rates.len(), STANDARD_BAUD_RATES.len() + 1);
        assert_eq!(rates.last(), Some(&250000));

        let rates = available_baud_rates(BaudRate::default());
        assert_eq!(rates, STANDARD_BAUD_RATES.to_vec());
    }

    #[test]
    fn test_terminator_bytes() {
        assert_eq!(LineTerminator::default().as_bytes(), b"\n");
        assert_eq!(LineTerminator::CrLf.as_bytes(), b"\r\n");
        assert_eq!(LineTerminator::Custom(";".into()).as_bytes(), b";");
    }

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.connection.baud_rate = 115200;
        config.connection.line_terminator = LineTerminator::CrLf;
        config.polling.port_interval_secs = 0.5;
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = AppConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded, AppConfig::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[connection]\nbaud_rate = 57600\n").unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.connection.baud_rate, 57600);
        assert!(loaded.connection.auto_refresh);
        assert_eq!(loaded.polling, PollingSettings::default());
    }

    #[test]
    fn test_unbounded_interval_rejected() {
        let mut app = AppConfig::default();
        app.polling.port_interval_secs = f64::INFINITY;
        assert!(matches!(
            app.connection_config(None),
            Err(SessionError::InvalidInterval(_))
        ));

        app.polling.port_interval_secs = f64::NAN;
        assert!(app.connection_config(None).is_err());

        app.polling.port_interval_secs = 0.0;
        let config = app.connection_config(None).unwrap();
        assert_eq!(config.poll_interval, MIN_PORT_INTERVAL);
    }

    #[test]
    fn test_infinite_interval_from_toml() {
        let app: AppConfig = toml::from_str("[polling]\nport_interval_secs = inf\n").unwrap();
        assert!(app.connection_config(None).is_err());
    }

    #[test]
    fn test_connection_config_from_settings() {
        let mut app = AppConfig::default();
        app.connection.auto_connect = true;
        app.polling.read_timeout_ms = 50;

        let config = app
            .connection_config(Some(PortSelector::serial_number("A1")))
            .unwrap();
        assert!(config.auto_connect);
        assert_eq!(config.reader.read_timeout, Duration::from_millis(50));
        assert_eq!(config.poll_interval, Duration::from_secs(1));

        app.connection.baud_rate = 0;
        assert!(matches!(
            app.connection_config(None),
            Err(SessionError::InvalidBaudRate(0))
        ));
    }
}
