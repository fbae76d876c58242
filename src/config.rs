//! Configuration management for the GSM panic controller
//!
//! This module handles loading and validation of the controller configuration
//! from YAML files. The controller never mutates a loaded [`Config`]; it asks
//! its [`ConfigProvider`] for a fresh snapshot at the top of every restart
//! cycle, so edits on disk take effect on the next restart.

mod defaults;

use crate::error::{GsmPanicError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Placeholder substituted with the device hardware id in USB commands
pub const HWID_PLACEHOLDER: &str = "{hwid}";

/// Restart delay used when the configured one cannot be represented
pub const DEFAULT_RESTART_DELAY_SECS: f64 = 5.0;

/// Accepted restart delay range in seconds
pub const MIN_RESTART_DELAY_SECS: f64 = 0.01;
pub const MAX_RESTART_DELAY_SECS: f64 = 3600.0;

/// Upper bound for the modem poll, timeout and debounce intervals (one week)
pub const MAX_MODEM_INTERVAL_SECS: u64 = 7 * 24 * 3600;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Whether panic-call reception is enabled at all
    pub enabled: bool,

    /// Serial device the modem is attached to (e.g. `COM3`, `/dev/ttyUSB0`)
    pub com_port: String,

    /// Hardware id of the serial device (e.g. `USB\VID_1A86&PID_7523\5&2B1`)
    pub com_port_hwid: String,

    /// Local UDP port the relay socket binds to
    pub udp_local_port: u16,

    /// Host receiving panic reports
    pub udp_target_host: String,

    /// UDP port receiving panic reports
    pub udp_target_port: u16,

    /// Power-cycle the USB serial adapter after repeated I/O errors
    pub usb_auto_rescan: bool,

    /// Modem dialogue settings
    pub modem: ModemConfig,

    /// Restart and recovery policy
    pub recovery: RecoveryConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Modem dialogue parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModemConfig {
    /// Serial baud rate
    pub baud_rate: u32,

    /// Interval between SIM/registration/signal queries in seconds
    pub status_poll_interval_secs: u64,

    /// Silence from the modem longer than this is treated as a serial error
    pub response_timeout_secs: u64,

    /// USSD code used to query the SIM balance; empty disables balance queries
    pub balance_ussd: String,

    /// Interval between balance queries in seconds
    pub balance_poll_interval_secs: u64,

    /// Caller-ID repeats within this window belong to the same panic call
    pub call_debounce_secs: u64,
}

/// Restart and recovery policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Delay before a stopped or failed loop is restarted, in seconds
    pub restart_delay: f64,

    /// Only every Nth consecutive transport error is logged at error level
    pub error_log_divisor: u64,

    /// Serial errors tolerated before the USB adapter is power-cycled
    pub usb_rescan_error_threshold: u64,

    /// Command removing the USB device; `{hwid}` is replaced by the hardware id
    pub usb_remove_command: String,

    /// Command rescanning the bus after removal
    pub usb_rescan_command: String,

    /// Poll interval while waiting for an external process, in milliseconds
    pub process_poll_interval_ms: u64,

    /// Maximum number of polls before an external process is abandoned
    pub process_max_polls: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Optional console level override
    pub console_level: Option<String>,

    /// Optional file level override
    pub file_level: Option<String>,

    /// Path to log file
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the first default location that exists
    pub fn load() -> Result<Self> {
        let default_paths = [
            "gsm_panic.yaml",
            "/data/gsm_panic.yaml",
            "/etc/gsm-panic/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        // Fall back to default configuration
        Ok(Self::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.com_port.trim().is_empty() {
            return Err(GsmPanicError::validation(
                "com_port",
                "Serial port cannot be empty",
            ));
        }

        if self.udp_target_port == 0 {
            return Err(GsmPanicError::validation(
                "udp_target_port",
                "Port must be greater than 0",
            ));
        }

        if self.udp_target_host.trim().is_empty() {
            return Err(GsmPanicError::validation(
                "udp_target_host",
                "Target host cannot be empty",
            ));
        }

        if self.modem.baud_rate == 0 {
            return Err(GsmPanicError::validation(
                "modem.baud_rate",
                "Must be greater than 0",
            ));
        }

        if self.modem.status_poll_interval_secs == 0 {
            return Err(GsmPanicError::validation(
                "modem.status_poll_interval_secs",
                "Must be greater than 0",
            ));
        }

        for (field, secs) in [
            (
                "modem.status_poll_interval_secs",
                self.modem.status_poll_interval_secs,
            ),
            ("modem.response_timeout_secs", self.modem.response_timeout_secs),
            (
                "modem.balance_poll_interval_secs",
                self.modem.balance_poll_interval_secs,
            ),
            ("modem.call_debounce_secs", self.modem.call_debounce_secs),
        ] {
            if secs > MAX_MODEM_INTERVAL_SECS {
                return Err(GsmPanicError::validation(
                    field.to_string(),
                    format!("Must not exceed {} seconds", MAX_MODEM_INTERVAL_SECS),
                ));
            }
        }

        if self.modem.response_timeout_secs <= self.modem.status_poll_interval_secs {
            return Err(GsmPanicError::validation(
                "modem.response_timeout_secs",
                "Must exceed the status poll interval",
            ));
        }

        if !(MIN_RESTART_DELAY_SECS..=MAX_RESTART_DELAY_SECS)
            .contains(&self.recovery.restart_delay)
        {
            return Err(GsmPanicError::validation(
                "recovery.restart_delay".to_string(),
                format!(
                    "Must be between {} and {} seconds",
                    MIN_RESTART_DELAY_SECS, MAX_RESTART_DELAY_SECS
                ),
            ));
        }

        if self.recovery.error_log_divisor == 0 {
            return Err(GsmPanicError::validation(
                "recovery.error_log_divisor",
                "Must be greater than 0",
            ));
        }

        if self.recovery.usb_rescan_error_threshold == 0 {
            return Err(GsmPanicError::validation(
                "recovery.usb_rescan_error_threshold",
                "Must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Restart delay as a [`std::time::Duration`], clamped to the accepted range.
    ///
    /// Unrepresentable values (NaN) fall back to the default delay.
    pub fn restart_delay(&self) -> std::time::Duration {
        let secs = self
            .recovery
            .restart_delay
            .clamp(MIN_RESTART_DELAY_SECS, MAX_RESTART_DELAY_SECS);
        std::time::Duration::try_from_secs_f64(secs)
            .unwrap_or(std::time::Duration::from_secs_f64(DEFAULT_RESTART_DELAY_SECS))
    }
}

/// Source of configuration snapshots.
///
/// Implementations must be cheap to call repeatedly: the controller reloads
/// once per supervisor iteration and once per transport restart.
pub trait ConfigProvider: Send + Sync {
    /// Load a fresh configuration snapshot
    fn load_config(&self) -> Result<Config>;
}

/// Configuration provider backed by a YAML file
#[derive(Debug, Clone, Default)]
pub struct FileConfigProvider {
    path: Option<PathBuf>,
}

impl FileConfigProvider {
    /// Read from an explicit path
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Search the default locations on every load
    pub const fn from_default_locations() -> Self {
        Self { path: None }
    }
}

impl ConfigProvider for FileConfigProvider {
    fn load_config(&self) -> Result<Config> {
        let config = match &self.path {
            Some(path) => Config::from_file(path)?,
            None => Config::load()?,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.enabled);
        assert_eq!(config.udp_target_port, 5000);
        assert_eq!(config.recovery.error_log_divisor, 10);
        assert!(config.usb_auto_rescan);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.com_port = String::new();
        assert!(config.validate().is_err());

        config = Config::default();
        config.udp_target_port = 0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.recovery.error_log_divisor = 0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.modem.response_timeout_secs = config.modem.status_poll_interval_secs;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let deserialized: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.udp_local_port, deserialized.udp_local_port);
        assert_eq!(config.com_port, deserialized.com_port);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "enabled: true\ncom_port: /dev/ttyACM0\nrecovery:\n  restart_delay: 0.5\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.enabled);
        assert_eq!(config.com_port, "/dev/ttyACM0");
        assert!((config.recovery.restart_delay - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.recovery.usb_rescan_error_threshold, 5);
        assert_eq!(config.modem.baud_rate, 115_200);
    }

    #[test]
    fn test_restart_delay_duration() {
        let mut config = Config::default();
        config.recovery.restart_delay = 1.5;
        assert_eq!(config.restart_delay().as_millis(), 1500);
    }

    #[test]
    fn test_restart_delay_out_of_range_is_rejected_and_clamped() {
        let mut config = Config::default();
        config.recovery.restart_delay = 1e20;
        assert!(config.validate().is_err());
        assert_eq!(config.restart_delay().as_secs(), 3600);

        config.recovery.restart_delay = 0.0;
        assert!(config.validate().is_err());
        assert_eq!(config.restart_delay().as_millis(), 10);

        config.recovery.restart_delay = f64::INFINITY;
        assert!(config.validate().is_err());
        assert_eq!(config.restart_delay().as_secs(), 3600);

        config.recovery.restart_delay = f64::NAN;
        assert!(config.validate().is_err());
        assert_eq!(config.restart_delay().as_secs(), 5);
    }

    #[test]
    fn test_modem_intervals_are_bounded() {
        let mut config = Config::default();
        config.modem.status_poll_interval_secs = u64::MAX - 1;
        config.modem.response_timeout_secs = u64::MAX;
        assert!(config.validate().is_err());

        config = Config::default();
        config.modem.balance_poll_interval_secs = MAX_MODEM_INTERVAL_SECS + 1;
        assert!(config.validate().is_err());

        config = Config::default();
        config.modem.call_debounce_secs = u64::MAX;
        assert!(config.validate().is_err());
    }
}
