use super::*;

#[cfg(windows)]
const DEFAULT_COM_PORT: &str = "COM1";
#[cfg(not(windows))]
const DEFAULT_COM_PORT: &str = "/dev/ttyUSB0";

// devcon ships with the Windows Driver Kit; other platforms need explicit commands
#[cfg(windows)]
const DEFAULT_USB_REMOVE_COMMAND: &str = "devcon.exe remove =ports \"{hwid}\"";
#[cfg(not(windows))]
const DEFAULT_USB_REMOVE_COMMAND: &str = "";
#[cfg(windows)]
const DEFAULT_USB_RESCAN_COMMAND: &str = "devcon.exe rescan";
#[cfg(not(windows))]
const DEFAULT_USB_RESCAN_COMMAND: &str = "";

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            status_poll_interval_secs: 10,
            response_timeout_secs: 45,
            balance_ussd: String::new(),
            balance_poll_interval_secs: 6 * 3600,
            call_debounce_secs: 15,
        }
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            restart_delay: DEFAULT_RESTART_DELAY_SECS,
            error_log_divisor: 10,
            usb_rescan_error_threshold: 5,
            usb_remove_command: DEFAULT_USB_REMOVE_COMMAND.to_string(),
            usb_rescan_command: DEFAULT_USB_RESCAN_COMMAND.to_string(),
            process_poll_interval_ms: 100,
            process_max_polls: 100,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_level: None,
            file_level: None,
            file: "/tmp/gsm_panic.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: false,
            com_port: DEFAULT_COM_PORT.to_string(),
            com_port_hwid: String::new(),
            udp_local_port: 5001,
            udp_target_host: "127.0.0.1".to_string(),
            udp_target_port: 5000,
            usb_auto_rescan: true,
            modem: ModemConfig::default(),
            recovery: RecoveryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
