//! Failure recovery policy for the transport loops
//!
//! Two pieces live here: [`ErrorCounter`], which counts transport errors and
//! decides at which severity each one is logged, and [`UsbCyclePolicy`] with
//! its [`HardwareReset`] collaborator, which power-cycles a USB-to-serial
//! adapter whose driver stopped recovering on its own.

pub mod process;

use crate::config::{Config, HWID_PLACEHOLDER};
use crate::error::{GsmPanicError, Result};
use crate::logging::{get_logger, level_for_divided_count};
use crate::reactor::RunningFlag;
use std::time::Duration;
use tracing::Level;

/// Hardware id prefixes identifying a device on the USB bus
pub const USB_HWID_PREFIXES: [&str; 3] = ["usb\\", "usb-", "usb:"];

/// Consecutive transport error counter for one transport loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorCounter {
    count: u64,
}

impl ErrorCounter {
    pub const fn new() -> Self {
        Self { count: 0 }
    }

    /// Count one error and return the level it should be logged at
    pub const fn record(&mut self, divisor: u64) -> Level {
        self.count = self.count.saturating_add(1);
        level_for_divided_count(self.count, divisor)
    }

    pub const fn count(&self) -> u64 {
        self.count
    }

    pub const fn reset(&mut self) {
        self.count = 0;
    }
}

/// Whether a hardware id names a USB device
pub fn is_usb_hwid(hwid: &str) -> bool {
    let lower = hwid.trim().to_ascii_lowercase();
    !lower.is_empty() && USB_HWID_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// Decides when the serial adapter should be power-cycled
#[derive(Debug, Clone, Copy, Default)]
pub struct UsbCyclePolicy;

impl UsbCyclePolicy {
    /// True exactly when auto-rescan is enabled, the device sits on USB and
    /// the error count reached the configured threshold
    pub fn should_cycle(config: &Config, error_count: u64) -> bool {
        config.usb_auto_rescan
            && is_usb_hwid(&config.com_port_hwid)
            && error_count >= config.recovery.usb_rescan_error_threshold
    }
}

/// Out-of-band hardware action used to recover a wedged serial adapter
pub trait HardwareReset: Send + Sync {
    /// Remove and re-enumerate the device; must give up once `running` clears
    fn power_cycle(&self, config: &Config, running: &RunningFlag) -> Result<()>;
}

/// Power-cycle by running the configured remove and rescan commands
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandUsbReset;

impl HardwareReset for CommandUsbReset {
    fn power_cycle(&self, config: &Config, running: &RunningFlag) -> Result<()> {
        let recovery = &config.recovery;
        if recovery.usb_remove_command.trim().is_empty()
            || recovery.usb_rescan_command.trim().is_empty()
        {
            return Err(GsmPanicError::config(
                "USB power-cycle commands are not configured",
            ));
        }

        let poll = process::ProcessPoll {
            interval: Duration::from_millis(recovery.process_poll_interval_ms),
            max_polls: recovery.process_max_polls,
        };
        let remove = recovery
            .usb_remove_command
            .replace(HWID_PLACEHOLDER, &config.com_port_hwid);

        let logger = get_logger("recovery");
        logger.debug(&format!("Removing USB device: {}", remove));
        process::start_external_process(&remove, true, running, poll)?;
        logger.debug(&format!(
            "Rescanning USB bus: {}",
            recovery.usb_rescan_command
        ));
        process::start_external_process(&recovery.usb_rescan_command, true, running, poll)?;
        Ok(())
    }
}
