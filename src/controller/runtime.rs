use super::ControllerCore;
use super::types::TransportKind;
use crate::config::Config;
use crate::error::Result;
use crate::reactor::ExitLatch;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Releases the exit latch when the supervisor returns or unwinds
struct ExitGuard<'a>(&'a ExitLatch);

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        self.0.release();
    }
}

impl ControllerCore {
    /// Reset modem state, then load a fresh configuration
    pub(crate) fn init(&self) -> Result<Config> {
        self.modem.reset_modem_states();
        self.provider.load_config()
    }

    /// Top-level loop: load config, run both transports until stopped, wait, repeat
    pub(crate) fn supervise(self: &Arc<Self>) {
        let _exit = ExitGuard(&self.exit_latch);
        let mut first_run = true;
        let mut restart_delay = Config::default().restart_delay();

        self.logger.info("Supervisor started");
        while self.running.is_set() {
            match self.init() {
                Ok(config) if config.enabled => {
                    restart_delay = config.restart_delay();
                    self.run_transports();
                }
                Ok(config) => {
                    restart_delay = config.restart_delay();
                    if first_run {
                        self.logger
                            .warn("Panic call reception is disabled in the configuration");
                    }
                }
                Err(e) => {
                    if first_run {
                        self.logger
                            .warn(&format!("Configuration could not be loaded: {}", e));
                    }
                }
            }
            first_run = false;

            if !self.running.wait(restart_delay) {
                break;
            }
        }
        self.logger.info("Supervisor exited");
    }

    /// Run both transport loops on their own threads and join them
    fn run_transports(self: &Arc<Self>) {
        let handles: Vec<(TransportKind, JoinHandle<()>)> =
            [TransportKind::Serial, TransportKind::Datagram]
                .into_iter()
                .filter_map(|kind| {
                    let core = Arc::clone(self);
                    thread::Builder::new()
                        .name(kind.thread_name().to_string())
                        .spawn(move || core.transport_loop(kind))
                        .map(|handle| (kind, handle))
                        .map_err(|e| {
                            self.logger
                                .error(&format!("Failed to spawn {} thread: {}", kind, e));
                        })
                        .ok()
                })
                .collect();

        for (kind, handle) in handles {
            if handle.join().is_err() {
                self.logger.error(&format!(
                    "Unexpected I/O thread termination ({})",
                    kind
                ));
            }
        }
    }
}
