//! Controller facade and supervisor
//!
//! [`Controller`] owns a supervisor thread that loads the configuration and,
//! when enabled, runs the serial and datagram transports on two dedicated
//! threads. Each transport thread constructs its client inside a fresh
//! [`Reactor`] run, serves until the client fails or the controller stops,
//! waits the restart delay and starts over. Everything is gated by one shared
//! [`RunningFlag`].
//!
//! Transport clients report back through the [`ModemEventSink`] implemented
//! by the controller core; the datagram client's [`PanicReporter`] is
//! published to the core only while that client is alive.

mod events;
mod runtime;
mod transport_loop;
mod types;

pub use types::{
    ControllerMode, ErrorCallback, ErrorReport, ErrorReportKind, PanicCallback, TransportKind,
};

use crate::config::{Config, ConfigProvider, FileConfigProvider};
use crate::error::{GsmPanicError, Result};
use crate::logging::{StructuredLogger, get_logger};
use crate::modem::{Balance, GsmState, ModemState, ModemStateTracker, ModemStatus};
use crate::reactor::{ExitLatch, Reactor, RunningFlag};
use crate::recovery::{CommandUsbReset, HardwareReset};
use crate::transport::{
    ModemEventSink, PanicReporter, SerialConnector, TransportConnector, UdpConnector,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

/// State shared between the facade, the supervisor and the transport threads
pub(crate) struct ControllerCore {
    mode: ControllerMode,
    running: RunningFlag,
    modem: ModemStateTracker,
    reporter: RwLock<Option<Arc<dyn PanicReporter>>>,
    panic_callback: RwLock<Option<PanicCallback>>,
    error_callback: RwLock<Option<ErrorCallback>>,
    serial_reactor: Reactor,
    datagram_reactor: Reactor,
    exit_latch: ExitLatch,
    provider: Arc<dyn ConfigProvider>,
    serial: Arc<dyn TransportConnector>,
    datagram: Arc<dyn TransportConnector>,
    hardware_reset: Arc<dyn HardwareReset>,
    logger: StructuredLogger,
}

impl ControllerCore {
    const fn reactor(&self, kind: TransportKind) -> &Reactor {
        match kind {
            TransportKind::Serial => &self.serial_reactor,
            TransportKind::Datagram => &self.datagram_reactor,
        }
    }

    const fn connector(&self, kind: TransportKind) -> &Arc<dyn TransportConnector> {
        match kind {
            TransportKind::Serial => &self.serial,
            TransportKind::Datagram => &self.datagram,
        }
    }

    fn reporter(&self) -> Option<Arc<dyn PanicReporter>> {
        self.reporter
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_reporter(&self, reporter: Option<Arc<dyn PanicReporter>>) {
        *self.reporter.write().unwrap_or_else(PoisonError::into_inner) = reporter;
    }

    fn panic_callback(&self) -> Option<PanicCallback> {
        if self.mode != ControllerMode::Library {
            return None;
        }
        self.panic_callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn notify_error(&self, report: ErrorReport) {
        if self.mode != ControllerMode::Library {
            return;
        }
        let callback = self
            .error_callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(callback) = callback {
            callback(&report);
        }
    }
}

/// Builder for a [`Controller`] with custom collaborators
pub struct ControllerBuilder {
    provider: Arc<dyn ConfigProvider>,
    serial: Arc<dyn TransportConnector>,
    datagram: Arc<dyn TransportConnector>,
    hardware_reset: Arc<dyn HardwareReset>,
    mode: ControllerMode,
}

impl ControllerBuilder {
    pub fn mode(mut self, mode: ControllerMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn hardware_reset(mut self, reset: Arc<dyn HardwareReset>) -> Self {
        self.hardware_reset = reset;
        self
    }

    pub fn build(self) -> Controller {
        let core = ControllerCore {
            mode: self.mode,
            running: RunningFlag::new(),
            modem: ModemStateTracker::new(),
            reporter: RwLock::new(None),
            panic_callback: RwLock::new(None),
            error_callback: RwLock::new(None),
            serial_reactor: Reactor::new(TransportKind::Serial.name()),
            datagram_reactor: Reactor::new(TransportKind::Datagram.name()),
            exit_latch: ExitLatch::new(),
            provider: self.provider,
            serial: self.serial,
            datagram: self.datagram,
            hardware_reset: self.hardware_reset,
            logger: get_logger("controller"),
        };
        Controller {
            core: Arc::new(core),
            supervisor: Mutex::new(None),
        }
    }
}

/// Supervisory controller for the panic-call appliance
pub struct Controller {
    core: Arc<ControllerCore>,
    /// Supervisor handle; its lock serialises start() against stop()
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl Controller {
    /// Controller with the serial modem client, UDP relay and command-based USB reset
    pub fn new(provider: Arc<dyn ConfigProvider>) -> Self {
        Self::builder(
            provider,
            Arc::new(SerialConnector),
            Arc::new(UdpConnector),
        )
        .build()
    }

    /// Controller reading its configuration from the default file locations
    pub fn from_default_locations() -> Self {
        Self::new(Arc::new(FileConfigProvider::from_default_locations()))
    }

    pub fn builder(
        provider: Arc<dyn ConfigProvider>,
        serial: Arc<dyn TransportConnector>,
        datagram: Arc<dyn TransportConnector>,
    ) -> ControllerBuilder {
        ControllerBuilder {
            provider,
            serial,
            datagram,
            hardware_reset: Arc::new(CommandUsbReset),
            mode: ControllerMode::default(),
        }
    }

    /// Start the supervisor thread; does nothing if already running.
    ///
    /// With `run_async == false` this blocks until the controller is stopped
    /// from another thread.
    pub fn start(&self, run_async: bool) -> Result<()> {
        // Held until the handle is stored so a concurrent stop() sees it
        let mut supervisor = self.lifecycle();
        if !self.core.running.try_set() {
            return Ok(());
        }
        self.core.exit_latch.arm();
        self.core.serial_reactor.reset();
        self.core.datagram_reactor.reset();

        let core = Arc::clone(&self.core);
        let spawned = thread::Builder::new()
            .name("gsm-supervisor".to_string())
            .spawn(move || core.supervise());
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.core.running.clear();
                self.core.exit_latch.release();
                return Err(GsmPanicError::generic(format!(
                    "Failed to spawn supervisor thread: {}",
                    e
                )));
            }
        };

        self.core.logger.info("Controller started");
        *supervisor = Some(handle);
        drop(supervisor);

        if !run_async {
            self.core.exit_latch.wait();
        }
        Ok(())
    }

    /// Stop both transports and wait for the supervisor to exit.
    ///
    /// Must not be called from a host callback; those run on transport threads
    /// this call waits for.
    pub fn stop(&self) {
        // Held until the supervisor has exited so start() cannot interleave
        let mut supervisor = self.lifecycle();
        if !self.core.running.clear() {
            return;
        }
        self.core.logger.info("Stopping controller");
        self.core.serial_reactor.stop();
        self.core.datagram_reactor.stop();

        if supervisor.take().is_some_and(|h| h.join().is_err()) {
            self.core.logger.error("Supervisor thread panicked");
        }
        self.core.exit_latch.wait();
        self.core.logger.info("Controller stopped");
    }

    fn lifecycle(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.supervisor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_running(&self) -> bool {
        self.core.running.is_set()
    }

    /// Reset modem state and balance, then load a fresh configuration
    pub fn init(&self) -> Result<Config> {
        self.core.init()
    }

    pub fn mode(&self) -> ControllerMode {
        self.core.mode
    }

    /// Register the host panic callback; replaces any previous one
    pub fn set_panic_callback<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self
            .core
            .panic_callback
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(callback));
    }

    /// Register the host error callback; replaces any previous one
    pub fn set_error_callback<F>(&self, callback: F)
    where
        F: Fn(&ErrorReport) + Send + Sync + 'static,
    {
        *self
            .core
            .error_callback
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(callback));
    }

    pub fn modem_status(&self) -> ModemStatus {
        self.core.modem.status()
    }

    pub fn modem_state(&self) -> ModemState {
        self.modem_status().modem_state
    }

    pub fn gsm_state(&self) -> GsmState {
        self.modem_status().gsm_state
    }

    pub fn signal_level(&self) -> i32 {
        self.modem_status().signal_level
    }

    pub fn bit_error_rate(&self) -> i32 {
        self.modem_status().bit_error_rate
    }

    pub fn balance(&self) -> f64 {
        self.core.modem.balance().value
    }

    pub fn is_balance_valid(&self) -> bool {
        self.core.modem.balance().valid
    }

    pub fn balance_snapshot(&self) -> Balance {
        self.core.modem.balance()
    }
}

impl ModemEventSink for Controller {
    fn on_panic_call(&self, number: &str) {
        self.core.on_panic_call(number);
    }

    fn on_modem_state(&self, state: ModemState) {
        self.core.on_modem_state(state);
    }

    fn on_gsm_state(&self, state: GsmState) {
        self.core.on_gsm_state(state);
    }

    fn on_signal(&self, rssi: i32, ber: i32) {
        self.core.on_signal(rssi, ber);
    }

    fn on_gsm_error(&self, code: i32) {
        self.core.on_gsm_error(code);
    }

    fn set_balance(&self, value: f64) {
        self.core.set_balance(value);
    }

    fn invalidate_balance(&self) {
        self.core.invalidate_balance();
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop();
    }
}
