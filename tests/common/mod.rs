#![allow(dead_code)]

use async_trait::async_trait;
use gsm_panic::config::{Config, ConfigProvider};
use gsm_panic::error::{GsmPanicError, Result};
use gsm_panic::reactor::RunningFlag;
use gsm_panic::recovery::HardwareReset;
use gsm_panic::transport::{
    Connection, ModemEventSink, PanicReporter, TransportClient, TransportConnector,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// Enabled config with fast restarts and every error logged
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.enabled = true;
    config.recovery.restart_delay = 0.02;
    config.recovery.error_log_divisor = 1;
    config
}

pub fn wait_until<F: Fn() -> bool>(timeout: Duration, cond: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    cond()
}

pub struct FakeProvider {
    config: Mutex<Option<Config>>,
    loads: AtomicUsize,
}

impl FakeProvider {
    pub fn new(config: Option<Config>) -> Arc<Self> {
        Arc::new(Self {
            config: Mutex::new(config),
            loads: AtomicUsize::new(0),
        })
    }

    pub fn set(&self, config: Option<Config>) {
        *self.config.lock().unwrap() = config;
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ConfigProvider for FakeProvider {
    fn load_config(&self) -> Result<Config> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.config
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| GsmPanicError::config("no configuration"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Behavior {
    /// Serve until stopped or told to fail
    Pending,
    /// Fail with a transport error as soon as it runs
    Fail,
    /// Fail with a non-transport error as soon as it runs
    RuntimeFail,
}

pub struct FakeConnector {
    behavior: Behavior,
    constructed: AtomicUsize,
    live: Arc<AtomicUsize>,
    max_live: Arc<AtomicUsize>,
    serving: Arc<AtomicUsize>,
    reporter: Mutex<Option<Arc<RecordingReporter>>>,
    sink: Mutex<Option<Arc<dyn ModemEventSink>>>,
    fail_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl FakeConnector {
    fn with_behavior(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            constructed: AtomicUsize::new(0),
            live: Arc::new(AtomicUsize::new(0)),
            max_live: Arc::new(AtomicUsize::new(0)),
            serving: Arc::new(AtomicUsize::new(0)),
            reporter: Mutex::new(None),
            sink: Mutex::new(None),
            fail_tx: Mutex::new(None),
        })
    }

    pub fn pending() -> Arc<Self> {
        Self::with_behavior(Behavior::Pending)
    }

    pub fn failing() -> Arc<Self> {
        Self::with_behavior(Behavior::Fail)
    }

    pub fn runtime_failing() -> Arc<Self> {
        Self::with_behavior(Behavior::RuntimeFail)
    }

    pub fn with_reporter(self: Arc<Self>, reporter: Arc<RecordingReporter>) -> Arc<Self> {
        *self.reporter.lock().unwrap() = Some(reporter);
        self
    }

    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Clients whose `run` has started; a published reporter is visible by then
    pub fn serving(&self) -> usize {
        self.serving.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    pub fn last_sink(&self) -> Option<Arc<dyn ModemEventSink>> {
        self.sink.lock().unwrap().clone()
    }

    /// Make the currently running client fail with a serial error
    pub fn fail_current(&self) {
        if let Some(tx) = self.fail_tx.lock().unwrap().take() {
            let _ = tx.send(());
        }
    }
}

#[async_trait]
impl TransportConnector for FakeConnector {
    async fn connect(&self, _config: &Config, sink: Arc<dyn ModemEventSink>) -> Result<Connection> {
        self.constructed.fetch_add(1, Ordering::SeqCst);
        let now_live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(now_live, Ordering::SeqCst);

        let (fail_tx, fail_rx) = oneshot::channel();
        *self.fail_tx.lock().unwrap() = Some(fail_tx);
        *self.sink.lock().unwrap() = Some(sink);

        let client = FakeClient {
            behavior: self.behavior,
            live: self.live.clone(),
            serving: self.serving.clone(),
            fail_rx: Some(fail_rx),
        };
        let connection = Connection::new(Box::new(client));
        Ok(match self.reporter.lock().unwrap().clone() {
            Some(reporter) => connection.with_reporter(reporter),
            None => connection,
        })
    }
}

struct FakeClient {
    behavior: Behavior,
    live: Arc<AtomicUsize>,
    serving: Arc<AtomicUsize>,
    fail_rx: Option<oneshot::Receiver<()>>,
}

#[async_trait]
impl TransportClient for FakeClient {
    async fn run(&mut self) -> Result<()> {
        self.serving.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Fail => return Err(GsmPanicError::serial("device vanished")),
            Behavior::RuntimeFail => return Err(GsmPanicError::generic("bad state")),
            Behavior::Pending => {}
        }
        if let Some(rx) = self.fail_rx.take()
            && rx.await.is_ok()
        {
            return Err(GsmPanicError::serial("forced failure"));
        }
        std::future::pending().await
    }
}

impl Drop for FakeClient {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct RecordingReporter {
    calls: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl PanicReporter for RecordingReporter {
    fn report_panic_call(&self, number: &str) {
        self.calls.lock().unwrap().push(number.to_string());
    }
}

#[derive(Default)]
pub struct FakeReset {
    cycles: AtomicUsize,
    last_hwid: Mutex<Option<String>>,
}

impl FakeReset {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn cycles(&self) -> usize {
        self.cycles.load(Ordering::SeqCst)
    }

    pub fn last_hwid(&self) -> Option<String> {
        self.last_hwid.lock().unwrap().clone()
    }
}

impl HardwareReset for FakeReset {
    fn power_cycle(&self, config: &Config, _running: &RunningFlag) -> Result<()> {
        self.cycles.fetch_add(1, Ordering::SeqCst);
        *self.last_hwid.lock().unwrap() = Some(config.com_port_hwid.clone());
        Ok(())
    }
}
