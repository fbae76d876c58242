//! Transport client contracts
//!
//! A transport client owns one device or socket and lives inside a single
//! reactor run. It talks back to the controller only through
//! [`ModemEventSink`]; the datagram client additionally hands out a
//! [`PanicReporter`] so the controller can relay panic calls to it.

pub mod at;
pub mod serial;
pub mod udp;

use crate::config::Config;
use crate::error::Result;
use crate::modem::{GsmState, ModemState};
use async_trait::async_trait;
use std::sync::Arc;

pub use serial::SerialConnector;
pub use udp::UdpConnector;

/// Callbacks a transport client raises into the controller.
///
/// Called on the reactor thread that detected the event; implementations
/// must not block.
pub trait ModemEventSink: Send + Sync {
    /// An incoming call from `number` was detected
    fn on_panic_call(&self, number: &str);
    fn on_modem_state(&self, state: ModemState);
    fn on_gsm_state(&self, state: GsmState);
    /// Signal quality as reported by `+CSQ`
    fn on_signal(&self, rssi: i32, ber: i32);
    /// `+CME ERROR` code reported by the modem
    fn on_gsm_error(&self, code: i32);
    fn set_balance(&self, value: f64);
    fn invalidate_balance(&self);
}

/// Relay for panic calls, exposed by the datagram client while it lives
pub trait PanicReporter: Send + Sync {
    fn report_panic_call(&self, number: &str);
}

/// A constructed client bound to the current reactor
#[async_trait]
pub trait TransportClient: Send {
    /// Serve until the transport fails or finishes
    async fn run(&mut self) -> Result<()>;
}

/// Result of connecting a transport
pub struct Connection {
    pub client: Box<dyn TransportClient>,
    pub reporter: Option<Arc<dyn PanicReporter>>,
}

impl Connection {
    pub fn new(client: Box<dyn TransportClient>) -> Self {
        Self {
            client,
            reporter: None,
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn PanicReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }
}

/// Factory building a fresh client inside the current reactor
#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn connect(&self, config: &Config, sink: Arc<dyn ModemEventSink>) -> Result<Connection>;
}
