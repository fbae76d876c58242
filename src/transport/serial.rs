//! Serial modem client
//!
//! Opens the modem's serial port, runs the AT initialisation sequence and
//! periodically polls SIM, registration, signal and (optionally) balance.
//! Port reads block, so they run on a tokio blocking task that forwards
//! complete lines to the client over a channel; the client itself stays on
//! the serial reactor.

use super::at::{self, AtEvent};
use super::{Connection, ModemEventSink, TransportClient, TransportConnector};
use crate::config::{Config, MAX_MODEM_INTERVAL_SECS, ModemConfig};
use crate::error::{GsmPanicError, Result};
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::modem::{GsmState, ModemState};
use async_trait::async_trait;
use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::time::{MissedTickBehavior, interval_at};

/// Read timeout of the blocking port reader; bounds how long a closed client
/// keeps its worker alive
const SERIAL_READ_TIMEOUT: Duration = Duration::from_millis(200);

const INIT_COMMANDS: [&str; 5] = ["AT", "ATE0", "AT+CMEE=1", "AT+CLIP=1", "AT+CREG=1"];
const STATUS_COMMANDS: [&str; 3] = ["AT+CPIN?", "AT+CREG?", "AT+CSQ"];
const HANGUP_COMMAND: &str = "ATH";

/// `+CSQ` value meaning "not known or not detectable"
const CSQ_UNKNOWN: i32 = 99;

/// CME error codes that mean the SIM is unusable
const CME_SIM_ERRORS: [i32; 5] = [10, 11, 12, 13, 15];

/// Minimum period between balance queries
const MIN_BALANCE_PERIOD: Duration = Duration::from_secs(60);

/// Timer periods of a serial session, bounded so deadline arithmetic cannot overflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PollSchedule {
    status: Duration,
    balance: Duration,
    first_balance: Duration,
    response_timeout: Duration,
    call_debounce: Duration,
}

impl PollSchedule {
    fn from_config(modem: &ModemConfig) -> Self {
        let bounded = |secs: u64| Duration::from_secs(secs.min(MAX_MODEM_INTERVAL_SECS));
        let status = bounded(modem.status_poll_interval_secs.max(1));
        Self {
            status,
            balance: bounded(modem.balance_poll_interval_secs).max(MIN_BALANCE_PERIOD),
            // First balance query once the modem had time to register
            first_balance: status.checked_mul(3).unwrap_or(status),
            response_timeout: bounded(modem.response_timeout_secs),
            call_debounce: bounded(modem.call_debounce_secs),
        }
    }
}

/// Protocol state for one modem session, independent of the port
#[derive(Debug)]
pub struct ModemSession {
    call_debounce: Duration,
    last_call: Option<(String, Instant)>,
    initialised: bool,
}

impl ModemSession {
    pub const fn new(call_debounce: Duration) -> Self {
        Self {
            call_debounce,
            last_call: None,
            initialised: false,
        }
    }

    /// Feed one line from the modem; returns commands to send back
    pub fn handle_line(&mut self, line: &str, sink: &dyn ModemEventSink) -> Vec<String> {
        match at::parse_line(line) {
            Some(event) => self.handle_event(event, Instant::now(), sink),
            None => Vec::new(),
        }
    }

    pub fn handle_event(
        &mut self,
        event: AtEvent,
        now: Instant,
        sink: &dyn ModemEventSink,
    ) -> Vec<String> {
        match event {
            AtEvent::Ok => {
                if !self.initialised {
                    self.initialised = true;
                    sink.on_modem_state(ModemState::Online);
                }
            }
            AtEvent::CallerId(number) => {
                if self.is_repeat(&number, now) {
                    self.last_call = Some((number, now));
                    return Vec::new();
                }
                sink.on_panic_call(&number);
                self.last_call = Some((number, now));
                return vec![HANGUP_COMMAND.to_string()];
            }
            AtEvent::Registration(state) => sink.on_gsm_state(state),
            AtEvent::Signal { rssi, ber } => {
                let rssi = if rssi == CSQ_UNKNOWN { 0 } else { rssi };
                let ber = if ber == CSQ_UNKNOWN { 0 } else { ber };
                sink.on_signal(rssi, ber);
            }
            AtEvent::CmeError(code) => {
                sink.on_gsm_error(code);
                if CME_SIM_ERRORS.contains(&code) {
                    sink.on_gsm_state(GsmState::NoSim);
                }
            }
            AtEvent::SimReady(false) => sink.on_gsm_state(GsmState::NoSim),
            AtEvent::Ussd(text) if text.is_empty() => {}
            AtEvent::Ussd(text) => {
                if let Some(value) = at::parse_balance(&text) {
                    sink.set_balance(value);
                } else {
                    sink.invalidate_balance();
                }
            }
            AtEvent::SimReady(true)
            | AtEvent::Error
            | AtEvent::Ring
            | AtEvent::NoCarrier
            | AtEvent::Other(_) => {}
        }
        Vec::new()
    }

    fn is_repeat(&self, number: &str, now: Instant) -> bool {
        self.last_call.as_ref().is_some_and(|(last, at)| {
            last == number && now.saturating_duration_since(*at) < self.call_debounce
        })
    }

    pub const fn is_initialised(&self) -> bool {
        self.initialised
    }
}

/// Connector opening the configured serial port
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialConnector;

#[async_trait]
impl TransportConnector for SerialConnector {
    async fn connect(&self, config: &Config, sink: Arc<dyn ModemEventSink>) -> Result<Connection> {
        let logger = get_logger_with_context(
            LogContext::new("serial").with_field("port", config.com_port.clone()),
        );
        let port_name = config.com_port.clone();
        let baud_rate = config.modem.baud_rate;

        logger.debug(&format!("Opening serial port at {} baud", baud_rate));
        let port = tokio::task::spawn_blocking(move || {
            serialport::new(&port_name, baud_rate)
                .data_bits(serialport::DataBits::Eight)
                .stop_bits(serialport::StopBits::One)
                .parity(serialport::Parity::None)
                .timeout(SERIAL_READ_TIMEOUT)
                .open()
        })
        .await
        .map_err(|e| GsmPanicError::generic(format!("Serial open task failed: {}", e)))??;

        let client = SerialClient::start(port, config.modem.clone(), sink, logger);
        Ok(Connection::new(Box::new(client)))
    }
}

/// Client driving one open serial port
pub struct SerialClient {
    session: ModemSession,
    modem: ModemConfig,
    sink: Arc<dyn ModemEventSink>,
    lines_rx: mpsc::UnboundedReceiver<io::Result<String>>,
    commands_tx: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
    logger: StructuredLogger,
}

impl SerialClient {
    fn start(
        port: Box<dyn SerialPort>,
        modem: ModemConfig,
        sink: Arc<dyn ModemEventSink>,
        logger: StructuredLogger,
    ) -> Self {
        let (lines_tx, lines_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));

        let worker_closed = closed.clone();
        tokio::task::spawn_blocking(move || {
            port_worker(port, commands_rx, lines_tx, &worker_closed);
        });

        sink.on_modem_state(ModemState::Detected);
        Self {
            session: ModemSession::new(PollSchedule::from_config(&modem).call_debounce),
            modem,
            sink,
            lines_rx,
            commands_tx,
            closed,
            logger,
        }
    }

    fn send(&self, command: &str) -> Result<()> {
        self.logger.trace(&format!("-> {}", command));
        self.commands_tx
            .send(command.to_string())
            .map_err(|_| GsmPanicError::serial("Serial writer has stopped"))
    }

    fn send_all<'a, I>(&self, commands: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        commands.into_iter().try_for_each(|c| self.send(c))
    }
}

#[async_trait]
impl TransportClient for SerialClient {
    async fn run(&mut self) -> Result<()> {
        self.logger.info("Serial port opened, initialising modem");
        self.send_all(INIT_COMMANDS)?;
        self.send_all(STATUS_COMMANDS)?;

        let schedule = PollSchedule::from_config(&self.modem);
        let started = tokio::time::Instant::now();
        let mut status_tick = interval_at(started + schedule.status, schedule.status);
        status_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let balance_enabled = !self.modem.balance_ussd.trim().is_empty();
        let mut balance_tick = interval_at(started + schedule.first_balance, schedule.balance);
        balance_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let response_timeout = schedule.response_timeout;
        let mut last_rx = Instant::now();

        loop {
            tokio::select! {
                line = self.lines_rx.recv() => {
                    let line = match line {
                        Some(Ok(line)) => line,
                        Some(Err(e)) => {
                            return Err(GsmPanicError::serial(format!("Serial port failure: {}", e)));
                        }
                        None => return Err(GsmPanicError::serial("Serial reader stopped")),
                    };
                    last_rx = Instant::now();
                    self.logger.trace(&format!("<- {}", line));
                    let replies = self.session.handle_line(&line, self.sink.as_ref());
                    for reply in &replies {
                        self.send(reply)?;
                    }
                }
                _ = status_tick.tick() => {
                    if last_rx.elapsed() > response_timeout {
                        return Err(GsmPanicError::timeout(format!(
                            "Modem silent for more than {}s",
                            response_timeout.as_secs()
                        )));
                    }
                    self.send_all(STATUS_COMMANDS)?;
                }
                _ = balance_tick.tick(), if balance_enabled => {
                    let request = at::ussd_request(self.modem.balance_ussd.trim());
                    self.send(&request)?;
                }
            }
        }
    }
}

impl Drop for SerialClient {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
        self.sink.on_modem_state(ModemState::Offline);
    }
}

/// Blocking port loop: writes queued commands, reads and splits lines
fn port_worker(
    mut port: Box<dyn SerialPort>,
    mut commands: mpsc::UnboundedReceiver<String>,
    lines: mpsc::UnboundedSender<io::Result<String>>,
    closed: &AtomicBool,
) {
    let mut buf = [0u8; 256];
    let mut pending: Vec<u8> = Vec::with_capacity(512);

    while !closed.load(Ordering::Acquire) {
        loop {
            match commands.try_recv() {
                Ok(command) => {
                    let written = port
                        .write_all(format!("{}\r", command).as_bytes())
                        .and_then(|()| port.flush());
                    if let Err(e) = written {
                        let _ = lines.send(Err(e));
                        return;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return,
            }
        }

        match port.read(&mut buf) {
            Ok(n) => {
                pending.extend_from_slice(&buf[..n]);
                for line in drain_lines(&mut pending) {
                    if lines.send(Ok(line)).is_err() {
                        return;
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {}
            Err(e) => {
                let _ = lines.send(Err(e));
                return;
            }
        }
    }
}

/// Split complete CR/LF terminated lines off the front of `pending`
fn drain_lines(pending: &mut Vec<u8>) -> Vec<String> {
    let mut out = Vec::new();
    while let Some(pos) = pending.iter().position(|b| *b == b'\n' || *b == b'\r') {
        let raw: Vec<u8> = pending.drain(..=pos).collect();
        let text = String::from_utf8_lossy(&raw).trim().to_string();
        if !text.is_empty() {
            out.push(text);
        }
    }
    out
}
