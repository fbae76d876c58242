//! UDP panic relay
//!
//! Binds the local relay port and sends one JSON [`PanicReport`] datagram to
//! the monitoring target for every panic call handed to its [`UdpReporter`].

use super::{Connection, ModemEventSink, PanicReporter, TransportClient, TransportConnector};
use crate::config::Config;
use crate::error::{GsmPanicError, Result};
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use uuid::Uuid;

const PANIC_EVENT: &str = "panic_call";
const RECV_BUFFER_SIZE: usize = 1500;

/// Datagram payload for one panic call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanicReport {
    pub event: String,
    pub id: Uuid,
    pub number: String,
    pub timestamp: DateTime<Utc>,
}

impl PanicReport {
    pub fn new(number: &str) -> Self {
        Self {
            event: PANIC_EVENT.to_string(),
            id: Uuid::new_v4(),
            number: number.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Handle the controller uses to queue panic calls for sending
#[derive(Debug, Clone)]
pub struct UdpReporter {
    tx: mpsc::UnboundedSender<String>,
}

impl PanicReporter for UdpReporter {
    fn report_panic_call(&self, number: &str) {
        // A closed channel means the client is being torn down
        let _ = self.tx.send(number.to_string());
    }
}

/// Connector binding the relay socket
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpConnector;

#[async_trait]
impl TransportConnector for UdpConnector {
    async fn connect(&self, config: &Config, _sink: Arc<dyn ModemEventSink>) -> Result<Connection> {
        let logger = get_logger_with_context(LogContext::new("udp").with_field(
            "target",
            format!("{}:{}", config.udp_target_host, config.udp_target_port),
        ));

        let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.udp_local_port);
        let socket = UdpSocket::bind(bind_addr).await.map_err(|e| {
            GsmPanicError::network(format!(
                "Failed to bind UDP port {}: {}",
                config.udp_local_port, e
            ))
        })?;

        let target = tokio::net::lookup_host((config.udp_target_host.as_str(), config.udp_target_port))
            .await
            .map_err(|e| {
                GsmPanicError::network(format!(
                    "Failed to resolve {}: {}",
                    config.udp_target_host, e
                ))
            })?
            .next()
            .ok_or_else(|| {
                GsmPanicError::network(format!(
                    "No address for {}",
                    config.udp_target_host
                ))
            })?;

        let (tx, rx) = mpsc::unbounded_channel();
        logger.debug(&format!("UDP relay bound on {}", bind_addr));
        let client = UdpClient {
            socket,
            target,
            reports: rx,
            logger,
        };
        Ok(Connection::new(Box::new(client)).with_reporter(Arc::new(UdpReporter { tx })))
    }
}

/// Client owning the relay socket
pub struct UdpClient {
    socket: UdpSocket,
    target: SocketAddr,
    reports: mpsc::UnboundedReceiver<String>,
    logger: StructuredLogger,
}

impl UdpClient {
    async fn send_report(&self, number: &str) -> Result<()> {
        let report = PanicReport::new(number);
        let payload = serde_json::to_vec(&report)?;
        self.socket
            .send_to(&payload, self.target)
            .await
            .map_err(|e| GsmPanicError::network(format!("Failed to send panic report: {}", e)))?;
        self.logger
            .info(&format!("Panic report {} sent for {}", report.id, number));
        Ok(())
    }
}

#[async_trait]
impl TransportClient for UdpClient {
    async fn run(&mut self) -> Result<()> {
        let mut buf = [0u8; RECV_BUFFER_SIZE];
        loop {
            tokio::select! {
                Some(number) = self.reports.recv() => {
                    self.send_report(&number).await?;
                }
                received = self.socket.recv_from(&mut buf) => {
                    match received {
                        Ok((len, from)) => {
                            self.logger.debug(&format!("Ignoring {} byte datagram from {}", len, from));
                        }
                        // ICMP port-unreachable from an earlier send surfaces here on some platforms
                        Err(e) if e.kind() == std::io::ErrorKind::ConnectionReset => {
                            self.logger.debug(&format!("Target unreachable: {}", e));
                        }
                        Err(e) => {
                            return Err(GsmPanicError::network(format!("UDP receive failed: {}", e)));
                        }
                    }
                }
            }
        }
    }
}
