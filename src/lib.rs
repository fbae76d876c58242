//! # gsm-panic - GSM panic-call controller
//!
//! Supervisory controller for a panic-alarm appliance built around a GSM
//! modem. Incoming calls ("panic calls") are picked up on the modem's serial
//! line and relayed as UDP datagrams to a monitoring target, while modem
//! registration, signal quality and SIM balance are tracked for the host.
//!
//! ## Features
//!
//! - **Dual reactors**: serial and UDP transports fail and restart independently
//! - **Unattended recovery**: periodic restart, rate-limited error logging
//! - **USB power-cycle**: wedged USB serial adapters are removed and rescanned
//! - **Library mode**: host callbacks for panic calls and failures
//! - **Configuration**: YAML-based configuration with validation
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `error`: Error taxonomy shared by all components
//! - `modem`: Modem and GSM network state tracking
//! - `reactor`: Run flag, per-transport reactor and exit latch
//! - `recovery`: Error counting, USB power-cycle policy, external processes
//! - `transport`: Serial modem client, AT parser and UDP relay
//! - `controller`: Supervisor loops and the public facade

pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod modem;
pub mod reactor;
pub mod recovery;
pub mod transport;

// Re-export commonly used types
pub use config::Config;
pub use controller::{Controller, ControllerMode};
pub use error::{GsmPanicError, Result};
