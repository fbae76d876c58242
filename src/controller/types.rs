use std::fmt;
use std::sync::Arc;

/// Whether host callbacks are active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerMode {
    /// Standalone daemon; callbacks may be registered but are never invoked
    #[default]
    Service,
    /// Embedded in a host application that receives callbacks
    Library,
}

/// The two independently supervised transports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// GSM modem on the serial line
    Serial,
    /// UDP relay to the monitoring target
    Datagram,
}

impl TransportKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Serial => "serial",
            Self::Datagram => "udp",
        }
    }

    pub const fn thread_name(self) -> &'static str {
        match self {
            Self::Serial => "gsm-serial",
            Self::Datagram => "gsm-udp",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Category of a failure reported to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorReportKind {
    /// Device or socket I/O failed; the client is restarted
    TransportIo,
    /// Any other failure surfaced from a transport loop
    Runtime,
    /// The modem reports no usable SIM card
    SimMissing,
    /// The network refused registration
    RegistrationDenied,
}

/// Details passed to the host error callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub kind: ErrorReportKind,
    pub transport: Option<TransportKind>,
    pub message: String,
}

impl ErrorReport {
    pub fn new<S: Into<String>>(
        kind: ErrorReportKind,
        transport: Option<TransportKind>,
        message: S,
    ) -> Self {
        Self {
            kind,
            transport,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.transport {
            Some(transport) => write!(f, "[{}] {:?}: {}", transport, self.kind, self.message),
            None => write!(f, "{:?}: {}", self.kind, self.message),
        }
    }
}

/// Host callback invoked with the caller's number
pub type PanicCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Host callback invoked for every reported failure
pub type ErrorCallback = Arc<dyn Fn(&ErrorReport) + Send + Sync>;
