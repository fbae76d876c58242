use super::ControllerCore;
use super::types::{ErrorReport, ErrorReportKind, TransportKind};
use crate::config::Config;
use crate::error::{GsmPanicError, Result};
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::recovery::{ErrorCounter, UsbCyclePolicy};
use crate::transport::{Connection, ModemEventSink, PanicReporter};
use std::sync::Arc;

/// Publishes the datagram reporter for as long as it is alive
struct PublishedReporter<'a> {
    core: &'a ControllerCore,
}

impl<'a> PublishedReporter<'a> {
    fn publish(core: &'a ControllerCore, reporter: Arc<dyn PanicReporter>) -> Self {
        core.set_reporter(Some(reporter));
        Self { core }
    }
}

impl Drop for PublishedReporter<'_> {
    fn drop(&mut self) {
        self.core.set_reporter(None);
    }
}

impl ControllerCore {
    /// Keep one transport alive until the run flag is cleared
    pub(crate) fn transport_loop(self: &Arc<Self>, kind: TransportKind) {
        let logger = get_logger_with_context(LogContext::new("controller").with_transport(kind.name()));
        let mut errors = ErrorCounter::new();
        let mut restart_delay = Config::default().restart_delay();

        logger.debug("Transport loop started");
        while self.running.is_set() {
            // Only the serial side owns modem state
            let loaded = match kind {
                TransportKind::Serial => self.init(),
                TransportKind::Datagram => self.provider.load_config(),
            };

            match loaded {
                Ok(config) if config.enabled => {
                    restart_delay = config.restart_delay();
                    match self.run_client(kind, &config) {
                        Ok(()) => logger.debug("Client stopped"),
                        Err(e) => self.handle_failure(kind, &config, &e, &mut errors, &logger),
                    }
                }
                Ok(config) => {
                    restart_delay = config.restart_delay();
                    logger.debug("Transport disabled by configuration");
                }
                Err(e) => logger.debug(&format!("Configuration unavailable: {}", e)),
            }

            if !self.running.wait(restart_delay) {
                break;
            }
        }
        logger.debug("Transport loop exited");
    }

    /// Build a client inside a fresh reactor and serve until it ends.
    ///
    /// The client, and the reporter it published, are gone when this returns.
    fn run_client(self: &Arc<Self>, kind: TransportKind, config: &Config) -> Result<()> {
        let sink: Arc<dyn ModemEventSink> = Arc::clone(self) as Arc<dyn ModemEventSink>;
        let connector = Arc::clone(self.connector(kind));
        let core: &ControllerCore = self;

        self.reactor(kind).run(|| async move {
            let Connection { mut client, reporter } = connector.connect(config, sink).await?;
            let _published = reporter.map(|r| PublishedReporter::publish(core, r));
            client.run().await
        })
    }

    fn handle_failure(
        &self,
        kind: TransportKind,
        config: &Config,
        error: &GsmPanicError,
        errors: &mut ErrorCounter,
        logger: &StructuredLogger,
    ) {
        if !error.is_transport() {
            logger.error(&format!("Runtime error: {}", error));
            self.notify_error(ErrorReport::new(
                ErrorReportKind::Runtime,
                Some(kind),
                error.to_string(),
            ));
            return;
        }

        let level = errors.record(config.recovery.error_log_divisor);
        logger.log(
            level,
            &format!("I/O error #{}: {}", errors.count(), error),
        );
        self.notify_error(ErrorReport::new(
            ErrorReportKind::TransportIo,
            Some(kind),
            error.to_string(),
        ));

        if kind == TransportKind::Serial && UsbCyclePolicy::should_cycle(config, errors.count()) {
            logger.info(&format!(
                "Power-cycling USB device {} after {} errors",
                config.com_port_hwid,
                errors.count()
            ));
            if let Err(e) = self.hardware_reset.power_cycle(config, &self.running) {
                logger.error(&format!("USB power-cycle failed: {}", e));
            }
            errors.reset();
        }
    }
}
