use super::ControllerCore;
use super::types::{ErrorReport, ErrorReportKind};
use crate::modem::{GsmEdge, GsmState, ModemState};
use crate::transport::ModemEventSink;

impl ModemEventSink for ControllerCore {
    fn on_panic_call(&self, number: &str) {
        self.logger.warn(&format!("Panic call from {}", number));

        if let Some(callback) = self.panic_callback() {
            callback(number);
        }

        match self.reporter() {
            Some(reporter) => reporter.report_panic_call(number),
            None => self
                .logger
                .warn("UDP relay is down; panic call not forwarded"),
        }
    }

    fn on_modem_state(&self, state: ModemState) {
        self.logger.debug(&format!("Modem state: {:?}", state));
        self.modem.set_modem_state(state);
    }

    fn on_gsm_state(&self, state: GsmState) {
        match self.modem.set_gsm_state(state) {
            Some(GsmEdge::SimMissing) => {
                self.logger.error("SIM card missing or locked");
                self.notify_error(ErrorReport::new(
                    ErrorReportKind::SimMissing,
                    None,
                    "SIM card missing or locked",
                ));
            }
            Some(GsmEdge::Registered { signal_level }) => {
                self.logger.info(&format!(
                    "Registered on GSM network, signal level {}",
                    signal_level
                ));
            }
            Some(GsmEdge::RegistrationDenied) => {
                self.logger.error("GSM network registration denied");
                self.notify_error(ErrorReport::new(
                    ErrorReportKind::RegistrationDenied,
                    None,
                    "GSM network registration denied",
                ));
            }
            None => {}
        }
    }

    fn on_signal(&self, rssi: i32, ber: i32) {
        self.logger.trace(&format!("Signal rssi={} ber={}", rssi, ber));
        self.modem.set_signal(rssi, ber);
    }

    fn on_gsm_error(&self, code: i32) {
        self.logger.debug(&format!("Modem reported CME error {}", code));
    }

    fn set_balance(&self, value: f64) {
        self.logger.info(&format!("SIM balance: {:.2}", value));
        self.modem.set_balance(value);
    }

    fn invalidate_balance(&self) {
        self.logger.debug("SIM balance invalidated");
        self.modem.invalidate_balance();
    }
}
