use gsm_panic::controller::{Controller, ControllerMode};
use gsm_panic::modem::{GsmState, ModemState};
use gsm_panic::transport::serial::ModemSession;
use std::sync::{Arc, Mutex};
use std::time::Duration;

mod common;

fn idle_controller() -> Controller {
    Controller::builder(
        common::FakeProvider::new(Some(common::test_config())),
        common::FakeConnector::pending(),
        common::FakeConnector::pending(),
    )
    .mode(ControllerMode::Library)
    .build()
}

#[test]
fn modem_transcript_drives_controller_state() {
    let controller = idle_controller();
    let panics = Arc::new(Mutex::new(Vec::new()));
    {
        let panics = panics.clone();
        controller.set_panic_callback(move |n| panics.lock().unwrap().push(n.to_string()));
    }

    let mut session = ModemSession::new(Duration::from_secs(15));
    let transcript = [
        "AT",
        "OK",
        "OK",
        "+CPIN: READY",
        "+CREG: 1,2",
        "+CSQ: 14,0",
        "+CREG: 1,1",
        "RING",
        "+CLIP: \"+79001112233\",145,\"\",0,\"\",0",
        "RING",
        "+CLIP: \"+79001112233\",145,\"\",0,\"\",0",
        "NO CARRIER",
        "+CUSD: 0,\"Balans: 250,75 rub.\",15",
    ];

    let mut replies = Vec::new();
    for line in transcript {
        replies.extend(session.handle_line(line, &controller));
    }

    assert_eq!(replies, vec!["ATH".to_string()]);
    assert_eq!(*panics.lock().unwrap(), vec!["+79001112233".to_string()]);

    let status = controller.modem_status();
    assert_eq!(status.modem_state, ModemState::Online);
    assert_eq!(status.gsm_state, GsmState::Online);
    assert_eq!(status.signal_level, 14);
    assert!(controller.is_balance_valid());
    assert!((controller.balance() - 250.75).abs() < 1e-9);
}

#[test]
fn sim_failure_reported_once_to_error_callback() {
    let controller = idle_controller();
    let errors = Arc::new(Mutex::new(0usize));
    {
        let errors = errors.clone();
        controller.set_error_callback(move |_| *errors.lock().unwrap() += 1);
    }

    let mut session = ModemSession::new(Duration::from_secs(15));
    for line in ["+CME ERROR: 10", "+CPIN: SIM PIN", "+CME ERROR: 10", "+CREG: 0,3"] {
        session.handle_line(line, &controller);
    }

    assert_eq!(controller.gsm_state(), GsmState::RegDenied);
    // NoSim edge once, RegDenied edge once
    assert_eq!(*errors.lock().unwrap(), 2);
}
