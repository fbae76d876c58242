use gsm_panic::config::LoggingConfig;
use gsm_panic::logging::{get_logger, init_logging, level_for_divided_count, parse_log_level};
use tracing::Level;

#[test]
fn warning_alias_is_accepted() {
    assert_eq!(parse_log_level("warning").unwrap(), Level::WARN);
    assert_eq!(parse_log_level("Trace").unwrap(), Level::TRACE);
    assert!(parse_log_level("verbose").is_err());
}

#[test]
fn divided_count_with_divisor_one_is_always_error() {
    assert!((1..=20).all(|n| level_for_divided_count(n, 1) == Level::ERROR));
    assert_eq!(level_for_divided_count(3, 0), Level::ERROR);
    assert_eq!(level_for_divided_count(11, 10), Level::ERROR);
    assert_eq!(level_for_divided_count(12, 10), Level::DEBUG);
}

#[test]
fn init_logging_is_idempotent() {
    let dir = std::env::temp_dir().join("gsm_panic_logging_test");
    std::fs::create_dir_all(&dir).unwrap();
    let config = LoggingConfig {
        file: dir.join("gsm_panic.log").to_string_lossy().to_string(),
        console_output: false,
        ..LoggingConfig::default()
    };

    let first = init_logging(&config);
    let second = init_logging(&config);
    assert_eq!(first.is_ok(), second.is_ok());
    get_logger("test").info("logging initialised");
}
