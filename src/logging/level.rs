use crate::error::{GsmPanicError, Result};
use tracing::Level;

pub fn parse_log_level(level_str: &str) -> Result<Level> {
    match level_str.to_uppercase().as_str() {
        "TRACE" => Ok(Level::TRACE),
        "DEBUG" => Ok(Level::DEBUG),
        "INFO" => Ok(Level::INFO),
        "WARN" | "WARNING" => Ok(Level::WARN),
        "ERROR" => Ok(Level::ERROR),
        _ => Err(GsmPanicError::config(format!(
            "Invalid log level: {}",
            level_str
        ))),
    }
}

pub fn level_rank(level: Level) -> u8 {
    match level {
        Level::TRACE => 0,
        Level::DEBUG => 1,
        Level::INFO => 2,
        Level::WARN => 3,
        Level::ERROR => 4,
    }
}

pub fn min_level(a: Level, b: Level) -> Level {
    if level_rank(a) <= level_rank(b) { a } else { b }
}

/// Severity for the `occurrence`-th (1-based) error in a run of errors.
///
/// Occurrences 1, 1 + divisor, 1 + 2 * divisor, ... are errors; the rest are
/// debug. A divisor of 0 is treated as 1.
pub const fn level_for_divided_count(occurrence: u64, divisor: u64) -> Level {
    let divisor = if divisor == 0 { 1 } else { divisor };
    if occurrence.saturating_sub(1) % divisor == 0 {
        Level::ERROR
    } else {
        Level::DEBUG
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divided_levels_follow_occurrence() {
        let levels: Vec<Level> = (1..=5).map(|n| level_for_divided_count(n, 2)).collect();
        assert_eq!(
            levels,
            vec![
                Level::ERROR,
                Level::DEBUG,
                Level::ERROR,
                Level::DEBUG,
                Level::ERROR
            ]
        );
    }

    #[test]
    fn divisor_of_one_always_errors() {
        assert!((1..=4).all(|n| level_for_divided_count(n, 1) == Level::ERROR));
        assert_eq!(level_for_divided_count(3, 0), Level::ERROR);
    }

    #[test]
    fn min_level_prefers_verbose() {
        assert_eq!(min_level(Level::INFO, Level::DEBUG), Level::DEBUG);
        assert_eq!(min_level(Level::WARN, Level::ERROR), Level::WARN);
    }
}
