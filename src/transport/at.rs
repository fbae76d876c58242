//! Minimal AT response line parser
//!
//! Understands the unsolicited result codes and command responses the serial
//! client relies on. Anything else is passed through as [`AtEvent::Other`].

use crate::modem::GsmState;

/// One parsed line from the modem
#[derive(Debug, Clone, PartialEq)]
pub enum AtEvent {
    Ok,
    Error,
    Ring,
    NoCarrier,
    /// `+CLIP: "<number>",<type>,...`
    CallerId(String),
    /// `+CREG: [<n>,]<stat>`
    Registration(GsmState),
    /// `+CSQ: <rssi>,<ber>`
    Signal { rssi: i32, ber: i32 },
    /// `+CME ERROR: <code>`
    CmeError(i32),
    /// `+CPIN: <code>`; true when the SIM is ready
    SimReady(bool),
    /// `+CUSD: <m>[,"<text>"[,<dcs>]]`
    Ussd(String),
    Other(String),
}

/// Parse one line with surrounding whitespace already allowed
pub fn parse_line(line: &str) -> Option<AtEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let event = match line {
        "OK" => AtEvent::Ok,
        "ERROR" => AtEvent::Error,
        "RING" => AtEvent::Ring,
        "NO CARRIER" | "BUSY" | "NO ANSWER" => AtEvent::NoCarrier,
        _ => parse_prefixed(line).unwrap_or_else(|| AtEvent::Other(line.to_string())),
    };
    Some(event)
}

fn parse_prefixed(line: &str) -> Option<AtEvent> {
    let (prefix, rest) = line.split_once(':')?;
    let rest = rest.trim();
    match prefix.trim() {
        "+CLIP" => {
            let number = first_quoted(rest)?;
            (!number.is_empty()).then(|| AtEvent::CallerId(number.to_string()))
        }
        "+CREG" => {
            let fields: Vec<&str> = rest.split(',').map(str::trim).collect();
            // Query answers carry "<n>,<stat>", unsolicited codes just "<stat>"
            let stat = match fields.as_slice() {
                [stat] => stat,
                [_, stat, ..] => stat,
                [] => return None,
            };
            stat.parse::<u8>()
                .ok()
                .map(|s| AtEvent::Registration(GsmState::from_creg_stat(s)))
        }
        "+CSQ" => {
            let (rssi, ber) = rest.split_once(',')?;
            Some(AtEvent::Signal {
                rssi: rssi.trim().parse().ok()?,
                ber: ber.trim().parse().ok()?,
            })
        }
        "+CME ERROR" => rest.parse().ok().map(AtEvent::CmeError),
        "+CPIN" => Some(AtEvent::SimReady(rest.eq_ignore_ascii_case("READY"))),
        "+CUSD" => Some(AtEvent::Ussd(first_quoted(rest).unwrap_or_default().to_string())),
        _ => None,
    }
}

fn first_quoted(s: &str) -> Option<&str> {
    let start = s.find('"')? + 1;
    let len = s[start..].find('"')?;
    Some(&s[start..start + len])
}

/// Extract the first decimal number from an operator balance message.
///
/// Accepts `,` as decimal separator and a leading minus sign.
pub fn parse_balance(text: &str) -> Option<f64> {
    let bytes = text.as_bytes();
    let start = bytes.iter().position(u8::is_ascii_digit)?;
    let negative = start > 0 && bytes[start - 1] == b'-';

    let mut number = String::new();
    let mut seen_separator = false;
    for &b in &bytes[start..] {
        match b {
            b'0'..=b'9' => number.push(b as char),
            b'.' | b',' if !seen_separator => {
                seen_separator = true;
                number.push('.');
            }
            _ => break,
        }
    }
    let number = number.trim_end_matches('.');
    let value: f64 = number.parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Format a USSD request for `code`
pub fn ussd_request(code: &str) -> String {
    format!("AT+CUSD=1,\"{}\",15", code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_results() {
        assert_eq!(parse_line("OK\r"), Some(AtEvent::Ok));
        assert_eq!(parse_line(" ERROR "), Some(AtEvent::Error));
        assert_eq!(parse_line("RING"), Some(AtEvent::Ring));
        assert_eq!(parse_line("NO CARRIER"), Some(AtEvent::NoCarrier));
        assert_eq!(parse_line("   "), None);
    }

    #[test]
    fn caller_id() {
        assert_eq!(
            parse_line("+CLIP: \"+79161234567\",145,\"\",0,\"\",0"),
            Some(AtEvent::CallerId("+79161234567".to_string()))
        );
        // Withheld numbers are not panic calls we can relay
        assert_eq!(
            parse_line("+CLIP: \"\",128"),
            Some(AtEvent::Other("+CLIP: \"\",128".to_string()))
        );
    }

    #[test]
    fn registration_forms() {
        assert_eq!(
            parse_line("+CREG: 0,1"),
            Some(AtEvent::Registration(GsmState::Online))
        );
        assert_eq!(
            parse_line("+CREG: 3"),
            Some(AtEvent::Registration(GsmState::RegDenied))
        );
        assert_eq!(
            parse_line("+CREG: 2,5,\"00C3\",\"1A2B\""),
            Some(AtEvent::Registration(GsmState::Roaming))
        );
    }

    #[test]
    fn signal_and_errors() {
        assert_eq!(
            parse_line("+CSQ: 17,0"),
            Some(AtEvent::Signal { rssi: 17, ber: 0 })
        );
        assert_eq!(parse_line("+CME ERROR: 10"), Some(AtEvent::CmeError(10)));
        assert_eq!(parse_line("+CPIN: READY"), Some(AtEvent::SimReady(true)));
        assert_eq!(parse_line("+CPIN: SIM PIN"), Some(AtEvent::SimReady(false)));
    }

    #[test]
    fn ussd_and_balance() {
        assert_eq!(
            parse_line("+CUSD: 0,\"Balance: 42,50 r.\",15"),
            Some(AtEvent::Ussd("Balance: 42,50 r.".to_string()))
        );
        assert_eq!(parse_balance("Balance: 42,50 r."), Some(42.5));
        assert_eq!(parse_balance("Vash balans -3.7 rub"), Some(-3.7));
        assert_eq!(parse_balance("Balans 100. Tarif X"), Some(100.0));
        assert_eq!(parse_balance("no digits here"), None);
        assert_eq!(ussd_request("*100#"), "AT+CUSD=1,\"*100#\",15");
    }
}
