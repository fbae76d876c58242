#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    for line in text.split(['\r', '\n']) {
        if let Some(gsm_panic::transport::at::AtEvent::Ussd(ussd)) =
            gsm_panic::transport::at::parse_line(line)
        {
            let _ = gsm_panic::transport::at::parse_balance(&ussd);
        }
    }
    let _ = gsm_panic::transport::at::parse_balance(&text);
});
