#![no_main]
use libfuzzer_sys::fuzz_target;
use ical_recur::{parse_rrule_property, parse_rule};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = parse_rule(s);
        let _ = parse_rrule_property(s);
    }
});
