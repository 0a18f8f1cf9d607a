#![no_main]
use libfuzzer_sys::fuzz_target;
use ical_recur::{format_rule, parse_rule, RecurRule};

fuzz_target!(|data: RecurRule| {
    let text = format_rule(&data);
    assert_eq!(Ok(data), parse_rule(&text), "{}", text);
});
