#![no_main]
use libfuzzer_sys::fuzz_target;
use ical_recur::{expand, Cap, DateValue, RecurRule};

fuzz_target!(|input: (RecurRule, DateValue)| {
    let (rule, dtstart) = input;
    // date-only starts reject sub-daily rules, which is fine
    let Ok(occurrences) = expand(rule, dtstart, &[], &[], None, Cap::count(64)) else {
        return;
    };
    let occurrences: Vec<_> = occurrences.collect();
    if let Some(first) = occurrences.first() {
        assert_eq!(*first, dtstart);
    }
    assert!(occurrences.windows(2).all(|w| w[0] < w[1]));
});
