//! RFC 5545 recurrence rules: parse RRULE/EXRULE text, format it back, and
//! expand a DTSTART plus rules, RDATE and EXDATE into ordered occurrences.
//!
//! ```
//! use ical_recur::{expand, parse_rule, Cap, DateValue};
//!
//! let rule = parse_rule("FREQ=MONTHLY;BYDAY=-1MO,-1TU,-1WE,-1TH,-1FR;BYSETPOS=-1").unwrap();
//! let dtstart = DateValue::date(2004, 2, 27).unwrap();
//! let last_weekdays: Vec<_> = expand(rule, dtstart, &[], &[], None, Cap::count(3))
//!     .unwrap()
//!     .map(|d| d.to_string())
//!     .collect();
//! assert_eq!(last_weekdays, ["20040227", "20040331", "20040430"]);
//! ```

pub mod date_value;
pub mod error;
pub mod interpreter;
pub mod parser;
pub mod weekday;

// https://github.com/Geal/nom/blob/master/doc/choosing_a_combinator.md

// https://datatracker.ietf.org/doc/html/rfc5545#section-3.3.10
// https://datatracker.ietf.org/doc/html/rfc5545#section-3.8.5
// https://datatracker.ietf.org/doc/html/rfc5545#section-3.8.5.3

pub use crate::{
    date_value::{format_date_list, DateValue},
    error::{Error, Result},
    interpreter::{
        config::{BoundPolicy, ExpansionConfig},
        set::{Cap, Occurrences, RecurrenceSet},
        RuleIter,
    },
    parser::{
        frequency::Frequency,
        recur_rule::{ByDayEntry, RecurEnd, RecurRule, RuleKind},
    },
    weekday::Weekday,
};

/// Parses an RRULE/EXRULE value such as `FREQ=WEEKLY;BYDAY=MO,WE`.
pub fn parse_rule(text: &str) -> Result<RecurRule> {
    parser::recur_rule::recur(text)
}

/// Parses a whole `RRULE` or `EXRULE` content line, parameters included.
pub fn parse_rrule_property(line: &str) -> Result<(RuleKind, RecurRule)> {
    parser::recur_rule::rrule(line)
}

/// Canonical text of `rule`, accepted again by [`parse_rule`].
pub fn format_rule(rule: &RecurRule) -> String {
    rule.to_string()
}

/// Lazily expands one rule with its RDATE, EXDATE and optional EXRULE,
/// stopping at the rule's own COUNT/UNTIL or at `cap`, whichever comes first.
pub fn expand(
    rule: RecurRule,
    dtstart: DateValue,
    rdates: &[DateValue],
    exdates: &[DateValue],
    exrule: Option<RecurRule>,
    cap: Cap,
) -> Result<Occurrences> {
    let set = RecurrenceSet::new(dtstart)
        .rrule(rule)
        .rdates(rdates.iter().copied())
        .exdates(exdates.iter().copied());
    let set = match exrule {
        Some(exrule) => set.exrule(exrule),
        None => set,
    };
    set.expand(cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> DateValue {
        DateValue::date_time(y, m, d, h, mi, s).unwrap()
    }

    fn expand_all(rule: &str, dtstart: DateValue, limit: usize) -> Vec<String> {
        expand(parse_rule(rule).unwrap(), dtstart, &[], &[], None, Cap::count(limit))
            .unwrap()
            .map(|d| d.to_string())
            .collect()
    }

    // RFC 5545 section 3.8.5.3
    #[test_log::test]
    fn rfc_examples() {
        let start = dt(1997, 9, 2, 9, 0, 0);
        assert_eq!(
            expand_all("FREQ=DAILY;INTERVAL=10;COUNT=5", start, 100),
            [
                "19970902T090000",
                "19970912T090000",
                "19970922T090000",
                "19971002T090000",
                "19971012T090000"
            ]
        );
        assert_eq!(
            expand_all("FREQ=WEEKLY;UNTIL=19971007T000000Z;WKST=SU;BYDAY=TU,TH", start, 100),
            [
                "19970902T090000",
                "19970904T090000",
                "19970909T090000",
                "19970911T090000",
                "19970916T090000",
                "19970918T090000",
                "19970923T090000",
                "19970925T090000",
                "19970930T090000",
                "19971002T090000"
            ]
        );
        assert_eq!(
            expand_all(
                "FREQ=MONTHLY;INTERVAL=2;COUNT=10;BYDAY=1SU,-1SU",
                dt(1997, 9, 7, 9, 0, 0),
                100
            ),
            [
                "19970907T090000",
                "19970928T090000",
                "19971102T090000",
                "19971130T090000",
                "19980104T090000",
                "19980125T090000",
                "19980301T090000",
                "19980329T090000",
                "19980503T090000",
                "19980531T090000"
            ]
        );
        assert_eq!(
            expand_all("FREQ=MONTHLY;BYMONTHDAY=-3", dt(1997, 9, 28, 9, 0, 0), 4),
            ["19970928T090000", "19971029T090000", "19971128T090000", "19971229T090000"]
        );
        assert_eq!(
            expand_all("FREQ=YEARLY;BYDAY=20MO", dt(1997, 5, 19, 9, 0, 0), 3),
            ["19970519T090000", "19980518T090000", "19990517T090000"]
        );
        assert_eq!(
            expand_all("FREQ=YEARLY;BYWEEKNO=20;BYDAY=MO", dt(1997, 5, 12, 9, 0, 0), 3),
            ["19970512T090000", "19980511T090000", "19990517T090000"]
        );
        // every Friday the 13th
        assert_eq!(
            expand_all("FREQ=MONTHLY;BYDAY=FR;BYMONTHDAY=13", dt(1997, 9, 2, 9, 0, 0), 5),
            [
                "19970902T090000",
                "19980213T090000",
                "19980313T090000",
                "19981113T090000",
                "19990813T090000"
            ]
        );
        // US presidential election day
        assert_eq!(
            expand_all(
                "FREQ=YEARLY;INTERVAL=4;BYMONTH=11;BYDAY=TU;BYMONTHDAY=2,3,4,5,6,7,8",
                dt(1996, 11, 5, 9, 0, 0),
                3
            ),
            ["19961105T090000", "20001107T090000", "20041102T090000"]
        );
        assert_eq!(
            expand_all("FREQ=MONTHLY;COUNT=3;BYDAY=TU,WE,TH;BYSETPOS=3", dt(1997, 9, 4, 9, 0, 0), 100),
            ["19970904T090000", "19971007T090000", "19971106T090000"]
        );
        assert_eq!(
            expand_all(
                "FREQ=MINUTELY;INTERVAL=20;BYHOUR=9,10,11,12,13,14,15,16",
                start,
                25
            )
            .last()
            .map(String::as_str),
            Some("19970903T090000")
        );
    }

    #[test_log::test]
    fn expansion_is_strictly_ascending() {
        let rules = [
            "FREQ=YEARLY;BYMONTH=1,6;BYDAY=MO,-1FR",
            "FREQ=MONTHLY;BYMONTHDAY=1,-1,15;BYHOUR=8,20",
            "FREQ=WEEKLY;INTERVAL=3;BYDAY=SU,WE;WKST=TH",
            "FREQ=DAILY;BYMONTH=2;BYSETPOS=1",
            "FREQ=HOURLY;INTERVAL=5;BYMINUTE=0,30",
        ];
        for rule in rules {
            let occurrences: Vec<_> = expand(
                parse_rule(rule).unwrap(),
                dt(2023, 11, 15, 10, 0, 0),
                &[],
                &[],
                None,
                Cap::count(300),
            )
            .unwrap()
            .collect();
            assert_eq!(occurrences.len(), 300, "{}", rule);
            assert_eq!(occurrences[0], dt(2023, 11, 15, 10, 0, 0), "{}", rule);
            assert!(occurrences.windows(2).all(|w| w[0] < w[1]), "{}", rule);
        }
    }

    #[test_log::test]
    fn count_with_exclusions() {
        let exdates = [dt(1997, 9, 3, 9, 0, 0), dt(1997, 9, 4, 9, 0, 0)];
        let occurrences: Vec<_> = expand(
            parse_rule("FREQ=DAILY;COUNT=10").unwrap(),
            dt(1997, 9, 2, 9, 0, 0),
            &[],
            &exdates,
            None,
            Cap::none(),
        )
        .unwrap()
        .collect();
        assert_eq!(occurrences.len(), 10);
        assert_eq!(occurrences.last(), Some(&dt(1997, 9, 13, 9, 0, 0)));
        assert!(occurrences.iter().all(|o| !exdates.contains(o)));
    }

    #[test_log::test]
    fn property_lines() {
        let (kind, rule) = parse_rrule_property("EXRULE;X-FOO=\"a:b\":FREQ=WEEKLY;BYDAY=SA").unwrap();
        assert_eq!(kind, RuleKind::Exrule);
        assert_eq!(format_rule(&rule), "FREQ=WEEKLY;BYDAY=SA");
        assert!(parse_rrule_property("RDATE:19970101").is_err());
    }
}
