pub mod chrono_utils;
pub mod enum_utils;
pub mod frequency;
pub mod recur_rule;

use std::{
    ops::{Neg, RangeBounds},
    str::FromStr,
};

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_while1},
    character::complete::{digit1, one_of},
    combinator::{map_res, opt, recognize, verify},
    multi::{many0, separated_list1},
    sequence::{delimited, pair},
    IResult,
};

pub fn iana_token(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '-')(input)
}

fn is_control(c: char) -> bool {
    (char::from(0x00) <= c && c <= char::from(0x08))
        || (char::from(0x0a) <= c && c <= char::from(0x1f))
        || c == char::from(0x7f)
}

pub fn paramtext(input: &str) -> IResult<&str, &str> {
    take_till(|c: char| is_control(c) || c == ';' || c == ':' || c == ',' || c == '"')(input)
}

pub fn quoted_string(input: &str) -> IResult<&str, &str> {
    delimited(
        tag("\""),
        take_till(|c: char| is_control(c) || c == '"'),
        tag("\""),
    )(input)
}

pub fn param_value(input: &str) -> IResult<&str, &str> {
    alt((quoted_string, paramtext))(input)
}

// https://datatracker.ietf.org/doc/html/rfc5545#section-3.2
pub fn other_param(input: &str) -> IResult<&str, (&str, Vec<&str>)> {
    let (input, iana_token) = iana_token(input)?;
    let (input, _) = tag("=")(input)?;
    let (input, param_values) = separated_list1(tag(","), param_value)(input)?;
    Ok((input, (iana_token, param_values)))
}

pub fn rrulparam(input: &str) -> IResult<&str, (&str, Vec<&str>)> {
    let (input, _) = tag(";")(input)?;
    other_param(input)
}

pub fn rrulparams(input: &str) -> IResult<&str, Vec<(&str, Vec<&str>)>> {
    many0(rrulparam)(input)
}

fn signed_integer(input: &str) -> IResult<&str, &str> {
    recognize(pair(opt(one_of("+-")), digit1))(input)
}

/// An optionally signed integer that has to fall into `range`.
pub fn digits<T: RangeBounds<U>, U: FromStr + PartialOrd>(
    range: T,
) -> impl FnMut(&str) -> IResult<&str, U> {
    move |input| {
        verify(map_res(signed_integer, |v: &str| v.parse::<U>()), |v: &U| {
            range.contains(v)
        })(input)
    }
}

/// A signed integer in `-limit..=limit`, zero excluded.
pub fn signed_nonzero<U>(limit: U) -> impl FnMut(&str) -> IResult<&str, U>
where
    U: FromStr + PartialOrd + Neg<Output = U> + Default + Copy,
{
    move |input| {
        verify(map_res(signed_integer, |v: &str| v.parse::<U>()), |v: &U| {
            *v != U::default() && -limit <= *v && *v <= limit
        })(input)
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use crate::{
        date_value::DateValue,
        error::Error,
        interpreter::config::BoundPolicy,
        parser::{
            frequency::{freq, Frequency},
            other_param, param_value,
            recur_rule::{recur, rrule, ByDayEntry, RecurEnd, RecurRule, RuleKind},
            rrulparams,
        },
        weekday::Weekday,
    };

    use super::{digits, iana_token, signed_nonzero};

    use Weekday::*;

    fn check(rule: &RecurRule, to_string: &str) {
        assert_eq!(to_string, rule.to_string());
        assert_eq!(rule, &recur(to_string).unwrap());
    }

    fn interval(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> DateValue {
        DateValue::utc(y, m, d, h, mi, s).unwrap()
    }

    fn days(entries: &[Weekday]) -> Vec<ByDayEntry> {
        entries.iter().copied().map(ByDayEntry::every).collect()
    }

    fn malformed(text: &str) -> bool {
        matches!(recur(text), Err(Error::MalformedRule { .. }))
    }

    #[test]
    fn tokens_and_params() {
        assert_eq!(iana_token("133THIS-IS-a-010-IAnATokn"), Ok(("", "133THIS-IS-a-010-IAnATokn")));
        assert!(iana_token("_").is_err());
        assert_eq!(param_value("ä"), Ok(("", "ä")));
        assert_eq!(param_value("\"a;b:c\";X"), Ok((";X", "a;b:c")));
        assert_eq!(
            other_param("1-tEST=ädf,üsldifh"),
            Ok(("", ("1-tEST", vec!["ädf", "üsldifh"])))
        );
        assert_eq!(
            rrulparams(";TEST=1,2;TEST=3,4"),
            Ok(("", vec![("TEST", vec!["1", "2"]), ("TEST", vec!["3", "4"])]))
        );
        assert_eq!(rrulparams(";"), Ok((";", vec![])));
    }

    #[test]
    fn numbers() {
        assert_eq!(digits(0_u8..=59)("59,"), Ok((",", 59)));
        assert!(digits(0_u8..=59)("60").is_err());
        assert_eq!(signed_nonzero(31_i8)("-31"), Ok(("", -31)));
        assert_eq!(signed_nonzero(31_i8)("+3MO"), Ok(("MO", 3)));
        assert!(signed_nonzero(31_i8)("0").is_err());
        assert!(signed_nonzero(31_i8)("32").is_err());
        assert!(signed_nonzero(31_i8)("-").is_err());
    }

    #[test]
    fn frequency_keywords() {
        assert_eq!(freq("MINUTELY"), Ok(("", Frequency::Minutely)));
        assert_eq!(freq("monthly"), Ok(("", Frequency::Monthly)));
        assert!(freq("FORTNIGHTLY").is_err());
    }

    #[test]
    fn daily_for_10_occurrences() {
        check(&RecurRule::new(Frequency::Daily).with_count(10), "FREQ=DAILY;COUNT=10");
    }

    #[test]
    fn daily_until() {
        let rule = RecurRule::new(Frequency::Daily).with_until(utc(1997, 12, 24, 0, 0, 0));
        check(&rule, "FREQ=DAILY;UNTIL=19971224T000000Z");
    }

    #[test]
    fn every_10_days_5_occurrences() {
        let rule = RecurRule::new(Frequency::Daily)
            .with_interval(interval(10))
            .with_count(5);
        check(&rule, "FREQ=DAILY;COUNT=5;INTERVAL=10");
        assert_eq!(rule, recur("FREQ=DAILY;INTERVAL=10;COUNT=5").unwrap());
    }

    #[test]
    fn every_day_in_january() {
        let rule = RecurRule::new(Frequency::Yearly)
            .with_until(utc(2000, 1, 31, 14, 0, 0))
            .with_by_month([1])
            .with_by_day(days(&[Sun, Mon, Tue, Wed, Thu, Fri, Sat]));
        check(
            &rule,
            "FREQ=YEARLY;UNTIL=20000131T140000Z;BYDAY=SU,MO,TU,WE,TH,FR,SA;BYMONTH=1",
        );
    }

    #[test]
    fn every_other_week_with_wkst() {
        let rule = RecurRule::new(Frequency::Weekly)
            .with_interval(interval(2))
            .with_until(utc(1997, 12, 24, 0, 0, 0))
            .with_week_start(Sun)
            .with_by_day(days(&[Mon, Wed, Fri]));
        check(
            &rule,
            "FREQ=WEEKLY;UNTIL=19971224T000000Z;INTERVAL=2;BYDAY=MO,WE,FR;WKST=SU",
        );
        assert_eq!(
            rule,
            recur("FREQ=WEEKLY;INTERVAL=2;UNTIL=19971224T000000Z;WKST=SU;BYDAY=MO,WE,FR").unwrap()
        );
    }

    #[test]
    fn monthly_ordinal_weekdays() {
        let rule = RecurRule::new(Frequency::Monthly)
            .with_interval(interval(2))
            .with_count(10)
            .with_by_day([ByDayEntry::nth(1, Sun), ByDayEntry::nth(-1, Sun)]);
        check(&rule, "FREQ=MONTHLY;COUNT=10;INTERVAL=2;BYDAY=1SU,-1SU");

        let rule = RecurRule::new(Frequency::Monthly)
            .with_count(6)
            .with_by_day([ByDayEntry::nth(-2, Mon)]);
        check(&rule, "FREQ=MONTHLY;COUNT=6;BYDAY=-2MO");
        assert_eq!(rule, recur("FREQ=MONTHLY;COUNT=6;BYDAY=-2mo").unwrap());
        assert_eq!(
            recur("FREQ=MONTHLY;BYDAY=+2TU").unwrap().by_day(),
            &[ByDayEntry::nth(2, Tue)]
        );
    }

    #[test]
    fn monthly_by_month_day() {
        check(
            &RecurRule::new(Frequency::Monthly).with_by_month_day([-3]),
            "FREQ=MONTHLY;BYMONTHDAY=-3",
        );
        check(
            &RecurRule::new(Frequency::Monthly)
                .with_count(10)
                .with_by_month_day([1, -1]),
            "FREQ=MONTHLY;COUNT=10;BYMONTHDAY=1,-1",
        );
    }

    #[test]
    fn last_weekday_of_month() {
        let rule = RecurRule::new(Frequency::Monthly)
            .with_by_day([
                ByDayEntry::every(Mon),
                ByDayEntry::every(Tue),
                ByDayEntry::every(Wed),
                ByDayEntry::every(Thu),
                ByDayEntry::every(Fri),
            ])
            .with_by_set_pos([-1]);
        check(&rule, "FREQ=MONTHLY;BYDAY=MO,TU,WE,TH,FR;BYSETPOS=-1");
    }

    #[test]
    fn yearly_week_number_and_year_day() {
        check(
            &RecurRule::new(Frequency::Yearly)
                .with_by_week_no([20])
                .with_by_day([ByDayEntry::every(Mon)]),
            "FREQ=YEARLY;BYDAY=MO;BYWEEKNO=20",
        );
        check(
            &RecurRule::new(Frequency::Yearly)
                .with_interval(interval(3))
                .with_count(10)
                .with_by_year_day([1, 100, 200]),
            "FREQ=YEARLY;COUNT=10;INTERVAL=3;BYYEARDAY=1,100,200",
        );
    }

    #[test]
    fn time_parts() {
        let rule = RecurRule::new(Frequency::Daily)
            .with_by_second([0, 60])
            .with_by_minute([0, 20, 40])
            .with_by_hour([9, 10, 11, 12, 13, 14, 15, 16]);
        check(
            &rule,
            "FREQ=DAILY;BYSECOND=0,60;BYMINUTE=0,20,40;BYHOUR=9,10,11,12,13,14,15,16",
        );
    }

    #[test]
    fn keys_are_case_insensitive() {
        let rule = recur("freq=weekly;count=4;byday=tu,su;wkst=su").unwrap();
        check(&rule, "FREQ=WEEKLY;COUNT=4;BYDAY=TU,SU;WKST=SU");
        assert_eq!(rule.week_start(), Sun);
    }

    #[test]
    fn freq_need_not_come_first() {
        let rule = recur("COUNT=5;BYMONTHDAY=15,30;FREQ=MONTHLY").unwrap();
        check(&rule, "FREQ=MONTHLY;COUNT=5;BYMONTHDAY=15,30");
    }

    #[test]
    fn date_only_until() {
        let rule = recur("FREQ=SECONDLY;UNTIL=19971224").unwrap();
        assert_eq!(rule.until(), Some(DateValue::date(1997, 12, 24).unwrap()));
        check(&rule, "FREQ=SECONDLY;UNTIL=19971224");
    }

    #[test]
    fn count_and_until_are_both_kept() {
        let rule = recur("FREQ=DAILY;COUNT=3;UNTIL=19970904T000000Z").unwrap();
        check(&rule, "FREQ=DAILY;UNTIL=19970904T000000Z;COUNT=3");
        assert_eq!(rule.end(BoundPolicy::CountWins), RecurEnd::Count(3));
        assert_eq!(
            rule.end(BoundPolicy::UntilWins),
            RecurEnd::Until(utc(1997, 9, 4, 0, 0, 0))
        );
        assert_eq!(
            recur("FREQ=DAILY").unwrap().end(BoundPolicy::CountWins),
            RecurEnd::Forever
        );
    }

    #[test]
    fn rejects_malformed_rules() {
        assert!(malformed(""));
        assert!(malformed("COUNT=10"));
        assert!(malformed("FREQ=FORTNIGHTLY"));
        assert!(malformed("FREQ=YEARLY;BYMONTH=13"));
        assert!(malformed("FREQ=YEARLY;BYMONTH=0"));
        assert!(malformed("FREQ=MONTHLY;BYMONTHDAY=0"));
        assert!(malformed("FREQ=MONTHLY;BYMONTHDAY=32"));
        assert!(malformed("FREQ=DAILY;BYHOUR=24"));
        assert!(malformed("FREQ=DAILY;INTERVAL=0"));
        assert!(malformed("FREQ=DAILY;COUNT=-1"));
        assert!(malformed("FREQ=DAILY;BYSECOND="));
        assert!(malformed("FREQ=DAILY;FREQ=DAILY"));
        assert!(malformed("FREQ=DAILY;COUNT=1;COUNT=2"));
        assert!(malformed("FREQ=DAILY;X-FOO=1"));
        assert!(malformed("FREQ=DAILY;UNTIL=19970230"));
        assert!(malformed("FREQ=MONTHLY;BYDAY=0MO"));
        assert!(malformed("FREQ=MONTHLY;BYDAY=XX"));
        assert!(malformed("FREQ=DAILY;"));
    }

    #[test]
    fn rejects_forbidden_combinations() {
        assert!(malformed("FREQ=MONTHLY;BYWEEKNO=1"));
        assert!(malformed("FREQ=DAILY;BYYEARDAY=1"));
        assert!(malformed("FREQ=WEEKLY;BYMONTHDAY=1"));
        assert!(malformed("FREQ=WEEKLY;BYDAY=1MO"));
        assert!(malformed("FREQ=YEARLY;BYWEEKNO=1;BYDAY=1MO"));
        assert!(recur("FREQ=HOURLY;BYYEARDAY=1").is_ok());
        assert!(recur("FREQ=YEARLY;BYWEEKNO=1;BYDAY=MO").is_ok());
    }

    #[test]
    fn error_names_the_offending_part() {
        match recur("FREQ=YEARLY;BYMONTH=13;COUNT=1") {
            Err(Error::MalformedRule { reason }) => assert!(reason.contains("BYMONTH=13"), "{}", reason),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn property_lines() {
        let (kind, rule) = rrule("RRULE:FREQ=DAILY;COUNT=2").unwrap();
        assert_eq!(kind, RuleKind::Rrule);
        assert_eq!(rule, RecurRule::new(Frequency::Daily).with_count(2));

        let (kind, rule) = rrule("EXRULE;X-NOTE=\"a:b\";Y=1,2:FREQ=WEEKLY;BYDAY=FR").unwrap();
        assert_eq!(kind, RuleKind::Exrule);
        assert_eq!(rule.by_day(), &[ByDayEntry::every(Fri)]);

        assert!(rrule("RDATE:19970101").is_err());
        assert!(rrule("RRULE;FREQ=DAILY").is_err());
    }

    #[cfg(feature = "arbitrary")]
    #[test]
    fn random_rules_survive_format_and_parse() {
        use arbitrary::{Arbitrary, Unstructured};
        use rand::{Rng, RngCore};

        let mut generated = 0;
        while generated < 1024 {
            let mut data = vec![0; rand::thread_rng().gen_range(64..1024)];
            rand::thread_rng().fill_bytes(&mut data);
            let mut unstructured = Unstructured::new(&data);
            let Ok(rule) = RecurRule::arbitrary(&mut unstructured) else {
                continue;
            };
            assert!(rule.validate().is_ok(), "{}", rule);
            let text = rule.to_string();
            assert_eq!(recur(&text), Ok(rule), "{}", text);
            generated += 1;
        }
    }
}
