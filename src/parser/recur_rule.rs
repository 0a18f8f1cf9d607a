use std::{fmt, num::NonZeroU32};

#[cfg(feature = "arbitrary")]
use arbitrary::{Arbitrary, Unstructured};
use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case},
    combinator::{all_consuming, map, opt},
    multi::separated_list1,
    sequence::{pair, preceded},
    IResult,
};

use crate::{
    date_value::DateValue,
    error::{Error, Result},
    interpreter::config::BoundPolicy,
    weekday::{weekday, Weekday},
};

use super::{
    chrono_utils::date_or_datetime,
    digits,
    frequency::{freq, Frequency},
    rrulparams, signed_nonzero,
};

/// One BYDAY entry: `MO` matches every Monday of the period, `-1MO` only the last one.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ByDayEntry {
    pub ordinal: Option<i8>,
    pub weekday: Weekday,
}

impl ByDayEntry {
    pub fn every(weekday: Weekday) -> Self {
        ByDayEntry {
            ordinal: None,
            weekday,
        }
    }

    pub fn nth(ordinal: i8, weekday: Weekday) -> Self {
        ByDayEntry {
            ordinal: Some(ordinal),
            weekday,
        }
    }
}

impl fmt::Display for ByDayEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(ordinal) = self.ordinal {
            write!(f, "{}", ordinal)?;
        }
        write!(f, "{}", self.weekday)
    }
}

/// The bound a rule ends with once COUNT and UNTIL have been reconciled.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RecurEnd {
    Until(DateValue),
    Count(u64),
    Forever,
}

/// A parsed RRULE or EXRULE value.
///
/// Empty BYxxx lists mean the rule part is absent. Rules built through the
/// `with_*` methods are checked by [`RecurRule::validate`] before expansion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecurRule {
    pub(crate) freq: Frequency,
    pub(crate) interval: NonZeroU32,
    pub(crate) count: Option<u64>,
    pub(crate) until: Option<DateValue>,
    pub(crate) weekstart: Weekday,
    pub(crate) bysecond: Vec<u8>,
    pub(crate) byminute: Vec<u8>,
    pub(crate) byhour: Vec<u8>,
    pub(crate) byday: Vec<ByDayEntry>,
    pub(crate) bymonthday: Vec<i8>,
    pub(crate) byyearday: Vec<i16>,
    pub(crate) byweekno: Vec<i8>,
    pub(crate) bymonth: Vec<u8>,
    pub(crate) bysetpos: Vec<i16>,
}

impl RecurRule {
    pub fn new(freq: Frequency) -> Self {
        RecurRule {
            freq,
            interval: NonZeroU32::MIN,
            count: None,
            until: None,
            weekstart: Weekday::Mon,
            bysecond: vec![],
            byminute: vec![],
            byhour: vec![],
            byday: vec![],
            bymonthday: vec![],
            byyearday: vec![],
            byweekno: vec![],
            bymonth: vec![],
            bysetpos: vec![],
        }
    }

    pub fn freq(&self) -> Frequency {
        self.freq
    }

    pub fn interval(&self) -> u32 {
        self.interval.get()
    }

    pub fn count(&self) -> Option<u64> {
        self.count
    }

    pub fn until(&self) -> Option<DateValue> {
        self.until
    }

    pub fn week_start(&self) -> Weekday {
        self.weekstart
    }

    pub fn by_second(&self) -> &[u8] {
        &self.bysecond
    }

    pub fn by_minute(&self) -> &[u8] {
        &self.byminute
    }

    pub fn by_hour(&self) -> &[u8] {
        &self.byhour
    }

    pub fn by_day(&self) -> &[ByDayEntry] {
        &self.byday
    }

    pub fn by_month_day(&self) -> &[i8] {
        &self.bymonthday
    }

    pub fn by_year_day(&self) -> &[i16] {
        &self.byyearday
    }

    pub fn by_week_no(&self) -> &[i8] {
        &self.byweekno
    }

    pub fn by_month(&self) -> &[u8] {
        &self.bymonth
    }

    pub fn by_set_pos(&self) -> &[i16] {
        &self.bysetpos
    }

    pub fn with_interval(self, interval: NonZeroU32) -> Self {
        RecurRule { interval, ..self }
    }

    pub fn with_count(self, count: u64) -> Self {
        RecurRule {
            count: Some(count),
            ..self
        }
    }

    pub fn with_until(self, until: DateValue) -> Self {
        RecurRule {
            until: Some(until),
            ..self
        }
    }

    pub fn with_week_start(self, weekstart: Weekday) -> Self {
        RecurRule { weekstart, ..self }
    }

    pub fn with_by_second(self, bysecond: impl IntoIterator<Item = u8>) -> Self {
        RecurRule {
            bysecond: bysecond.into_iter().collect(),
            ..self
        }
    }

    pub fn with_by_minute(self, byminute: impl IntoIterator<Item = u8>) -> Self {
        RecurRule {
            byminute: byminute.into_iter().collect(),
            ..self
        }
    }

    pub fn with_by_hour(self, byhour: impl IntoIterator<Item = u8>) -> Self {
        RecurRule {
            byhour: byhour.into_iter().collect(),
            ..self
        }
    }

    pub fn with_by_day(self, byday: impl IntoIterator<Item = ByDayEntry>) -> Self {
        RecurRule {
            byday: byday.into_iter().collect(),
            ..self
        }
    }

    pub fn with_by_month_day(self, bymonthday: impl IntoIterator<Item = i8>) -> Self {
        RecurRule {
            bymonthday: bymonthday.into_iter().collect(),
            ..self
        }
    }

    pub fn with_by_year_day(self, byyearday: impl IntoIterator<Item = i16>) -> Self {
        RecurRule {
            byyearday: byyearday.into_iter().collect(),
            ..self
        }
    }

    pub fn with_by_week_no(self, byweekno: impl IntoIterator<Item = i8>) -> Self {
        RecurRule {
            byweekno: byweekno.into_iter().collect(),
            ..self
        }
    }

    pub fn with_by_month(self, bymonth: impl IntoIterator<Item = u8>) -> Self {
        RecurRule {
            bymonth: bymonth.into_iter().collect(),
            ..self
        }
    }

    pub fn with_by_set_pos(self, bysetpos: impl IntoIterator<Item = i16>) -> Self {
        RecurRule {
            bysetpos: bysetpos.into_iter().collect(),
            ..self
        }
    }

    /// Which bound applies. A rule carrying both COUNT and UNTIL is resolved
    /// by `policy`.
    pub fn end(&self, policy: BoundPolicy) -> RecurEnd {
        match (self.count, self.until, policy) {
            (Some(count), Some(_), BoundPolicy::CountWins) | (Some(count), None, _) => {
                RecurEnd::Count(count)
            }
            (_, Some(until), _) => RecurEnd::Until(until),
            (None, None, _) => RecurEnd::Forever,
        }
    }

    /// True when any BYxxx part other than BYSETPOS is present.
    pub(crate) fn has_by_rules(&self) -> bool {
        !(self.bysecond.is_empty()
            && self.byminute.is_empty()
            && self.byhour.is_empty()
            && self.byday.is_empty()
            && self.bymonthday.is_empty()
            && self.byyearday.is_empty()
            && self.byweekno.is_empty()
            && self.bymonth.is_empty())
    }

    /// Checks value ranges and the frequency/BYxxx combinations RFC 5545 forbids.
    pub fn validate(&self) -> Result<()> {
        check_range("BYSECOND", &self.bysecond, |v| *v <= 60)?;
        check_range("BYMINUTE", &self.byminute, |v| *v <= 59)?;
        check_range("BYHOUR", &self.byhour, |v| *v <= 23)?;
        check_range("BYMONTH", &self.bymonth, |v| (1..=12).contains(v))?;
        check_range("BYMONTHDAY", &self.bymonthday, |v| {
            *v != 0 && (-31..=31).contains(v)
        })?;
        check_range("BYYEARDAY", &self.byyearday, |v| {
            *v != 0 && (-366..=366).contains(v)
        })?;
        check_range("BYWEEKNO", &self.byweekno, |v| *v != 0 && (-53..=53).contains(v))?;
        check_range("BYSETPOS", &self.bysetpos, |v| *v != 0 && (-366..=366).contains(v))?;
        check_range("BYDAY", &self.byday, |v| {
            v.ordinal.map_or(true, |o| o != 0 && (-53..=53).contains(&o))
        })?;

        if !self.byweekno.is_empty() && self.freq != Frequency::Yearly {
            return Err(Error::malformed_rule(format!(
                "BYWEEKNO is only valid with FREQ=YEARLY, not {}",
                self.freq
            )));
        }
        if !self.byyearday.is_empty()
            && matches!(
                self.freq,
                Frequency::Daily | Frequency::Weekly | Frequency::Monthly
            )
        {
            return Err(Error::malformed_rule(format!(
                "BYYEARDAY is not valid with FREQ={}",
                self.freq
            )));
        }
        if !self.bymonthday.is_empty() && self.freq == Frequency::Weekly {
            return Err(Error::malformed_rule("BYMONTHDAY is not valid with FREQ=WEEKLY"));
        }
        if self.byday.iter().any(|d| d.ordinal.is_some()) {
            if !matches!(self.freq, Frequency::Monthly | Frequency::Yearly) {
                return Err(Error::malformed_rule(format!(
                    "BYDAY ordinals are not valid with FREQ={}",
                    self.freq
                )));
            }
            if self.freq == Frequency::Yearly && !self.byweekno.is_empty() {
                return Err(Error::malformed_rule(
                    "BYDAY ordinals are not valid together with BYWEEKNO",
                ));
            }
        }
        Ok(())
    }
}

fn check_range<T: fmt::Display>(name: &str, values: &[T], valid: impl Fn(&T) -> bool) -> Result<()> {
    match values.iter().find(|v| !valid(v)) {
        Some(v) => Err(Error::malformed_rule(format!("{} value `{}` is out of range", name, v))),
        None => Ok(()),
    }
}

fn join<T: fmt::Display>(values: &[T]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<String>>()
        .join(",")
}

/// Canonical text: FREQ, UNTIL, COUNT, INTERVAL, BYSECOND, BYMINUTE, BYHOUR,
/// BYDAY, BYMONTHDAY, BYYEARDAY, BYWEEKNO, BYMONTH, BYSETPOS, WKST.
/// INTERVAL=1 and WKST=MO are the defaults and are left out.
impl fmt::Display for RecurRule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "FREQ={}", self.freq)?;
        if let Some(until) = &self.until {
            write!(f, ";UNTIL={}", until)?;
        }
        if let Some(count) = self.count {
            write!(f, ";COUNT={}", count)?;
        }
        if self.interval.get() != 1 {
            write!(f, ";INTERVAL={}", self.interval)?;
        }
        let lists = [
            ("BYSECOND", join(&self.bysecond)),
            ("BYMINUTE", join(&self.byminute)),
            ("BYHOUR", join(&self.byhour)),
            ("BYDAY", join(&self.byday)),
            ("BYMONTHDAY", join(&self.bymonthday)),
            ("BYYEARDAY", join(&self.byyearday)),
            ("BYWEEKNO", join(&self.byweekno)),
            ("BYMONTH", join(&self.bymonth)),
            ("BYSETPOS", join(&self.bysetpos)),
        ];
        for (name, values) in lists.iter().filter(|(_, values)| !values.is_empty()) {
            write!(f, ";{}={}", name, values)?;
        }
        if self.weekstart != Weekday::Mon {
            write!(f, ";WKST={}", self.weekstart)?;
        }
        Ok(())
    }
}

#[cfg(feature = "arbitrary")]
fn arbitrary_list<'a, T>(
    u: &mut Unstructured<'a>,
    mut element: impl FnMut(&mut Unstructured<'a>) -> arbitrary::Result<T>,
) -> arbitrary::Result<Vec<T>> {
    if !bool::arbitrary(u)? {
        return Ok(vec![]);
    }
    let len: usize = u.int_in_range(1..=4)?;
    (0..len).map(|_| element(u)).collect()
}

#[cfg(feature = "arbitrary")]
fn arbitrary_signed<'a>(u: &mut Unstructured<'a>, max: i16) -> arbitrary::Result<i16> {
    let value = u.int_in_range(1..=max)?;
    Ok(if bool::arbitrary(u)? { -value } else { value })
}

/// Only produces rules that pass [`RecurRule::validate`].
#[cfg(feature = "arbitrary")]
impl<'a> Arbitrary<'a> for RecurRule {
    fn arbitrary(u: &mut Unstructured<'a>) -> arbitrary::Result<Self> {
        let freq = Frequency::arbitrary(u)?;
        let mut rule = RecurRule::new(freq);
        rule.interval = NonZeroU32::arbitrary(u)?;
        rule.count = if bool::arbitrary(u)? {
            Some(u64::arbitrary(u)?)
        } else {
            None
        };
        rule.until = if bool::arbitrary(u)? {
            Some(DateValue::arbitrary(u)?)
        } else {
            None
        };
        rule.weekstart = Weekday::arbitrary(u)?;
        rule.bysecond = arbitrary_list(u, |u| u.int_in_range(0..=60))?;
        rule.byminute = arbitrary_list(u, |u| u.int_in_range(0..=59))?;
        rule.byhour = arbitrary_list(u, |u| u.int_in_range(0..=23))?;
        rule.bymonth = arbitrary_list(u, |u| u.int_in_range(1..=12))?;
        rule.bysetpos = arbitrary_list(u, |u| arbitrary_signed(u, 366))?;
        if freq == Frequency::Yearly {
            rule.byweekno = arbitrary_list(u, |u| Ok(arbitrary_signed(u, 53)? as i8))?;
        }
        if !matches!(
            freq,
            Frequency::Daily | Frequency::Weekly | Frequency::Monthly
        ) {
            rule.byyearday = arbitrary_list(u, |u| arbitrary_signed(u, 366))?;
        }
        if freq != Frequency::Weekly {
            rule.bymonthday = arbitrary_list(u, |u| Ok(arbitrary_signed(u, 31)? as i8))?;
        }
        let ordinals = matches!(freq, Frequency::Monthly | Frequency::Yearly)
            && rule.byweekno.is_empty();
        rule.byday = arbitrary_list(u, |u| {
            let ordinal = if ordinals && bool::arbitrary(u)? {
                Some(arbitrary_signed(u, 53)? as i8)
            } else {
                None
            };
            Ok(ByDayEntry {
                ordinal,
                weekday: Weekday::arbitrary(u)?,
            })
        })?;
        Ok(rule)
    }
}

enum RecurRulePart {
    Freq(Frequency),
    Until(DateValue),
    Count(u64),
    Interval(NonZeroU32),
    Bysecond(Vec<u8>),
    Byminute(Vec<u8>),
    Byhour(Vec<u8>),
    Byday(Vec<ByDayEntry>),
    Bymonthday(Vec<i8>),
    Byyearday(Vec<i16>),
    Byweekno(Vec<i8>),
    Bymonth(Vec<u8>),
    Bysetpos(Vec<i16>),
    Weekstart(Weekday),
}

impl RecurRulePart {
    fn name(&self) -> &'static str {
        match self {
            RecurRulePart::Freq(_) => "FREQ",
            RecurRulePart::Until(_) => "UNTIL",
            RecurRulePart::Count(_) => "COUNT",
            RecurRulePart::Interval(_) => "INTERVAL",
            RecurRulePart::Bysecond(_) => "BYSECOND",
            RecurRulePart::Byminute(_) => "BYMINUTE",
            RecurRulePart::Byhour(_) => "BYHOUR",
            RecurRulePart::Byday(_) => "BYDAY",
            RecurRulePart::Bymonthday(_) => "BYMONTHDAY",
            RecurRulePart::Byyearday(_) => "BYYEARDAY",
            RecurRulePart::Byweekno(_) => "BYWEEKNO",
            RecurRulePart::Bymonth(_) => "BYMONTH",
            RecurRulePart::Bysetpos(_) => "BYSETPOS",
            RecurRulePart::Weekstart(_) => "WKST",
        }
    }
}

fn list<'a, O>(
    element: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> impl FnMut(&'a str) -> IResult<&'a str, Vec<O>> {
    separated_list1(tag(","), element)
}

fn byday_entry(input: &str) -> IResult<&str, ByDayEntry> {
    map(pair(opt(signed_nonzero(53_i8)), weekday), |(ordinal, weekday)| {
        ByDayEntry { ordinal, weekday }
    })(input)
}

fn recur_rule_part(input: &str) -> IResult<&str, RecurRulePart> {
    alt((
        map(preceded(tag_no_case("FREQ="), freq), RecurRulePart::Freq),
        map(
            preceded(tag_no_case("UNTIL="), date_or_datetime),
            RecurRulePart::Until,
        ),
        map(
            preceded(tag_no_case("COUNT="), digits(0_u64..)),
            RecurRulePart::Count,
        ),
        map(
            preceded(tag_no_case("INTERVAL="), digits(NonZeroU32::MIN..)),
            RecurRulePart::Interval,
        ),
        map(
            preceded(tag_no_case("BYSECOND="), list(digits(0_u8..=60))),
            RecurRulePart::Bysecond,
        ),
        map(
            preceded(tag_no_case("BYMINUTE="), list(digits(0_u8..=59))),
            RecurRulePart::Byminute,
        ),
        map(
            preceded(tag_no_case("BYHOUR="), list(digits(0_u8..=23))),
            RecurRulePart::Byhour,
        ),
        map(
            preceded(tag_no_case("BYDAY="), list(byday_entry)),
            RecurRulePart::Byday,
        ),
        map(
            preceded(tag_no_case("BYMONTHDAY="), list(signed_nonzero(31_i8))),
            RecurRulePart::Bymonthday,
        ),
        map(
            preceded(tag_no_case("BYYEARDAY="), list(signed_nonzero(366_i16))),
            RecurRulePart::Byyearday,
        ),
        map(
            preceded(tag_no_case("BYWEEKNO="), list(signed_nonzero(53_i8))),
            RecurRulePart::Byweekno,
        ),
        map(
            preceded(tag_no_case("BYMONTH="), list(digits(1_u8..=12))),
            RecurRulePart::Bymonth,
        ),
        map(
            preceded(tag_no_case("BYSETPOS="), list(signed_nonzero(366_i16))),
            RecurRulePart::Bysetpos,
        ),
        map(
            preceded(tag_no_case("WKST="), weekday),
            RecurRulePart::Weekstart,
        ),
    ))(input)
}

fn recur_rule_parts(input: &str) -> IResult<&str, Vec<RecurRulePart>> {
    separated_list1(tag(";"), recur_rule_part)(input)
}

/// Names the rule part the parser stopped at.
fn describe_failure(text: &str, rest: &str) -> Error {
    let offending = rest.trim_start_matches([';', ',']);
    let offending = offending.split(';').next().unwrap_or(offending);
    if offending.is_empty() {
        Error::malformed_rule(format!("unexpected end of rule `{}`", text))
    } else {
        Error::malformed_rule(format!("invalid rule part `{}`", offending))
    }
}

/// Parses an RRULE/EXRULE value such as `FREQ=MONTHLY;BYDAY=-1FR`.
///
/// Rule part names are case-insensitive and may come in any order, but each
/// may appear only once and FREQ is required.
pub fn recur(text: &str) -> Result<RecurRule> {
    let parts = match all_consuming(recur_rule_parts)(text) {
        Ok((_, parts)) => parts,
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            return Err(describe_failure(text, e.input))
        }
        Err(nom::Err::Incomplete(_)) => return Err(describe_failure(text, "")),
    };

    let freq = parts
        .iter()
        .find_map(|part| match part {
            RecurRulePart::Freq(freq) => Some(*freq),
            _ => None,
        })
        .ok_or_else(|| Error::malformed_rule("FREQ is required"))?;

    let mut seen: Vec<&'static str> = Vec::with_capacity(parts.len());
    let mut rule = RecurRule::new(freq);
    for part in parts {
        let name = part.name();
        if seen.contains(&name) {
            return Err(Error::malformed_rule(format!("{} appears more than once", name)));
        }
        seen.push(name);
        match part {
            RecurRulePart::Freq(_) => {}
            RecurRulePart::Until(v) => rule.until = Some(v),
            RecurRulePart::Count(v) => rule.count = Some(v),
            RecurRulePart::Interval(v) => rule.interval = v,
            RecurRulePart::Bysecond(v) => rule.bysecond = v,
            RecurRulePart::Byminute(v) => rule.byminute = v,
            RecurRulePart::Byhour(v) => rule.byhour = v,
            RecurRulePart::Byday(v) => rule.byday = v,
            RecurRulePart::Bymonthday(v) => rule.bymonthday = v,
            RecurRulePart::Byyearday(v) => rule.byyearday = v,
            RecurRulePart::Byweekno(v) => rule.byweekno = v,
            RecurRulePart::Bymonth(v) => rule.bymonth = v,
            RecurRulePart::Bysetpos(v) => rule.bysetpos = v,
            RecurRulePart::Weekstart(v) => rule.weekstart = v,
        }
    }
    rule.validate()?;
    tracing::debug!(rule = %rule, "parsed recurrence rule");
    Ok(rule)
}

/// Which property a rule line came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleKind {
    Rrule,
    Exrule,
}

fn rule_property_head(input: &str) -> IResult<&str, RuleKind> {
    let (input, kind) = alt((
        map(tag_no_case("RRULE"), |_| RuleKind::Rrule),
        map(tag_no_case("EXRULE"), |_| RuleKind::Exrule),
    ))(input)?;
    // parameters carry nothing the expansion needs
    let (input, _params) = rrulparams(input)?;
    let (input, _) = tag(":")(input)?;
    Ok((input, kind))
}

/// Parses a whole content line, e.g. `RRULE;X-NAME=1:FREQ=DAILY;COUNT=2`.
///
/// A component may carry several such lines; [`crate::RecurrenceSet`] merges them.
pub fn rrule(line: &str) -> Result<(RuleKind, RecurRule)> {
    let (value, kind) = rule_property_head(line)
        .map_err(|_| Error::malformed_rule(format!("not an RRULE or EXRULE line: `{}`", line)))?;
    Ok((kind, recur(value)?))
}
