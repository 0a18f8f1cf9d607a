//! BYxxx expansion and limiting inside one base period, followed by BYSETPOS.
//!
//! Every date-level rule part is evaluated as a predicate over the days of the
//! period. Whether a part expands or limits then only depends on how many days
//! the period holds: a YEARLY period offers every day of the year, a DAILY one
//! a single day. Absent parts fall back to the DTSTART fields the way RFC 5545
//! §3.3.10 describes.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::{
    date_value::{days_in_month, days_in_year, week_of_year, weeks_in_year},
    parser::{
        frequency::Frequency,
        recur_rule::{ByDayEntry, RecurRule},
    },
    weekday::Weekday,
};

use super::candidate::Period;

/// What one base period produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expansion {
    /// Ascending wall-clock candidates, possibly none.
    Instants(Vec<NaiveDateTime>),
    /// A sub-daily period whose date fails a filter. Nothing else on that day can match.
    DayRejected(NaiveDateTime),
    /// A sub-daily period whose hour fails BYHOUR.
    HourRejected(NaiveDateTime),
    /// A sub-daily period whose minute fails BYMINUTE.
    MinuteRejected(NaiveDateTime),
}

#[derive(Clone, Debug)]
pub struct ByRuleFilter {
    freq: Frequency,
    wkst: Weekday,
    date_only: bool,
    months: Vec<u32>,
    weeks: Vec<i32>,
    year_days: Vec<i32>,
    month_days: Vec<i32>,
    week_days: Vec<ByDayEntry>,
    hours: Vec<u32>,
    minutes: Vec<u32>,
    seconds: Vec<u32>,
    set_pos: Vec<i32>,
}

fn sorted<T: Ord>(mut values: Vec<T>) -> Vec<T> {
    values.sort_unstable();
    values.dedup();
    values
}

fn widen<T: Copy, U: From<T>>(values: &[T]) -> Vec<U> {
    values.iter().map(|&v| U::from(v)).collect()
}

/// Counts `value` against a signed list where -1 stands for `len`.
fn signed_match(list: &[i32], value: i32, len: i32) -> bool {
    list.iter().any(|&n| n == value || n == value - len - 1)
}

/// Frequencies coarser than the field expand it, falling back to DTSTART's value.
fn time_part(by: &[u8], expands: bool, fallback: u32) -> Vec<u32> {
    let mut values: Vec<u32> = widen(by);
    if values.is_empty() && expands {
        values.push(fallback);
    }
    sorted(values)
}

fn limit(list: &[u32], value: u32) -> bool {
    list.is_empty() || list.contains(&value)
}

fn days_from(first: Option<NaiveDate>, count: u32) -> Vec<NaiveDate> {
    first
        .map(|first| first.iter_days().take(count as usize).collect())
        .unwrap_or_default()
}

impl ByRuleFilter {
    pub fn new(rule: &RecurRule, dtstart: NaiveDateTime, date_only: bool) -> Self {
        let freq = rule.freq;
        let mut months: Vec<u32> = widen(&rule.bymonth);
        let mut month_days: Vec<i32> = widen(&rule.bymonthday);
        let mut week_days = rule.byday.clone();

        if rule.byweekno.is_empty()
            && rule.byyearday.is_empty()
            && rule.bymonthday.is_empty()
            && rule.byday.is_empty()
        {
            match freq {
                Frequency::Yearly => {
                    if months.is_empty() {
                        months.push(dtstart.month());
                    }
                    month_days.push(dtstart.day() as i32);
                }
                Frequency::Monthly => month_days.push(dtstart.day() as i32),
                Frequency::Weekly => {
                    week_days.push(ByDayEntry::every(dtstart.weekday().into()));
                }
                _ => {}
            }
        }

        let set_pos = if rule.has_by_rules() {
            widen(&rule.bysetpos)
        } else {
            vec![]
        };

        ByRuleFilter {
            freq,
            wkst: rule.weekstart,
            date_only,
            months: sorted(months),
            weeks: widen(&rule.byweekno),
            year_days: widen(&rule.byyearday),
            month_days,
            week_days,
            hours: time_part(&rule.byhour, freq > Frequency::Hourly, dtstart.hour()),
            minutes: time_part(&rule.byminute, freq > Frequency::Minutely, dtstart.minute()),
            seconds: time_part(&rule.bysecond, freq > Frequency::Secondly, dtstart.second()),
            set_pos,
        }
    }

    pub fn expand(&self, period: Period) -> Expansion {
        if let Some(t) = period.instant() {
            return self.expand_instant(t);
        }
        let days = match period {
            Period::Year(year) if self.months.is_empty() => {
                days_from(NaiveDate::from_ymd_opt(year, 1, 1), days_in_year(year))
            }
            Period::Year(year) => self
                .months
                .iter()
                .flat_map(|&month| {
                    days_from(
                        NaiveDate::from_ymd_opt(year, month, 1),
                        days_in_month(year, month),
                    )
                })
                .collect(),
            Period::Month { year, month } => days_from(
                NaiveDate::from_ymd_opt(year, month, 1),
                days_in_month(year, month),
            ),
            Period::Week(start) => days_from(Some(start), 7),
            Period::Day(date) => vec![date],
            Period::Hour(_) | Period::Minute(_) | Period::Second(_) => vec![],
        };

        let times = if self.date_only {
            vec![NaiveTime::MIN]
        } else {
            times_of_day(&self.hours, &self.minutes, &self.seconds)
        };
        let instants = days
            .into_iter()
            .filter(|date| self.matches_day(*date))
            .flat_map(|date| times.iter().map(move |time| date.and_time(*time)))
            .collect();
        Expansion::Instants(self.select_positions(instants))
    }

    fn expand_instant(&self, t: NaiveDateTime) -> Expansion {
        if !self.matches_day(t.date()) {
            return Expansion::DayRejected(t);
        }
        if self.freq <= Frequency::Hourly && !limit(&self.hours, t.hour()) {
            return Expansion::HourRejected(t);
        }
        if self.freq <= Frequency::Minutely && !limit(&self.minutes, t.minute()) {
            return Expansion::MinuteRejected(t);
        }
        if self.freq == Frequency::Secondly && !limit(&self.seconds, t.second()) {
            return Expansion::Instants(vec![]);
        }

        let hour = [t.hour()];
        let minute = [t.minute()];
        let second = [t.second()];
        let minutes: &[u32] = if self.freq <= Frequency::Minutely {
            &minute
        } else {
            &self.minutes
        };
        let seconds: &[u32] = if self.freq == Frequency::Secondly {
            &second
        } else {
            &self.seconds
        };
        let date = t.date();
        let instants = times_of_day(&hour, minutes, seconds)
            .into_iter()
            .map(|time| date.and_time(time))
            .collect();
        Expansion::Instants(self.select_positions(instants))
    }

    //    |          |SECONDLY|MINUTELY|HOURLY |DAILY  |WEEKLY|MONTHLY|YEARLY|
    //    |BYMONTH   |Limit   |Limit   |Limit  |Limit  |Limit |Limit  |Expand|
    //    |BYWEEKNO  |N/A     |N/A     |N/A    |N/A    |N/A   |N/A    |Expand|
    //    |BYYEARDAY |Limit   |Limit   |Limit  |N/A    |N/A   |N/A    |Expand|
    //    |BYMONTHDAY|Limit   |Limit   |Limit  |Limit  |N/A   |Expand |Expand|
    //    |BYDAY     |Limit   |Limit   |Limit  |Limit  |Expand|Note 1 |Note 2|
    fn matches_day(&self, date: NaiveDate) -> bool {
        limit(&self.months, date.month())
            && (self.weeks.is_empty() || self.matches_week(date))
            && (self.year_days.is_empty()
                || signed_match(
                    &self.year_days,
                    date.ordinal() as i32,
                    days_in_year(date.year()) as i32,
                ))
            && (self.month_days.is_empty()
                || signed_match(
                    &self.month_days,
                    date.day() as i32,
                    days_in_month(date.year(), date.month()) as i32,
                ))
            && (self.week_days.is_empty()
                || self
                    .week_days
                    .iter()
                    .any(|entry| self.matches_weekday(entry, date)))
    }

    fn matches_week(&self, date: NaiveDate) -> bool {
        let (week_year, week) = week_of_year(date, self.wkst);
        let weeks = weeks_in_year(week_year, self.wkst) as i32;
        signed_match(&self.weeks, week as i32, weeks)
    }

    fn matches_weekday(&self, entry: &ByDayEntry, date: NaiveDate) -> bool {
        if Weekday::from(date.weekday()) != entry.weekday {
            return false;
        }
        let Some(ordinal) = entry.ordinal else {
            return true;
        };
        // the nth weekday counts within the month for MONTHLY rules and for
        // YEARLY rules narrowed by BYMONTH, within the year otherwise
        let (first, len) = if self.freq == Frequency::Monthly
            || (self.freq == Frequency::Yearly && !self.months.is_empty())
        {
            (date.with_day(1), days_in_month(date.year(), date.month()))
        } else {
            (date.with_ordinal(1), days_in_year(date.year()))
        };
        let Some(first) = first else {
            return false;
        };
        let index = (date - first).num_days() as i32;
        let ordinal = i32::from(ordinal);
        if ordinal > 0 {
            index / 7 + 1 == ordinal
        } else {
            -((len as i32 - 1 - index) / 7 + 1) == ordinal
        }
    }

    /// BYSETPOS picks from the whole period's sorted candidates, 1-based from
    /// the start or negative from the end.
    fn select_positions(&self, instants: Vec<NaiveDateTime>) -> Vec<NaiveDateTime> {
        if self.set_pos.is_empty() {
            return instants;
        }
        let len = instants.len() as i32;
        let picked = self
            .set_pos
            .iter()
            .filter_map(|&pos| {
                let index = if pos > 0 { pos - 1 } else { len + pos };
                usize::try_from(index)
                    .ok()
                    .and_then(|index| instants.get(index).copied())
            })
            .collect();
        sorted(picked)
    }
}

/// Every valid combination, ascending. Second 60 has no `NaiveTime` and drops out.
fn times_of_day(hours: &[u32], minutes: &[u32], seconds: &[u32]) -> Vec<NaiveTime> {
    hours
        .iter()
        .flat_map(|&h| {
            minutes.iter().flat_map(move |&m| {
                seconds
                    .iter()
                    .filter_map(move |&s| NaiveTime::from_hms_opt(h, m, s))
            })
        })
        .collect()
}
