//! Base periods at the rule's FREQ granularity.
//!
//! MONTHLY and YEARLY rules hand whole months and years downstream, WEEKLY
//! hands a seven-day block starting on WKST, DAILY a single date. The finer
//! frequencies step the DTSTART wall clock itself.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};

use crate::{parser::frequency::Frequency, weekday::Weekday};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Period {
    Year(i32),
    Month { year: i32, month: u32 },
    /// Seven days starting at the given WKST-aligned date.
    Week(NaiveDate),
    Day(NaiveDate),
    Hour(NaiveDateTime),
    Minute(NaiveDateTime),
    Second(NaiveDateTime),
}

impl Period {
    /// Wall clock of a sub-daily period.
    pub fn instant(&self) -> Option<NaiveDateTime> {
        match self {
            Period::Hour(t) | Period::Minute(t) | Period::Second(t) => Some(*t),
            _ => None,
        }
    }

    /// Earliest wall clock anything in the period can land on.
    pub fn start(&self) -> Option<NaiveDateTime> {
        let date = match *self {
            Period::Year(year) => NaiveDate::from_ymd_opt(year, 1, 1)?,
            Period::Month { year, month } => NaiveDate::from_ymd_opt(year, month, 1)?,
            Period::Week(date) | Period::Day(date) => date,
            Period::Hour(t) => return t.with_minute(0)?.with_second(0),
            Period::Minute(t) => return t.with_second(0),
            Period::Second(t) => return Some(t),
        };
        date.and_hms_opt(0, 0, 0)
    }
}

/// Lazy walk over base periods. Two generators built from the same anchor
/// yield the same sequence.
#[derive(Clone, Debug)]
pub struct CandidateGenerator {
    freq: Frequency,
    interval: u32,
    next: Option<Period>,
}

impl CandidateGenerator {
    pub fn new(freq: Frequency, interval: u32, wkst: Weekday, anchor: NaiveDateTime) -> Self {
        let date = anchor.date();
        let first = match freq {
            Frequency::Yearly => Some(Period::Year(date.year())),
            Frequency::Monthly => Some(Period::Month {
                year: date.year(),
                month: date.month(),
            }),
            Frequency::Weekly => {
                let back = wkst.days_until(date.weekday().into());
                date.checked_sub_signed(Duration::days(i64::from(back)))
                    .map(Period::Week)
            }
            Frequency::Daily => Some(Period::Day(date)),
            Frequency::Hourly => Some(Period::Hour(anchor)),
            Frequency::Minutely => Some(Period::Minute(anchor)),
            Frequency::Secondly => Some(Period::Second(anchor)),
        };
        CandidateGenerator {
            freq,
            interval: interval.max(1),
            next: first,
        }
    }

    fn step_seconds(&self) -> i64 {
        let unit = match self.freq {
            Frequency::Hourly => 3_600,
            Frequency::Minutely => 60,
            _ => 1,
        };
        unit * i64::from(self.interval)
    }

    fn advance(&self, period: Period) -> Option<Period> {
        let interval = i64::from(self.interval);
        match period {
            Period::Year(year) => {
                let year = i32::try_from(i64::from(year) + interval).ok()?;
                NaiveDate::from_ymd_opt(year, 1, 1)?;
                Some(Period::Year(year))
            }
            Period::Month { year, month } => {
                let index = i64::from(year) * 12 + i64::from(month - 1) + interval;
                let year = i32::try_from(index.div_euclid(12)).ok()?;
                let month = index.rem_euclid(12) as u32 + 1;
                NaiveDate::from_ymd_opt(year, month, 1)?;
                Some(Period::Month { year, month })
            }
            Period::Week(start) => start
                .checked_add_signed(Duration::try_weeks(interval)?)
                .map(Period::Week),
            Period::Day(date) => date
                .checked_add_signed(Duration::try_days(interval)?)
                .map(Period::Day),
            Period::Hour(t) => self.shift(t, 1).map(Period::Hour),
            Period::Minute(t) => self.shift(t, 1).map(Period::Minute),
            Period::Second(t) => self.shift(t, 1).map(Period::Second),
        }
    }

    fn shift(&self, t: NaiveDateTime, steps: i64) -> Option<NaiveDateTime> {
        let seconds = self.step_seconds().checked_mul(steps)?;
        t.checked_add_signed(Duration::try_seconds(seconds)?)
    }

    fn rewrap(&self, t: NaiveDateTime) -> Period {
        match self.freq {
            Frequency::Hourly => Period::Hour(t),
            Frequency::Minutely => Period::Minute(t),
            _ => Period::Second(t),
        }
    }

    /// For sub-daily frequencies: moves the pending period forward, in whole
    /// INTERVAL steps, to the first one at or after `boundary`.
    pub fn skip_to(&mut self, boundary: NaiveDateTime) {
        let Some(current) = self.next.and_then(|p| p.instant()) else {
            return;
        };
        if current >= boundary {
            return;
        }
        let gap = (boundary - current).num_seconds();
        let step = self.step_seconds();
        let steps = (gap + step - 1) / step;
        self.next = self.shift(current, steps).map(|t| self.rewrap(t));
    }

    fn skip_past(&mut self, boundary: Option<NaiveDateTime>) {
        match boundary {
            Some(boundary) => self.skip_to(boundary),
            None => self.next = None,
        }
    }

    /// Skips whatever is left of the day holding `t`.
    pub fn skip_day_of(&mut self, t: NaiveDateTime) {
        self.skip_past(t.date().succ_opt().and_then(|d| d.and_hms_opt(0, 0, 0)));
    }

    /// Skips whatever is left of the hour holding `t`.
    pub fn skip_hour_of(&mut self, t: NaiveDateTime) {
        self.skip_past(
            t.with_minute(0)
                .and_then(|t| t.with_second(0))
                .and_then(|t| t.checked_add_signed(Duration::hours(1))),
        );
    }

    /// Skips whatever is left of the minute holding `t`.
    pub fn skip_minute_of(&mut self, t: NaiveDateTime) {
        self.skip_past(
            t.with_second(0)
                .and_then(|t| t.checked_add_signed(Duration::minutes(1))),
        );
    }

    pub fn peek(&self) -> Option<Period> {
        self.next
    }
}

impl Iterator for CandidateGenerator {
    type Item = Period;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.advance(current);
        Some(current)
    }
}
