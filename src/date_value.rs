//! Calendar values as they appear in DTSTART, UNTIL, RDATE and EXDATE.
//!
//! A [`DateValue`] is either a plain DATE or a DATE-TIME. A DATE-TIME is
//! floating (no offset) or pinned to a fixed UTC offset; resolving an IANA
//! zone into that offset is left to the caller.

use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    str::FromStr,
};

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::{
    error::{DateFields, Error, Result},
    parser::chrono_utils,
    weekday::Weekday,
};

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Clone, Copy, Debug)]
pub struct DateValue {
    date: NaiveDate,
    // None for DATE values
    time: Option<NaiveTime>,
    // seconds east of UTC, None for floating time and for DATE values
    offset: Option<i32>,
}

impl DateValue {
    /// A DATE value. Fails with [`Error::MalformedDate`] for e.g. February 30.
    pub fn date(year: i32, month: u32, day: u32) -> Result<Self> {
        let date = NaiveDate::from_ymd_opt(year, month, day).ok_or(Error::MalformedDate(
            DateFields {
                year,
                month,
                day,
                time: None,
            },
        ))?;
        Ok(Self::from_naive_date(date))
    }

    /// A floating DATE-TIME value.
    pub fn date_time(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
    ) -> Result<Self> {
        let malformed = || {
            Error::MalformedDate(DateFields {
                year,
                month,
                day,
                time: Some((hour, minute, second)),
            })
        };
        let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(malformed)?;
        let time = NaiveTime::from_hms_opt(hour, minute, second).ok_or_else(malformed)?;
        Ok(Self::from_naive_date_time(date.and_time(time), None))
    }

    /// A DATE-TIME value in UTC.
    pub fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Result<Self> {
        Self::date_time(year, month, day, hour, minute, second)?.with_utc_offset(0)
    }

    /// Pins a DATE-TIME to a fixed UTC offset. DATE values carry no offset and
    /// are returned unchanged.
    pub fn with_utc_offset(self, seconds: i32) -> Result<Self> {
        if seconds.unsigned_abs() >= SECONDS_PER_DAY as u32 {
            return Err(Error::InvalidUtcOffset(seconds));
        }
        if self.time.is_none() {
            return Ok(self);
        }
        Ok(Self {
            offset: Some(seconds),
            ..self
        })
    }

    /// Drops the offset, keeping the wall-clock fields.
    pub fn to_floating(self) -> Self {
        Self {
            offset: None,
            ..self
        }
    }

    pub(crate) fn from_naive_date(date: NaiveDate) -> Self {
        Self {
            date,
            time: None,
            offset: None,
        }
    }

    pub(crate) fn from_naive_date_time(date_time: NaiveDateTime, offset: Option<i32>) -> Self {
        Self {
            date: date_time.date(),
            time: Some(date_time.time()),
            offset,
        }
    }

    /// Same precision and offset as `self`, with new wall-clock fields.
    pub(crate) fn with_local(self, date_time: NaiveDateTime) -> Self {
        match self.time {
            Some(_) => Self::from_naive_date_time(date_time, self.offset),
            None => Self::from_naive_date(date_time.date()),
        }
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }

    pub fn month(&self) -> u32 {
        self.date.month()
    }

    pub fn day(&self) -> u32 {
        self.date.day()
    }

    pub fn hour(&self) -> u32 {
        self.time.map_or(0, |t| t.hour())
    }

    pub fn minute(&self) -> u32 {
        self.time.map_or(0, |t| t.minute())
    }

    pub fn second(&self) -> u32 {
        self.time.map_or(0, |t| t.second())
    }

    pub fn is_date_only(&self) -> bool {
        self.time.is_none()
    }

    pub fn is_floating(&self) -> bool {
        self.time.is_some() && self.offset.is_none()
    }

    pub fn utc_offset_seconds(&self) -> Option<i32> {
        self.offset
    }

    pub fn naive_date(&self) -> NaiveDate {
        self.date
    }

    /// Wall-clock value; DATE values sit at midnight.
    pub fn naive_local(&self) -> NaiveDateTime {
        self.date.and_time(self.time.unwrap_or(NaiveTime::MIN))
    }

    /// The instant in UTC. Floating values are read as if they were UTC.
    pub fn utc_instant(&self) -> NaiveDateTime {
        let local = self.naive_local();
        match self.offset {
            Some(offset) => local
                .checked_sub_signed(Duration::seconds(i64::from(offset)))
                .unwrap_or(local),
            None => local,
        }
    }

    /// Adds a signed duration. DATE values only move by whole days, the
    /// sub-day remainder is floored away. `None` when leaving chrono's range.
    pub fn add_duration(&self, days: i64, hours: i64, minutes: i64, seconds: i64) -> Option<Self> {
        let total = days
            .checked_mul(SECONDS_PER_DAY)?
            .checked_add(hours.checked_mul(3_600)?)?
            .checked_add(minutes.checked_mul(60)?)?
            .checked_add(seconds)?;
        match self.time {
            Some(_) => {
                let moved = self
                    .naive_local()
                    .checked_add_signed(Duration::try_seconds(total)?)?;
                Some(self.with_local(moved))
            }
            None => {
                let moved = self
                    .date
                    .checked_add_signed(Duration::try_days(total.div_euclid(SECONDS_PER_DAY))?)?;
                Some(Self::from_naive_date(moved))
            }
        }
    }

    /// Moves by whole months, clamping the day to the target month's length:
    /// January 31 plus one month is the last day of February.
    pub fn add_months(&self, months: i32) -> Option<Self> {
        let index = i64::from(self.year()) * 12 + i64::from(self.month0()) + i64::from(months);
        let year = i32::try_from(index.div_euclid(12)).ok()?;
        let month = index.rem_euclid(12) as u32 + 1;
        let day = self.day().min(days_in_month(year, month));
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        Some(Self { date, ..*self })
    }

    /// Moves by whole years with the same clamping as [`DateValue::add_months`],
    /// so February 29 lands on February 28 in common years.
    pub fn add_years(&self, years: i32) -> Option<Self> {
        self.add_months(years.checked_mul(12)?)
    }

    pub fn weekday(&self) -> Weekday {
        self.date.weekday().into()
    }

    /// Week number where weeks start on `wkst` and week 1 is the first week
    /// holding at least four days of the year.
    pub fn iso_week_number(&self, wkst: Weekday) -> u32 {
        week_of_year(self.date, wkst).1
    }

    /// Like [`DateValue::iso_week_number`] but also returns the year the week
    /// belongs to, which differs from the calendar year around New Year.
    pub fn week_of_year(&self, wkst: Weekday) -> (i32, u32) {
        week_of_year(self.date, wkst)
    }

    pub fn days_in_month(&self) -> u32 {
        days_in_month(self.year(), self.month())
    }

    pub fn is_leap_year(&self) -> bool {
        is_leap_year(self.year())
    }

    /// 1-based ordinal day.
    pub fn day_of_year(&self) -> u32 {
        self.date.ordinal()
    }

    /// Ordinal counted from the end of the year: the last day is -1.
    pub fn day_of_year_from_end(&self) -> i32 {
        self.date.ordinal() as i32 - days_in_year(self.year()) as i32 - 1
    }

    fn month0(&self) -> u32 {
        self.date.month0()
    }

    fn sort_key(&self) -> (NaiveDateTime, bool) {
        (self.utc_instant(), self.time.is_none())
    }
}

impl PartialEq for DateValue {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl Eq for DateValue {}

impl PartialOrd for DateValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DateValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl Hash for DateValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sort_key().hash(state);
    }
}

impl fmt::Display for DateValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (self.time, self.offset) {
            (None, _) => write!(f, "{}", self.date.format("%Y%m%d")),
            (Some(_), None) => write!(f, "{}", self.naive_local().format("%Y%m%dT%H%M%S")),
            (Some(_), Some(_)) => write!(f, "{}", self.utc_instant().format("%Y%m%dT%H%M%SZ")),
        }
    }
}

impl FromStr for DateValue {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match chrono_utils::date_or_datetime(s) {
            Ok(("", value)) => Ok(value),
            _ => Err(Error::MalformedDateText(s.to_string())),
        }
    }
}

#[cfg(feature = "arbitrary")]
impl<'a> arbitrary::Arbitrary<'a> for DateValue {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        // iCalendar years are four digits
        let year = u.int_in_range(1..=9999)?;
        let ordinal = u.int_in_range(1..=days_in_year(year))?;
        let date =
            NaiveDate::from_yo_opt(year, ordinal).ok_or(arbitrary::Error::IncorrectFormat)?;
        match u.int_in_range(0..=2)? {
            0 => Ok(Self::from_naive_date(date)),
            kind => {
                let secs = u.int_in_range(0..=(SECONDS_PER_DAY as u32 - 1))?;
                let time = NaiveTime::from_num_seconds_from_midnight_opt(secs, 0)
                    .ok_or(arbitrary::Error::IncorrectFormat)?;
                let offset = (kind == 2).then_some(0);
                Ok(Self::from_naive_date_time(date.and_time(time), offset))
            }
        }
    }
}

/// Formats values for an RDATE or EXDATE property value.
pub fn format_date_list(values: &[DateValue]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<String>>()
        .join(",")
}

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_year(year: i32) -> u32 {
    if is_leap_year(year) {
        366
    } else {
        365
    }
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

/// Day number of January 1st of `year`, on the same scale as
/// [`NaiveDate::num_days_from_ce`]. Works outside chrono's range too.
pub(crate) fn jan1_ce_day(year: i32) -> i64 {
    let p = i64::from(year) - 1;
    365 * p + p.div_euclid(4) - p.div_euclid(100) + p.div_euclid(400) + 1
}

pub(crate) fn ce_day(date: NaiveDate) -> i64 {
    i64::from(date.num_days_from_ce())
}

pub(crate) fn weekday_of_ce_day(day: i64) -> Weekday {
    // 0001-01-01 was a Monday
    Weekday::ALL[(day - 1).rem_euclid(7) as usize]
}

/// First day of week 1 of `year` for weeks starting on `wkst`.
pub(crate) fn week_one_start(year: i32, wkst: Weekday) -> i64 {
    let jan1 = jan1_ce_day(year);
    let into_week = i64::from(wkst.days_until(weekday_of_ce_day(jan1)));
    if 7 - into_week >= 4 {
        jan1 - into_week
    } else {
        jan1 + 7 - into_week
    }
}

pub(crate) fn weeks_in_year(year: i32, wkst: Weekday) -> u32 {
    ((week_one_start(year + 1, wkst) - week_one_start(year, wkst)) / 7) as u32
}

pub(crate) fn week_of_year(date: NaiveDate, wkst: Weekday) -> (i32, u32) {
    let day = ce_day(date);
    let year = date.year();
    let (week_year, start) = if day < week_one_start(year, wkst) {
        (year - 1, week_one_start(year - 1, wkst))
    } else if day >= week_one_start(year + 1, wkst) {
        (year + 1, week_one_start(year + 1, wkst))
    } else {
        (year, week_one_start(year, wkst))
    };
    (week_year, ((day - start) / 7 + 1) as u32)
}
