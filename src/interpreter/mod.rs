//! Turns a [`RecurRule`] anchored at a DTSTART into occurrences.
//!
//! [`RuleIter`] drives a [`candidate::CandidateGenerator`] and a
//! [`by_rule::ByRuleFilter`] period by period and buffers what each period
//! produces. [`set::RecurrenceSet`] merges several of them with RDATE and
//! subtracts EXDATE and EXRULE.

pub mod by_rule;
pub mod candidate;
pub mod config;
pub mod set;

use std::collections::VecDeque;

use chrono::{Datelike, NaiveDateTime};

use crate::{
    date_value::DateValue,
    error::{Error, Result},
    parser::{
        frequency::Frequency,
        recur_rule::{RecurEnd, RecurRule},
    },
};

use self::{
    by_rule::{ByRuleFilter, Expansion},
    candidate::CandidateGenerator,
    config::ExpansionConfig,
};

/// Dates and weekdays repeat every 400 Gregorian years, so a rule that stays
/// empty for that many INTERVALs of years never matches again.
const GREGORIAN_CYCLE_YEARS: i64 = 400;

/// Lazy, ascending occurrences of a single rule.
///
/// An RRULE iterator always yields DTSTART first, whether or not the BYxxx
/// parts match it; COUNT includes it. Unbounded rules never end on their own.
#[derive(Clone, Debug)]
pub struct RuleIter {
    rule: RecurRule,
    dtstart: DateValue,
    generator: CandidateGenerator,
    filter: ByRuleFilter,
    buffer: VecDeque<DateValue>,
    // inclusive bound as a UTC instant
    until: Option<NaiveDateTime>,
    remaining: Option<u64>,
    // candidates equal to DTSTART are kept only when DTSTART is not forced
    forced_start: bool,
    config: ExpansionConfig,
    finished: bool,
}

fn check_start(rule: &RecurRule, dtstart: &DateValue) -> Result<()> {
    if !dtstart.is_date_only() {
        return Ok(());
    }
    if rule.freq < Frequency::Daily {
        return Err(Error::incompatible_start(format!(
            "FREQ={} needs a DATE-TIME start, got {}",
            rule.freq, dtstart
        )));
    }
    if !(rule.byhour.is_empty() && rule.byminute.is_empty() && rule.bysecond.is_empty()) {
        return Err(Error::incompatible_start(format!(
            "BYHOUR, BYMINUTE and BYSECOND need a DATE-TIME start, got {}",
            dtstart
        )));
    }
    Ok(())
}

/// The UTC instant UNTIL stands for. A DATE bound on a DATE-TIME series lasts
/// until the end of that day and a floating bound is read in DTSTART's offset.
fn until_instant(until: DateValue, dtstart: &DateValue) -> NaiveDateTime {
    if dtstart.is_date_only() {
        return until.utc_instant();
    }
    let local = if until.is_date_only() {
        until
            .naive_date()
            .and_hms_opt(23, 59, 59)
            .unwrap_or_else(|| until.naive_local())
    } else if until.is_floating() {
        until.naive_local()
    } else {
        return until.utc_instant();
    };
    dtstart.with_local(local).utc_instant()
}

impl RuleIter {
    pub fn new(rule: RecurRule, dtstart: DateValue) -> Result<Self> {
        Self::with_config(rule, dtstart, ExpansionConfig::default())
    }

    pub fn with_config(rule: RecurRule, dtstart: DateValue, config: ExpansionConfig) -> Result<Self> {
        Self::build(rule, dtstart, config, true)
    }

    /// An EXRULE expansion: DTSTART only appears when the rule itself matches it.
    pub(crate) fn exclusion(rule: RecurRule, dtstart: DateValue, config: ExpansionConfig) -> Result<Self> {
        Self::build(rule, dtstart, config, false)
    }

    fn build(
        rule: RecurRule,
        dtstart: DateValue,
        config: ExpansionConfig,
        forced_start: bool,
    ) -> Result<Self> {
        rule.validate()?;
        check_start(&rule, &dtstart)?;

        let (remaining, until) = match rule.end(config.bound_policy) {
            RecurEnd::Count(count) => (Some(count), None),
            RecurEnd::Until(until) => (None, Some(until_instant(until, &dtstart))),
            RecurEnd::Forever => (None, None),
        };

        let anchor = dtstart.naive_local();
        let generator =
            CandidateGenerator::new(rule.freq, rule.interval.get(), rule.weekstart, anchor);
        let filter = ByRuleFilter::new(&rule, anchor, dtstart.is_date_only());

        let mut buffer = VecDeque::new();
        if forced_start {
            buffer.push_back(dtstart);
        }

        tracing::debug!(
            rule = %rule,
            dtstart = %dtstart,
            count = ?remaining,
            until = ?until,
            "expanding recurrence rule"
        );

        Ok(RuleIter {
            rule,
            dtstart,
            generator,
            filter,
            buffer,
            until,
            remaining,
            forced_start,
            config,
            finished: false,
        })
    }

    pub fn rule(&self) -> &RecurRule {
        &self.rule
    }

    pub fn dtstart(&self) -> DateValue {
        self.dtstart
    }

    /// True when COUNT or UNTIL ends the rule.
    pub fn is_bounded(&self) -> bool {
        self.rule.end(self.config.bound_policy) != RecurEnd::Forever
    }

    /// Hands the COUNT budget to the caller, who then decides what counts.
    pub(crate) fn take_count(&mut self) -> Option<u64> {
        self.remaining.take()
    }

    fn past_until(&self, local: NaiveDateTime) -> bool {
        self.until
            .is_some_and(|until| self.dtstart.with_local(local).utc_instant() > until)
    }

    /// Pulls base periods until one produces something. Returns false once
    /// the rule is exhausted.
    fn refill(&mut self) -> bool {
        let floor = self.dtstart.naive_local();
        let mut empty_periods: u32 = 0;
        let mut empty_since: Option<i32> = None;
        let horizon = GREGORIAN_CYCLE_YEARS * i64::from(self.rule.interval.get());
        while self.buffer.is_empty() {
            let Some(period) = self.generator.next() else {
                return false;
            };
            let Some(start) = period.start() else {
                return false;
            };
            if self.past_until(start) {
                return false;
            }

            match self.filter.expand(period) {
                Expansion::Instants(instants) => {
                    tracing::trace!(?period, candidates = instants.len(), "expanded period");
                    let forced_start = self.forced_start;
                    let dtstart = self.dtstart;
                    self.buffer.extend(
                        instants
                            .into_iter()
                            .filter(|t| *t > floor || (!forced_start && *t == floor))
                            .map(|t| dtstart.with_local(t)),
                    );
                }
                Expansion::DayRejected(t) => self.generator.skip_day_of(t),
                Expansion::HourRejected(t) => self.generator.skip_hour_of(t),
                Expansion::MinuteRejected(t) => self.generator.skip_minute_of(t),
            }

            if self.buffer.is_empty() {
                empty_periods += 1;
                let since = *empty_since.get_or_insert(start.year());
                if i64::from(start.year()) - i64::from(since) > horizon {
                    tracing::warn!(
                        rule = %self.rule,
                        periods = empty_periods,
                        years = horizon,
                        "no occurrence in a whole calendar cycle, ending expansion"
                    );
                    return false;
                }
                if empty_periods >= self.config.max_empty_periods {
                    tracing::warn!(
                        rule = %self.rule,
                        periods = empty_periods,
                        "no occurrence in consecutive periods, ending expansion"
                    );
                    return false;
                }
            }
        }
        true
    }
}

impl Iterator for RuleIter {
    type Item = DateValue;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.remaining == Some(0) {
            return None;
        }
        if self.buffer.is_empty() && !self.refill() {
            self.finished = true;
            return None;
        }
        let next = self.buffer.pop_front()?;
        if self.until.is_some_and(|until| next.utc_instant() > until) {
            self.buffer.clear();
            self.finished = true;
            return None;
        }
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        Some(next)
    }
}
