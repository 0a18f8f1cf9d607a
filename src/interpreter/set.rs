//! DTSTART + RRULE + RDATE - EXDATE - EXRULE.

use std::{
    cmp::Reverse,
    collections::{BTreeSet, BinaryHeap},
    iter::Peekable,
};

use crate::{
    date_value::DateValue,
    error::{Error, Result},
    parser::recur_rule::{RecurEnd, RecurRule},
};

use super::{config::ExpansionConfig, RuleIter};

/// Caller-imposed bound on an expansion, on top of COUNT and UNTIL.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cap {
    pub max_count: Option<usize>,
    /// Inclusive.
    pub max_instant: Option<DateValue>,
}

impl Cap {
    pub fn none() -> Self {
        Cap::default()
    }

    pub fn count(max_count: usize) -> Self {
        Cap {
            max_count: Some(max_count),
            max_instant: None,
        }
    }

    pub fn until(max_instant: DateValue) -> Self {
        Cap {
            max_count: None,
            max_instant: Some(max_instant),
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.max_count.is_some() || self.max_instant.is_some()
    }
}

/// Everything that makes up one recurrence set, anchored at a single DTSTART.
///
/// Built by value:
///
/// ```
/// use ical_recur::{parse_rule, DateValue, RecurrenceSet};
///
/// let dtstart = DateValue::date_time(1997, 9, 2, 9, 0, 0).unwrap();
/// let set = RecurrenceSet::new(dtstart)
///     .rrule(parse_rule("FREQ=DAILY;COUNT=3").unwrap())
///     .exdate(DateValue::date_time(1997, 9, 3, 9, 0, 0).unwrap());
/// let occurrences = set.materialize(Default::default()).unwrap();
/// assert_eq!(occurrences.len(), 3);
/// assert_eq!(occurrences[2], DateValue::date_time(1997, 9, 5, 9, 0, 0).unwrap());
/// ```
#[derive(Clone, Debug)]
pub struct RecurrenceSet {
    dtstart: DateValue,
    rrules: Vec<RecurRule>,
    rdates: Vec<DateValue>,
    exdates: Vec<DateValue>,
    exrules: Vec<RecurRule>,
    config: ExpansionConfig,
}

impl RecurrenceSet {
    pub fn new(dtstart: DateValue) -> Self {
        RecurrenceSet {
            dtstart,
            rrules: vec![],
            rdates: vec![],
            exdates: vec![],
            exrules: vec![],
            config: ExpansionConfig::default(),
        }
    }

    pub fn rrule(mut self, rule: RecurRule) -> Self {
        self.rrules.push(rule);
        self
    }

    pub fn exrule(mut self, rule: RecurRule) -> Self {
        self.exrules.push(rule);
        self
    }

    pub fn rdate(mut self, value: DateValue) -> Self {
        self.rdates.push(value);
        self
    }

    pub fn rdates(mut self, values: impl IntoIterator<Item = DateValue>) -> Self {
        self.rdates.extend(values);
        self
    }

    pub fn exdate(mut self, value: DateValue) -> Self {
        self.exdates.push(value);
        self
    }

    pub fn exdates(mut self, values: impl IntoIterator<Item = DateValue>) -> Self {
        self.exdates.extend(values);
        self
    }

    pub fn with_config(self, config: ExpansionConfig) -> Self {
        RecurrenceSet { config, ..self }
    }

    pub fn dtstart(&self) -> DateValue {
        self.dtstart
    }

    /// False as soon as one RRULE has neither COUNT nor UNTIL.
    pub fn is_bounded(&self) -> bool {
        self.rrules
            .iter()
            .all(|rule| rule.end(self.config.bound_policy) != RecurEnd::Forever)
    }

    fn check_precision(&self) -> Result<()> {
        let date_only = self.dtstart.is_date_only();
        let mismatch = self
            .rdates
            .iter()
            .map(|value| ("RDATE", value))
            .chain(self.exdates.iter().map(|value| ("EXDATE", value)))
            .find(|(_, value)| value.is_date_only() != date_only);
        match mismatch {
            Some((property, value)) => Err(Error::incompatible_start(format!(
                "{} {} does not have the precision of {}",
                property, value, self.dtstart
            ))),
            None => Ok(()),
        }
    }

    /// Lazy and uncapped; an unbounded set never ends.
    pub fn occurrences(&self) -> Result<Occurrences> {
        self.expand(Cap::none())
    }

    /// Lazy, ending at whichever comes first of the set's own bounds and `cap`.
    pub fn expand(&self, cap: Cap) -> Result<Occurrences> {
        self.check_precision()?;

        let mut streams = Vec::with_capacity(self.rrules.len() + 1);
        let mut budgets = Vec::with_capacity(self.rrules.len() + 1);
        for rule in &self.rrules {
            let mut iter = RuleIter::with_config(rule.clone(), self.dtstart, self.config)?;
            budgets.push(iter.take_count());
            streams.push(Stream::Rule(iter));
        }

        let mut rdates = self.rdates.clone();
        if self.rrules.is_empty() {
            rdates.push(self.dtstart);
        }
        rdates.sort_unstable();
        rdates.dedup();
        streams.push(Stream::Dates(rdates.into_iter()));
        budgets.push(None);

        let exrules = self
            .exrules
            .iter()
            .map(|rule| {
                RuleIter::exclusion(rule.clone(), self.dtstart, self.config).map(Iterator::peekable)
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            dtstart = %self.dtstart,
            rrules = self.rrules.len(),
            rdates = self.rdates.len(),
            exdates = self.exdates.len(),
            exrules = self.exrules.len(),
            ?cap,
            "expanding recurrence set"
        );

        let mut occurrences = Occurrences {
            streams,
            budgets,
            heap: BinaryHeap::new(),
            exdates: self.exdates.iter().copied().collect(),
            exrules,
            cap,
            emitted: 0,
            config: self.config,
            finished: false,
        };
        for index in 0..occurrences.streams.len() {
            occurrences.advance(index);
        }
        Ok(occurrences)
    }

    /// Collects every occurrence. Fails with [`Error::UnboundedExpansion`]
    /// unless the set or `cap` guarantees an end.
    pub fn materialize(&self, cap: Cap) -> Result<Vec<DateValue>> {
        if !cap.is_bounded() && !self.is_bounded() {
            return Err(Error::UnboundedExpansion);
        }
        Ok(self.expand(cap)?.collect())
    }

    /// Occurrences strictly later than `instant`.
    pub fn after(&self, instant: DateValue) -> Result<impl Iterator<Item = DateValue>> {
        Ok(self.occurrences()?.skip_while(move |at| *at <= instant))
    }

    /// Occurrences within `start..=end`.
    pub fn between(&self, start: DateValue, end: DateValue) -> Result<Vec<DateValue>> {
        Ok(self
            .expand(Cap::until(end))?
            .filter(|at| *at >= start)
            .collect())
    }

    pub fn first_n(&self, n: usize) -> Result<Vec<DateValue>> {
        Ok(self.expand(Cap::count(n))?.collect())
    }
}

#[derive(Clone, Debug)]
enum Stream {
    Rule(RuleIter),
    Dates(std::vec::IntoIter<DateValue>),
}

impl Iterator for Stream {
    type Item = DateValue;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Stream::Rule(iter) => iter.next(),
            Stream::Dates(iter) => iter.next(),
        }
    }
}

/// The ascending, deduplicated occurrences of a [`RecurrenceSet`].
///
/// Each RRULE keeps its own COUNT budget, spent only on occurrences that
/// survive EXDATE and EXRULE. RDATE values do not touch any budget.
#[derive(Clone, Debug)]
pub struct Occurrences {
    streams: Vec<Stream>,
    budgets: Vec<Option<u64>>,
    // head of every live stream, tagged with the stream index
    heap: BinaryHeap<Reverse<(DateValue, usize)>>,
    exdates: BTreeSet<DateValue>,
    exrules: Vec<Peekable<RuleIter>>,
    cap: Cap,
    emitted: usize,
    config: ExpansionConfig,
    finished: bool,
}

impl Occurrences {
    fn advance(&mut self, index: usize) {
        if self.budgets[index] == Some(0) {
            return;
        }
        if let Some(at) = self.streams[index].next() {
            self.heap.push(Reverse((at, index)));
        }
    }

    fn is_excluded(&mut self, at: &DateValue) -> bool {
        if self.exdates.contains(at) {
            return true;
        }
        self.exrules.iter_mut().any(|rule| {
            while rule.next_if(|excluded| excluded < at).is_some() {}
            rule.peek() == Some(at)
        })
    }
}

impl Iterator for Occurrences {
    type Item = DateValue;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if self.cap.max_count.is_some_and(|max| self.emitted >= max) {
            self.finished = true;
            return None;
        }

        let mut excluded_in_a_row: u32 = 0;
        while let Some(Reverse((at, first))) = self.heap.pop() {
            let mut sources = vec![first];
            while let Some(Reverse((_, index))) = self.heap.peek().filter(|Reverse((next, _))| *next == at) {
                sources.push(*index);
                self.heap.pop();
            }

            if self.cap.max_instant.is_some_and(|max| at > max) {
                break;
            }

            let excluded = self.is_excluded(&at);
            if !excluded {
                for &index in &sources {
                    if let Some(budget) = self.budgets[index].as_mut() {
                        *budget -= 1;
                    }
                }
            }
            for &index in &sources {
                self.advance(index);
            }

            if excluded {
                excluded_in_a_row += 1;
                if excluded_in_a_row >= self.config.max_consecutive_exclusions {
                    tracing::warn!(
                        excluded = excluded_in_a_row,
                        last = %at,
                        "every candidate is excluded, ending expansion"
                    );
                    break;
                }
                continue;
            }

            self.emitted += 1;
            return Some(at);
        }

        self.finished = true;
        None
    }
}
