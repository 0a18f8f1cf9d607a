/// Decides which bound wins when a rule carries both COUNT and UNTIL,
/// which RFC 5545 forbids but real calendars contain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BoundPolicy {
    #[default]
    CountWins,
    UntilWins,
}

/// Knobs for an expansion, handed to [`crate::RecurrenceSet::with_config`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpansionConfig {
    /// Consecutive base periods without a single candidate after which a rule
    /// is considered exhausted, e.g. `FREQ=YEARLY;BYMONTH=2;BYMONTHDAY=30`.
    pub max_empty_periods: u32,
    /// Consecutive candidates removed by EXDATE/EXRULE after which the set
    /// stops, e.g. an EXRULE equal to the RRULE.
    pub max_consecutive_exclusions: u32,
    pub bound_policy: BoundPolicy,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        ExpansionConfig {
            max_empty_periods: 100_000,
            max_consecutive_exclusions: 100_000,
            bound_policy: BoundPolicy::default(),
        }
    }
}

impl ExpansionConfig {
    pub fn with_bound_policy(self, bound_policy: BoundPolicy) -> Self {
        ExpansionConfig {
            bound_policy,
            ..self
        }
    }

    pub fn with_max_empty_periods(self, max_empty_periods: u32) -> Self {
        ExpansionConfig {
            max_empty_periods,
            ..self
        }
    }

    pub fn with_max_consecutive_exclusions(self, max_consecutive_exclusions: u32) -> Self {
        ExpansionConfig {
            max_consecutive_exclusions,
            ..self
        }
    }
}
