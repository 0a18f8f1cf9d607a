use std::fmt;

/// Everything that can go wrong while parsing a rule or expanding a recurrence set.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The rule text could not be parsed or breaks an RFC 5545 constraint.
    #[error("malformed recurrence rule: {reason}")]
    MalformedRule { reason: String },
    /// The fields do not describe a real calendar date or time of day.
    #[error("malformed date: {0}")]
    MalformedDate(DateFields),
    /// A DATE or DATE-TIME text value could not be parsed.
    #[error("malformed date text `{0}`")]
    MalformedDateText(String),
    /// UTC offsets must stay strictly within one day.
    #[error("invalid UTC offset of {0} seconds")]
    InvalidUtcOffset(i32),
    /// An eager expansion was requested for a set with no COUNT, UNTIL or cap.
    #[error("refusing to materialize an unbounded recurrence set without a cap")]
    UnboundedExpansion,
    /// The rule cannot be anchored to the given DTSTART.
    #[error("rule is incompatible with DTSTART: {reason}")]
    IncompatibleStart { reason: String },
}

impl Error {
    pub(crate) fn malformed_rule<S: Into<String>>(reason: S) -> Self {
        Self::MalformedRule {
            reason: reason.into(),
        }
    }

    pub(crate) fn incompatible_start<S: Into<String>>(reason: S) -> Self {
        Self::IncompatibleStart {
            reason: reason.into(),
        }
    }
}

/// The raw fields of a rejected date, kept for the error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateFields {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub time: Option<(u32, u32, u32)>,
}

impl fmt::Display for DateFields {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)?;
        if let Some((hour, minute, second)) = self.time {
            write!(f, "T{:02}:{:02}:{:02}", hour, minute, second)?;
        }
        Ok(())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
