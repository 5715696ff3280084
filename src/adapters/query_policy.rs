//! Severity selection for database trace events

use crate::core::Severity;
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

/// Display text of the not-found error ORMs return for empty single-row lookups
pub const RECORD_NOT_FOUND: &str = "record not found";

/// ORM-side verbosity, from quietest to chattiest
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum TraceLevel {
    Silent = 1,
    Error = 2,
    #[default]
    Warn = 3,
    Info = 4,
}

/// Error value for "no row matched"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordNotFound;

impl fmt::Display for RecordNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(RECORD_NOT_FOUND)
    }
}

impl StdError for RecordNotFound {}

/// True when `err`, or any error in its source chain, is [`RecordNotFound`] or
/// displays exactly as `record not found`.
pub fn is_record_not_found(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<RecordNotFound>() || e.to_string() == RECORD_NOT_FOUND {
            return true;
        }
        current = e.source();
    }
    false
}

/// What the policy needs to know about a finished statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOutcome {
    pub has_error: bool,
    pub is_not_found: bool,
    pub elapsed: Duration,
}

impl QueryOutcome {
    pub fn new(elapsed: Duration, error: Option<&(dyn StdError + 'static)>) -> Self {
        Self {
            has_error: error.is_some(),
            is_not_found: error.is_some_and(is_record_not_found),
            elapsed,
        }
    }
}

/// Maps a finished statement to the severity it is logged at
///
/// ```
/// use rust_trace_logger::adapters::{QueryOutcome, QueryPolicy};
/// use rust_trace_logger::Severity;
/// use std::time::Duration;
///
/// let policy = QueryPolicy::default();
/// let slow = QueryOutcome { has_error: false, is_not_found: false, elapsed: Duration::from_millis(300) };
/// assert_eq!(policy.classify(slow), Some(Severity::Warn));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPolicy {
    pub level: TraceLevel,
    /// `Duration::ZERO` disables slow-statement promotion
    pub slow_threshold: Duration,
    pub ignore_not_found: bool,
    /// Severity of statements that are neither failed nor slow, capped at Error
    pub normal_severity: Severity,
    /// Lowest `level` at which such ordinary statements are logged at all
    pub normal_level: TraceLevel,
}

impl Default for QueryPolicy {
    fn default() -> Self {
        Self {
            level: TraceLevel::Warn,
            slow_threshold: Duration::from_millis(200),
            ignore_not_found: true,
            normal_severity: Severity::Info,
            normal_level: TraceLevel::Error,
        }
    }
}

impl QueryPolicy {
    #[must_use]
    pub fn with_level(mut self, level: TraceLevel) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_ignore_not_found(mut self, ignore: bool) -> Self {
        self.ignore_not_found = ignore;
        self
    }

    #[must_use]
    pub fn with_normal_severity(mut self, severity: Severity) -> Self {
        self.normal_severity = severity;
        self
    }

    /// Require at least `level` before ordinary statements are logged. With
    /// `TraceLevel::Info` only the chattiest setting traces every statement.
    #[must_use]
    pub fn with_normal_level(mut self, level: TraceLevel) -> Self {
        self.normal_level = level;
        self
    }

    /// Severity for `outcome`, or `None` when nothing should be logged.
    ///
    /// Failures win over slowness; a not-found failure that is ignored falls through to
    /// the slow and normal cases.
    pub fn classify(&self, outcome: QueryOutcome) -> Option<Severity> {
        if outcome.has_error
            && self.level >= TraceLevel::Error
            && !(self.ignore_not_found && outcome.is_not_found)
        {
            return Some(Severity::Error);
        }
        if !self.slow_threshold.is_zero()
            && outcome.elapsed > self.slow_threshold
            && self.level >= TraceLevel::Warn
        {
            return Some(Severity::Warn);
        }
        if self.level > TraceLevel::Silent && self.level >= self.normal_level {
            return Some(self.normal_severity.min(Severity::Error));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_severity_is_capped_at_error() {
        let policy = QueryPolicy::default()
            .with_level(TraceLevel::Info)
            .with_normal_severity(Severity::Fatal);
        assert_eq!(policy.classify(outcome(false, false, 1)), Some(Severity::Error));
    }

    fn outcome(has_error: bool, is_not_found: bool, elapsed_ms: u64) -> QueryOutcome {
        QueryOutcome {
            has_error,
            is_not_found,
            elapsed: Duration::from_millis(elapsed_ms),
        }
    }

    #[test]
    fn test_error_wins() {
        let policy = QueryPolicy::default().with_level(TraceLevel::Error);
        assert_eq!(policy.classify(outcome(true, false, 500)), Some(Severity::Error));
    }

    #[test]
    fn test_ignored_not_found_is_not_an_error() {
        let policy = QueryPolicy::default()
            .with_level(TraceLevel::Info)
            .with_ignore_not_found(true);
        assert_eq!(policy.classify(outcome(true, true, 1)), Some(Severity::Info));

        let debug = policy.with_normal_severity(Severity::Debug);
        assert_eq!(debug.classify(outcome(true, true, 1)), Some(Severity::Debug));

        let strict = policy.with_ignore_not_found(false);
        assert_eq!(strict.classify(outcome(true, true, 1)), Some(Severity::Error));
    }

    #[test]
    fn test_ignored_not_found_at_error_level_falls_through() {
        let policy = QueryPolicy::default().with_level(TraceLevel::Error);
        assert_eq!(policy.classify(outcome(true, true, 1)), Some(Severity::Info));

        let chatty_only = policy.with_normal_level(TraceLevel::Info);
        assert_eq!(chatty_only.classify(outcome(true, true, 1)), None);
    }

    #[test]
    fn test_slow_statement_is_warn() {
        let policy = QueryPolicy::default();
        assert_eq!(policy.classify(outcome(false, false, 300)), Some(Severity::Warn));
        assert_eq!(policy.classify(outcome(false, false, 200)), Some(Severity::Info));

        let no_threshold = policy
            .with_slow_threshold(Duration::ZERO)
            .with_normal_level(TraceLevel::Info);
        assert_eq!(no_threshold.classify(outcome(false, false, 10_000)), None);
    }

    #[test]
    fn test_silent_logs_nothing() {
        let policy = QueryPolicy::default().with_level(TraceLevel::Silent);
        assert_eq!(policy.classify(outcome(true, false, 10_000)), None);
    }

    #[derive(Debug)]
    struct Wrapped(RecordNotFound);

    impl fmt::Display for Wrapped {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "lookup failed")
        }
    }

    impl StdError for Wrapped {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_not_found_detection_walks_sources() {
        assert!(is_record_not_found(&RecordNotFound));
        assert!(is_record_not_found(&Wrapped(RecordNotFound)));

        let text = std::io::Error::new(std::io::ErrorKind::NotFound, "record not found");
        assert!(is_record_not_found(&text));

        let other = std::io::Error::new(std::io::ErrorKind::Other, "connection reset");
        assert!(!is_record_not_found(&other));
    }
}
