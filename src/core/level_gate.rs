//! Per-sink severity gate

use super::error::Result;
use super::severity::Severity;

/// Predicate deciding whether a sink accepts a record of a given severity.
///
/// A gate built from a configured name accepts `severity >= minimum`. A disabled gate
/// accepts nothing; it stands in for a sink whose level name could not be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelGate {
    minimum: Option<Severity>,
}

impl LevelGate {
    /// Build a gate from a severity name.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::InvalidLevel`](super::error::LoggerError::InvalidLevel)
    /// for an unknown name.
    pub fn configure(name: &str) -> Result<Self> {
        Ok(Self::at(name.parse()?))
    }

    /// Like [`configure`](Self::configure), but degrades to a disabled gate.
    pub fn configure_or_disabled(name: &str) -> Self {
        Self::configure(name).unwrap_or_else(|_| Self::disabled())
    }

    pub const fn at(minimum: Severity) -> Self {
        Self {
            minimum: Some(minimum),
        }
    }

    pub const fn disabled() -> Self {
        Self { minimum: None }
    }

    #[inline]
    pub fn accepts(&self, severity: Severity) -> bool {
        self.minimum.is_some_and(|min| severity >= min)
    }

    pub fn minimum(&self) -> Option<Severity> {
        self.minimum
    }
}

impl Default for LevelGate {
    fn default() -> Self {
        Self::at(Severity::Info)
    }
}
