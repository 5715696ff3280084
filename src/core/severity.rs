//! Severity definitions

use super::error::LoggerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Record severity, totally ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Default)]
pub enum Severity {
    Debug = 0,
    #[default]
    Info = 1,
    Warn = 2,
    Error = 3,
    Panic = 4,
    Fatal = 5,
}

/// What the caller must do after a record at a given severity has been emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a Panic or Exit disposition must be enforced by the caller"]
pub enum Disposition {
    /// Log and continue normally
    Continue,
    /// Log, then unwind the calling context
    Panic,
    /// Log, flush, then terminate the process
    Exit,
}

impl Severity {
    pub const ALL: [Severity; 6] = [
        Severity::Debug,
        Severity::Info,
        Severity::Warn,
        Severity::Error,
        Severity::Panic,
        Severity::Fatal,
    ];

    pub fn to_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Panic => "PANIC",
            Severity::Fatal => "FATAL",
        }
    }

    pub fn disposition(&self) -> Disposition {
        match self {
            Severity::Panic => Disposition::Panic,
            Severity::Fatal => Disposition::Exit,
            _ => Disposition::Continue,
        }
    }

    #[cfg(feature = "console")]
    pub fn color_code(&self) -> colored::Color {
        use colored::Color::*;
        match self {
            Severity::Debug => Magenta,
            Severity::Info => Blue,
            Severity::Warn => Yellow,
            Severity::Error => Red,
            Severity::Panic => BrightRed,
            Severity::Fatal => BrightRed,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl FromStr for Severity {
    type Err = LoggerError;

    /// An empty name means `Info`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DEBUG" => Ok(Severity::Debug),
            "" | "INFO" => Ok(Severity::Info),
            "WARN" | "WARNING" => Ok(Severity::Warn),
            "ERROR" => Ok(Severity::Error),
            "PANIC" | "DPANIC" => Ok(Severity::Panic),
            "FATAL" => Ok(Severity::Fatal),
            _ => Err(LoggerError::invalid_level(s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("debug".parse::<Severity>().unwrap(), Severity::Debug);
        assert_eq!("Warning".parse::<Severity>().unwrap(), Severity::Warn);
        assert_eq!("DPANIC".parse::<Severity>().unwrap(), Severity::Panic);
        assert_eq!("".parse::<Severity>().unwrap(), Severity::Info);
        assert!("verbose".parse::<Severity>().is_err());
    }

    #[test]
    fn test_ordering() {
        for pair in Severity::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_disposition() {
        assert_eq!(Severity::Error.disposition(), Disposition::Continue);
        assert_eq!(Severity::Panic.disposition(), Disposition::Panic);
        assert_eq!(Severity::Fatal.disposition(), Disposition::Exit);
    }
}
