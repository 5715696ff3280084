//! Initialization configuration
//!
//! Loading the configuration from a file is left to the application; any serde format
//! works since every key has a default.

use crate::appenders::{RotationPolicy, RotationStrategy};
use serde::{Deserialize, Serialize};

/// Settings for the two standard sinks
///
/// # Example
///
/// ```
/// use rust_trace_logger::core::LogConfig;
///
/// let config: LogConfig = serde_json::from_str(
///     r#"{"level":"warn","console":"error","file":"logs/app.log","max_size":50}"#,
/// ).unwrap();
/// assert_eq!(config.max_backups, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Minimum severity name for the file sink
    pub level: String,
    /// Minimum severity name for the console sink
    pub console: String,
    /// File sink path; empty disables the file sink
    pub file: String,
    /// Size in megabytes that triggers rotation; `0` means 100
    pub max_size: u64,
    /// Rotated files to keep; `0` keeps all of them
    pub max_backups: usize,
    /// Days to keep rotated files; `0` keeps them regardless of age
    pub max_age: u32,
    /// Gzip rotated files
    pub compress: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console: "info".to_string(),
            file: String::new(),
            max_size: 0,
            max_backups: 0,
            max_age: 0,
            compress: false,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    #[must_use]
    pub fn with_console(mut self, level: impl Into<String>) -> Self {
        self.console = level.into();
        self
    }

    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>) -> Self {
        self.file = path.into();
        self
    }

    /// Rotation settings for the file sink: size triggers rotation, age only
    /// limits retention.
    pub fn rotation_policy(&self) -> RotationPolicy {
        RotationPolicy::new()
            .with_strategy(RotationStrategy::megabytes(self.max_size))
            .with_max_backups(self.max_backups)
            .with_max_age_days(self.max_age)
            .with_compression(self.compress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_defaults_fill_missing_keys() {
        let config: LogConfig = serde_json::from_str(r#"{"file":"app.log"}"#).unwrap();
        assert_eq!(config.level, "info");
        assert_eq!(config.console, "info");
        assert_eq!(config.file, "app.log");
        assert!(!config.compress);
    }

    #[test]
    fn test_rotation_policy_mapping() {
        let config = LogConfig {
            max_size: 10,
            max_backups: 4,
            max_age: 7,
            compress: true,
            ..LogConfig::default()
        };

        let policy = config.rotation_policy();
        assert_eq!(policy.max_file_size(), Some(10 * 1024 * 1024));
        assert_eq!(policy.max_backup_files, 4);
        assert_eq!(policy.max_age, Some(Duration::from_secs(7 * 24 * 3600)));
        assert!(policy.compress);
    }
}
