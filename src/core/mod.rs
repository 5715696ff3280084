//! Core logger types and traits

pub mod appender;
pub mod caller;
pub mod config;
pub mod encoding;
pub mod error;
pub mod field;
pub mod level_gate;
pub mod logger;
pub mod metrics;
pub mod record;
pub mod severity;
pub mod sink;
pub mod timestamp;

pub use appender::Appender;
pub use caller::{resolve, CallerFrame, CallerResolver, DEFAULT_MAX_DEPTH, TEST_FILE_PATTERNS};
pub use config::LogConfig;
pub use encoding::OutputFormat;
pub use error::{LoggerError, Result};
pub use field::{format_duration, Field, FieldValue, Fields};
pub use level_gate::LevelGate;
pub use logger::{Logger, LoggerBuilder, CALLER_KEY};
pub use metrics::LoggerMetrics;
pub use record::Record;
pub use severity::{Disposition, Severity};
pub use sink::Sink;
pub use timestamp::TimestampFormat;
