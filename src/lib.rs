//! # Rust Trace Logger
//!
//! A leveled, multi-sink structured logging core with adapters that trace HTTP
//! requests, database statements and outbound HTTP round trips.
//!
//! ## Features
//!
//! - **Per-sink level gates**: one record fans out to every sink whose gate accepts it
//! - **Console and rotating JSON file sinks**: size/time rotation, retention, gzip
//! - **Caller attribution**: error records name the first frame outside the logger
//! - **Failure isolation**: a failing or panicking sink never reaches the caller
//! - **Adapters**: access log and panic recovery middleware, ORM and SQL engine
//!   loggers with a shared severity policy, an outbound round-trip logger
//!
//! ## Example
//!
//! ```
//! use rust_trace_logger::prelude::*;
//!
//! let logger = Logger::builder()
//!     .sink(LevelGate::at(Severity::Info), ConsoleAppender::new())
//!     .build();
//!
//! logger.info("server started", [Field::int("port", 8080)]);
//! logger.error("upstream timed out", [Field::string("host", "db-1")]);
//! ```

pub mod adapters;
pub mod appenders;
pub mod core;
pub mod global;
pub mod macros;

pub mod prelude {
    pub use crate::adapters::{
        AccessLog, ClientTraceLogger, Exchange, HttpContext, OrmLogger, Pipeline, QueryLogger,
        QueryPolicy, Recovery, SqlEngineLogger, TraceEvent, TraceLevel,
    };
    pub use crate::appenders::{ConsoleAppender, RotatingFileAppender, RotationPolicy, RotationStrategy};
    pub use crate::core::{
        Appender, CallerResolver, Disposition, Field, FieldValue, Fields, LevelGate, LogConfig,
        Logger, LoggerBuilder, LoggerError, LoggerMetrics, OutputFormat, Record, Result,
        Severity, TimestampFormat,
    };
}

pub use crate::appenders::{ConsoleAppender, RotatingFileAppender};
pub use crate::core::{
    Appender, CallerFrame, CallerResolver, Disposition, Field, FieldValue, Fields, LevelGate,
    LogConfig, Logger, LoggerBuilder, LoggerError, LoggerMetrics, OutputFormat, Record, Result,
    Severity, TimestampFormat,
};
