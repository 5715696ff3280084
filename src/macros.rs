//! Logging macros for ergonomic log message formatting.
//!
//! These macros provide a convenient interface for logging with automatic
//! string formatting, similar to `println!` and `format!`. Records written through
//! them carry no fields; use the [`Logger`](crate::Logger) methods for structured data.
//!
//! # Examples
//!
//! ```
//! use rust_trace_logger::prelude::*;
//! use rust_trace_logger::info;
//!
//! let logger = Logger::new();
//!
//! // Basic logging
//! info!(logger, "Server started");
//!
//! // With format arguments
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port);
//! ```

/// Log a message at an explicit severity.
///
/// The returned [`Disposition`](crate::Disposition) is discarded: `log!` never
/// panics or exits, even for Panic and Fatal records.
///
/// # Examples
///
/// ```
/// # use rust_trace_logger::prelude::*;
/// # let logger = Logger::new();
/// use rust_trace_logger::log;
/// log!(logger, Severity::Info, "Simple message");
/// log!(logger, Severity::Error, "Error code: {}", 500);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        {
            let _ = $logger.emit($level, format!($($arg)+), ());
        }
    };
}

/// Log a debug-level message.
///
/// # Examples
///
/// ```
/// # use rust_trace_logger::prelude::*;
/// # let logger = Logger::new();
/// use rust_trace_logger::debug;
/// debug!(logger, "Counter value: {}", 10);
/// ```
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $logger.debug(format!($($arg)+), ())
    };
}

/// Log an info-level message.
///
/// # Examples
///
/// ```
/// # use rust_trace_logger::prelude::*;
/// # let logger = Logger::new();
/// use rust_trace_logger::info;
/// info!(logger, "Processing {} items", 100);
/// ```
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $logger.info(format!($($arg)+), ())
    };
}

/// Log a warning-level message.
///
/// # Examples
///
/// ```
/// # use rust_trace_logger::prelude::*;
/// # let logger = Logger::new();
/// use rust_trace_logger::warn;
/// warn!(logger, "Retry attempt {} of {}", 3, 5);
/// ```
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $logger.warn(format!($($arg)+), ())
    };
}

/// Log an error-level message with the caller attached.
///
/// # Examples
///
/// ```
/// # use rust_trace_logger::prelude::*;
/// # let logger = Logger::new();
/// use rust_trace_logger::error;
/// error!(logger, "Error code: {}, message: {}", 500, "Internal error");
/// ```
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $logger.error(format!($($arg)+), ())
    };
}

#[cfg(test)]
mod tests {
    use crate::core::{Appender, LevelGate, Logger, Record, Result, Severity};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Memory(Arc<Mutex<Vec<Record>>>);

    impl Appender for Memory {
        fn append(&mut self, record: &Record) -> Result<()> {
            self.0.lock().push(record.clone());
            Ok(())
        }
        fn flush(&mut self) -> Result<()> {
            Ok(())
        }
        fn name(&self) -> &str {
            "memory"
        }
    }

    fn logger() -> (Logger, Memory) {
        let memory = Memory::default();
        let logger = Logger::builder()
            .sink(LevelGate::at(Severity::Debug), memory.clone())
            .build();
        (logger, memory)
    }

    #[test]
    fn test_log_macro() {
        let (logger, memory) = logger();
        log!(logger, Severity::Info, "Test message");
        log!(logger, Severity::Warn, "Formatted: {}", 42);

        let records = memory.0.lock();
        assert_eq!(records[1].message(), "Formatted: 42");
        assert_eq!(records[1].severity(), Severity::Warn);
    }

    #[test]
    fn test_log_macro_does_not_abort() {
        let (logger, memory) = logger();
        log!(logger, Severity::Panic, "recorded only");
        assert_eq!(memory.0.lock()[0].severity(), Severity::Panic);
    }

    #[test]
    fn test_level_macros() {
        let (logger, memory) = logger();
        debug!(logger, "Count: {}", 5);
        info!(logger, "Items: {}", 100);
        warn!(logger, "Retry {} of {}", 1, 3);
        error!(logger, "Code: {}", 500);

        let records = memory.0.lock();
        let severities: Vec<_> = records.iter().map(Record::severity).collect();
        assert_eq!(
            severities,
            vec![Severity::Debug, Severity::Info, Severity::Warn, Severity::Error]
        );
        assert_eq!(records[3].message(), "Code: 500");
        assert!(records[3].fields().get("caller").is_some());
    }
}
