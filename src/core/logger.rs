//! Main logger implementation

use super::{
    appender::Appender,
    caller::{CallerFrame, CallerResolver},
    config::LogConfig,
    error::Result,
    field::{Field, Fields},
    level_gate::LevelGate,
    metrics::LoggerMetrics,
    record::Record,
    severity::{Disposition, Severity},
    sink::Sink,
};
use crate::appenders::{ConsoleAppender, RotatingFileAppender};
use std::panic::Location;
use std::sync::Arc;

/// Field carrying the attributed source location
pub const CALLER_KEY: &str = "caller";

/// Leveled multi-sink logging core
///
/// Every record is offered to each sink; a sink writes it when its own
/// [`LevelGate`] accepts the severity. Emit operations never fail: sink errors are
/// counted in [`LoggerMetrics`] and otherwise dropped.
///
/// # Example
///
/// ```
/// use rust_trace_logger::prelude::*;
///
/// let logger = Logger::builder()
///     .sink(LevelGate::at(Severity::Warn), ConsoleAppender::new())
///     .build();
///
/// logger.warn("disk almost full", [Field::int("free_mb", 12)]);
/// ```
pub struct Logger {
    sinks: Vec<Sink>,
    resolver: CallerResolver,
    metrics: Arc<LoggerMetrics>,
}

impl Logger {
    /// Logger without sinks; every emit is a no-op until one is added.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sinks: Vec::new(),
            resolver: CallerResolver::new(),
            metrics: Arc::new(LoggerMetrics::new()),
        }
    }

    /// File sink (JSON lines, gated by `level`) plus console sink (gated by `console`).
    ///
    /// A level name that does not parse disables its sink instead of failing.
    ///
    /// # Errors
    ///
    /// Returns an error when the log file cannot be created or opened.
    pub fn from_config(config: &LogConfig) -> Result<Self> {
        let mut logger = Logger::new();

        if !config.file.is_empty() {
            let appender = RotatingFileAppender::with_policy(&config.file, config.rotation_policy())?;
            logger.add_sink(LevelGate::configure_or_disabled(&config.level), appender);
        }
        logger.add_sink(
            LevelGate::configure_or_disabled(&config.console),
            ConsoleAppender::new(),
        );

        Ok(logger)
    }

    pub fn add_sink<A: Appender + 'static>(&mut self, gate: LevelGate, appender: A) {
        self.sinks.push(Sink::new(gate, Box::new(appender)));
    }

    pub fn set_resolver(&mut self, resolver: CallerResolver) {
        self.resolver = resolver;
    }

    pub fn sinks(&self) -> &[Sink] {
        &self.sinks
    }

    pub fn metrics(&self) -> &LoggerMetrics {
        &self.metrics
    }

    /// True when at least one sink would write a record of `severity`.
    pub fn enabled(&self, severity: Severity) -> bool {
        self.sinks.iter().any(|sink| sink.gate().accepts(severity))
    }

    /// Lowest severity any sink accepts
    pub fn min_enabled(&self) -> Option<Severity> {
        self.sinks.iter().filter_map(|sink| sink.gate().minimum()).min()
    }

    /// Build a record and fan it out. The returned disposition tells the caller whether
    /// it must abort after a Panic or Fatal record; this method never does.
    pub fn emit(
        &self,
        severity: Severity,
        message: impl Into<String>,
        fields: impl Into<Fields>,
    ) -> Disposition {
        if self.enabled(severity) {
            self.log(&Record::new(severity, message, fields));
        }
        severity.disposition()
    }

    /// Fan an already built record out to every accepting sink.
    pub fn log(&self, record: &Record) {
        for sink in &self.sinks {
            match sink.write(record) {
                Ok(true) => {
                    self.metrics.record_written();
                }
                Ok(false) => {}
                Err(_) => {
                    self.metrics.record_failed();
                }
            }
        }
    }

    /// Resolve the source location that should be credited for the current emit call.
    #[track_caller]
    pub fn caller(&self) -> CallerFrame {
        self.resolver.resolve(Location::caller())
    }

    /// Like [`emit`](Self::emit), with a `caller` field appended.
    #[track_caller]
    pub fn emit_with_caller(
        &self,
        severity: Severity,
        message: impl Into<String>,
        fields: impl Into<Fields>,
    ) -> Disposition {
        if self.enabled(severity) {
            let caller = self.caller();
            let record = Record::new(severity, message, fields)
                .with_field(Field::string(CALLER_KEY, caller.short()));
            self.log(&record);
        }
        severity.disposition()
    }

    pub fn debug(&self, message: impl Into<String>, fields: impl Into<Fields>) {
        let _ = self.emit(Severity::Debug, message, fields);
    }

    pub fn info(&self, message: impl Into<String>, fields: impl Into<Fields>) {
        let _ = self.emit(Severity::Info, message, fields);
    }

    pub fn warn(&self, message: impl Into<String>, fields: impl Into<Fields>) {
        let _ = self.emit(Severity::Warn, message, fields);
    }

    /// Error record with the caller attached
    #[track_caller]
    pub fn error(&self, message: impl Into<String>, fields: impl Into<Fields>) {
        let _ = self.emit_with_caller(Severity::Error, message, fields);
    }

    /// Emit a Panic record with the caller attached, then panic with the message.
    #[track_caller]
    pub fn panic(&self, message: impl Into<String>, fields: impl Into<Fields>) -> ! {
        let message = message.into();
        let _ = self.emit_with_caller(Severity::Panic, message.clone(), fields);
        panic!("{}", message);
    }

    /// Emit a Fatal record with the caller attached, flush every sink, then exit the
    /// process with status 1.
    #[track_caller]
    pub fn fatal(&self, message: impl Into<String>, fields: impl Into<Fields>) -> ! {
        let _ = self.emit_with_caller(Severity::Fatal, message, fields);
        self.sync();
        std::process::exit(1);
    }

    /// Flush every sink.
    ///
    /// # Errors
    ///
    /// Returns the first sink error; the remaining sinks are still flushed.
    pub fn flush(&self) -> Result<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.flush() {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Best-effort flush for shutdown paths
    pub fn sync(&self) {
        let _ = self.flush();
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.sync();
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("sinks", &self.sinks)
            .field("resolver", &self.resolver)
            .finish()
    }
}

/// Builder for [`Logger`]
///
/// # Example
/// ```
/// use rust_trace_logger::prelude::*;
///
/// let logger = Logger::builder()
///     .sink(LevelGate::at(Severity::Debug), ConsoleAppender::stdout())
///     .resolver(CallerResolver::new().with_exclude("/my-framework/"))
///     .build();
/// assert!(logger.enabled(Severity::Debug));
/// ```
pub struct LoggerBuilder {
    sinks: Vec<Sink>,
    resolver: CallerResolver,
}

impl LoggerBuilder {
    pub fn new() -> Self {
        Self {
            sinks: Vec::new(),
            resolver: CallerResolver::new(),
        }
    }

    /// Add a sink gated by `gate`
    #[must_use = "builder methods return a new value"]
    pub fn sink<A: Appender + 'static>(mut self, gate: LevelGate, appender: A) -> Self {
        self.sinks.push(Sink::new(gate, Box::new(appender)));
        self
    }

    /// Replace the caller resolver
    #[must_use = "builder methods return a new value"]
    pub fn resolver(mut self, resolver: CallerResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn build(self) -> Logger {
        Logger {
            sinks: self.sinks,
            resolver: self.resolver,
            metrics: Arc::new(LoggerMetrics::new()),
        }
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger {
    #[must_use]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::LoggerError;
    use crate::core::field::FieldValue;
    use parking_lot::Mutex;

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

    struct Failing;

    impl Appender for Failing {
        fn append(&mut self, _record: &Record) -> Result<()> {
            Err(LoggerError::writer("broken pipe"))
        }
        fn flush(&mut self) -> Result<()> {
            Err(LoggerError::writer("broken pipe"))
        }
        fn name(&self) -> &str {
            "failing"
        }
    }

    #[test]
    fn test_fan_out_respects_each_gate() {
        let file = Memory::default();
        let console = Memory::default();
        let logger = Logger::builder()
            .sink(LevelGate::at(Severity::Warn), file.clone())
            .sink(LevelGate::at(Severity::Error), console.clone())
            .build();

        logger.info("x", ());
        logger.warn("x", ());
        logger.error("x", ());

        assert_eq!(file.0.lock().len(), 2);
        assert_eq!(console.0.lock().len(), 1);
        assert_eq!(logger.metrics().written_count(), 3);
    }

    #[test]
    fn test_error_attaches_caller_but_warn_does_not() {
        let memory = Memory::default();
        let logger = Logger::builder()
            .sink(LevelGate::at(Severity::Debug), memory.clone())
            .build();

        logger.warn("plain", ());
        logger.error("attributed", [Field::string("Path", "/x")]);

        let records = memory.0.lock();
        assert!(records[0].fields().get(CALLER_KEY).is_none());

        let fields = records[1].fields();
        assert_eq!(fields.get("Path"), Some(&FieldValue::String("/x".into())));
        match fields.get(CALLER_KEY) {
            Some(FieldValue::String(caller)) => assert!(caller.contains(".rs:")),
            other => panic!("missing caller: {:?}", other),
        }
    }

    #[test]
    fn test_failing_sink_does_not_affect_others() {
        let memory = Memory::default();
        let logger = Logger::builder()
            .sink(LevelGate::at(Severity::Debug), Failing)
            .sink(LevelGate::at(Severity::Debug), memory.clone())
            .build();

        logger.info("survives", ());

        assert_eq!(memory.0.lock().len(), 1);
        assert_eq!(logger.metrics().failed_count(), 1);
        assert_eq!(logger.metrics().written_count(), 1);
        assert!(logger.flush().is_err());
    }

    #[test]
    fn test_disposition_of_emit() {
        let logger = Logger::new();
        assert_eq!(logger.emit(Severity::Error, "x", ()), Disposition::Continue);
        assert_eq!(logger.emit(Severity::Panic, "x", ()), Disposition::Panic);
        assert_eq!(logger.emit(Severity::Fatal, "x", ()), Disposition::Exit);
    }

    #[test]
    fn test_panic_emits_then_unwinds() {
        let memory = Memory::default();
        let logger = Logger::builder()
            .sink(LevelGate::at(Severity::Error), memory.clone())
            .build();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            logger.panic("invariant broken", ());
        }));

        assert!(result.is_err());
        let records = memory.0.lock();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].severity(), Severity::Panic);
        assert!(records[0].fields().get(CALLER_KEY).is_some());
    }

    #[test]
    fn test_enabled_and_min_enabled() {
        let logger = Logger::builder()
            .sink(LevelGate::disabled(), Memory::default())
            .sink(LevelGate::at(Severity::Warn), Memory::default())
            .build();

        assert!(!logger.enabled(Severity::Info));
        assert!(logger.enabled(Severity::Warn));
        assert_eq!(logger.min_enabled(), Some(Severity::Warn));
        assert_eq!(Logger::new().min_enabled(), None);
    }

    #[test]
    fn test_from_config_disables_invalid_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let config = LogConfig::new()
            .with_level("warn")
            .with_console("nonsense")
            .with_file(path.to_string_lossy());

        let logger = Logger::from_config(&config).unwrap();
        assert_eq!(logger.sinks().len(), 2);
        assert_eq!(logger.sinks()[0].gate().minimum(), Some(Severity::Warn));
        assert_eq!(logger.sinks()[1].gate().minimum(), None);
    }
}
