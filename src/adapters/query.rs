//! Database trace adapters
//!
//! [`QueryLogger`] is one core-backed type that plugs into both logger contracts a
//! database layer may expect: the ORM hook ([`OrmLogger`]) and the lower-level SQL
//! engine hook ([`SqlEngineLogger`]). Both run the same [`QueryPolicy`].

use super::query_policy::{QueryOutcome, QueryPolicy, TraceLevel};
use super::statement::{BindFormatter, StatementFormatter, TraceEvent};
use crate::core::{Disposition, Field, Fields, Logger, Severity};
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Message of statement records written through the ORM preset
pub const ORM_PREFIX: &str = "[ORM]";
/// Message of statement records written through the SQL engine preset
pub const SQL_PREFIX: &str = "[SQL]";

/// Logger contract of an object-relational layer
pub trait OrmLogger {
    fn log_level(&self) -> TraceLevel;
    fn set_log_level(&self, level: TraceLevel);
    /// Called before a statement runs; nothing is logged here.
    fn before_statement(&self, event: &TraceEvent<'_>);
    /// Called once the statement finished; the only place a record is produced.
    fn after_statement(&self, event: &TraceEvent<'_>);
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Verbosity scale of a SQL execution engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SqlLogLevel {
    Debug = 0,
    Info = 1,
    Warning = 2,
    Err = 3,
    Off = 4,
    Unknown = 5,
}

impl From<Severity> for SqlLogLevel {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Debug => SqlLogLevel::Debug,
            Severity::Info => SqlLogLevel::Info,
            Severity::Warn => SqlLogLevel::Warning,
            Severity::Error | Severity::Panic | Severity::Fatal => SqlLogLevel::Err,
        }
    }
}

/// Logger contract of a SQL execution engine
pub trait SqlEngineLogger {
    fn debugf(&self, args: fmt::Arguments<'_>);
    fn infof(&self, args: fmt::Arguments<'_>);
    fn warnf(&self, args: fmt::Arguments<'_>);
    fn errorf(&self, args: fmt::Arguments<'_>);
    fn level(&self) -> SqlLogLevel;
    fn set_level(&self, level: SqlLogLevel);
    fn show_sql(&self, show: bool);
    fn is_show_sql(&self) -> bool;
    fn before_sql(&self, event: &TraceEvent<'_>);
    fn after_sql(&self, event: &TraceEvent<'_>);
}

/// Shared implementation of both database logger contracts
///
/// Statement records carry `SQL` (statement with arguments bound), `Rows` when known,
/// `Latency`, and `Error` when the statement failed. Error records also carry the
/// caller.
///
/// # Example
///
/// ```
/// use rust_trace_logger::adapters::{OrmLogger, QueryLogger, SqlArg, TraceEvent};
/// use rust_trace_logger::prelude::*;
/// use std::sync::Arc;
/// use std::time::{Duration, Instant};
///
/// let logger = Arc::new(Logger::builder()
///     .sink(LevelGate::at(Severity::Warn), ConsoleAppender::new())
///     .build());
/// let orm = QueryLogger::orm(Arc::clone(&logger));
///
/// let args = [SqlArg::from(7)];
/// let event = TraceEvent::new("SELECT * FROM users WHERE id = ?", Instant::now())
///     .with_args(&args)
///     .with_duration(Duration::from_millis(350))
///     .with_rows(1);
/// orm.after_statement(&event); // slow: logged at Warn
/// ```
pub struct QueryLogger {
    logger: Arc<Logger>,
    prefix: String,
    policy: RwLock<QueryPolicy>,
    show_sql: AtomicBool,
    formatter: Arc<dyn StatementFormatter>,
}

impl QueryLogger {
    pub fn new(logger: Arc<Logger>, prefix: impl Into<String>, policy: QueryPolicy) -> Self {
        Self {
            logger,
            prefix: prefix.into(),
            policy: RwLock::new(policy),
            show_sql: AtomicBool::new(true),
            formatter: Arc::new(BindFormatter),
        }
    }

    /// `[ORM]`, level Warn, slow threshold 200 ms, not-found errors ignored
    pub fn orm(logger: Arc<Logger>) -> Self {
        Self::new(logger, ORM_PREFIX, QueryPolicy::default())
    }

    /// `[SQL]`, level Info, no slow threshold, every error logged
    pub fn sql_engine(logger: Arc<Logger>) -> Self {
        let policy = QueryPolicy::default()
            .with_level(TraceLevel::Info)
            .with_slow_threshold(Duration::ZERO)
            .with_ignore_not_found(false);
        Self::new(logger, SQL_PREFIX, policy)
    }

    /// Replace the bind-substitution formatter
    #[must_use]
    pub fn with_formatter<F: StatementFormatter + 'static>(mut self, formatter: F) -> Self {
        self.formatter = Arc::new(formatter);
        self
    }

    /// Copy of this logger at another level; every other setting is kept.
    #[must_use]
    pub fn with_level(&self, level: TraceLevel) -> Self {
        Self {
            logger: Arc::clone(&self.logger),
            prefix: self.prefix.clone(),
            policy: RwLock::new(self.policy().with_level(level)),
            show_sql: AtomicBool::new(self.show_sql.load(Ordering::Relaxed)),
            formatter: Arc::clone(&self.formatter),
        }
    }

    pub fn policy(&self) -> QueryPolicy {
        *self.policy.read()
    }

    pub fn set_policy(&self, policy: QueryPolicy) {
        *self.policy.write() = policy;
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Classify a finished statement and emit at most one record for it.
    pub fn trace(&self, event: &TraceEvent<'_>) {
        let elapsed = event.elapsed();
        let outcome = QueryOutcome::new(elapsed, event.error);
        let Some(severity) = self.policy().classify(outcome) else {
            return;
        };
        if !self.logger.enabled(severity) {
            return;
        }

        let mut fields = Fields::new().with("SQL", self.formatter.format(event.statement, event.args));
        if let Some(rows) = event.rows {
            fields.push(Field::int("Rows", rows));
        }
        fields.push(Field::duration("Latency", elapsed));
        if let Some(err) = event.error {
            fields.push(Field::error("Error", err));
        }

        let disposition = if severity >= Severity::Error {
            self.logger.emit_with_caller(severity, self.prefix.as_str(), fields)
        } else {
            self.logger.emit(severity, self.prefix.as_str(), fields)
        };
        // The policy tops out at Error, so a statement never unwinds or exits.
        debug_assert_eq!(disposition, Disposition::Continue);
    }

    fn allows(&self, level: TraceLevel) -> bool {
        self.policy().level >= level
    }
}

impl fmt::Debug for QueryLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryLogger")
            .field("prefix", &self.prefix)
            .field("policy", &self.policy())
            .field("show_sql", &self.is_show_sql())
            .finish()
    }
}

impl OrmLogger for QueryLogger {
    fn log_level(&self) -> TraceLevel {
        self.policy().level
    }

    fn set_log_level(&self, level: TraceLevel) {
        self.policy.write().level = level;
    }

    fn before_statement(&self, _event: &TraceEvent<'_>) {}

    fn after_statement(&self, event: &TraceEvent<'_>) {
        self.trace(event);
    }

    fn info(&self, message: &str) {
        if self.allows(TraceLevel::Info) {
            self.logger.info(message, ());
        }
    }

    fn warn(&self, message: &str) {
        if self.allows(TraceLevel::Warn) {
            self.logger.warn(message, ());
        }
    }

    fn error(&self, message: &str) {
        if self.allows(TraceLevel::Error) {
            self.logger.error(message, ());
        }
    }
}

impl SqlEngineLogger for QueryLogger {
    fn debugf(&self, args: fmt::Arguments<'_>) {
        self.logger.debug(args.to_string(), ());
    }

    fn infof(&self, args: fmt::Arguments<'_>) {
        self.logger.info(args.to_string(), ());
    }

    fn warnf(&self, args: fmt::Arguments<'_>) {
        self.logger.warn(args.to_string(), ());
    }

    fn errorf(&self, args: fmt::Arguments<'_>) {
        self.logger.error(args.to_string(), ());
    }

    /// `Off` when statements are switched off, otherwise the less verbose of the
    /// configured level and what the sinks accept; `Unknown` without any enabled sink.
    fn level(&self) -> SqlLogLevel {
        let policy = self.policy();
        let configured = match policy.level {
            TraceLevel::Silent => return SqlLogLevel::Off,
            TraceLevel::Error => SqlLogLevel::Err,
            TraceLevel::Warn => SqlLogLevel::Warning,
            TraceLevel::Info if policy.normal_severity == Severity::Debug => SqlLogLevel::Debug,
            TraceLevel::Info => SqlLogLevel::Info,
        };
        match self.logger.min_enabled() {
            Some(severity) => configured.max(SqlLogLevel::from(severity)),
            None => SqlLogLevel::Unknown,
        }
    }

    fn set_level(&self, level: SqlLogLevel) {
        let mut policy = self.policy.write();
        match level {
            SqlLogLevel::Debug => {
                policy.level = TraceLevel::Info;
                policy.normal_severity = Severity::Debug;
            }
            SqlLogLevel::Info => {
                policy.level = TraceLevel::Info;
                policy.normal_severity = Severity::Info;
            }
            SqlLogLevel::Warning => policy.level = TraceLevel::Warn,
            SqlLogLevel::Err => policy.level = TraceLevel::Error,
            SqlLogLevel::Off => policy.level = TraceLevel::Silent,
            SqlLogLevel::Unknown => {}
        }
    }

    fn show_sql(&self, show: bool) {
        self.show_sql.store(show, Ordering::Relaxed);
    }

    fn is_show_sql(&self) -> bool {
        self.show_sql.load(Ordering::Relaxed)
    }

    fn before_sql(&self, _event: &TraceEvent<'_>) {}

    fn after_sql(&self, event: &TraceEvent<'_>) {
        if self.is_show_sql() {
            self.trace(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::query_policy::RecordNotFound;
    use crate::adapters::statement::SqlArg;
    use crate::core::{Appender, FieldValue, LevelGate, Record, Result};
    use parking_lot::Mutex;
    use std::time::Instant;

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

    fn logger_at(min: Severity) -> (Arc<Logger>, Memory) {
        let memory = Memory::default();
        let logger = Logger::builder()
            .sink(LevelGate::at(min), memory.clone())
            .build();
        (Arc::new(logger), memory)
    }

    #[test]
    fn test_orm_slow_statement_is_warn_with_fields() {
        let (logger, memory) = logger_at(Severity::Debug);
        let orm = QueryLogger::orm(logger);

        let args = [SqlArg::from(42)];
        let event = TraceEvent::new("SELECT * FROM users WHERE id = ?", Instant::now())
            .with_args(&args)
            .with_duration(Duration::from_millis(300))
            .with_rows(1);
        orm.after_statement(&event);

        let records = memory.0.lock();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].severity(), Severity::Warn);
        assert_eq!(records[0].message(), ORM_PREFIX);
        assert_eq!(
            records[0].fields().get("SQL"),
            Some(&FieldValue::String("SELECT * FROM users WHERE id = 42".into()))
        );
        assert_eq!(records[0].fields().get("Rows"), Some(&FieldValue::Int(1)));
        assert_eq!(
            records[0].fields().get("Latency"),
            Some(&FieldValue::String("300ms".into()))
        );
    }

    #[test]
    fn test_orm_not_found_is_not_an_error() {
        let (logger, memory) = logger_at(Severity::Debug);
        let orm = QueryLogger::orm(logger);

        let err = RecordNotFound;
        let event = TraceEvent::new("SELECT 1", Instant::now())
            .with_duration(Duration::from_millis(1))
            .with_error(&err);
        orm.after_statement(&event);

        let records = memory.0.lock();
        assert_eq!(records[0].severity(), Severity::Info);
        assert_eq!(
            records[0].fields().get("Error"),
            Some(&FieldValue::String("record not found".into()))
        );
    }

    #[test]
    fn test_sql_engine_error_carries_caller() {
        let (logger, memory) = logger_at(Severity::Info);
        let sql = QueryLogger::sql_engine(logger);

        let err = std::io::Error::new(std::io::ErrorKind::Other, "deadlock detected");
        let event = TraceEvent::new("UPDATE t SET a = 1", Instant::now()).with_error(&err);
        sql.after_sql(&event);

        let records = memory.0.lock();
        assert_eq!(records[0].severity(), Severity::Error);
        assert_eq!(records[0].message(), SQL_PREFIX);
        assert!(records[0].fields().get("caller").is_some());
        assert!(records[0].fields().get("Rows").is_none());
    }

    #[test]
    fn test_show_sql_off_suppresses_statements_only() {
        let (logger, memory) = logger_at(Severity::Debug);
        let sql = QueryLogger::sql_engine(logger);

        sql.show_sql(false);
        assert!(!sql.is_show_sql());
        sql.after_sql(&TraceEvent::new("SELECT 1", Instant::now()));
        sql.infof(format_args!("connected to {}", "db1"));

        let records = memory.0.lock();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message(), "connected to db1");
    }

    #[test]
    fn test_gated_out_statement_is_not_formatted() {
        let (logger, memory) = logger_at(Severity::Error);
        let formatted = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&formatted);
        let orm = QueryLogger::orm(logger).with_formatter(move |sql: &str, _: &[SqlArg]| {
            flag.store(true, Ordering::Relaxed);
            sql.to_string()
        });

        orm.after_statement(&TraceEvent::new("SELECT 1", Instant::now()));
        assert!(memory.0.lock().is_empty());
        assert!(!formatted.load(Ordering::Relaxed));
    }

    #[test]
    fn test_with_level_keeps_policy() {
        let (logger, _) = logger_at(Severity::Debug);
        let orm = QueryLogger::orm(logger);
        let quiet = orm.with_level(TraceLevel::Error);

        assert_eq!(quiet.log_level(), TraceLevel::Error);
        assert_eq!(quiet.policy().slow_threshold, Duration::from_millis(200));
        assert!(quiet.policy().ignore_not_found);
        assert_eq!(orm.log_level(), TraceLevel::Warn);
    }

    #[test]
    fn test_orm_message_methods_respect_level() {
        let (logger, memory) = logger_at(Severity::Debug);
        let orm = QueryLogger::orm(logger);

        OrmLogger::info(&orm, "migrations up to date");
        OrmLogger::warn(&orm, "deprecated column");
        assert_eq!(memory.0.lock().len(), 1);

        orm.set_log_level(TraceLevel::Info);
        OrmLogger::info(&orm, "migrations up to date");
        assert_eq!(memory.0.lock().len(), 2);
    }

    #[test]
    fn test_sql_level_reporting() {
        let (logger, _) = logger_at(Severity::Warn);
        let sql = QueryLogger::sql_engine(logger);
        assert_eq!(sql.level(), SqlLogLevel::Warning);

        sql.set_level(SqlLogLevel::Err);
        assert_eq!(sql.level(), SqlLogLevel::Err);

        sql.set_level(SqlLogLevel::Off);
        assert_eq!(sql.level(), SqlLogLevel::Off);

        let quiet = QueryLogger::sql_engine(Arc::new(Logger::new()));
        assert_eq!(quiet.level(), SqlLogLevel::Unknown);
    }
}
