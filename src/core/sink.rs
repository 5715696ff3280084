//! Sink: one destination with its own level gate

use super::appender::Appender;
use super::error::{LoggerError, Result};
use super::level_gate::LevelGate;
use super::record::Record;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Gate plus appender. The appender sits behind a mutex so a single record is never
/// interleaved with another on the same destination.
pub struct Sink {
    gate: LevelGate,
    appender: Mutex<Box<dyn Appender>>,
}

impl Sink {
    pub fn new(gate: LevelGate, appender: Box<dyn Appender>) -> Self {
        Self {
            gate,
            appender: Mutex::new(appender),
        }
    }

    pub fn gate(&self) -> LevelGate {
        self.gate
    }

    pub fn name(&self) -> String {
        self.appender.lock().name().to_string()
    }

    /// Write `record` if the gate accepts it. Returns `Ok(false)` when gated out.
    ///
    /// A panicking appender is reported as [`LoggerError::WriterError`].
    pub fn write(&self, record: &Record) -> Result<bool> {
        if !self.gate.accepts(record.severity()) {
            return Ok(false);
        }

        let mut appender = self.appender.lock();
        match catch_unwind(AssertUnwindSafe(|| appender.append(record))) {
            Ok(result) => result.map(|()| true),
            Err(panic_info) => Err(LoggerError::writer(format!(
                "appender '{}' panicked: {}",
                appender.name(),
                panic_message(panic_info.as_ref())
            ))),
        }
    }

    pub fn flush(&self) -> Result<()> {
        let mut appender = self.appender.lock();
        match catch_unwind(AssertUnwindSafe(|| appender.flush())) {
            Ok(result) => result,
            Err(panic_info) => Err(LoggerError::writer(format!(
                "appender '{}' panicked during flush: {}",
                appender.name(),
                panic_message(panic_info.as_ref())
            ))),
        }
    }
}

impl std::fmt::Debug for Sink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sink")
            .field("gate", &self.gate)
            .field("appender", &self.name())
            .finish()
    }
}

pub(crate) fn panic_message(panic_info: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
