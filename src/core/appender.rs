//! Appender trait for log output destinations

use super::{error::Result, record::Record};

/// Encoder plus writer of one sink.
///
/// Appenders are driven through a [`Sink`](super::sink::Sink), which owns the level gate
/// and serializes calls, so `append` receives one record at a time.
pub trait Appender: Send {
    fn append(&mut self, record: &Record) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    fn name(&self) -> &str;
}
