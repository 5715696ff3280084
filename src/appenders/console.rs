//! Console appender implementation

use crate::core::encoding::{format_text, OutputFormat};
use crate::core::{Appender, LoggerError, Record, Result, TimestampFormat};
use std::io::{self, Write};

enum Target {
    Stderr,
    Stdout,
    Writer(Box<dyn Write + Send>),
}

/// Human-readable sink for terminals
///
/// Writes to a locked stderr by default. Each record is written with a single
/// `write_all` while the stream lock is held.
pub struct ConsoleAppender {
    target: Target,
    use_colors: bool,
    timestamp_format: TimestampFormat,
    output_format: OutputFormat,
}

impl ConsoleAppender {
    pub fn new() -> Self {
        Self {
            target: Target::Stderr,
            use_colors: cfg!(feature = "console"),
            timestamp_format: TimestampFormat::default(),
            output_format: OutputFormat::Text,
        }
    }

    /// Write to stdout instead of stderr
    pub fn stdout() -> Self {
        Self {
            target: Target::Stdout,
            ..Self::new()
        }
    }

    /// Write to an arbitrary destination; colors start disabled.
    pub fn with_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            target: Target::Writer(Box::new(writer)),
            use_colors: false,
            ..Self::new()
        }
    }

    /// Enable or disable level colors (no effect without the `console` feature)
    #[must_use]
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    /// Set the output format for this appender
    ///
    /// # Example
    ///
    /// ```
    /// use rust_trace_logger::appenders::ConsoleAppender;
    /// use rust_trace_logger::OutputFormat;
    ///
    /// let appender = ConsoleAppender::new()
    ///     .with_output_format(OutputFormat::Json);
    /// ```
    #[must_use]
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Set the timestamp format for this appender
    ///
    /// # Examples
    ///
    /// ```
    /// use rust_trace_logger::appenders::ConsoleAppender;
    /// use rust_trace_logger::TimestampFormat;
    ///
    /// let appender = ConsoleAppender::new()
    ///     .with_timestamp_format(TimestampFormat::Rfc3339Local);
    /// ```
    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    fn render(&self, record: &Record) -> String {
        let mut line = match self.output_format {
            OutputFormat::Text => format_text(record, &self.timestamp_format, self.use_colors),
            OutputFormat::Json => self.output_format.format(record, &self.timestamp_format),
        };
        line.push('\n');
        line
    }
}

impl Default for ConsoleAppender {
    fn default() -> Self {
        Self::new()
    }
}

impl Appender for ConsoleAppender {
    fn append(&mut self, record: &Record) -> Result<()> {
        let line = self.render(record);
        let written = match &mut self.target {
            Target::Stderr => io::stderr().lock().write_all(line.as_bytes()),
            Target::Stdout => io::stdout().lock().write_all(line.as_bytes()),
            Target::Writer(writer) => writer.write_all(line.as_bytes()),
        };
        written.map_err(|e| LoggerError::io_operation("write console record", self.name(), e))
    }

    fn flush(&mut self) -> Result<()> {
        match &mut self.target {
            Target::Stderr => io::stderr().flush()?,
            Target::Stdout => io::stdout().flush()?,
            Target::Writer(writer) => writer.flush()?,
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Field, Severity};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Shared {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().clone()).unwrap()
        }
    }

    #[test]
    fn test_writes_one_line_per_record() {
        let buffer = Shared::default();
        let mut appender = ConsoleAppender::with_writer(buffer.clone());

        let record = Record::new(
            Severity::Error,
            "[HTTP]",
            [Field::string("Path", "/api?id=1"), Field::int("Code", 500)],
        );
        appender.append(&record).unwrap();
        appender.append(&Record::new(Severity::Info, "second", ())).unwrap();

        let output = buffer.contents();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("ERROR [HTTP] Path=\"/api?id=1\" Code=500"));
        assert!(lines[1].ends_with("INFO second"));
    }

    #[test]
    fn test_json_output() {
        let buffer = Shared::default();
        let mut appender =
            ConsoleAppender::with_writer(buffer.clone()).with_output_format(OutputFormat::Json);

        appender.append(&Record::new(Severity::Warn, "slow", ())).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(buffer.contents().trim()).unwrap();
        assert_eq!(parsed["level"], "WARN");
    }

    #[cfg(feature = "console")]
    #[test]
    fn test_colors_wrap_level() {
        colored::control::set_override(true);
        let buffer = Shared::default();
        let mut appender = ConsoleAppender::with_writer(buffer.clone()).with_colors(true);

        appender.append(&Record::new(Severity::Error, "red", ())).unwrap();
        assert!(buffer.contents().contains("\u{1b}["));
    }
}
