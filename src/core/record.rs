//! Log record structure

use super::field::{Field, Fields};
use super::severity::Severity;
use chrono::{DateTime, Utc};

/// Immutable log record, created at the adapter boundary and shared by every sink.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    severity: Severity,
    message: String,
    timestamp: DateTime<Utc>,
    fields: Fields,
}

impl Record {
    /// Sanitize log message to prevent log injection attacks
    ///
    /// Replaces newlines, carriage returns, and tabs with escape sequences
    /// to prevent attackers from injecting fake log entries.
    fn sanitize_message(message: &str) -> String {
        message
            .replace('\n', "\\n")
            .replace('\r', "\\r")
            .replace('\t', "\\t")
    }

    pub fn new(severity: Severity, message: impl Into<String>, fields: impl Into<Fields>) -> Self {
        Self {
            severity,
            message: Self::sanitize_message(&message.into()),
            timestamp: Utc::now(),
            fields: fields.into(),
        }
    }

    /// Rebuild a record from decoded parts; the message is taken verbatim.
    pub(crate) fn from_parts(
        severity: Severity,
        message: String,
        timestamp: DateTime<Utc>,
        fields: Fields,
    ) -> Self {
        Self {
            severity,
            message,
            timestamp,
            fields,
        }
    }

    /// Append a field before the record is handed to the sinks.
    #[must_use]
    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn timestamp(&self) -> &DateTime<Utc> {
        &self.timestamp
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }
}
