//! Timestamp formatting utilities
//!
//! Provides the timestamp formats sinks use when encoding records, and the inverse
//! parsing used when a file record is read back.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp format options
///
/// # Examples
///
/// ```
/// use rust_trace_logger::core::TimestampFormat;
/// use chrono::Utc;
///
/// let format = TimestampFormat::Iso8601;
/// let timestamp = format.format(&Utc::now());
/// assert!(timestamp.ends_with('Z'));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampFormat {
    /// ISO 8601 with milliseconds in UTC: `2025-01-08T10:30:45.123Z`
    #[default]
    Iso8601,

    /// RFC 3339 in local time, second precision: `2025-01-08T18:30:45+08:00`
    Rfc3339Local,

    /// Local wall-clock time without zone: `2025-01-08 18:30:45`
    Layout,

    /// Unix timestamp in milliseconds: `1736332245123`
    UnixMillis,

    /// Custom strftime format
    ///
    /// ```
    /// use rust_trace_logger::core::TimestampFormat;
    ///
    /// let format = TimestampFormat::Custom("%d/%b/%Y:%H:%M:%S %z".to_string());
    /// ```
    Custom(String),
}

impl TimestampFormat {
    /// Format a `DateTime<Utc>` according to this format
    #[must_use]
    pub fn format(&self, datetime: &DateTime<Utc>) -> String {
        match self {
            TimestampFormat::Iso8601 => datetime.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            TimestampFormat::Rfc3339Local => datetime
                .with_timezone(&Local)
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, false),
            TimestampFormat::Layout => datetime
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            TimestampFormat::UnixMillis => datetime.timestamp_millis().to_string(),
            TimestampFormat::Custom(format_str) => datetime.format(format_str).to_string(),
        }
    }

    /// JSON representation: a number for `UnixMillis`, a string otherwise.
    #[must_use]
    pub fn to_json_value(&self, datetime: &DateTime<Utc>) -> serde_json::Value {
        match self {
            TimestampFormat::UnixMillis => {
                serde_json::Value::Number(datetime.timestamp_millis().into())
            }
            _ => serde_json::Value::String(self.format(datetime)),
        }
    }

    /// Inverse of [`to_json_value`](Self::to_json_value), within the format's resolution.
    ///
    /// Custom formats are parsed with their own format string. A value without a zone
    /// is read as UTC, the zone it was formatted in. RFC 3339 is accepted as a last resort.
    #[must_use]
    pub fn parse_json_value(&self, value: &serde_json::Value) -> Option<DateTime<Utc>> {
        match (self, value) {
            (TimestampFormat::UnixMillis, serde_json::Value::Number(n)) => {
                Utc.timestamp_millis_opt(n.as_i64()?).single()
            }
            (TimestampFormat::Layout, serde_json::Value::String(s)) => {
                let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok()?;
                Local
                    .from_local_datetime(&naive)
                    .earliest()
                    .map(|local| local.with_timezone(&Utc))
            }
            (TimestampFormat::Custom(format_str), serde_json::Value::String(s)) => {
                parse_custom(s, format_str).or_else(|| {
                    DateTime::parse_from_rfc3339(s)
                        .ok()
                        .map(|parsed| parsed.with_timezone(&Utc))
                })
            }
            (_, serde_json::Value::String(s)) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|parsed| parsed.with_timezone(&Utc)),
            _ => None,
        }
    }
}

fn parse_custom(s: &str, format_str: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_str(s, format_str) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, format_str) {
        return Some(Utc.from_utc_datetime(&naive));
    }
    NaiveDate::parse_from_str(s, format_str)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}
