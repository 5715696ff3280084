//! Record encodings used by the sinks
//!
//! - Text: human-readable line for terminals, optionally colorized
//! - Json: one object per line for files, parseable back into a [`Record`]
//!
//! JSON field keys are escaped so that every record maps to a distinct line:
//! - keys equal to a header key, or starting with `_` or `~`, gain a `_` prefix
//! - the n-th repeat (n >= 1) of a key is written as `~n~<key>`

use super::error::{LoggerError, Result};
use super::field::{Field, FieldValue, Fields};
use super::record::Record;
use super::severity::Severity;
use super::timestamp::TimestampFormat;
use std::collections::HashMap;

/// Keys written ahead of the record fields in JSON output
pub const TIMESTAMP_KEY: &str = "ts";
pub const LEVEL_KEY: &str = "level";
pub const MESSAGE_KEY: &str = "msg";

const ESCAPE_MARK: char = '_';
const REPEAT_MARK: char = '~';

/// Output format for records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    ///
    /// Example: `2025-01-08T10:30:45.123Z WARN [ORM] SQL="SELECT 1" Latency=250ms`
    #[default]
    Text,

    /// JSON format for machine processing
    ///
    /// Example: `{"ts":"2025-01-08T10:30:45.123Z","level":"WARN","msg":"[ORM]","SQL":"SELECT 1"}`
    Json,
}

impl OutputFormat {
    /// Encode a record according to this output format, without trailing newline
    pub fn format(&self, record: &Record, timestamp_format: &TimestampFormat) -> String {
        match self {
            OutputFormat::Text => format_text(record, timestamp_format, false),
            OutputFormat::Json => format_json(record, timestamp_format),
        }
    }

    /// Parse one JSON line produced by [`OutputFormat::Json`] back into a record.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::DecodeError`] when the line is not a JSON object or lacks a
    /// valid level, message or timestamp.
    pub fn decode_json(line: &str, timestamp_format: &TimestampFormat) -> Result<Record> {
        let value: serde_json::Value = serde_json::from_str(line.trim())?;
        let serde_json::Value::Object(object) = value else {
            return Err(LoggerError::decode("JSON", "not an object"));
        };

        // One ordered pass: removing header keys from the map would reorder the rest.
        let mut level = None;
        let mut message = None;
        let mut ts = None;
        let mut fields = Fields::new();
        for (key, value) in object {
            match key.as_str() {
                LEVEL_KEY => level = Some(value),
                MESSAGE_KEY => message = Some(value),
                TIMESTAMP_KEY => ts = Some(value),
                _ => fields.push(Field::new(decode_key(key)?, FieldValue::from_json_value(value))),
            }
        }

        let severity: Severity = match level {
            Some(serde_json::Value::String(name)) => name.parse()?,
            _ => return Err(LoggerError::decode("JSON", "missing level")),
        };
        let message = match message {
            Some(serde_json::Value::String(msg)) => msg,
            _ => return Err(LoggerError::decode("JSON", "missing msg")),
        };
        let timestamp = ts
            .and_then(|ts| timestamp_format.parse_json_value(&ts))
            .ok_or_else(|| LoggerError::decode("JSON", "missing or malformed ts"))?;

        Ok(Record::from_parts(severity, message, timestamp, fields))
    }
}

/// `<ts> <LEVEL> <message> key=value ...`
pub(crate) fn format_text(
    record: &Record,
    timestamp_format: &TimestampFormat,
    colorize: bool,
) -> String {
    let mut line = format!(
        "{} {} {}",
        timestamp_format.format(record.timestamp()),
        level_label(record.severity(), colorize),
        record.message()
    );

    for field in record.fields() {
        line.push(' ');
        line.push_str(&field.key);
        line.push('=');
        line.push_str(&text_value(&field.value));
    }

    line
}

#[cfg(feature = "console")]
fn level_label(severity: Severity, colorize: bool) -> String {
    use colored::Colorize;

    if colorize {
        severity.to_str().color(severity.color_code()).to_string()
    } else {
        severity.to_str().to_string()
    }
}

#[cfg(not(feature = "console"))]
fn level_label(severity: Severity, _colorize: bool) -> String {
    severity.to_str().to_string()
}

fn text_value(value: &FieldValue) -> String {
    match value {
        FieldValue::String(s) => {
            let escaped = s
                .replace('\\', "\\\\")
                .replace('\n', "\\n")
                .replace('\r', "\\r")
                .replace('\t', "\\t");
            if escaped.is_empty()
                || escaped.contains(char::is_whitespace)
                || escaped.contains('=')
                || escaped.contains('"')
            {
                format!("\"{}\"", escaped.replace('"', "\\\""))
            } else {
                escaped
            }
        }
        other => other.to_string(),
    }
}

fn format_json(record: &Record, timestamp_format: &TimestampFormat) -> String {
    let mut json_obj = serde_json::Map::new();

    json_obj.insert(
        TIMESTAMP_KEY.to_string(),
        timestamp_format.to_json_value(record.timestamp()),
    );
    json_obj.insert(
        LEVEL_KEY.to_string(),
        serde_json::Value::String(record.severity().to_str().to_string()),
    );
    json_obj.insert(
        MESSAGE_KEY.to_string(),
        serde_json::Value::String(record.message().to_string()),
    );

    let mut seen: HashMap<&str, usize> = HashMap::new();
    for field in record.fields() {
        let repeat = seen.entry(field.key.as_str()).or_insert(0);
        json_obj.insert(encode_key(&field.key, *repeat), field.value.to_json_value());
        *repeat += 1;
    }

    serde_json::to_string(&serde_json::Value::Object(json_obj)).unwrap_or_default()
}

fn encode_key(key: &str, repeat: usize) -> String {
    if repeat > 0 {
        return format!("{}{}{}{}", REPEAT_MARK, repeat, REPEAT_MARK, key);
    }
    match key {
        TIMESTAMP_KEY | LEVEL_KEY | MESSAGE_KEY => format!("{}{}", ESCAPE_MARK, key),
        _ if key.starts_with(ESCAPE_MARK) || key.starts_with(REPEAT_MARK) => {
            format!("{}{}", ESCAPE_MARK, key)
        }
        _ => key.to_string(),
    }
}

fn decode_key(key: String) -> Result<String> {
    if let Some(escaped) = key.strip_prefix(ESCAPE_MARK) {
        return Ok(escaped.to_string());
    }
    if let Some(rest) = key.strip_prefix(REPEAT_MARK) {
        return match rest.split_once(REPEAT_MARK) {
            Some((n, original)) if !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) => {
                Ok(original.to_string())
            }
            _ => Err(LoggerError::decode("JSON", format!("malformed repeated key '{}'", key))),
        };
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sample() -> Record {
        Record::new(
            Severity::Warn,
            "[ORM]",
            [
                Field::string("SQL", "SELECT * FROM users WHERE id = 7"),
                Field::int("Rows", 1),
                Field::duration("Latency", Duration::from_millis(250)),
            ],
        )
    }

    #[test]
    fn test_text_format() {
        let line = OutputFormat::Text.format(&sample(), &TimestampFormat::Iso8601);

        assert!(line.contains(" WARN [ORM] "));
        assert!(line.contains("SQL=\"SELECT * FROM users WHERE id = 7\""));
        assert!(line.ends_with("Rows=1 Latency=250ms"));
    }

    #[test]
    fn test_text_escapes_embedded_newlines() {
        let record = Record::new(
            Severity::Error,
            "[Recovery]",
            [Field::string("Stack", "frame 1\nframe 2")],
        );
        let line = OutputFormat::Text.format(&record, &TimestampFormat::Iso8601);
        assert!(!line.contains('\n'));
        assert!(line.contains("Stack=\"frame 1\\nframe 2\""));
    }

    #[test]
    fn test_json_keeps_field_order() {
        let line = OutputFormat::Json.format(&sample(), &TimestampFormat::Iso8601);

        let ts = line.find("\"ts\"").unwrap();
        let sql = line.find("\"SQL\"").unwrap();
        let rows = line.find("\"Rows\"").unwrap();
        let latency = line.find("\"Latency\"").unwrap();
        assert!(ts < sql && sql < rows && rows < latency);

        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["level"], "WARN");
        assert_eq!(parsed["msg"], "[ORM]");
        assert_eq!(parsed["Rows"], 1);
    }

    #[test]
    fn test_json_round_trip() {
        let record = sample().with_field(Field::any("args", &vec!["a", "b"]));
        let format = TimestampFormat::Iso8601;
        let line = OutputFormat::Json.format(&record, &format);

        let decoded = OutputFormat::decode_json(&line, &format).unwrap();
        assert_eq!(decoded.severity(), record.severity());
        assert_eq!(decoded.message(), record.message());
        assert_eq!(decoded.fields(), record.fields());
        assert_eq!(
            decoded.timestamp().timestamp_millis(),
            record.timestamp().timestamp_millis()
        );
    }

    #[test]
    fn test_reserved_keys_do_not_clobber_header() {
        let record = Record::new(Severity::Info, "hello", [Field::string("msg", "other")]);
        let line = OutputFormat::Json.format(&record, &TimestampFormat::Iso8601);
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["msg"], "hello");
        assert_eq!(parsed["_msg"], "other");

        let decoded = OutputFormat::decode_json(&line, &TimestampFormat::Iso8601).unwrap();
        assert_eq!(decoded.fields(), record.fields());
    }

    #[test]
    fn test_repeated_and_marked_keys_survive_decode() {
        let record = Record::new(
            Severity::Error,
            "x",
            [
                Field::int("k", 1),
                Field::int("k", 2),
                Field::string("caller", "upstream-service"),
                Field::string("_k", "underscore"),
                Field::string("~1~k", "looks repeated"),
                Field::string("ts", "user ts"),
                Field::string("caller", "handlers.rs:12"),
                Field::int("k", 3),
            ],
        );
        let format = TimestampFormat::Iso8601;
        let line = OutputFormat::Json.format(&record, &format);
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["k"], 1);
        assert_eq!(parsed["~1~k"], 2);
        assert_eq!(parsed["~2~k"], 3);
        assert_eq!(parsed["~1~caller"], "handlers.rs:12");
        assert_eq!(parsed["__k"], "underscore");
        assert_eq!(parsed["_~1~k"], "looks repeated");

        let decoded = OutputFormat::decode_json(&line, &format).unwrap();
        assert_eq!(decoded.fields(), record.fields());
    }

    #[test]
    fn test_decode_rejects_malformed_repeat_key() {
        let format = TimestampFormat::Iso8601;
        let line = r#"{"ts":"2025-01-08T10:30:45.123Z","level":"INFO","msg":"x","~k":1}"#;
        assert!(OutputFormat::decode_json(line, &format).is_err());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let format = TimestampFormat::Iso8601;
        assert!(OutputFormat::decode_json("not json", &format).is_err());
        assert!(OutputFormat::decode_json("[1,2]", &format).is_err());
        assert!(OutputFormat::decode_json(r#"{"level":"LOUD","msg":"x"}"#, &format).is_err());
    }

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Text);
    }
}
