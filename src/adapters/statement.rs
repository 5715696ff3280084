//! Traced statements and bind-argument substitution

use chrono::{DateTime, Utc};
use std::error::Error as StdError;
use std::fmt;
use std::time::{Duration, Instant};

/// A bound statement argument
#[derive(Debug, Clone, PartialEq)]
pub enum SqlArg {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
}

impl SqlArg {
    /// SQL literal form: strings quoted with `'` doubled, `NULL` for null.
    pub fn to_literal(&self) -> String {
        match self {
            SqlArg::Null => "NULL".to_string(),
            SqlArg::Bool(b) => b.to_string(),
            SqlArg::Int(i) => i.to_string(),
            SqlArg::Float(f) => f.to_string(),
            SqlArg::Text(s) => quote(s),
            SqlArg::Bytes(bytes) => quote(&String::from_utf8_lossy(bytes)),
            SqlArg::Timestamp(ts) => quote(&ts.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

impl fmt::Display for SqlArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_literal())
    }
}

impl From<&str> for SqlArg {
    fn from(s: &str) -> Self {
        SqlArg::Text(s.to_string())
    }
}

impl From<String> for SqlArg {
    fn from(s: String) -> Self {
        SqlArg::Text(s)
    }
}

impl From<i64> for SqlArg {
    fn from(i: i64) -> Self {
        SqlArg::Int(i)
    }
}

impl From<i32> for SqlArg {
    fn from(i: i32) -> Self {
        SqlArg::Int(i64::from(i))
    }
}

impl From<f64> for SqlArg {
    fn from(f: f64) -> Self {
        SqlArg::Float(f)
    }
}

impl From<bool> for SqlArg {
    fn from(b: bool) -> Self {
        SqlArg::Bool(b)
    }
}

impl From<Vec<u8>> for SqlArg {
    fn from(bytes: Vec<u8>) -> Self {
        SqlArg::Bytes(bytes)
    }
}

impl From<DateTime<Utc>> for SqlArg {
    fn from(ts: DateTime<Utc>) -> Self {
        SqlArg::Timestamp(ts)
    }
}

impl<T: Into<SqlArg>> From<Option<T>> for SqlArg {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlArg::Null, Into::into)
    }
}

/// Turns a statement and its arguments into one printable string
pub trait StatementFormatter: Send + Sync {
    fn format(&self, sql: &str, args: &[SqlArg]) -> String;
}

impl<F> StatementFormatter for F
where
    F: Fn(&str, &[SqlArg]) -> String + Send + Sync,
{
    fn format(&self, sql: &str, args: &[SqlArg]) -> String {
        self(sql, args)
    }
}

/// Default formatter: [`bind`]
#[derive(Debug, Clone, Copy, Default)]
pub struct BindFormatter;

impl StatementFormatter for BindFormatter {
    fn format(&self, sql: &str, args: &[SqlArg]) -> String {
        bind(sql, args)
    }
}

/// Byte offsets of `?` placeholders outside quoted sections
fn placeholders(sql: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut quote: Option<char> = None;

    for (i, c) in sql.char_indices() {
        match quote {
            Some(open) if c == open => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                '?' => positions.push(i),
                _ => {}
            },
        }
    }
    positions
}

/// Substitute `?` placeholders with literal arguments.
///
/// When the number of placeholders does not match the arguments, the statement is
/// kept as is and the arguments are appended: `SELECT ... [1, 'x']`.
///
/// ```
/// use rust_trace_logger::adapters::{bind, SqlArg};
///
/// let sql = bind("SELECT * FROM users WHERE id = ? AND name = ?", &[7.into(), "o'neil".into()]);
/// assert_eq!(sql, "SELECT * FROM users WHERE id = 7 AND name = 'o''neil'");
/// ```
pub fn bind(sql: &str, args: &[SqlArg]) -> String {
    let positions = placeholders(sql);
    if positions.len() != args.len() {
        if args.is_empty() {
            return sql.to_string();
        }
        let rendered: Vec<String> = args.iter().map(SqlArg::to_literal).collect();
        return format!("{} [{}]", sql, rendered.join(", "));
    }

    let mut out = String::with_capacity(sql.len() + args.len() * 8);
    let mut last = 0;
    for (pos, arg) in positions.iter().zip(args) {
        out.push_str(&sql[last..*pos]);
        out.push_str(&arg.to_literal());
        last = pos + 1;
    }
    out.push_str(&sql[last..]);
    out
}

/// One traced statement
///
/// Borrowed from the engine for the duration of a single hook call.
#[derive(Debug, Clone, Copy)]
pub struct TraceEvent<'a> {
    pub statement: &'a str,
    pub args: &'a [SqlArg],
    pub started: Instant,
    /// Execution time measured by the engine, preferred over `started.elapsed()`
    pub duration: Option<Duration>,
    pub rows: Option<i64>,
    pub error: Option<&'a (dyn StdError + 'static)>,
}

impl<'a> TraceEvent<'a> {
    pub fn new(statement: &'a str, started: Instant) -> Self {
        Self {
            statement,
            args: &[],
            started,
            duration: None,
            rows: None,
            error: None,
        }
    }

    #[must_use]
    pub fn with_args(mut self, args: &'a [SqlArg]) -> Self {
        self.args = args;
        self
    }

    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    #[must_use]
    pub fn with_rows(mut self, rows: i64) -> Self {
        self.rows = Some(rows);
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: &'a (dyn StdError + 'static)) -> Self {
        self.error = Some(error);
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.duration.unwrap_or_else(|| self.started.elapsed())
    }
}
