//! Error types for the logger system

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// Unparseable severity name
    #[error("Invalid log level: '{0}'")]
    InvalidLevel(String),

    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// File appender error with path
    #[error("File appender error for '{path}': {message}")]
    FileAppenderError { path: String, message: String },

    /// File rotation error
    #[error("File rotation failed for '{path}': {message}")]
    FileRotationError { path: String, message: String },

    /// Writer error (generic)
    #[error("Writer error: {0}")]
    WriterError(String),

    /// An encoded record could not be parsed back
    #[error("Cannot decode {format_type} record: {message}")]
    DecodeError {
        format_type: String,
        message: String,
    },
}

impl LoggerError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        LoggerError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create an invalid level error
    pub fn invalid_level(name: impl Into<String>) -> Self {
        LoggerError::InvalidLevel(name.into())
    }

    /// Create a file appender error
    pub fn file_appender(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileAppenderError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a file rotation error
    pub fn file_rotation(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileRotationError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode(format_type: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::DecodeError {
            format_type: format_type.into(),
            message: message.into(),
        }
    }

    /// Create a writer error (generic)
    pub fn writer<S: Into<String>>(msg: S) -> Self {
        LoggerError::WriterError(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = LoggerError::invalid_level("verbose");
        assert!(matches!(err, LoggerError::InvalidLevel(_)));

        let err = LoggerError::file_appender("/var/log/app.log", "Permission denied");
        assert!(matches!(err, LoggerError::FileAppenderError { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = LoggerError::invalid_level("verbose");
        assert_eq!(err.to_string(), "Invalid log level: 'verbose'");

        let err = LoggerError::file_rotation("/var/log/app.log", "Disk full");
        assert_eq!(
            err.to_string(),
            "File rotation failed for '/var/log/app.log': Disk full"
        );

        let err = LoggerError::decode("JSON", "missing field `level`");
        assert_eq!(
            err.to_string(),
            "Cannot decode JSON record: missing field `level`"
        );
    }

    #[test]
    fn test_io_operation_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = LoggerError::io_operation("writing log file", "cannot write to file", io_err);

        assert!(matches!(err, LoggerError::IoOperation { .. }));
        assert!(err.to_string().contains("writing log file"));
        assert!(err.to_string().contains("cannot write to file"));
    }
}
