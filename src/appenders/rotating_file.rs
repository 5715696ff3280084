//! Rotating file appender with automatic log rotation
//!
//! Records are written one JSON object per line (see [`OutputFormat::Json`]). The active
//! file is renamed to `<file>.1` when a rotation triggers; older backups shift up to
//! `<file>.N`, optionally gzip-compressed to `<file>.N.gz`.

use crate::core::appender::Appender;
use crate::core::encoding::OutputFormat;
use crate::core::error::{LoggerError, Result};
use crate::core::record::Record;
use crate::core::timestamp::TimestampFormat;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

const BYTES_PER_MEGABYTE: u64 = 1024 * 1024;
const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Rotation strategy defining when to rotate log files
///
/// # Examples
///
/// ```
/// use rust_trace_logger::appenders::RotationStrategy;
/// use std::time::Duration;
///
/// // Rotate when the next record would push the file past 100 MB
/// let size_strategy = RotationStrategy::Size { max_bytes: 100 * 1024 * 1024 };
///
/// // Rotate every hour
/// let time_strategy = RotationStrategy::Time { interval: Duration::from_secs(3600) };
///
/// // Rotate on size OR time, whichever comes first
/// let hybrid_strategy = RotationStrategy::Hybrid {
///     max_bytes: 50 * 1024 * 1024,
///     interval: Duration::from_secs(24 * 3600),
/// };
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RotationStrategy {
    /// Rotate when the file would exceed size in bytes
    Size { max_bytes: u64 },

    /// Rotate at time interval
    Time { interval: Duration },

    /// Rotate on size OR time, whichever comes first
    Hybrid { max_bytes: u64, interval: Duration },

    /// No rotation (useful for testing or when external rotation is used)
    Never,
}

impl Default for RotationStrategy {
    fn default() -> Self {
        RotationStrategy::Size {
            max_bytes: 100 * BYTES_PER_MEGABYTE,
        }
    }
}

impl RotationStrategy {
    #[must_use]
    pub fn size(max_bytes: u64) -> Self {
        RotationStrategy::Size { max_bytes }
    }

    /// Size strategy from a megabyte count; `0` means the 100 MB default.
    #[must_use]
    pub fn megabytes(max_size_mb: u64) -> Self {
        match max_size_mb {
            0 => RotationStrategy::default(),
            mb => RotationStrategy::Size {
                max_bytes: mb.saturating_mul(BYTES_PER_MEGABYTE),
            },
        }
    }

    #[must_use]
    pub fn time(interval: Duration) -> Self {
        RotationStrategy::Time { interval }
    }

    /// Create a hybrid rotation strategy (size OR time)
    #[must_use]
    pub fn hybrid(max_bytes: u64, interval: Duration) -> Self {
        RotationStrategy::Hybrid { max_bytes, interval }
    }

    #[must_use]
    pub fn never() -> Self {
        RotationStrategy::Never
    }
}

/// Configuration for rotating file appender
///
/// # Examples
///
/// ```
/// use rust_trace_logger::appenders::{RotationPolicy, RotationStrategy};
/// use std::time::Duration;
///
/// // 50 MB files, seven backups, compressed, nothing older than a week
/// let policy = RotationPolicy::new()
///     .with_strategy(RotationStrategy::Size { max_bytes: 50 * 1024 * 1024 })
///     .with_max_backups(7)
///     .with_max_age(Duration::from_secs(7 * 24 * 3600))
///     .with_compression(true);
/// ```
#[derive(Debug, Clone)]
pub struct RotationPolicy {
    /// Rotation strategy defining when to rotate
    pub strategy: RotationStrategy,
    /// Maximum number of rotated files to keep; `0` keeps all of them
    pub max_backup_files: usize,
    /// Backups last modified longer ago than this are removed after a rotation
    pub max_age: Option<Duration>,
    /// Whether to compress rotated files
    pub compress: bool,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            strategy: RotationStrategy::default(),
            max_backup_files: 0,
            max_age: None,
            compress: false,
        }
    }
}

impl RotationPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_strategy(mut self, strategy: RotationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set maximum file size (convenience method for size-based rotation)
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_size(mut self, size: u64) -> Self {
        self.strategy = RotationStrategy::Size { max_bytes: size };
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_backups(mut self, count: usize) -> Self {
        self.max_backup_files = count;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_age(mut self, age: Duration) -> Self {
        self.max_age = Some(age);
        self
    }

    /// Age limit in whole days; `0` disables age-based removal.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_age_days(mut self, days: u32) -> Self {
        self.max_age = match days {
            0 => None,
            days => Some(Duration::from_secs(u64::from(days) * SECONDS_PER_DAY)),
        };
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }

    /// Get the maximum file size if using size-based rotation
    #[must_use]
    pub fn max_file_size(&self) -> Option<u64> {
        match &self.strategy {
            RotationStrategy::Size { max_bytes } => Some(*max_bytes),
            RotationStrategy::Hybrid { max_bytes, .. } => Some(*max_bytes),
            _ => None,
        }
    }
}

/// File sink writing machine-parseable records with rotation
///
/// # Examples
///
/// ```no_run
/// use rust_trace_logger::appenders::{RotatingFileAppender, RotationPolicy};
///
/// let policy = RotationPolicy::new()
///     .with_max_size(10 * 1024 * 1024)
///     .with_max_backups(5)
///     .with_max_age_days(30);
/// let appender = RotatingFileAppender::with_policy("/var/log/app.log", policy).unwrap();
/// ```
pub struct RotatingFileAppender {
    base_path: PathBuf,
    policy: RotationPolicy,
    writer: Option<BufWriter<File>>,
    current_size: u64,
    /// Timestamp of the last rotation (used for time-based strategies)
    last_rotation: SystemTime,
    /// Counter for consecutive deletion failures (reset on successful deletion)
    deletion_failure_count: usize,
    format: OutputFormat,
    timestamp_format: TimestampFormat,
}

impl RotatingFileAppender {
    /// Create a new rotating file appender with the default policy
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be created or opened
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_policy(path, RotationPolicy::default())
    }

    /// Create a new rotating file appender with custom policy
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be created or opened
    pub fn with_policy<P: AsRef<Path>>(path: P, policy: RotationPolicy) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();

        if let Some(parent) = base_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                LoggerError::io_operation(
                    "create log directory",
                    format!("Failed to create directory '{}'", parent.display()),
                    e,
                )
            })?;
        }

        let (file, current_size, last_rotation) = Self::open_file(&base_path)?;

        #[cfg(not(feature = "compression"))]
        if policy.compress {
            eprintln!(
                "[WARN] Compression requested for {} but the `compression` feature is disabled; \
                 backups stay uncompressed.",
                base_path.display()
            );
        }

        Ok(Self {
            base_path,
            policy,
            writer: Some(BufWriter::new(file)),
            current_size,
            last_rotation,
            deletion_failure_count: 0,
            format: OutputFormat::Json,
            timestamp_format: TimestampFormat::default(),
        })
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    /// Switch the line encoding (JSON by default)
    #[must_use]
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    fn open_file(path: &Path) -> Result<(File, u64, SystemTime)> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                LoggerError::file_appender(
                    path.display().to_string(),
                    format!("Failed to open: {}", e),
                )
            })?;

        let metadata = file.metadata().map_err(|e| {
            LoggerError::file_appender(
                path.display().to_string(),
                format!("Cannot access file metadata: {}", e),
            )
        })?;
        // Use file modification time as last rotation time, or current time if unavailable
        let last_rotation = metadata.modified().unwrap_or_else(|_| SystemTime::now());
        Ok((file, metadata.len(), last_rotation))
    }

    /// Check if rotation is needed before writing `incoming` bytes
    fn should_rotate(&self, incoming: u64) -> bool {
        let size_exceeded = |max_bytes: u64| {
            self.current_size > 0 && self.current_size.saturating_add(incoming) > max_bytes
        };
        let time_exceeded = |interval: Duration| {
            SystemTime::now()
                .duration_since(self.last_rotation)
                .unwrap_or(Duration::ZERO)
                >= interval
        };

        match &self.policy.strategy {
            RotationStrategy::Never => false,
            RotationStrategy::Size { max_bytes } => size_exceeded(*max_bytes),
            RotationStrategy::Time { interval } => self.current_size > 0 && time_exceeded(*interval),
            RotationStrategy::Hybrid { max_bytes, interval } => {
                size_exceeded(*max_bytes) || (self.current_size > 0 && time_exceeded(*interval))
            }
        }
    }

    /// Perform log rotation
    fn rotate(&mut self) -> Result<()> {
        // Explicitly drop writer to release file handle before renaming
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| {
                LoggerError::file_rotation(
                    self.base_path.display().to_string(),
                    format!("Failed to flush before rotation: {}", e),
                )
            })?;
        }

        let highest = match self.policy.max_backup_files {
            0 => self.highest_backup_index(),
            max => {
                self.remove_backup(max)?;
                max - 1
            }
        };

        for i in (1..=highest).rev() {
            self.shift_backup(i)?;
        }

        let backup_path = self.backup_path(1);
        if self.base_path.exists() {
            fs::rename(&self.base_path, &backup_path).map_err(|e| {
                LoggerError::file_rotation(
                    self.base_path.display().to_string(),
                    format!("Failed to rotate current log file: {}", e),
                )
            })?;

            if self.policy.compress {
                self.compress_file(&backup_path)?;
            }
        }

        let (file, _, _) = Self::open_file(&self.base_path).map_err(|e| {
            LoggerError::file_rotation(
                self.base_path.display().to_string(),
                format!("Failed to create new log file: {}", e),
            )
        })?;

        self.writer = Some(BufWriter::new(file));
        self.current_size = 0;
        self.last_rotation = SystemTime::now();

        if let Some(max_age) = self.policy.max_age {
            self.remove_expired_backups(max_age);
        }

        Ok(())
    }

    /// Remove the backup at `index`, counting consecutive failures.
    fn remove_backup(&mut self, index: usize) -> Result<()> {
        const MAX_DELETION_FAILURES: usize = 5;
        let mut deletion_failed = false;

        for path in [self.backup_path(index), self.compressed_path(index)] {
            if !path.exists() {
                continue;
            }
            if let Err(e) = fs::remove_file(&path) {
                deletion_failed = true;
                eprintln!(
                    "[WARN] Failed to remove oldest backup {}: {} (failure #{}/{})",
                    path.display(),
                    e,
                    self.deletion_failure_count + 1,
                    MAX_DELETION_FAILURES
                );
            }
        }

        if deletion_failed {
            self.deletion_failure_count += 1;
            if self.deletion_failure_count >= MAX_DELETION_FAILURES {
                return Err(LoggerError::file_rotation(
                    self.base_path.display().to_string(),
                    format!(
                        "Rotation aborted: failed to delete old backup files {} consecutive times",
                        self.deletion_failure_count
                    ),
                ));
            }
        } else {
            self.deletion_failure_count = 0;
        }

        Ok(())
    }

    /// Move backup `index` (plain or compressed) to `index + 1`.
    fn shift_backup(&self, index: usize) -> Result<()> {
        let pairs = [
            (self.compressed_path(index), self.compressed_path(index + 1)),
            (self.backup_path(index), self.backup_path(index + 1)),
        ];

        for (old_path, new_path) in pairs {
            if !old_path.exists() {
                continue;
            }
            if fs::rename(&old_path, &new_path).is_err() {
                // Some platforms refuse to rename over an existing file
                if new_path.exists() {
                    let _ = fs::remove_file(&new_path);
                }
                fs::rename(&old_path, &new_path).map_err(|e| {
                    LoggerError::file_rotation(
                        old_path.display().to_string(),
                        format!("Failed to rotate backup files: {}", e),
                    )
                })?;
            }
        }

        Ok(())
    }

    fn highest_backup_index(&self) -> usize {
        let mut index = 0;
        while self.backup_path(index + 1).exists() || self.compressed_path(index + 1).exists() {
            index += 1;
        }
        index
    }

    fn remove_expired_backups(&self, max_age: Duration) {
        let now = SystemTime::now();
        for path in self.existing_backups() {
            let expired = fs::metadata(&path)
                .and_then(|meta| meta.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .is_some_and(|age| age > max_age);

            if expired {
                if let Err(e) = fs::remove_file(&path) {
                    eprintln!("[WARN] Failed to remove expired backup {}: {}", path.display(), e);
                }
            }
        }
    }

    /// Every backup on disk, in index order
    pub fn existing_backups(&self) -> Vec<PathBuf> {
        (1..=self.highest_backup_index())
            .flat_map(|i| [self.backup_path(i), self.compressed_path(i)])
            .filter(|path| path.exists())
            .collect()
    }

    /// Backup file path for given index: `<file>.<index>`
    fn backup_path(&self, index: usize) -> PathBuf {
        self.suffixed_path(&index.to_string())
    }

    /// Compressed backup file path for given index: `<file>.<index>.gz`
    fn compressed_path(&self, index: usize) -> PathBuf {
        self.suffixed_path(&format!("{}.gz", index))
    }

    fn suffixed_path(&self, suffix: &str) -> PathBuf {
        let mut path = self.base_path.clone();
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("app.log")
            .to_string();
        path.set_file_name(format!("{}.{}", filename, suffix));
        path
    }

    /// Compress a rotated file, deleting the original only after success.
    #[cfg(feature = "compression")]
    fn compress_file(&self, path: &Path) -> Result<()> {
        use std::io::{BufReader, Read};

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("backup");
        let gz_path = path.with_file_name(format!("{}.gz", file_name));
        let temp_gz_path = path.with_file_name(format!("{}.gz.tmp", file_name));

        let compress_error = |message: String, e: std::io::Error| {
            let _ = fs::remove_file(&temp_gz_path);
            LoggerError::io_operation("compress log file", message, e)
        };

        let input = File::open(path).map_err(|e| {
            compress_error(
                format!("Failed to open file for compression: {}", path.display()),
                e,
            )
        })?;
        let mut reader = BufReader::with_capacity(64 * 1024, input);

        let output = File::create(&temp_gz_path).map_err(|e| {
            compress_error(
                format!(
                    "Failed to create temporary compressed file: {}",
                    temp_gz_path.display()
                ),
                e,
            )
        })?;
        let mut encoder = flate2::write::GzEncoder::new(
            BufWriter::with_capacity(64 * 1024, output),
            flate2::Compression::default(),
        );

        let mut buffer = vec![0u8; 64 * 1024];
        loop {
            let bytes_read = reader.read(&mut buffer).map_err(|e| {
                compress_error(format!("Failed to read from file: {}", path.display()), e)
            })?;
            if bytes_read == 0 {
                break;
            }
            encoder
                .write_all(&buffer[..bytes_read])
                .map_err(|e| compress_error("Failed to compress data chunk".to_string(), e))?;
        }

        encoder
            .finish()
            .and_then(|mut out| out.flush())
            .map_err(|e| compress_error("Failed to finish compression".to_string(), e))?;

        fs::rename(&temp_gz_path, &gz_path).map_err(|e| {
            compress_error(
                format!("Failed to rename compressed file to: {}", gz_path.display()),
                e,
            )
        })?;

        if let Err(e) = fs::remove_file(path) {
            eprintln!(
                "[WARN] Compression succeeded but failed to remove original file {}: {}",
                path.display(),
                e
            );
        }

        Ok(())
    }

    #[cfg(not(feature = "compression"))]
    fn compress_file(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    #[must_use]
    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.base_path
    }

    #[must_use]
    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }
}

impl Appender for RotatingFileAppender {
    fn name(&self) -> &str {
        "RotatingFileAppender"
    }

    fn append(&mut self, record: &Record) -> Result<()> {
        let mut line = self.format.format(record, &self.timestamp_format);
        line.push('\n');
        let bytes = line.len() as u64;

        if self.should_rotate(bytes) {
            if let Err(e) = self.rotate() {
                eprintln!(
                    "[WARN] Log rotation failed: {}. Continuing with current file.",
                    e
                );

                if self.writer.is_none() {
                    let (file, size, last_rotation) = Self::open_file(&self.base_path)?;
                    self.writer = Some(BufWriter::new(file));
                    self.current_size = size;
                    self.last_rotation = last_rotation;
                }
                // Let the file grow past the limit instead of retrying on every record
                self.current_size = 0;
            }
        }

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| LoggerError::writer("Writer not initialized"))?;
        writer.write_all(line.as_bytes()).map_err(|e| {
            LoggerError::file_appender(
                self.base_path.display().to_string(),
                format!("Failed to write record: {}", e),
            )
        })?;
        self.current_size += bytes;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush().map_err(|e| {
                LoggerError::file_appender(
                    self.base_path.display().to_string(),
                    format!("Failed to flush: {}", e),
                )
            })?;
            writer.get_ref().sync_data().map_err(|e| {
                LoggerError::file_appender(
                    self.base_path.display().to_string(),
                    format!("Failed to sync: {}", e),
                )
            })?;
        }
        Ok(())
    }
}

impl Drop for RotatingFileAppender {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
        }
    }
}
