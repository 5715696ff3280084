//! Caller attribution
//!
//! Walks the active call stack and returns the first frame that belongs to neither
//! this crate nor an excluded set of path fragments (framework internals, the standard
//! library, dependency sources). The walk itself is a pure function over a captured
//! frame list so it can be exercised without real stack manipulation.

use std::fmt;
use std::panic::Location;
use std::path::{Path, MAIN_SEPARATOR};

/// Number of frames inspected after the skipped ones.
pub const DEFAULT_MAX_DEPTH: usize = 15;

/// Path fragments matching integration test trees and `*_test.rs` / `*_tests.rs` files.
pub const TEST_FILE_PATTERNS: [&str; 4] = ["/tests/", "\\tests\\", "_test.rs", "_tests.rs"];

/// Source location attributed to a record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallerFrame {
    pub file: String,
    pub line: u32,
}

impl CallerFrame {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// `dir/file:line`, keeping only the last two path components.
    pub fn short(&self) -> String {
        let normalized = self.file.replace('\\', "/");
        let mut parts = normalized.rsplitn(3, '/');
        let file = parts.next().unwrap_or_default();
        match parts.next() {
            Some(dir) if !dir.is_empty() => format!("{}/{}:{}", dir, file, self.line),
            _ => format!("{}:{}", file, self.line),
        }
    }
}

impl fmt::Display for CallerFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

impl From<&Location<'_>> for CallerFrame {
    fn from(location: &Location<'_>) -> Self {
        Self::new(location.file(), location.line())
    }
}

/// Return the first frame in `frames[skip..skip + max_depth]` whose file matches none
/// of the `exclude` fragments.
pub fn resolve<'a, S: AsRef<str>>(
    frames: &'a [CallerFrame],
    skip: usize,
    max_depth: usize,
    exclude: &[S],
) -> Option<&'a CallerFrame> {
    frames
        .iter()
        .skip(skip)
        .take(max_depth)
        .find(|frame| !exclude.iter().any(|pattern| frame.file.contains(pattern.as_ref())))
}

/// Captures live frames and resolves the attributed caller.
#[derive(Debug, Clone)]
pub struct CallerResolver {
    skip: usize,
    max_depth: usize,
    exclude: Vec<String>,
}

impl CallerResolver {
    /// Resolver excluding this crate, the standard library and dependency sources.
    pub fn new() -> Self {
        let own_src = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("src")
            .to_string_lossy()
            .into_owned();
        Self {
            skip: 0,
            max_depth: DEFAULT_MAX_DEPTH,
            exclude: vec![
                format!("{}{}", own_src, MAIN_SEPARATOR),
                "/rustc/".to_string(),
                "cargo/registry/src/".to_string(),
                "cargo/git/checkouts/".to_string(),
            ],
        }
    }

    /// Resolver with no exclusions at all
    pub fn empty() -> Self {
        Self {
            skip: 0,
            max_depth: DEFAULT_MAX_DEPTH,
            exclude: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Exclude every frame whose path contains `pattern`.
    #[must_use]
    pub fn with_exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self
    }

    /// Also exclude test files, so that a helper shared by tests is credited to the
    /// code it exercises.
    #[must_use]
    pub fn with_test_exclusion(mut self) -> Self {
        self.exclude
            .extend(TEST_FILE_PATTERNS.iter().map(|pattern| pattern.to_string()));
        self
    }

    pub fn excludes(&self) -> &[String] {
        &self.exclude
    }

    /// Pure resolution over an already captured frame list
    pub fn resolve_frames(&self, frames: &[CallerFrame]) -> Option<CallerFrame> {
        resolve(frames, self.skip, self.max_depth, &self.exclude).cloned()
    }

    /// Capture at most `skip + max_depth` frames that carry a source location.
    pub fn capture(&self) -> Vec<CallerFrame> {
        let limit = self.skip.saturating_add(self.max_depth);
        let mut frames = Vec::with_capacity(limit.min(64));

        backtrace::trace(|frame| {
            backtrace::resolve_frame(frame, |symbol| {
                if frames.len() >= limit {
                    return;
                }
                if let (Some(file), Some(line)) = (symbol.filename(), symbol.lineno()) {
                    frames.push(CallerFrame::new(file.to_string_lossy(), line));
                }
            });
            frames.len() < limit
        });

        frames
    }

    /// Resolve the live caller, falling back to `fallback` when no frame within the
    /// bound qualifies. Never fails.
    pub fn resolve(&self, fallback: &Location<'_>) -> CallerFrame {
        self.resolve_frames(&self.capture())
            .unwrap_or_else(|| CallerFrame::from(fallback))
    }
}

impl Default for CallerResolver {
    fn default() -> Self {
        Self::new()
    }
}
