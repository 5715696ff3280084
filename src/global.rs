//! Process-wide logger
//!
//! A single replaceable slot holding the logger used by the free functions in this
//! module. Until something is installed, emit calls are no-ops; `panic` still panics
//! and `fatal` still exits.

use crate::core::{Fields, LogConfig, Logger, Result};
use parking_lot::RwLock;
use std::sync::Arc;

static GLOBAL: RwLock<Option<Arc<Logger>>> = parking_lot::const_rwlock(None);

/// Build a logger from `config` and install it. The previous logger, if any, is
/// replaced; last writer wins.
///
/// # Errors
///
/// Returns an error when the configured log file cannot be opened. The slot is left
/// untouched in that case.
pub fn init(config: &LogConfig) -> Result<Arc<Logger>> {
    let logger = Logger::from_config(config)?;
    Ok(install(logger))
}

/// Install an already built logger.
pub fn install(logger: Logger) -> Arc<Logger> {
    let logger = Arc::new(logger);
    *GLOBAL.write() = Some(Arc::clone(&logger));
    logger
}

/// The currently installed logger
pub fn logger() -> Option<Arc<Logger>> {
    GLOBAL.read().clone()
}

pub fn debug(message: impl Into<String>, fields: impl Into<Fields>) {
    if let Some(logger) = logger() {
        logger.debug(message, fields);
    }
}

pub fn info(message: impl Into<String>, fields: impl Into<Fields>) {
    if let Some(logger) = logger() {
        logger.info(message, fields);
    }
}

pub fn warn(message: impl Into<String>, fields: impl Into<Fields>) {
    if let Some(logger) = logger() {
        logger.warn(message, fields);
    }
}

#[track_caller]
pub fn error(message: impl Into<String>, fields: impl Into<Fields>) {
    if let Some(logger) = logger() {
        logger.error(message, fields);
    }
}

#[track_caller]
pub fn panic(message: impl Into<String>, fields: impl Into<Fields>) -> ! {
    match logger() {
        Some(logger) => logger.panic(message, fields),
        None => panic!("{}", message.into()),
    }
}

#[track_caller]
pub fn fatal(message: impl Into<String>, fields: impl Into<Fields>) -> ! {
    match logger() {
        Some(logger) => logger.fatal(message, fields),
        None => std::process::exit(1),
    }
}

/// Flush the installed logger, ignoring errors.
pub fn sync() {
    if let Some(logger) = logger() {
        logger.sync();
    }
}
