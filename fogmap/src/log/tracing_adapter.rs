//! `tracing` backed logger.

use crate::log::{LogLevel, Logger};
use std::fmt::Arguments;

/// Forwards messages to `tracing` events under the `fogmap` target.
///
/// Nothing is printed unless a subscriber is installed, for example with
/// [`init_logging`](crate::logging::init_logging).
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl TracingLogger {
    pub fn new() -> Self {
        Self
    }
}

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, args: Arguments<'_>) {
        match level {
            LogLevel::Trace => tracing::trace!(target: "fogmap", "{}", args),
            LogLevel::Debug => tracing::debug!(target: "fogmap", "{}", args),
            LogLevel::Info => tracing::info!(target: "fogmap", "{}", args),
            LogLevel::Warn => tracing::warn!(target: "fogmap", "{}", args),
            LogLevel::Error => tracing::error!(target: "fogmap", "{}", args),
        }
    }
}
