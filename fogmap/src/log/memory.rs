//! In-memory logger for asserting on diagnostics.

use std::fmt::Arguments;
use std::sync::Mutex;

use crate::log::{LogLevel, Logger};

/// A recorded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
}

/// Keeps every message it receives.
///
/// # Example
///
/// ```
/// use fogmap::log::{LogLevel, Logger, MemoryLogger};
/// use fogmap::log_warn;
///
/// let logger = MemoryLogger::new();
/// log_warn!(logger, "fell back to world fog");
///
/// assert!(logger.contains("world fog"));
/// assert_eq!(logger.records_at(LogLevel::Warn).len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryLogger {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything logged so far.
    pub fn records(&self) -> Vec<LogRecord> {
        self.lock().clone()
    }

    pub fn records_at(&self, level: LogLevel) -> Vec<LogRecord> {
        self.lock()
            .iter()
            .filter(|r| r.level == level)
            .cloned()
            .collect()
    }

    /// Whether any message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lock().iter().any(|r| r.message.contains(needle))
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LogRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Logger for MemoryLogger {
    fn log(&self, level: LogLevel, args: Arguments<'_>) {
        self.lock().push(LogRecord {
            level,
            message: args.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_records_in_order() {
        let logger = MemoryLogger::new();
        crate::log_info!(logger, "first");
        crate::log_error!(logger, "second {}", 2);

        let records = logger.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].level, LogLevel::Info);
        assert_eq!(records[1].message, "second 2");
    }

    #[test]
    fn test_clear() {
        let logger = MemoryLogger::new();
        crate::log_info!(logger, "gone");
        logger.clear();
        assert!(logger.records().is_empty());
        assert!(!logger.contains("gone"));
    }

    #[test]
    fn test_shared_across_threads() {
        let logger = Arc::new(MemoryLogger::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let logger = Arc::clone(&logger);
                std::thread::spawn(move || crate::log_debug!(logger, "thread {}", i))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(logger.records_at(LogLevel::Debug).len(), 4);
    }
}
