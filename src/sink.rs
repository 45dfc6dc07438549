//! Destinations for the lines produced by the traffic logger.
//!
//! The logger renders each exchange into plain text and hands it to a [`LogSink`] together with
//! its tag and severity. [`TracingSink`] forwards lines to the `tracing` ecosystem and is the
//! default; [`MemorySink`] keeps them in memory so they can be inspected.

use std::error::Error;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// Severity of an emitted line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Normal traffic lines.
    Debug,
    /// Forwarding failures and internal buffering errors.
    Warn,
}

/// Trait for receiving the rendered lines.
///
/// Implementations must be cheap and must not panic: they run inline on the request path.
///
/// # Examples
///
/// ```rust
/// use wiretap::LogSink;
///
/// struct StderrSink;
///
/// impl LogSink for StderrSink {
///     fn debug(&self, tag: &str, message: &str) {
///         eprintln!("D/{tag}: {message}");
///     }
///
///     fn warn(&self, tag: &str, message: &str, error: Option<&(dyn std::error::Error + 'static)>) {
///         match error {
///             Some(e) => eprintln!("W/{tag}: {message}: {e}"),
///             None => eprintln!("W/{tag}: {message}"),
///         }
///     }
/// }
/// ```
pub trait LogSink: Send + Sync + 'static {
    /// Emit a line at debug severity.
    fn debug(&self, tag: &str, message: &str);
    /// Emit a line at warning severity, optionally with the error that caused it.
    fn warn(&self, tag: &str, message: &str, error: Option<&(dyn Error + 'static)>);
}

impl<T: LogSink + ?Sized> LogSink for Arc<T> {
    fn debug(&self, tag: &str, message: &str) {
        (**self).debug(tag, message)
    }

    fn warn(&self, tag: &str, message: &str, error: Option<&(dyn Error + 'static)>) {
        (**self).warn(tag, message, error)
    }
}

/// Sink that emits lines as `tracing` events.
///
/// The tag is recorded as a structured `tag` field and the error, if any, as an `error` field.
#[derive(Debug, Clone, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn debug(&self, tag: &str, message: &str) {
        debug!(tag = %tag, "{message}");
    }

    fn warn(&self, tag: &str, message: &str, error: Option<&(dyn Error + 'static)>) {
        match error {
            Some(e) => warn!(tag = %tag, error = %e, "{message}"),
            None => warn!(tag = %tag, "{message}"),
        }
    }
}

/// A line captured by [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub tag: String,
    pub severity: Severity,
    pub message: String,
    /// Display form of the attached error.
    pub error: Option<String>,
}

/// Sink that keeps every line in memory.
///
/// Clones share the same storage, so one clone can be handed to the layer while another is
/// kept for inspection.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the captured lines, oldest first.
    pub fn records(&self) -> Vec<LogRecord> {
        self.lock().clone()
    }

    /// Captured lines of the given severity, oldest first.
    pub fn records_with(&self, severity: Severity) -> Vec<LogRecord> {
        self.lock()
            .iter()
            .filter(|record| record.severity == severity)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn push(&self, record: LogRecord) {
        self.lock().push(record);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogRecord>> {
        // A panic while holding the lock cannot leave a Vec half-written.
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LogSink for MemorySink {
    fn debug(&self, tag: &str, message: &str) {
        self.push(LogRecord {
            tag: tag.to_string(),
            severity: Severity::Debug,
            message: message.to_string(),
            error: None,
        });
    }

    fn warn(&self, tag: &str, message: &str, error: Option<&(dyn Error + 'static)>) {
        self.push(LogRecord {
            tag: tag.to_string(),
            severity: Severity::Warn,
            message: message.to_string(),
            error: error.map(|e| e.to_string()),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_records_lines_in_order() {
        let sink = MemorySink::new();
        let error = std::io::Error::new(std::io::ErrorKind::Other, "connection reset");

        sink.debug("HTTP", "first");
        sink.warn("HTTP", "second", Some(&error));
        sink.warn("HTTP", "third", None);

        let records = sink.records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].severity, Severity::Debug);
        assert_eq!(records[0].message, "first");
        assert_eq!(records[1].error.as_deref(), Some("connection reset"));
        assert_eq!(records[2].error, None);
        assert_eq!(sink.records_with(Severity::Warn).len(), 2);
    }

    #[test]
    fn memory_sink_clones_share_storage() {
        let sink = MemorySink::new();
        let handle = sink.clone();

        sink.debug("api", "hello");
        assert_eq!(handle.len(), 1);

        handle.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn tracing_sink_does_not_panic_without_subscriber() {
        let sink = TracingSink;
        let error = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        sink.debug("HTTP", "line");
        sink.warn("HTTP", "line", Some(&error));
        sink.warn("HTTP", "line", None);
    }

    #[test]
    fn shared_sink_delegates() {
        let memory = MemorySink::new();
        let shared: Arc<dyn LogSink> = Arc::new(memory.clone());
        shared.debug("HTTP", "through arc");
        assert_eq!(memory.records()[0].message, "through arc");
    }
}
