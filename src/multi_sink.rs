//! Composite sink for fanning lines out to several destinations.
//!
//! # Example
//!
//! ```rust
//! use wiretap::{MemorySink, MultiSink, TracingSink};
//!
//! let captured = MemorySink::new();
//! let sink = MultiSink::new()
//!     .with(TracingSink)
//!     .with(captured.clone());
//!
//! assert_eq!(sink.len(), 2);
//! ```

use crate::LogSink;
use std::error::Error;
use std::sync::Arc;

/// A sink that delegates every line to multiple inner sinks, in the order they were added.
#[derive(Clone, Default)]
pub struct MultiSink {
    sinks: Vec<Arc<dyn LogSink>>,
}

impl MultiSink {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Add a sink to the chain. Returns self for builder pattern.
    pub fn with<L: LogSink>(mut self, sink: L) -> Self {
        self.sinks.push(Arc::new(sink));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }
}

impl std::fmt::Debug for MultiSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiSink")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl LogSink for MultiSink {
    fn debug(&self, tag: &str, message: &str) {
        for sink in &self.sinks {
            sink.debug(tag, message);
        }
    }

    fn warn(&self, tag: &str, message: &str, error: Option<&(dyn Error + 'static)>) {
        for sink in &self.sinks {
            sink.warn(tag, message, error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemorySink, Severity};

    #[test]
    fn test_multi_sink_empty() {
        let sink = MultiSink::new();
        assert!(sink.is_empty());
        assert_eq!(sink.len(), 0);

        // Should not panic with no sinks
        sink.debug("HTTP", "nobody listens");
        sink.warn("HTTP", "nobody listens", None);
    }

    #[test]
    fn test_multi_sink_delivers_to_every_sink() {
        let first = MemorySink::new();
        let second = MemorySink::new();
        let sink = MultiSink::new().with(first.clone()).with(second.clone());
        assert_eq!(sink.len(), 2);

        let error = std::io::Error::new(std::io::ErrorKind::Other, "connection reset");
        sink.debug("HTTP", "#1 Sending GET request /");
        sink.warn("HTTP", "Response failed for /", Some(&error));

        for captured in [&first, &second] {
            let records = captured.records();
            assert_eq!(records.len(), 2);
            assert_eq!(records[0].severity, Severity::Debug);
            assert_eq!(records[1].severity, Severity::Warn);
            assert_eq!(records[1].error.as_deref(), Some("connection reset"));
        }
    }

    #[test]
    fn test_multi_sink_nests() {
        let captured = MemorySink::new();
        let inner = MultiSink::new().with(captured.clone());
        let outer = MultiSink::new().with(inner);

        outer.debug("HTTP", "nested");
        assert_eq!(captured.records()[0].message, "nested");
    }
}
