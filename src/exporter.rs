//! The exporter boundary and the exporters that ship with the crate.
//!
//! The bridge hands every finished [`OccurrenceRecord`] to an [`Exporter`] exactly once, along
//! with counter increments for metrics. Transport, batching and retries belong to the exporter;
//! the bridge never looks at the outcome. Only [`Exporter::flush`] reports failures.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::occurrence::OccurrenceRecord;

/// Errors surfaced when draining an exporter.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExportError {
    /// The exporter's queue had no room for the flush request.
    #[error("export queue full")]
    QueueFull,
    /// The exporter's worker is gone.
    #[error("exporter closed")]
    Closed,
    /// Pending data was not drained in time.
    #[error("flush timed out after {0:?}")]
    FlushTimeout(Duration),
    /// The backend reported a failure.
    #[error("backend: {0}")]
    Backend(String),
}

/// Consumer of finished records and counter increments.
pub trait Exporter: Send + Sync + fmt::Debug {
    /// Ship one record. Must not block on I/O.
    fn export(&self, record: OccurrenceRecord);

    /// Add `delta` to the monotonic counter `name`.
    fn add_to_counter(&self, name: &str, delta: u64);

    /// Drain pending data before returning. May block for the exporter's own bounded time.
    fn flush(&self) -> Result<(), ExportError> {
        Ok(())
    }
}

/// An exporter that keeps records in memory.
///
/// Useful for testing and debugging. Bounded: the oldest record is evicted once `capacity` is
/// reached.
///
/// ```rust
/// use telebridge::{Event, MemoryExporter, TelemetryBridge, TelemetryConfig};
/// use std::sync::Arc;
///
/// let exporter = Arc::new(MemoryExporter::new());
/// let bridge = TelemetryBridge::new();
/// bridge.initialize(TelemetryConfig::builder("http://localhost").build().unwrap(), exporter.clone());
/// bridge.track_event(Event::new("Started"));
/// assert_eq!(exporter.records()[0].name, "Started");
/// ```
#[derive(Debug, Clone)]
pub struct MemoryExporter {
    records: Arc<Mutex<VecDeque<OccurrenceRecord>>>,
    counters: Arc<Mutex<BTreeMap<String, u64>>>,
    capacity: usize,
    evicted: Arc<AtomicU64>,
    flushes: Arc<AtomicU64>,
}

impl MemoryExporter {
    /// Bounded exporter (default cap: 10,000 records).
    pub fn new() -> Self {
        Self::with_capacity(10_000)
    }

    /// Bounded exporter with explicit capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Arc::new(Mutex::new(VecDeque::new())),
            counters: Arc::new(Mutex::new(BTreeMap::new())),
            capacity: capacity.max(1),
            evicted: Arc::new(AtomicU64::new(0)),
            flushes: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Snapshot of the stored records, oldest first.
    pub fn records(&self) -> Vec<OccurrenceRecord> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).iter().cloned().collect()
    }

    /// Total received for counter `name`.
    pub fn counter(&self, name: &str) -> u64 {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner).get(name).copied().unwrap_or(0)
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop stored records and counters.
    pub fn clear(&self) {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clear();
        self.counters.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records evicted because the buffer was full.
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    /// Number of `flush` calls seen.
    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }
}

impl Default for MemoryExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Exporter for MemoryExporter {
    fn export(&self, record: OccurrenceRecord) {
        let mut guard = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.len() >= self.capacity {
            guard.pop_front();
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
        guard.push_back(record);
    }

    fn add_to_counter(&self, name: &str, delta: u64) {
        let mut guard = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        let total = guard.entry(name.to_string()).or_insert(0);
        *total = total.saturating_add(delta);
    }

    fn flush(&self) -> Result<(), ExportError> {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// An exporter that writes records as `tracing` events.
///
/// Records are logged at INFO (ERROR status at WARN) under the `telebridge::export` target.
#[derive(Clone, Debug, Default)]
pub struct LogExporter;

impl Exporter for LogExporter {
    fn export(&self, record: OccurrenceRecord) {
        let attributes = serde_json::to_string(&record.attributes).unwrap_or_default();
        if record.is_error() {
            tracing::warn!(
                target: "telebridge::export",
                kind = %record.kind,
                name = %record.name,
                attributes = %attributes,
                "occurrence"
            );
        } else {
            tracing::info!(
                target: "telebridge::export",
                kind = %record.kind,
                name = %record.name,
                attributes = %attributes,
                "occurrence"
            );
        }
    }

    fn add_to_counter(&self, name: &str, delta: u64) {
        tracing::info!(target: "telebridge::export", counter = %name, delta, "counter");
    }
}

/// Sends every record and increment to each wrapped exporter.
#[derive(Clone, Debug, Default)]
pub struct MulticastExporter {
    exporters: Vec<Arc<dyn Exporter>>,
}

impl MulticastExporter {
    /// Fan out to `exporters`.
    pub fn new(exporters: Vec<Arc<dyn Exporter>>) -> Self {
        Self { exporters }
    }

    /// Add another target.
    pub fn with(mut self, exporter: Arc<dyn Exporter>) -> Self {
        self.exporters.push(exporter);
        self
    }
}

impl Exporter for MulticastExporter {
    fn export(&self, record: OccurrenceRecord) {
        if let Some((last, rest)) = self.exporters.split_last() {
            for exporter in rest {
                exporter.export(record.clone());
            }
            last.export(record);
        }
    }

    fn add_to_counter(&self, name: &str, delta: u64) {
        for exporter in &self.exporters {
            exporter.add_to_counter(name, delta);
        }
    }

    /// Flushes every target; returns the first failure.
    fn flush(&self) -> Result<(), ExportError> {
        let mut first_err = None;
        for exporter in &self.exporters {
            if let Err(e) = exporter.flush() {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::occurrence::{OccurrenceKind, SpanKind, Status};
    use crate::Attributes;
    use std::time::SystemTime;
    use tracing_subscriber::fmt::writer::BoxMakeWriter;
    use tracing_subscriber::fmt::MakeWriter;

    fn record(name: &str, status: Status) -> OccurrenceRecord {
        OccurrenceRecord {
            name: name.to_string(),
            kind: OccurrenceKind::Event,
            span_kind: SpanKind::Internal,
            attributes: Attributes::new(),
            status,
            duration: None,
            timestamp: SystemTime::now(),
        }
    }

    #[derive(Debug)]
    struct FailingFlush;

    impl Exporter for FailingFlush {
        fn export(&self, _record: OccurrenceRecord) {}
        fn add_to_counter(&self, _name: &str, _delta: u64) {}
        fn flush(&self) -> Result<(), ExportError> {
            Err(ExportError::Backend("down".into()))
        }
    }

    #[test]
    fn memory_exporter_evicts_oldest() {
        let exporter = MemoryExporter::with_capacity(2);
        assert!(exporter.is_empty());
        exporter.export(record("a", Status::Ok));
        exporter.export(record("b", Status::Ok));
        exporter.export(record("c", Status::Ok));
        assert_eq!(exporter.len(), 2);
        assert_eq!(exporter.evicted(), 1);
        let names: Vec<_> = exporter.records().into_iter().map(|r| r.name).collect();
        assert_eq!(names, ["b", "c"]);
        exporter.clear();
        assert!(exporter.is_empty());
    }

    #[test]
    fn memory_exporter_sums_counters() {
        let exporter = MemoryExporter::new();
        exporter.add_to_counter("Load", 2);
        exporter.add_to_counter("Load", 2);
        assert_eq!(exporter.counter("Load"), 4);
        assert_eq!(exporter.counter("missing"), 0);
        exporter.flush().unwrap();
        assert_eq!(exporter.flushes(), 1);
    }

    #[test]
    fn multicast_reaches_every_target_and_reports_first_flush_error() {
        let a = Arc::new(MemoryExporter::new());
        let b = Arc::new(MemoryExporter::new());
        let multi = MulticastExporter::new(vec![a.clone(), b.clone()]);
        multi.export(record("x", Status::Ok));
        multi.add_to_counter("c", 3);
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
        assert_eq!(b.counter("c"), 3);
        assert!(multi.flush().is_ok());

        let failing = multi.with(Arc::new(FailingFlush));
        assert_eq!(failing.flush(), Err(ExportError::Backend("down".into())));
        assert_eq!(a.flushes(), 2, "healthy targets still flushed");
    }

    #[derive(Clone)]
    struct SharedWriter(Arc<Mutex<Vec<u8>>>);

    impl<'a> MakeWriter<'a> for SharedWriter {
        type Writer = SharedGuard;
        fn make_writer(&'a self) -> Self::Writer {
            SharedGuard(self.0.clone())
        }
    }

    struct SharedGuard(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for SharedGuard {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn log_exporter_writes_structured_events() {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::fmt()
            .with_writer(BoxMakeWriter::new(SharedWriter(buffer.clone())))
            .with_target(true)
            .with_ansi(false)
            .without_time()
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        LogExporter.export(record("Click", Status::Ok));
        LogExporter.export(record("Boom", Status::Error));
        LogExporter.add_to_counter("Load", 2);

        let logs = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("telebridge::export"));
        assert!(logs.contains("Click"));
        assert!(logs.contains("WARN") && logs.contains("Boom"));
        assert!(logs.contains("counter=Load"));
    }
}
