//! Tower sinks and the adapter that turns them into an [`Exporter`].
//!
//! A sink is any `tower::Service<Export>`. [`SinkExporter`] queues exports on a bounded channel
//! and drives the sink from a worker task, so the emitting thread never waits on the sink.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tower_service::Service;

use crate::exporter::{ExportError, Exporter};
use crate::occurrence::OccurrenceRecord;

/// Default queue depth for [`SinkExporter`].
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Default time [`SinkExporter::flush`] waits for the worker.
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Unit of work delivered to a sink.
#[derive(Debug, Clone, PartialEq)]
pub enum Export {
    /// A finished record.
    Record(OccurrenceRecord),
    /// A counter increment.
    Counter {
        /// Counter (metric) name.
        name: String,
        /// Amount added.
        delta: u64,
    },
}

/// A telemetry sink that consumes exports.
pub trait TelemetrySink:
    Service<Export, Response = (), Error = Self::SinkError> + Clone + Send + 'static
{
    /// The error type for this sink.
    type SinkError: std::error::Error + Send + 'static;
}

enum Message {
    Export(Export),
    Flush(std_mpsc::Sender<()>),
}

/// Offloads exports to a bounded channel and a worker task that drives a tower sink.
///
/// A full queue drops the export and bumps [`dropped`](Self::dropped). [`Exporter::flush`]
/// blocks until everything queued before it has been handed to the sink, or the flush timeout
/// elapses; call it from a blocking context or a multi-threaded runtime.
#[derive(Clone)]
pub struct SinkExporter {
    tx: mpsc::Sender<Message>,
    dropped: Arc<AtomicU64>,
    flush_timeout: Duration,
}

impl fmt::Debug for SinkExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkExporter")
            .field("dropped", &self.dropped())
            .field("flush_timeout", &self.flush_timeout)
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl SinkExporter {
    /// Wrap `sink` with the default queue depth.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub fn new<S>(sink: S) -> Self
    where
        S: Service<Export, Response = ()> + Send + 'static,
        S::Error: fmt::Display + Send + 'static,
        S::Future: Send + 'static,
    {
        Self::with_capacity(sink, DEFAULT_QUEUE_CAPACITY)
    }

    /// Wrap `sink` with an explicit queue depth (minimum 1).
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub fn with_capacity<S>(mut sink: S, capacity: usize) -> Self
    where
        S: Service<Export, Response = ()> + Send + 'static,
        S::Error: fmt::Display + Send + 'static,
        S::Future: Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<Message>(capacity.max(1));

        tokio::spawn(async move {
            use tower::ServiceExt;

            while let Some(message) = rx.recv().await {
                match message {
                    Message::Export(export) => match sink.ready().await {
                        Ok(ready) => {
                            if let Err(e) = ready.call(export).await {
                                tracing::warn!(target: "telebridge::sink", error = %e, "telemetry sink failed");
                            }
                        }
                        Err(e) => {
                            tracing::warn!(target: "telebridge::sink", error = %e, "telemetry sink not ready");
                        }
                    },
                    Message::Flush(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
        });

        Self { tx, dropped: Arc::new(AtomicU64::new(0)), flush_timeout: DEFAULT_FLUSH_TIMEOUT }
    }

    /// Bound on how long `flush` waits.
    pub fn with_flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout = timeout;
        self
    }

    /// Exports dropped because the queue was full or the worker was gone.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn enqueue(&self, export: Export) {
        if self.tx.try_send(Message::Export(export)).is_err() {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            // 1st, 2nd, 4th, 8th... drop.
            if dropped.is_power_of_two() {
                tracing::warn!(target: "telebridge::sink", dropped, "telemetry queue full; dropping");
            }
        }
    }
}

impl Exporter for SinkExporter {
    fn export(&self, record: OccurrenceRecord) {
        self.enqueue(Export::Record(record));
    }

    fn add_to_counter(&self, name: &str, delta: u64) {
        self.enqueue(Export::Counter { name: name.to_string(), delta });
    }

    fn flush(&self) -> Result<(), ExportError> {
        let (ack_tx, ack_rx) = std_mpsc::channel();
        self.tx.try_send(Message::Flush(ack_tx)).map_err(|e| match e {
            TrySendError::Full(_) => ExportError::QueueFull,
            TrySendError::Closed(_) => ExportError::Closed,
        })?;
        ack_rx.recv_timeout(self.flush_timeout).map_err(|e| match e {
            std_mpsc::RecvTimeoutError::Timeout => ExportError::FlushTimeout(self.flush_timeout),
            std_mpsc::RecvTimeoutError::Disconnected => ExportError::Closed,
        })
    }
}
