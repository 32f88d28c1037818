//! JSONL sink for `telebridge`. Writes one export per line.
//! Always appends; bring your own path.
//!
//! Wrap it in a [`telebridge::SinkExporter`] to use it as the bridge's exporter.

use serde_json::{json, Value};
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, UNIX_EPOCH};
use telebridge::{Export, OccurrenceRecord, SpanKind, Status, TelemetrySink};

#[derive(Clone, Debug)]
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// File the sink appends to.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl tower_service::Service<Export> for JsonlSink {
    type Response = ();
    type Error = io::Error;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<(), Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, export: Export) -> Self::Future {
        let path = self.path.clone();
        let line = export_to_json(&export).to_string() + "\n";
        Box::pin(async move {
            use tokio::io::AsyncWriteExt;
            let mut file =
                tokio::fs::OpenOptions::new().create(true).append(true).open(&path).await?;
            file.write_all(line.as_bytes()).await?;
            file.flush().await?;
            tracing::trace!(target: "telebridge::jsonl", path = %path.display(), "line written");
            Ok(())
        })
    }
}

impl TelemetrySink for JsonlSink {
    type SinkError = io::Error;
}

/// JSON shape of one line.
pub fn export_to_json(export: &Export) -> Value {
    match export {
        Export::Record(record) => record_to_json(record),
        Export::Counter { name, delta } => {
            json!({ "type": "counter", "name": name, "delta": delta })
        }
    }
}

fn record_to_json(record: &OccurrenceRecord) -> Value {
    let timestamp_ms = record
        .timestamp
        .duration_since(UNIX_EPOCH)
        .map(millis)
        .unwrap_or(0);
    let span_kind = match record.span_kind {
        SpanKind::Internal => "internal",
        SpanKind::Client => "client",
    };
    let status = match record.status {
        Status::Ok => "ok",
        Status::Error => "error",
    };
    json!({
        "type": "record",
        "name": record.name,
        "kind": record.kind.as_str(),
        "span_kind": span_kind,
        "status": status,
        "timestamp_ms": timestamp_ms,
        "duration_ms": record.duration.map(millis),
        "attributes": record.attributes,
    })
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
