//! Convenient re-exports for common telebridge types.
pub use crate::{
    attributes::{keys, AttributeValue, Attributes},
    bridge::TelemetryBridge,
    config::{ConfigError, PropertyEncoding, TelemetryConfig, TelemetryConfigBuilder},
    exporter::{ExportError, Exporter, LogExporter, MemoryExporter, MulticastExporter},
    occurrence::{
        Availability, Dependency, Event, ExceptionReport, Metric, Occurrence, OccurrenceKind,
        OccurrenceRecord, PageView, Request, SpanKind, Status, Trace, WithPayload,
    },
    redaction::{SensitiveKeys, REDACTED},
    severity::SeverityLevel,
    sink::{Export, SinkExporter, TelemetrySink},
};
