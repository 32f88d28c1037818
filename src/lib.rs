#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # telebridge
//!
//! A telemetry-emission facade: report events, traces, exceptions, metrics, dependency calls,
//! page views, availability probes and requests through one typed API, and get uniform,
//! redacted, context-enriched records out the other side.
//!
//! ## Features
//!
//! - **Typed occurrences** with one input struct per kind and builder-style optional fields
//! - **Redaction** of sensitive property keys (substring match, case-insensitive)
//! - **Ambient context** (user, session, device, custom dimensions) read as one consistent snapshot
//! - **Monotonic counters** fed by metrics, safe under concurrent increments
//! - **Pluggable exporters**: in-memory, `tracing`, fan-out, or any tower sink
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use telebridge::{Event, MemoryExporter, TelemetryBridge, TelemetryConfig, WithPayload};
//!
//! let config = TelemetryConfig::builder("http://localhost:4318")
//!     .sensitive_keys(["password", "credit_card"])
//!     .build()
//!     .unwrap();
//! let exporter = Arc::new(MemoryExporter::new());
//!
//! let bridge = TelemetryBridge::new();
//! bridge.initialize(config, exporter.clone());
//! bridge.set_custom_dimension("env", "prod");
//! bridge.track_event(
//!     Event::new("Click").with_property("username", "alice").with_property("password", "x"),
//! );
//!
//! let record = &exporter.records()[0];
//! assert_eq!(record.str_attribute("password"), Some("[REDACTED]"));
//! assert_eq!(record.str_attribute("env"), Some("prod"));
//! ```

pub mod attributes;
pub mod bridge;
pub mod config;
pub mod context;
pub mod counters;
pub mod exporter;
pub mod occurrence;
pub mod prelude;
pub mod redaction;
pub mod severity;
pub mod shared;
pub mod sink;

// Re-exports
pub use attributes::{AttributeValue, Attributes};
pub use bridge::TelemetryBridge;
pub use config::{
    ConfigError, ConnectionString, PropertyEncoding, TelemetryConfig, TelemetryConfigBuilder,
};
pub use context::{AmbientContext, ContextStore};
pub use counters::CounterRegistry;
pub use exporter::{ExportError, Exporter, LogExporter, MemoryExporter, MulticastExporter};
pub use occurrence::{
    Availability, Dependency, Event, ExceptionReport, Metric, Occurrence, OccurrenceKind,
    OccurrenceRecord, PageView, Request, SpanKind, Status, Trace, WithPayload,
};
pub use redaction::{SensitiveKeys, REDACTED};
pub use severity::SeverityLevel;
pub use sink::{Export, SinkExporter, TelemetrySink};
