//! OTLP exporter for `telebridge`.
//!
//! Each record becomes one finished span (name, kind, status, attributes, start/end time from
//! the record); counter increments go to `u64` OpenTelemetry counters named after the metric.
//! Transport, batching and retries are the OpenTelemetry SDK's job. HTTP/protobuf is always
//! available; gRPC needs the `grpc` feature and a Tokio runtime.
//!
//! ```no_run
//! use telebridge::{Event, TelemetryBridge, TelemetryConfig};
//!
//! let bridge = TelemetryBridge::new();
//! let config = TelemetryConfig::builder("http://localhost:4318")
//!     .cloud_role_name("checkout")
//!     .sampling_ratio(0.5)
//!     .build()
//!     .unwrap();
//! let exporter = telebridge_otlp::install(&bridge, config).unwrap();
//! bridge.track_event(Event::new("Started"));
//! bridge.shutdown().unwrap();
//! exporter.shutdown().unwrap();
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use opentelemetry::metrics::{Counter, Meter, MeterProvider as _};
use opentelemetry::trace::{Span as _, Tracer as _, TracerProvider};
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider, TracerProviderBuilder};
use opentelemetry_sdk::Resource;
use telebridge::attributes::keys;
use telebridge::{
    AttributeValue, ExportError, Exporter, OccurrenceRecord, SpanKind, Status,
    TelemetryBridge, TelemetryConfig,
};

type SdkTracer = <SdkTracerProvider as TracerProvider>::Tracer;

/// Instrumentation scope of every span and counter.
pub const INSTRUMENTATION_SCOPE: &str = "telebridge";

/// `service.name` used when no cloud role name is configured.
pub const DEFAULT_SERVICE_NAME: &str = "telebridge";

/// OTLP transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    /// HTTP with protobuf payloads; the endpoint is a base URL (`/v1/traces` and `/v1/metrics`
    /// are appended).
    #[default]
    Http,
    /// gRPC via tonic. Requires the `grpc` feature.
    Grpc,
}

/// Errors raised while building or shutting down the exporter.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum OtlpError {
    /// The OTLP exporter could not be built.
    #[error("otlp exporter build failed: {0}")]
    Build(#[from] opentelemetry_otlp::ExporterBuildError),
    /// gRPC was requested without the `grpc` feature.
    #[error("grpc transport requires the `grpc` feature")]
    GrpcDisabled,
    /// Provider shutdown failed.
    #[error("otlp shutdown failed: {0}")]
    Shutdown(String),
}

/// [`Exporter`] that ships records and counters over OTLP.
pub struct OtlpExporter {
    tracer_provider: SdkTracerProvider,
    meter_provider: SdkMeterProvider,
    tracer: SdkTracer,
    meter: Meter,
    counters: Mutex<HashMap<String, Counter<u64>>>,
}

impl fmt::Debug for OtlpExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtlpExporter").field("counters", &self.counter_names()).finish()
    }
}

impl OtlpExporter {
    /// Build batch span and periodic metric pipelines from `config`: endpoint, timeout,
    /// sampling ratio, and `service.*` resource attributes from the cloud role and app version.
    ///
    /// # Errors
    /// [`OtlpError::Build`] when the SDK rejects the exporter settings,
    /// [`OtlpError::GrpcDisabled`] for gRPC without the feature.
    pub fn from_config(config: &TelemetryConfig, protocol: Protocol) -> Result<Self, OtlpError> {
        let span_exporter = span_exporter(config, protocol)?;
        let metric_exporter = metric_exporter(config, protocol)?;

        let tracer_provider = tracer_provider_builder(config).with_batch_exporter(span_exporter).build();
        let meter_provider = SdkMeterProvider::builder()
            .with_reader(PeriodicReader::builder(metric_exporter).build())
            .with_resource(resource(config))
            .build();
        Ok(Self::from_providers(tracer_provider, meter_provider))
    }

    /// Use pre-built providers (custom processors, in-memory exporters, ...).
    pub fn from_providers(tracer_provider: SdkTracerProvider, meter_provider: SdkMeterProvider) -> Self {
        let tracer = tracer_provider.tracer(INSTRUMENTATION_SCOPE);
        let meter = meter_provider.meter(INSTRUMENTATION_SCOPE);
        Self { tracer_provider, meter_provider, tracer, meter, counters: Mutex::new(HashMap::new()) }
    }

    /// Names of the counters created so far, sorted.
    pub fn counter_names(&self) -> Vec<String> {
        let counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = counters.keys().cloned().collect();
        names.sort();
        names
    }

    /// Flush and stop both providers. Later exports are dropped by the SDK.
    ///
    /// # Errors
    /// [`OtlpError::Shutdown`] with the first provider failure.
    pub fn shutdown(&self) -> Result<(), OtlpError> {
        let traces = self.tracer_provider.shutdown();
        let metrics = self.meter_provider.shutdown();
        traces.and(metrics).map_err(|e| OtlpError::Shutdown(e.to_string()))
    }
}

impl Exporter for OtlpExporter {
    fn export(&self, record: OccurrenceRecord) {
        let start = record.timestamp;
        let end = record.duration.and_then(|d| start.checked_add(d)).unwrap_or(start);
        let kind = match record.span_kind {
            SpanKind::Internal => opentelemetry::trace::SpanKind::Internal,
            SpanKind::Client => opentelemetry::trace::SpanKind::Client,
        };
        let status = match record.status {
            Status::Ok => opentelemetry::trace::Status::Ok,
            Status::Error => opentelemetry::trace::Status::error(
                record.str_attribute(keys::EXCEPTION_MESSAGE).unwrap_or("error").to_string(),
            ),
        };
        let attributes: Vec<KeyValue> =
            record.attributes.into_iter().map(|(key, value)| key_value(key, value)).collect();

        let mut span = self
            .tracer
            .span_builder(record.name)
            .with_kind(kind)
            .with_start_time(start)
            .with_attributes(attributes)
            .start(&self.tracer);
        span.set_status(status);
        span.end_with_timestamp(end);
    }

    fn add_to_counter(&self, name: &str, delta: u64) {
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        let counter = counters
            .entry(name.to_string())
            .or_insert_with(|| self.meter.u64_counter(name.to_string()).build());
        counter.add(delta, &[]);
    }

    fn flush(&self) -> Result<(), ExportError> {
        let traces = self.tracer_provider.force_flush();
        let metrics = self.meter_provider.force_flush();
        traces.and(metrics).map_err(|e| ExportError::Backend(e.to_string()))
    }
}

/// Build an [`OtlpExporter`] from `config` over HTTP and install it on `bridge`.
///
/// # Errors
/// See [`OtlpExporter::from_config`].
pub fn install(bridge: &TelemetryBridge, config: TelemetryConfig) -> Result<Arc<OtlpExporter>, OtlpError> {
    install_with(bridge, config, Protocol::Http)
}

/// [`install`] with an explicit transport.
///
/// # Errors
/// See [`OtlpExporter::from_config`].
pub fn install_with(
    bridge: &TelemetryBridge,
    config: TelemetryConfig,
    protocol: Protocol,
) -> Result<Arc<OtlpExporter>, OtlpError> {
    let exporter = Arc::new(OtlpExporter::from_config(&config, protocol)?);
    tracing::info!(target: "telebridge::otlp", ?protocol, endpoint = %config.endpoint(), "otlp exporter installed");
    bridge.initialize(config, exporter.clone());
    Ok(exporter)
}

fn tracer_provider_builder(config: &TelemetryConfig) -> TracerProviderBuilder {
    SdkTracerProvider::builder()
        .with_sampler(Sampler::TraceIdRatioBased(config.sampling_ratio()))
        .with_resource(resource(config))
}

fn resource(config: &TelemetryConfig) -> Resource {
    let mut attributes = Vec::new();
    if let Some(instance) = config.cloud_role_instance() {
        attributes.push(KeyValue::new("service.instance.id", instance.to_string()));
    }
    if let Some(version) = config.app_version() {
        attributes.push(KeyValue::new("service.version", version.to_string()));
    }
    Resource::builder()
        .with_service_name(config.cloud_role_name().unwrap_or(DEFAULT_SERVICE_NAME).to_string())
        .with_attributes(attributes)
        .build()
}

fn span_exporter(
    config: &TelemetryConfig,
    protocol: Protocol,
) -> Result<opentelemetry_otlp::SpanExporter, OtlpError> {
    match protocol {
        Protocol::Http => Ok(opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(signal_endpoint(config.endpoint(), "traces"))
            .with_timeout(config.timeout())
            .build()?),
        #[cfg(feature = "grpc")]
        Protocol::Grpc => Ok(opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(config.endpoint())
            .with_timeout(config.timeout())
            .build()?),
        #[cfg(not(feature = "grpc"))]
        Protocol::Grpc => Err(OtlpError::GrpcDisabled),
    }
}

fn metric_exporter(
    config: &TelemetryConfig,
    protocol: Protocol,
) -> Result<opentelemetry_otlp::MetricExporter, OtlpError> {
    match protocol {
        Protocol::Http => Ok(opentelemetry_otlp::MetricExporter::builder()
            .with_http()
            .with_endpoint(signal_endpoint(config.endpoint(), "metrics"))
            .with_timeout(config.timeout())
            .build()?),
        #[cfg(feature = "grpc")]
        Protocol::Grpc => Ok(opentelemetry_otlp::MetricExporter::builder()
            .with_tonic()
            .with_endpoint(config.endpoint())
            .with_timeout(config.timeout())
            .build()?),
        #[cfg(not(feature = "grpc"))]
        Protocol::Grpc => Err(OtlpError::GrpcDisabled),
    }
}

/// `http://host:4318` -> `http://host:4318/v1/<signal>`; already-qualified URLs are kept.
fn signal_endpoint(base: &str, signal: &str) -> String {
    let suffix = format!("/v1/{signal}");
    let trimmed = base.trim_end_matches('/');
    if trimmed.ends_with(&suffix) {
        trimmed.to_string()
    } else {
        format!("{trimmed}{suffix}")
    }
}

fn key_value(key: String, value: AttributeValue) -> KeyValue {
    match value {
        AttributeValue::Str(v) => KeyValue::new(key, v),
        AttributeValue::Int(v) => KeyValue::new(key, v),
        AttributeValue::Float(v) => KeyValue::new(key, v),
        AttributeValue::Bool(v) => KeyValue::new(key, v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::{SpanKind as OtelSpanKind, Status as OtelStatus};
    use opentelemetry::Value;
    use opentelemetry_sdk::trace::InMemorySpanExporter;
    use std::time::Duration;
    use telebridge::{Dependency, Event, ExceptionReport, WithPayload};

    fn config(ratio: f64) -> TelemetryConfig {
        TelemetryConfig::builder("http://localhost:4318")
            .cloud_role_name("checkout")
            .sampling_ratio(ratio)
            .build()
            .unwrap()
    }

    fn in_memory(config: &TelemetryConfig) -> (OtlpExporter, InMemorySpanExporter) {
        let spans = InMemorySpanExporter::default();
        let tracer_provider = tracer_provider_builder(config).with_simple_exporter(spans.clone()).build();
        let exporter = OtlpExporter::from_providers(tracer_provider, SdkMeterProvider::builder().build());
        (exporter, spans)
    }

    fn attr<'a>(attributes: &'a [KeyValue], key: &str) -> Option<&'a Value> {
        attributes.iter().find(|kv| kv.key.as_str() == key).map(|kv| &kv.value)
    }

    #[test]
    fn records_become_finished_spans() {
        let cfg = config(1.0);
        let (exporter, spans) = in_memory(&cfg);
        let bridge = TelemetryBridge::new();
        bridge.initialize(cfg, Arc::new(exporter));
        bridge.set_user_id("user123");
        bridge.track_event(Event::new("Click").with_property("password", "x"));
        bridge.track_dependency(Dependency::new("SQL Query", "SQL", "users_db", false, Duration::from_millis(25)));
        bridge.track_exception(ExceptionReport::new("logon failed"));

        let finished = spans.get_finished_spans().unwrap();
        assert_eq!(finished.len(), 3);

        let click = &finished[0];
        assert_eq!(click.name, "Click");
        assert_eq!(click.span_kind, OtelSpanKind::Internal);
        assert_eq!(click.status, OtelStatus::Ok);
        assert_eq!(attr(&click.attributes, "password"), Some(&Value::from("[REDACTED]")));
        assert_eq!(attr(&click.attributes, "user.id"), Some(&Value::from("user123")));

        let dep = &finished[1];
        assert_eq!(dep.span_kind, OtelSpanKind::Client);
        assert!(matches!(dep.status, OtelStatus::Error { .. }));
        assert_eq!(dep.end_time.duration_since(dep.start_time).unwrap(), Duration::from_millis(25));
        assert_eq!(attr(&dep.attributes, "dependency.success"), Some(&Value::Bool(false)));

        let exc = &finished[2];
        assert_eq!(exc.status, OtelStatus::error("logon failed"));
    }

    #[test]
    fn zero_ratio_samples_everything_out() {
        let (exporter, spans) = in_memory(&config(0.0));
        exporter.export(telebridge::occurrence::normalize(Event::new("e").into(), &config(0.0)));
        assert!(spans.get_finished_spans().unwrap().is_empty());
    }

    #[test]
    fn counters_are_created_once_per_name() {
        let (exporter, _spans) = in_memory(&config(1.0));
        exporter.add_to_counter("Load", 2);
        exporter.add_to_counter("Load", 2);
        exporter.add_to_counter("Clicks", 1);
        assert_eq!(exporter.counter_names(), ["Clicks", "Load"]);
        assert!(exporter.flush().is_ok());
    }

    #[test]
    fn endpoints_get_signal_paths() {
        assert_eq!(signal_endpoint("http://c:4318", "traces"), "http://c:4318/v1/traces");
        assert_eq!(signal_endpoint("http://c:4318/", "metrics"), "http://c:4318/v1/metrics");
        assert_eq!(signal_endpoint("http://c:4318/v1/traces", "traces"), "http://c:4318/v1/traces");
    }

    #[cfg(not(feature = "grpc"))]
    #[test]
    fn grpc_without_feature_is_an_error() {
        let err = OtlpExporter::from_config(&config(1.0), Protocol::Grpc).unwrap_err();
        assert!(matches!(err, OtlpError::GrpcDisabled));
    }

    #[test]
    fn second_shutdown_is_reported() {
        let (exporter, _spans) = in_memory(&config(1.0));
        exporter.shutdown().unwrap();
        let err = exporter.shutdown().unwrap_err();
        assert!(matches!(err, OtlpError::Shutdown(_)));
        assert!(err.to_string().starts_with("otlp shutdown failed"));
    }
}
