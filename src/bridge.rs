//! The `TelemetryBridge` facade.
//!
//! Every tracking call runs the same pipeline: normalize (redacting properties), enrich with
//! one snapshot of the ambient context, feed the counter registry for metrics, and hand the
//! record to the exporter. Before [`TelemetryBridge::initialize`] every tracking call is a
//! silent no-op.
//!
//! ```rust
//! use std::sync::Arc;
//! use telebridge::prelude::*;
//!
//! let exporter = Arc::new(MemoryExporter::new());
//! let bridge = TelemetryBridge::new();
//! bridge.track_event(Event::new("ignored"));
//!
//! let config = TelemetryConfig::builder("http://localhost:4318")
//!     .cloud_role_name("checkout")
//!     .build()
//!     .unwrap();
//! bridge.initialize(config, exporter.clone());
//! bridge.set_user_id("user123");
//! bridge.track_metric(Metric::new("Load", 2.5));
//!
//! let records = exporter.records();
//! assert_eq!(records.len(), 1);
//! assert_eq!(records[0].str_attribute("user.id"), Some("user123"));
//! assert_eq!(bridge.counter("Load"), 2);
//! ```

use std::sync::{Arc, OnceLock};

use crate::config::TelemetryConfig;
use crate::context::{enrich, AmbientContext, ContextStore};
use crate::counters::{truncate_delta, CounterRegistry};
use crate::exporter::{ExportError, Exporter};
use crate::occurrence::{
    normalize, Availability, Dependency, Event, ExceptionReport, Metric, Occurrence, PageView,
    Request, Trace,
};
use crate::severity::SeverityLevel;
use crate::shared::Shared;

#[derive(Debug)]
struct Pipeline {
    config: Arc<TelemetryConfig>,
    exporter: Arc<dyn Exporter>,
}

/// Entry point for reporting telemetry.
///
/// Cloning is cheap and every clone shares the pipeline, context and counters. Context and
/// counters survive re-initialization and `shutdown`.
#[derive(Debug, Clone)]
pub struct TelemetryBridge {
    pipeline: Shared<Option<Arc<Pipeline>>>,
    context: ContextStore,
    counters: CounterRegistry,
}

impl Default for TelemetryBridge {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL: OnceLock<TelemetryBridge> = OnceLock::new();

impl TelemetryBridge {
    /// Uninitialized bridge.
    pub fn new() -> Self {
        Self {
            pipeline: Shared::new(None),
            context: ContextStore::new(),
            counters: CounterRegistry::new(),
        }
    }

    /// Process-wide bridge, created uninitialized on first use.
    pub fn global() -> &'static TelemetryBridge {
        GLOBAL.get_or_init(TelemetryBridge::new)
    }

    /// Install `config` and `exporter`. A later call replaces both; the previous exporter is
    /// released without being flushed.
    pub fn initialize(&self, config: TelemetryConfig, exporter: Arc<dyn Exporter>) {
        tracing::info!(
            target: "telebridge::bridge",
            endpoint = %config.endpoint(),
            sampling_ratio = config.sampling_ratio(),
            "telemetry initialized"
        );
        let pipeline = Pipeline { config: Arc::new(config), exporter };
        self.pipeline.store(Some(Arc::new(pipeline)));
    }

    fn pipeline(&self) -> Option<Arc<Pipeline>> {
        (*self.pipeline.load()).clone()
    }

    /// True once an exporter is installed.
    pub fn is_initialized(&self) -> bool {
        self.pipeline.load().is_some()
    }

    /// Active configuration, if initialized.
    pub fn config(&self) -> Option<Arc<TelemetryConfig>> {
        self.pipeline().map(|p| p.config.clone())
    }

    /// Flush the exporter and return to the uninitialized state.
    ///
    /// # Errors
    /// Propagates the exporter's flush failure; the bridge is uninitialized either way.
    pub fn shutdown(&self) -> Result<(), ExportError> {
        let previous = self.pipeline.swap(None);
        match &*previous {
            Some(pipeline) => {
                let result = pipeline.exporter.flush();
                tracing::info!(target: "telebridge::bridge", ok = result.is_ok(), "telemetry shut down");
                result
            }
            None => Ok(()),
        }
    }

    /// Drain the exporter. `Ok(())` when uninitialized.
    ///
    /// # Errors
    /// Whatever the exporter reports.
    pub fn flush(&self) -> Result<(), ExportError> {
        match self.pipeline() {
            Some(pipeline) => pipeline.exporter.flush(),
            None => Ok(()),
        }
    }

    /// Report any occurrence.
    pub fn track(&self, occurrence: impl Into<Occurrence>) {
        let occurrence = occurrence.into();
        let Some(pipeline) = self.pipeline() else {
            tracing::trace!(target: "telebridge::bridge", kind = %occurrence.kind(), "not initialized; dropped");
            return;
        };

        let counter = match &occurrence {
            Occurrence::Metric(m) => Some((m.name.clone(), m.value)),
            _ => None,
        };

        let mut record = normalize(occurrence, &pipeline.config);
        let context = self.context.snapshot();
        enrich(&mut record.attributes, &pipeline.config, &context);
        pipeline.exporter.export(record);

        if let Some((name, value)) = counter {
            match truncate_delta(value) {
                Some(delta) => {
                    self.counters.add(&name, delta);
                    pipeline.exporter.add_to_counter(&name, delta);
                }
                None => {
                    tracing::debug!(target: "telebridge::bridge", metric = %name, value, "counter delta skipped");
                }
            }
        }
    }

    /// Report a named event.
    pub fn track_event(&self, event: Event) {
        self.track(event);
    }

    /// Report a trace message.
    pub fn track_trace(&self, trace: Trace) {
        self.track(trace);
    }

    /// `Info` trace.
    pub fn track_info(&self, message: impl Into<String>) {
        self.track_leveled(message, SeverityLevel::Info);
    }

    /// `Warn` trace.
    pub fn track_warning(&self, message: impl Into<String>) {
        self.track_leveled(message, SeverityLevel::Warn);
    }

    /// `Error` trace. Use [`track_exception`](Self::track_exception) for error values.
    pub fn track_error(&self, message: impl Into<String>) {
        self.track_leveled(message, SeverityLevel::Error);
    }

    /// `Verbose` trace.
    pub fn track_debug(&self, message: impl Into<String>) {
        self.track_leveled(message, SeverityLevel::Verbose);
    }

    fn track_leveled(&self, message: impl Into<String>, level: SeverityLevel) {
        self.track(Trace::new(message).with_severity(level));
    }

    /// Report an error.
    pub fn track_exception(&self, exception: ExceptionReport) {
        self.track(exception);
    }

    /// Report a measurement and add it to the counter of the same name.
    pub fn track_metric(&self, metric: Metric) {
        self.track(metric);
    }

    /// Report an outbound dependency call.
    pub fn track_dependency(&self, dependency: Dependency) {
        self.track(dependency);
    }

    /// Report a page view.
    pub fn track_page_view(&self, page_view: PageView) {
        self.track(page_view);
    }

    /// Report an availability probe.
    pub fn track_availability(&self, availability: Availability) {
        self.track(availability);
    }

    /// Report a handled request.
    pub fn track_request(&self, request: Request) {
        self.track(request);
    }

    /// Set the ambient user id.
    pub fn set_user_id(&self, id: impl Into<String>) {
        self.context.set_user_id(id);
    }

    /// Set the ambient session id.
    pub fn set_session_id(&self, id: impl Into<String>) {
        self.context.set_session_id(id);
    }

    /// Set the ambient device id.
    pub fn set_device_id(&self, id: impl Into<String>) {
        self.context.set_device_id(id);
    }

    /// Set the runtime app version (`app.version`).
    pub fn set_app_version(&self, version: impl Into<String>) {
        self.context.set_app_version(version);
    }

    /// Attach `key=value` to every following record.
    pub fn set_custom_dimension(&self, key: impl Into<String>, value: impl Into<String>) {
        self.context.set_custom_dimension(key, value);
    }

    /// Stop attaching `key`.
    pub fn remove_custom_dimension(&self, key: &str) {
        self.context.remove_custom_dimension(key);
    }

    /// Stop attaching any custom dimension.
    pub fn clear_custom_dimensions(&self) {
        self.context.clear_custom_dimensions();
    }

    /// Current ambient context.
    pub fn context(&self) -> Arc<AmbientContext> {
        self.context.snapshot()
    }

    /// Total of counter `name` in this process.
    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name)
    }

    /// Every counter, sorted by name.
    pub fn counters(&self) -> Vec<(String, u64)> {
        self.counters.snapshot()
    }
}
