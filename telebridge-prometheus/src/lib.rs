//! Prometheus metrics sink for `telebridge`.
//! Bring your own `prometheus::Registry`; counters are registered and incremented.
//!
//! Two families are exported:
//! - `telebridge_occurrences_total{kind, status}`: one increment per record.
//! - `telebridge_counter_total{name}`: the metric counters, incremented by each delta.

use prometheus::{IntCounterVec, Registry};
use std::convert::Infallible;
use std::future::{ready, Ready};
use std::sync::Arc;
use std::task::{Context, Poll};
use telebridge::{Export, Status, TelemetrySink};

/// Name of the per-record family.
pub const OCCURRENCES_METRIC: &str = "telebridge_occurrences_total";

/// Name of the metric-counter family.
pub const COUNTERS_METRIC: &str = "telebridge_counter_total";

#[derive(Clone, Debug)]
pub struct PrometheusSink {
    registry: Arc<Registry>,
    occurrences: IntCounterVec,
    counters: IntCounterVec,
}

impl PrometheusSink {
    /// Create a sink and register counters into the provided registry.
    ///
    /// # Errors
    /// Returns an error if the metrics cannot be registered (e.g. name conflict).
    pub fn new<R: Into<Arc<Registry>>>(registry: R) -> Result<Self, prometheus::Error> {
        let registry = registry.into();
        let occurrences = IntCounterVec::new(
            prometheus::Opts::new(OCCURRENCES_METRIC, "Telemetry occurrences by kind and status"),
            &["kind", "status"],
        )?;
        let counters = IntCounterVec::new(
            prometheus::Opts::new(COUNTERS_METRIC, "Monotonic counters fed by tracked metrics"),
            &["name"],
        )?;
        registry.register(Box::new(occurrences.clone()))?;
        registry.register(Box::new(counters.clone()))?;
        Ok(Self { registry, occurrences, counters })
    }

    /// Expose the registry for HTTP scraping.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Records seen for `kind` (`telemetry.type` value) and `status` (`ok` / `error`).
    pub fn occurrences(&self, kind: &str, status: &str) -> u64 {
        self.occurrences.with_label_values(&[kind, status]).get()
    }

    /// Current value of the metric counter `name`.
    pub fn counter(&self, name: &str) -> u64 {
        self.counters.with_label_values(&[name]).get()
    }
}

impl tower_service::Service<Export> for PrometheusSink {
    type Response = ();
    type Error = Infallible;
    type Future = Ready<Result<(), Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, export: Export) -> Self::Future {
        match &export {
            Export::Record(record) => {
                let status = match record.status {
                    Status::Ok => "ok",
                    Status::Error => "error",
                };
                self.occurrences.with_label_values(&[record.kind.as_str(), status]).inc();
            }
            Export::Counter { name, delta } => {
                self.counters.with_label_values(&[name.as_str()]).inc_by(*delta);
            }
        }
        ready(Ok(()))
    }
}

impl TelemetrySink for PrometheusSink {
    type SinkError = Infallible;
}
