use prometheus::{Encoder, Registry, TextEncoder};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use telebridge::{
    Attributes, Dependency, Event, Export, Metric, OccurrenceKind, OccurrenceRecord, SinkExporter,
    SpanKind, Status, TelemetryBridge, TelemetryConfig,
};
use telebridge_prometheus::{PrometheusSink, COUNTERS_METRIC, OCCURRENCES_METRIC};
use tower_service::Service;

fn record(kind: OccurrenceKind, status: Status) -> Export {
    Export::Record(OccurrenceRecord {
        name: kind.as_str().to_string(),
        kind,
        span_kind: SpanKind::Internal,
        attributes: Attributes::new(),
        status,
        duration: None,
        timestamp: SystemTime::now(),
    })
}

fn exposition(registry: &Registry) -> String {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer).expect("encode");
    String::from_utf8(buffer).expect("utf8")
}

#[tokio::test]
async fn test_record_kinds_and_statuses() {
    let registry = Registry::new();
    let mut sink = PrometheusSink::new(registry.clone()).expect("Failed to create PrometheusSink");

    let cases = [
        (OccurrenceKind::Event, Status::Ok, "event", "ok"),
        (OccurrenceKind::Exception, Status::Error, "exception", "error"),
        (OccurrenceKind::Dependency, Status::Error, "dependency", "error"),
        (OccurrenceKind::Request, Status::Ok, "request", "ok"),
    ];

    for (kind, status, kind_label, status_label) in cases {
        sink.call(record(kind, status)).await.expect("Failed to call sink");
        assert_eq!(sink.occurrences(kind_label, status_label), 1);
    }
    assert_eq!(sink.occurrences("event", "error"), 0);
}

#[tokio::test]
async fn test_counter_deltas_accumulate() {
    let registry = Registry::new();
    let mut sink = PrometheusSink::new(registry.clone()).expect("Failed to create PrometheusSink");

    assert_eq!(sink.counter("Load"), 0);
    sink.call(Export::Counter { name: "Load".into(), delta: 2 }).await.unwrap();
    sink.call(Export::Counter { name: "Load".into(), delta: 2 }).await.unwrap();
    assert_eq!(sink.counter("Load"), 4);

    let text = exposition(&registry);
    assert!(text.contains(&format!("{COUNTERS_METRIC}{{name=\"Load\"}} 4")), "{text}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_bridge_through_sink_exporter() {
    let registry = Registry::new();
    let sink = PrometheusSink::new(registry.clone()).expect("Failed to create PrometheusSink");

    let bridge = TelemetryBridge::new();
    bridge.initialize(
        TelemetryConfig::builder("http://localhost:9090").build().unwrap(),
        Arc::new(SinkExporter::new(sink.clone())),
    );
    bridge.track_event(Event::new("Click"));
    bridge.track_metric(Metric::new("Load", 2.5));
    bridge.track_metric(Metric::new("Load", 2.5));
    bridge.track_dependency(Dependency::new("q", "SQL", "db", false, Duration::from_millis(3)));

    let flusher = bridge.clone();
    tokio::task::spawn_blocking(move || flusher.flush()).await.unwrap().expect("flush");

    assert_eq!(sink.occurrences("event", "ok"), 1);
    assert_eq!(sink.occurrences("metric", "ok"), 2);
    assert_eq!(sink.occurrences("dependency", "error"), 1);
    assert_eq!(sink.counter("Load"), bridge.counter("Load"));
    assert!(exposition(&registry).contains(OCCURRENCES_METRIC));
}
