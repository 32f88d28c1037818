mod common;

use common::test_helpers::capture_logs;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use telebridge::prelude::*;

fn config() -> TelemetryConfig {
    TelemetryConfig::builder("http://localhost:4318")
        .sensitive_keys(["password", "credit_card"])
        .cloud_role_name("storefront")
        .cloud_role_instance("host-1")
        .app_version("vQA_1.2.29")
        .build()
        .expect("config")
}

fn bridge() -> (TelemetryBridge, Arc<MemoryExporter>) {
    let exporter = Arc::new(MemoryExporter::new());
    let bridge = TelemetryBridge::new();
    bridge.initialize(config(), exporter.clone());
    (bridge, exporter)
}

#[test]
fn click_event_is_redacted_end_to_end() {
    let (bridge, exporter) = bridge();
    bridge.track_event(
        Event::new("Click")
            .with_property("username", "alice")
            .with_property("password", "x")
            .with_property("credit_card", "1234"),
    );

    let record = &exporter.records()[0];
    assert_eq!(record.str_attribute("username"), Some("alice"));
    assert_eq!(record.str_attribute("password"), Some(REDACTED));
    assert_eq!(record.str_attribute("credit_card"), Some(REDACTED));
    assert_eq!(record.str_attribute(keys::CLOUD_ROLE_NAME), Some("storefront"));
    assert_eq!(record.str_attribute(keys::CLOUD_ROLE_INSTANCE), Some("host-1"));
    assert_eq!(record.str_attribute(keys::APPLICATION_VERSION), Some("vQA_1.2.29"));
}

#[test]
fn env_dimension_on_every_record() {
    let (bridge, exporter) = bridge();
    bridge.set_custom_dimension("env", "prod");
    bridge.track_info("starting");
    bridge.track_page_view(PageView::new("Home"));
    bridge.track_request(Request::new("checkout", "https://shop/checkout", "POST", Duration::from_millis(40), true));
    assert!(exporter.records().iter().all(|r| r.str_attribute("env") == Some("prod")));
}

#[test]
fn load_metric_twice_counts_four() {
    let (bridge, exporter) = bridge();
    bridge.track_metric(Metric::new("Load", 2.5));
    bridge.track_metric(Metric::new("Load", 2.5));
    assert_eq!(bridge.counter("Load"), 4);
    assert_eq!(exporter.counter("Load"), 4);
    assert!(exporter
        .records()
        .iter()
        .all(|r| r.attribute(keys::METRIC_VALUE).and_then(AttributeValue::as_f64) == Some(2.5)));
    assert_eq!(bridge.counters(), vec![("Load".to_string(), 4)]);
}

#[test]
fn concurrent_increments_sum_exactly() {
    let (bridge, _exporter) = bridge();
    let threads = 16;
    let per_thread = 500;
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let bridge = bridge.clone();
            thread::spawn(move || {
                for _ in 0..per_thread {
                    bridge.track_metric(Metric::new("X", 1.99));
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(bridge.counter("X"), threads * per_thread);
}

#[test]
fn context_writers_and_emitters_interleave_safely() {
    let (bridge, exporter) = bridge();
    let writer = {
        let bridge = bridge.clone();
        thread::spawn(move || {
            for i in 0..200 {
                bridge.set_user_id(format!("user-{i}"));
                bridge.set_custom_dimension("step", i.to_string());
            }
        })
    };
    let emitter = {
        let bridge = bridge.clone();
        thread::spawn(move || {
            for _ in 0..200 {
                bridge.track_event(Event::new("tick"));
            }
        })
    };
    writer.join().unwrap();
    emitter.join().unwrap();
    assert_eq!(exporter.len(), 200);
    assert_eq!(bridge.context().user_id.as_deref(), Some("user-199"));
}

#[test]
fn uninitialized_calls_are_logged_at_trace_only() {
    let (logs, _guard) = capture_logs();
    let bridge = TelemetryBridge::new();
    bridge.track_event(Event::new("early"));
    bridge.track_metric(Metric::new("Load", 3.0));
    assert_eq!(bridge.counter("Load"), 0);

    let out = logs.contents();
    assert!(out.contains("TRACE"), "{out}");
    assert!(out.contains("not initialized"), "{out}");
    assert!(!out.contains("WARN"), "{out}");
}

#[test]
fn lifecycle_is_logged() {
    let (logs, _guard) = capture_logs();
    let (bridge, _exporter) = bridge();
    bridge.track_metric(Metric::new("Tiny", 0.5));
    bridge.shutdown().expect("shutdown");

    let out = logs.contents();
    assert!(out.contains("telemetry initialized"), "{out}");
    assert!(out.contains("counter delta skipped"), "{out}");
    assert!(out.contains("telemetry shut down"), "{out}");
}

#[test]
fn exception_from_error_value() {
    let (bridge, exporter) = bridge();
    let err = "x".parse::<u8>().unwrap_err();
    bridge.track_exception(ExceptionReport::from_error(&err).with_property("SerialNumber", "F2101"));
    let record = &exporter.records()[0];
    assert!(record.is_error());
    assert_eq!(record.name, "Exception");
    assert_eq!(record.str_attribute(keys::EXCEPTION_TYPE), Some("ParseIntError"));
}

#[test]
fn connection_string_key_is_attached() {
    let exporter = Arc::new(MemoryExporter::new());
    let bridge = TelemetryBridge::new();
    let config = TelemetryConfig::builder("")
        .connection_string("InstrumentationKey=abc-123;IngestionEndpoint=https://in.example.com/")
        .build()
        .expect("config");
    bridge.initialize(config, exporter.clone());
    bridge.track_availability(Availability::new("probe", Duration::from_millis(9), false, "timeout"));

    let record = &exporter.records()[0];
    assert_eq!(record.str_attribute(keys::INSTRUMENTATION_KEY), Some("abc-123"));
    assert_eq!(record.status, Status::Error);
    assert_eq!(bridge.config().unwrap().endpoint(), "https://in.example.com/");
}

#[test]
fn json_encoding_end_to_end() {
    let exporter = Arc::new(MemoryExporter::new());
    let bridge = TelemetryBridge::new();
    let config = TelemetryConfig::builder("http://x")
        .property_encoding(PropertyEncoding::Json)
        .build()
        .expect("config");
    bridge.initialize(config, exporter.clone());
    bridge.track_page_view(PageView::new("Cart").with_property("token", "t").with_metric("items", 3.0));

    let record = &exporter.records()[0];
    assert_eq!(record.str_attribute(keys::PROPERTIES), Some(r#"{"token":"[REDACTED]"}"#));
    assert_eq!(record.str_attribute(keys::MEASUREMENTS), Some(r#"{"items":3.0}"#));
}
