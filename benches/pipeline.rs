use criterion::{black_box, criterion_group, criterion_main, Criterion};
use telebridge::prelude::*;

use std::convert::Infallible;
use std::future::{ready, Ready};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower_service::Service;

// A sink that accepts every export and does nothing with it.
#[derive(Clone)]
struct NullSink;

impl Service<Export> for NullSink {
    type Response = ();
    type Error = Infallible;
    type Future = Ready<Result<(), Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _export: Export) -> Self::Future {
        ready(Ok(()))
    }
}

fn bridge_with(exporter: Arc<dyn Exporter>) -> TelemetryBridge {
    let config = TelemetryConfig::builder("http://localhost:4318")
        .cloud_role_name("bench")
        .app_version("1.0.0")
        .build()
        .unwrap();
    let bridge = TelemetryBridge::new();
    bridge.initialize(config, exporter);
    bridge.set_user_id("bench-user");
    bridge.set_custom_dimension("env", "bench");
    bridge
}

fn track_event_memory(c: &mut Criterion) {
    // Small ring so the exporter stays at steady state.
    let bridge = bridge_with(Arc::new(MemoryExporter::with_capacity(1024)));

    c.bench_function("track_event_memory_exporter", |b| {
        b.iter(|| {
            bridge.track_event(black_box(
                Event::new("Click").with_property("username", "alice").with_property("password", "x"),
            ));
        });
    });
}

fn track_metric_memory(c: &mut Criterion) {
    let bridge = bridge_with(Arc::new(MemoryExporter::with_capacity(1024)));

    c.bench_function("track_metric_memory_exporter", |b| {
        b.iter(|| {
            bridge.track_metric(black_box(Metric::new("Load", 2.5)));
        });
    });
}

fn track_event_sink_exporter(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_multi_thread().worker_threads(1).enable_all().build().unwrap();
    let _enter = rt.enter();
    let bridge = bridge_with(Arc::new(SinkExporter::with_capacity(NullSink, 4096)));

    c.bench_function("track_event_sink_exporter", |b| {
        b.iter(|| {
            bridge.track_event(black_box(Event::new("Click").with_property("token", "t")));
        });
    });
}

fn track_uninitialized(c: &mut Criterion) {
    let bridge = TelemetryBridge::new();

    c.bench_function("track_event_uninitialized", |b| {
        b.iter(|| {
            bridge.track_event(black_box(Event::new("Click")));
        });
    });
}

criterion_group!(
    benches,
    track_event_memory,
    track_metric_memory,
    track_event_sink_exporter,
    track_uninitialized
);
criterion_main!(benches);
