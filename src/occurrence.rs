//! Typed occurrence inputs and their normalization into exporter records.
//!
//! Every kind has one input struct: required fields go through `new`, optional ones through
//! builder methods. [`normalize`] turns any [`Occurrence`] into an [`OccurrenceRecord`] with
//! redacted properties and kind-specific attributes. Ambient context is added afterwards by
//! [`crate::context::enrich`].
//!
//! ```rust
//! use telebridge::occurrence::{normalize, Dependency, Status, WithPayload};
//! use telebridge::TelemetryConfig;
//! use std::time::Duration;
//!
//! let config = TelemetryConfig::builder("http://localhost:4318").build().unwrap();
//! let dep = Dependency::new("SQL Query", "SQL", "users_db", false, Duration::from_millis(25))
//!     .with_property("statement", "select");
//! let record = normalize(dep.into(), &config);
//! assert_eq!(record.status, Status::Error);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::attributes::{keys, AttributeValue, Attributes};
use crate::config::{PropertyEncoding, TelemetryConfig};
use crate::redaction::{redact, Properties};
use crate::severity::SeverityLevel;

/// Numeric measurement bag. Never redacted.
pub type Measurements = BTreeMap<String, f64>;

/// Kind tag of an occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OccurrenceKind {
    /// Named business event.
    Event,
    /// Log-style message with a severity.
    Trace,
    /// Reported error.
    Exception,
    /// Numeric measurement.
    Metric,
    /// Outbound call to a dependency.
    Dependency,
    /// Screen or page displayed.
    PageView,
    /// Availability probe result.
    Availability,
    /// Handled request.
    Request,
}

impl OccurrenceKind {
    /// Value of the `telemetry.type` attribute.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Trace => "trace",
            Self::Exception => "exception",
            Self::Metric => "metric",
            Self::Dependency => "dependency",
            Self::PageView => "pageview",
            Self::Availability => "availability",
            Self::Request => "request",
        }
    }
}

impl fmt::Display for OccurrenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routing hint for span-based exporters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpanKind {
    /// In-process work.
    #[default]
    Internal,
    /// Outbound call.
    Client,
}

/// Outcome of an occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    /// Completed normally.
    #[default]
    Ok,
    /// Failed.
    Error,
}

impl Status {
    /// `Ok` when `success`, otherwise `Error`.
    pub fn from_success(success: bool) -> Self {
        if success {
            Self::Ok
        } else {
            Self::Error
        }
    }
}

/// Optional fields shared by every occurrence kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    /// String properties. Redacted before export.
    pub properties: Option<Properties>,
    /// Numeric measurements.
    pub metrics: Option<Measurements>,
    /// Explicit timestamp; emission time when absent.
    pub timestamp: Option<SystemTime>,
}

/// Builder methods for the shared [`Payload`].
pub trait WithPayload: Sized {
    /// Mutable access to the payload.
    fn payload_mut(&mut self) -> &mut Payload;

    /// Add one property.
    fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let bag = self.payload_mut().properties.get_or_insert_with(Properties::new);
        bag.insert(key.into(), value.into());
        self
    }

    /// Add several properties.
    fn with_properties<I, K, V>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let bag = self.payload_mut().properties.get_or_insert_with(Properties::new);
        bag.extend(properties.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Add one measurement.
    fn with_metric(mut self, key: impl Into<String>, value: f64) -> Self {
        let bag = self.payload_mut().metrics.get_or_insert_with(Measurements::new);
        bag.insert(key.into(), value);
        self
    }

    /// Add several measurements.
    fn with_metrics<I, K>(mut self, metrics: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        let bag = self.payload_mut().metrics.get_or_insert_with(Measurements::new);
        bag.extend(metrics.into_iter().map(|(k, v)| (k.into(), v)));
        self
    }

    /// Stamp with an explicit time.
    fn at(mut self, timestamp: SystemTime) -> Self {
        self.payload_mut().timestamp = Some(timestamp);
        self
    }
}

/// Named business event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Event name; becomes the record name.
    pub name: String,
    /// Shared optional fields.
    pub payload: Payload,
}

impl Event {
    /// New event.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), payload: Payload::default() }
    }
}

/// Log-style message.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    /// Message text.
    pub message: String,
    /// Severity; `Info` unless set.
    pub severity: SeverityLevel,
    /// Shared optional fields.
    pub payload: Payload,
}

impl Trace {
    /// New `Info` trace.
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), severity: SeverityLevel::Info, payload: Payload::default() }
    }

    /// Set the severity.
    pub fn with_severity(mut self, severity: SeverityLevel) -> Self {
        self.severity = severity;
        self
    }

    /// Set the severity from a level name (unknown names mean `Info`).
    pub fn with_severity_str(self, severity: &str) -> Self {
        self.with_severity(SeverityLevel::parse(severity))
    }
}

/// Reported error.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionReport {
    /// Short type tag, e.g. `ParseIntError`.
    pub type_name: String,
    /// Display text of the error.
    pub message: String,
    /// Rendered error record (message plus cause chain), when known.
    pub stacktrace: Option<String>,
    /// Shared optional fields.
    pub payload: Payload,
}

impl ExceptionReport {
    /// Report from a bare message, tagged `Error`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            type_name: "Error".to_string(),
            message: message.into(),
            stacktrace: None,
            payload: Payload::default(),
        }
    }

    /// Report from an error value: type tag from the static type, message from `Display`,
    /// record from the `source()` chain.
    pub fn from_error<E: std::error::Error>(error: &E) -> Self {
        let type_name = short_type_name(std::any::type_name::<E>()).to_string();
        let message = error.to_string();
        let mut record = format!("{}: {}", type_name, message);
        let mut source = error.source();
        while let Some(cause) = source {
            record.push_str("\ncaused by: ");
            record.push_str(&cause.to_string());
            source = cause.source();
        }
        Self { type_name, message, stacktrace: Some(record), payload: Payload::default() }
    }

    /// Override the type tag.
    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = type_name.into();
        self
    }

    /// Attach a captured stack trace / record.
    pub fn with_stacktrace(mut self, stacktrace: impl Into<String>) -> Self {
        self.stacktrace = Some(stacktrace.into());
        self
    }
}

fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Numeric measurement; also feeds the monotonic counter named after it.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    /// Metric (and counter) name.
    pub name: String,
    /// Full-precision value.
    pub value: f64,
    /// Shared optional fields.
    pub payload: Payload,
}

impl Metric {
    /// New measurement.
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self { name: name.into(), value, payload: Payload::default() }
    }
}

/// Outbound dependency call.
#[derive(Debug, Clone, PartialEq)]
pub struct Dependency {
    /// Call name; becomes the record name.
    pub name: String,
    /// Dependency type, e.g. `SQL`, `HTTP`.
    pub dependency_type: String,
    /// Target, e.g. host or database.
    pub target: String,
    /// Whether the call succeeded.
    pub success: bool,
    /// Call duration.
    pub duration: Duration,
    /// Command / query text.
    pub data: Option<String>,
    /// Shared optional fields.
    pub payload: Payload,
}

impl Dependency {
    /// New dependency call.
    pub fn new(
        name: impl Into<String>,
        dependency_type: impl Into<String>,
        target: impl Into<String>,
        success: bool,
        duration: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            dependency_type: dependency_type.into(),
            target: target.into(),
            success,
            duration,
            data: None,
            payload: Payload::default(),
        }
    }

    /// Attach the command / query text.
    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }
}

/// Page or screen view.
#[derive(Debug, Clone, PartialEq)]
pub struct PageView {
    /// Page name.
    pub name: String,
    /// Shared optional fields.
    pub payload: Payload,
}

impl PageView {
    /// New page view.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), payload: Payload::default() }
    }
}

/// Availability probe result.
#[derive(Debug, Clone, PartialEq)]
pub struct Availability {
    /// Probe name.
    pub name: String,
    /// Probe duration.
    pub duration: Duration,
    /// Whether the probe passed.
    pub success: bool,
    /// Probe message.
    pub message: String,
    /// Shared optional fields.
    pub payload: Payload,
}

impl Availability {
    /// New availability result.
    pub fn new(
        name: impl Into<String>,
        duration: Duration,
        success: bool,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            duration,
            success,
            message: message.into(),
            payload: Payload::default(),
        }
    }
}

/// Handled request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Request name; becomes the record name.
    pub name: String,
    /// Request URL.
    pub url: String,
    /// HTTP method.
    pub method: String,
    /// Time taken.
    pub duration: Duration,
    /// Whether the request succeeded.
    pub success: bool,
    /// Shared optional fields.
    pub payload: Payload,
}

impl Request {
    /// New request.
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        method: impl Into<String>,
        duration: Duration,
        success: bool,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            method: method.into(),
            duration,
            success,
            payload: Payload::default(),
        }
    }
}

impl WithPayload for Event {
    fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }
}

impl WithPayload for Trace {
    fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }
}

impl WithPayload for ExceptionReport {
    fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }
}

impl WithPayload for Metric {
    fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }
}

impl WithPayload for Dependency {
    fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }
}

impl WithPayload for PageView {
    fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }
}

impl WithPayload for Availability {
    fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }
}

impl WithPayload for Request {
    fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }
}

/// Any reportable occurrence.
#[derive(Debug, Clone, PartialEq)]
pub enum Occurrence {
    /// Named event.
    Event(Event),
    /// Trace message.
    Trace(Trace),
    /// Error report.
    Exception(ExceptionReport),
    /// Measurement.
    Metric(Metric),
    /// Dependency call.
    Dependency(Dependency),
    /// Page view.
    PageView(PageView),
    /// Availability result.
    Availability(Availability),
    /// Handled request.
    Request(Request),
}

impl Occurrence {
    /// Kind tag.
    pub fn kind(&self) -> OccurrenceKind {
        match self {
            Self::Event(_) => OccurrenceKind::Event,
            Self::Trace(_) => OccurrenceKind::Trace,
            Self::Exception(_) => OccurrenceKind::Exception,
            Self::Metric(_) => OccurrenceKind::Metric,
            Self::Dependency(_) => OccurrenceKind::Dependency,
            Self::PageView(_) => OccurrenceKind::PageView,
            Self::Availability(_) => OccurrenceKind::Availability,
            Self::Request(_) => OccurrenceKind::Request,
        }
    }
}

impl From<Event> for Occurrence {
    fn from(v: Event) -> Self {
        Self::Event(v)
    }
}

impl From<Trace> for Occurrence {
    fn from(v: Trace) -> Self {
        Self::Trace(v)
    }
}

impl From<ExceptionReport> for Occurrence {
    fn from(v: ExceptionReport) -> Self {
        Self::Exception(v)
    }
}

impl From<Metric> for Occurrence {
    fn from(v: Metric) -> Self {
        Self::Metric(v)
    }
}

impl From<Dependency> for Occurrence {
    fn from(v: Dependency) -> Self {
        Self::Dependency(v)
    }
}

impl From<PageView> for Occurrence {
    fn from(v: PageView) -> Self {
        Self::PageView(v)
    }
}

impl From<Availability> for Occurrence {
    fn from(v: Availability) -> Self {
        Self::Availability(v)
    }
}

impl From<Request> for Occurrence {
    fn from(v: Request) -> Self {
        Self::Request(v)
    }
}

/// A finished record, ready for an exporter.
#[derive(Debug, Clone, PartialEq)]
pub struct OccurrenceRecord {
    /// Span / record name.
    pub name: String,
    /// Kind tag.
    pub kind: OccurrenceKind,
    /// Routing hint.
    pub span_kind: SpanKind,
    /// Flattened attributes.
    pub attributes: Attributes,
    /// Outcome.
    pub status: Status,
    /// Measured duration, for kinds that carry one.
    pub duration: Option<Duration>,
    /// When the occurrence happened.
    pub timestamp: SystemTime,
}

impl OccurrenceRecord {
    /// Look up an attribute.
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Look up a string attribute.
    pub fn str_attribute(&self, key: &str) -> Option<&str> {
        self.attribute(key).and_then(AttributeValue::as_str)
    }

    /// True for error status.
    pub fn is_error(&self) -> bool {
        self.status == Status::Error
    }
}

impl fmt::Display for OccurrenceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}({:?}, {} attrs)", self.kind, self.name, self.status, self.attributes.len())
    }
}

/// Shape an occurrence into a record: payload (redacted) first, then the kind-specific
/// attributes, which win on key collisions.
pub fn normalize(occurrence: Occurrence, config: &TelemetryConfig) -> OccurrenceRecord {
    let kind = occurrence.kind();
    let mut attributes = Attributes::new();
    let (name, span_kind, status, duration, payload) = match occurrence {
        Occurrence::Event(e) => {
            if let Some(ts) = e.payload.timestamp {
                set(&mut attributes, keys::EVENT_TIMESTAMP, epoch_millis(ts).into());
            }
            (e.name, SpanKind::Internal, Status::Ok, None, e.payload)
        }
        Occurrence::Trace(t) => {
            set(&mut attributes, keys::LOG_MESSAGE, t.message.into());
            set(&mut attributes, keys::LOG_SEVERITY, t.severity.as_str().into());
            set(&mut attributes, keys::LOG_SEVERITY_NUMBER, i64::from(t.severity.as_i32()).into());
            ("Trace".to_string(), SpanKind::Internal, Status::Ok, None, t.payload)
        }
        Occurrence::Exception(x) => {
            set(&mut attributes, keys::EXCEPTION_TYPE, x.type_name.into());
            set(&mut attributes, keys::EXCEPTION_MESSAGE, x.message.into());
            if let Some(stack) = x.stacktrace {
                set(&mut attributes, keys::EXCEPTION_STACKTRACE, stack.into());
            }
            ("Exception".to_string(), SpanKind::Internal, Status::Error, None, x.payload)
        }
        Occurrence::Metric(m) => {
            set(&mut attributes, keys::METRIC_NAME, m.name.into());
            set(&mut attributes, keys::METRIC_VALUE, m.value.into());
            ("Metric".to_string(), SpanKind::Internal, Status::Ok, None, m.payload)
        }
        Occurrence::Dependency(d) => {
            set(&mut attributes, keys::DEPENDENCY_TYPE, d.dependency_type.into());
            set(&mut attributes, keys::DEPENDENCY_TARGET, d.target.into());
            set(&mut attributes, keys::DEPENDENCY_SUCCESS, d.success.into());
            set(&mut attributes, keys::DEPENDENCY_DURATION_MS, duration_millis(d.duration).into());
            if let Some(data) = d.data {
                set(&mut attributes, keys::DEPENDENCY_DATA, data.into());
            }
            (d.name, SpanKind::Client, Status::from_success(d.success), Some(d.duration), d.payload)
        }
        Occurrence::PageView(p) => {
            set(&mut attributes, keys::PAGE_NAME, p.name.into());
            ("PageView".to_string(), SpanKind::Internal, Status::Ok, None, p.payload)
        }
        Occurrence::Availability(a) => {
            set(&mut attributes, keys::AVAILABILITY_NAME, a.name.into());
            set(&mut attributes, keys::AVAILABILITY_DURATION_MS, duration_millis(a.duration).into());
            set(&mut attributes, keys::AVAILABILITY_SUCCESS, a.success.into());
            set(&mut attributes, keys::AVAILABILITY_MESSAGE, a.message.into());
            let status = Status::from_success(a.success);
            ("Availability".to_string(), SpanKind::Internal, status, Some(a.duration), a.payload)
        }
        Occurrence::Request(r) => {
            set(&mut attributes, keys::HTTP_URL, r.url.into());
            set(&mut attributes, keys::HTTP_METHOD, r.method.into());
            set(&mut attributes, keys::HTTP_DURATION_MS, duration_millis(r.duration).into());
            set(&mut attributes, keys::HTTP_SUCCESS, r.success.into());
            (r.name, SpanKind::Client, Status::from_success(r.success), Some(r.duration), r.payload)
        }
    };
    set(&mut attributes, keys::TELEMETRY_TYPE, kind.as_str().into());

    let mut merged = render_payload(&payload, config);
    merged.append(&mut attributes);

    OccurrenceRecord {
        name,
        kind,
        span_kind,
        attributes: merged,
        status,
        duration,
        timestamp: payload.timestamp.unwrap_or_else(SystemTime::now),
    }
}

fn render_payload(payload: &Payload, config: &TelemetryConfig) -> Attributes {
    let mut attrs = Attributes::new();
    let properties = payload
        .properties
        .as_ref()
        .filter(|p| !p.is_empty())
        .map(|p| redact(p, config.sensitive_keys()));
    let metrics = payload.metrics.as_ref().filter(|m| !m.is_empty());

    match config.property_encoding() {
        PropertyEncoding::Flat => {
            for (k, v) in properties.into_iter().flatten() {
                attrs.insert(k, AttributeValue::Str(v));
            }
            for (k, v) in metrics.into_iter().flatten() {
                attrs.insert(k.clone(), AttributeValue::Float(*v));
            }
        }
        PropertyEncoding::Json => {
            if let Some(json) = properties.and_then(|p| serde_json::to_string(&p).ok()) {
                attrs.insert(keys::PROPERTIES.to_string(), AttributeValue::Str(json));
            }
            if let Some(json) = metrics.and_then(|m| serde_json::to_string(m).ok()) {
                attrs.insert(keys::MEASUREMENTS.to_string(), AttributeValue::Str(json));
            }
        }
    }
    attrs
}

fn set(attrs: &mut Attributes, key: &str, value: AttributeValue) {
    attrs.insert(key.to_string(), value);
}

fn duration_millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

fn epoch_millis(ts: SystemTime) -> i64 {
    ts.duration_since(UNIX_EPOCH).map(duration_millis).unwrap_or(0)
}
