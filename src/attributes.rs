//! Attribute values carried by occurrence records, and the well-known attribute names.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// String-keyed attribute set of a record.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Text.
    Str(String),
    /// Signed integer.
    Int(i64),
    /// Floating point, kept at full precision.
    Float(f64),
    /// Flag.
    Bool(bool),
}

impl AttributeValue {
    /// Borrow the text if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The integer if this is an integer value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The float if this is a float value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// The flag if this is a boolean value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Bool(v) => write!(f, "{}", v),
        }
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// Well-known attribute names.
pub mod keys {
    /// Occurrence kind tag.
    pub const TELEMETRY_TYPE: &str = "telemetry.type";

    /// Explicit event time, epoch milliseconds.
    pub const EVENT_TIMESTAMP: &str = "event.timestamp";

    /// Trace message text.
    pub const LOG_MESSAGE: &str = "log.message";
    /// Severity name, e.g. `WARN`.
    pub const LOG_SEVERITY: &str = "log.severity";
    /// Severity ordinal, 0 (verbose) to 4 (critical).
    pub const LOG_SEVERITY_NUMBER: &str = "log.severity_number";

    /// Exception type tag.
    pub const EXCEPTION_TYPE: &str = "exception.type";
    /// Exception message.
    pub const EXCEPTION_MESSAGE: &str = "exception.message";
    /// Stack trace or error source chain.
    pub const EXCEPTION_STACKTRACE: &str = "exception.stacktrace";

    /// Metric name.
    pub const METRIC_NAME: &str = "metric.name";
    /// Full-precision metric value.
    pub const METRIC_VALUE: &str = "metric.value";

    /// Dependency type, e.g. `HTTP` or `SQL`.
    pub const DEPENDENCY_TYPE: &str = "dependency.type";
    /// Dependency target host or resource.
    pub const DEPENDENCY_TARGET: &str = "dependency.target";
    /// Whether the dependency call succeeded.
    pub const DEPENDENCY_SUCCESS: &str = "dependency.success";
    /// Dependency call duration, milliseconds.
    pub const DEPENDENCY_DURATION_MS: &str = "dependency.duration_ms";
    /// Command or query text of the dependency call.
    pub const DEPENDENCY_DATA: &str = "dependency.data";

    /// Page name.
    pub const PAGE_NAME: &str = "page.name";

    /// Availability test name.
    pub const AVAILABILITY_NAME: &str = "availability.name";
    /// Availability test duration, milliseconds.
    pub const AVAILABILITY_DURATION_MS: &str = "availability.duration_ms";
    /// Whether the availability test passed.
    pub const AVAILABILITY_SUCCESS: &str = "availability.success";
    /// Availability test message.
    pub const AVAILABILITY_MESSAGE: &str = "availability.message";

    /// Request URL.
    pub const HTTP_URL: &str = "http.url";
    /// Request method.
    pub const HTTP_METHOD: &str = "http.method";
    /// Request duration, milliseconds.
    pub const HTTP_DURATION_MS: &str = "http.duration_ms";
    /// Whether the request succeeded.
    pub const HTTP_SUCCESS: &str = "http.success";

    /// JSON-encoded property bag (`PropertyEncoding::Json`).
    pub const PROPERTIES: &str = "properties";
    /// JSON-encoded metric bag (`PropertyEncoding::Json`).
    pub const MEASUREMENTS: &str = "measurements";

    /// Cloud role name from configuration.
    pub const CLOUD_ROLE_NAME: &str = "cloud.role_name";
    /// Cloud role instance from configuration.
    pub const CLOUD_ROLE_INSTANCE: &str = "cloud.role_instance";
    /// Deployed version from configuration.
    pub const APPLICATION_VERSION: &str = "application.version";
    /// Instrumentation key, explicit or from the connection string.
    pub const INSTRUMENTATION_KEY: &str = "ai.instrumentation_key";

    /// Ambient user id.
    pub const USER_ID: &str = "user.id";
    /// Ambient session id.
    pub const SESSION_ID: &str = "session.id";
    /// Ambient device id.
    pub const DEVICE_ID: &str = "device.id";
    /// Version set at runtime through the ambient context.
    pub const APP_VERSION: &str = "app.version";
}
