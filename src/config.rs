//! Bridge configuration.
//!
//! A [`TelemetryConfig`] is built once through [`TelemetryConfigBuilder`], validated, and then
//! shared read-only (behind an `Arc`) by every emission.

use std::time::Duration;

use crate::redaction::SensitiveKeys;

/// Default exporter timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default sampling ratio (keep everything).
pub const DEFAULT_SAMPLING_RATIO: f64 = 1.0;

/// How caller-supplied properties and metrics are laid out on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropertyEncoding {
    /// One attribute per property / metric.
    #[default]
    Flat,
    /// Properties as one JSON object under `properties`, metrics under `measurements`.
    Json,
}

/// Errors produced when validating configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ConfigError {
    /// Timeout must be at least one second.
    #[error("timeout must be > 0 seconds (got {0})")]
    InvalidTimeout(u64),
    /// Sampling ratio must be a finite value in `[0, 1]`.
    #[error("sampling_ratio must be within [0, 1] (got {0})")]
    InvalidSamplingRatio(f64),
    /// Neither an endpoint nor a connection string ingestion endpoint was supplied.
    #[error("no endpoint configured and connection string has no IngestionEndpoint")]
    MissingEndpoint,
    /// A connection string segment was not a `key=value` pair.
    #[error("malformed connection string segment: {segment:?}")]
    MalformedConnectionString {
        /// Offending segment.
        segment: String,
    },
}

/// Parsed `Key=Value;Key=Value` connection string.
///
/// Only `InstrumentationKey` and `IngestionEndpoint` are interpreted; keys are matched
/// case-insensitively and unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionString {
    raw: String,
    instrumentation_key: Option<String>,
    ingestion_endpoint: Option<String>,
}

impl ConnectionString {
    /// Parse a connection string. Empty segments (e.g. a trailing `;`) are skipped.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let mut parsed = Self { raw: raw.to_string(), ..Self::default() };
        for segment in raw.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = segment.split_once('=').ok_or_else(|| {
                ConfigError::MalformedConnectionString { segment: segment.to_string() }
            })?;
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.trim().to_ascii_lowercase().as_str() {
                "instrumentationkey" => parsed.instrumentation_key = Some(value.to_string()),
                "ingestionendpoint" => parsed.ingestion_endpoint = Some(value.to_string()),
                _ => {}
            }
        }
        Ok(parsed)
    }

    /// The original string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// `InstrumentationKey` segment, if present.
    pub fn instrumentation_key(&self) -> Option<&str> {
        self.instrumentation_key.as_deref()
    }

    /// `IngestionEndpoint` segment, if present.
    pub fn ingestion_endpoint(&self) -> Option<&str> {
        self.ingestion_endpoint.as_deref()
    }
}

/// Validated, immutable bridge configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    endpoint: String,
    timeout: Duration,
    sampling_ratio: f64,
    cloud_role_name: Option<String>,
    cloud_role_instance: Option<String>,
    app_version: Option<String>,
    instrumentation_key: Option<String>,
    connection_string: Option<ConnectionString>,
    sensitive_keys: SensitiveKeys,
    property_encoding: PropertyEncoding,
}

impl TelemetryConfig {
    /// Start a builder targeting `endpoint`.
    pub fn builder(endpoint: impl Into<String>) -> TelemetryConfigBuilder {
        TelemetryConfigBuilder::new(endpoint)
    }

    /// Exporter endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Exporter timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Ratio of traces the exporter should keep.
    pub fn sampling_ratio(&self) -> f64 {
        self.sampling_ratio
    }

    /// Cloud role name (service name).
    pub fn cloud_role_name(&self) -> Option<&str> {
        self.cloud_role_name.as_deref()
    }

    /// Cloud role instance (host / device).
    pub fn cloud_role_instance(&self) -> Option<&str> {
        self.cloud_role_instance.as_deref()
    }

    /// Application version as deployed. Independent of the ambient `app.version`.
    pub fn app_version(&self) -> Option<&str> {
        self.app_version.as_deref()
    }

    /// Explicit instrumentation key, falling back to the connection string's key.
    pub fn instrumentation_key(&self) -> Option<&str> {
        self.instrumentation_key
            .as_deref()
            .or_else(|| self.connection_string.as_ref().and_then(|c| c.instrumentation_key()))
    }

    /// Parsed connection string, if one was configured.
    pub fn connection_string(&self) -> Option<&ConnectionString> {
        self.connection_string.as_ref()
    }

    /// Keys whose values are masked.
    pub fn sensitive_keys(&self) -> &SensitiveKeys {
        &self.sensitive_keys
    }

    /// Payload layout.
    pub fn property_encoding(&self) -> PropertyEncoding {
        self.property_encoding
    }
}

/// Builder for [`TelemetryConfig`].
///
/// Starts with a 30 second timeout, full sampling, flat property encoding and the default
/// sensitive-key set.
#[derive(Debug, Clone)]
pub struct TelemetryConfigBuilder {
    endpoint: String,
    timeout_secs: u64,
    sampling_ratio: f64,
    cloud_role_name: Option<String>,
    cloud_role_instance: Option<String>,
    app_version: Option<String>,
    instrumentation_key: Option<String>,
    connection_string: Option<String>,
    sensitive_keys: SensitiveKeys,
    property_encoding: PropertyEncoding,
}

impl TelemetryConfigBuilder {
    /// Create a builder with defaults.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            sampling_ratio: DEFAULT_SAMPLING_RATIO,
            cloud_role_name: None,
            cloud_role_instance: None,
            app_version: None,
            instrumentation_key: None,
            connection_string: None,
            sensitive_keys: SensitiveKeys::default(),
            property_encoding: PropertyEncoding::default(),
        }
    }

    /// Exporter timeout in whole seconds. Must be > 0.
    pub fn timeout_seconds(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Sampling ratio in `[0, 1]`.
    pub fn sampling_ratio(mut self, ratio: f64) -> Self {
        self.sampling_ratio = ratio;
        self
    }

    /// Cloud role name.
    pub fn cloud_role_name(mut self, name: impl Into<String>) -> Self {
        self.cloud_role_name = Some(name.into());
        self
    }

    /// Cloud role instance.
    pub fn cloud_role_instance(mut self, instance: impl Into<String>) -> Self {
        self.cloud_role_instance = Some(instance.into());
        self
    }

    /// Deployed application version.
    pub fn app_version(mut self, version: impl Into<String>) -> Self {
        self.app_version = Some(version.into());
        self
    }

    /// Instrumentation key. Takes precedence over one found in the connection string.
    pub fn instrumentation_key(mut self, key: impl Into<String>) -> Self {
        self.instrumentation_key = Some(key.into());
        self
    }

    /// `Key=Value;...` connection string, parsed at [`build`](Self::build).
    pub fn connection_string(mut self, raw: impl Into<String>) -> Self {
        self.connection_string = Some(raw.into());
        self
    }

    /// Replace the sensitive-key set. An empty iterator disables redaction.
    pub fn sensitive_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.sensitive_keys = SensitiveKeys::new(keys);
        self
    }

    /// Disable redaction entirely.
    pub fn without_redaction(mut self) -> Self {
        self.sensitive_keys = SensitiveKeys::none();
        self
    }

    /// Payload layout.
    pub fn property_encoding(mut self, encoding: PropertyEncoding) -> Self {
        self.property_encoding = encoding;
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    /// Returns [`ConfigError`] for a zero timeout, an out-of-range sampling ratio, a malformed
    /// connection string, or when no endpoint can be determined.
    pub fn build(self) -> Result<TelemetryConfig, ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout(self.timeout_secs));
        }
        if !self.sampling_ratio.is_finite() || !(0.0..=1.0).contains(&self.sampling_ratio) {
            return Err(ConfigError::InvalidSamplingRatio(self.sampling_ratio));
        }
        let connection_string =
            self.connection_string.as_deref().map(ConnectionString::parse).transpose()?;

        let endpoint = match self.endpoint.trim() {
            "" => connection_string
                .as_ref()
                .and_then(|c| c.ingestion_endpoint())
                .map(str::to_string)
                .ok_or(ConfigError::MissingEndpoint)?,
            trimmed => trimmed.to_string(),
        };

        Ok(TelemetryConfig {
            endpoint,
            timeout: Duration::from_secs(self.timeout_secs),
            sampling_ratio: self.sampling_ratio,
            cloud_role_name: self.cloud_role_name,
            cloud_role_instance: self.cloud_role_instance,
            app_version: self.app_version,
            instrumentation_key: self.instrumentation_key,
            connection_string,
            sensitive_keys: self.sensitive_keys,
            property_encoding: self.property_encoding,
        })
    }
}
