//! Ambient context: identity and custom dimensions attached to every record.
//!
//! The context lives in a [`ContextStore`]. Setters publish a new immutable
//! [`AmbientContext`] through read-copy-update, and each emission reads exactly one snapshot,
//! so a record never mixes fields from two different writes.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::attributes::{keys, AttributeValue, Attributes};
use crate::config::TelemetryConfig;
use crate::shared::Shared;

/// Immutable snapshot of the ambient context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmbientContext {
    /// Current user.
    pub user_id: Option<String>,
    /// Current session.
    pub session_id: Option<String>,
    /// Current device.
    pub device_id: Option<String>,
    /// Runtime app version. Attached as `app.version`, separately from the configured
    /// `application.version`.
    pub app_version: Option<String>,
    /// Free-form dimensions attached to every record.
    pub custom_dimensions: BTreeMap<String, String>,
}

impl AmbientContext {
    /// True when nothing would be attached.
    pub fn is_empty(&self) -> bool {
        self.user_id.is_none()
            && self.session_id.is_none()
            && self.device_id.is_none()
            && self.app_version.is_none()
            && self.custom_dimensions.is_empty()
    }
}

/// Concurrent store for the ambient context. Cloning shares the same store.
#[derive(Debug, Clone)]
pub struct ContextStore {
    inner: Shared<AmbientContext>,
}

impl Default for ContextStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextStore {
    /// Empty store.
    pub fn new() -> Self {
        Self { inner: Shared::new(AmbientContext::default()) }
    }

    /// Consistent snapshot of every field.
    pub fn snapshot(&self) -> Arc<AmbientContext> {
        self.inner.load()
    }

    /// Set the user id.
    pub fn set_user_id(&self, id: impl Into<String>) {
        let id = id.into();
        self.inner.update(|cur| AmbientContext { user_id: Some(id.clone()), ..cur.clone() });
    }

    /// Set the session id.
    pub fn set_session_id(&self, id: impl Into<String>) {
        let id = id.into();
        self.inner.update(|cur| AmbientContext { session_id: Some(id.clone()), ..cur.clone() });
    }

    /// Set the device id.
    pub fn set_device_id(&self, id: impl Into<String>) {
        let id = id.into();
        self.inner.update(|cur| AmbientContext { device_id: Some(id.clone()), ..cur.clone() });
    }

    /// Set the runtime app version.
    pub fn set_app_version(&self, version: impl Into<String>) {
        let version = version.into();
        self.inner
            .update(|cur| AmbientContext { app_version: Some(version.clone()), ..cur.clone() });
    }

    /// Insert or replace one custom dimension.
    pub fn set_custom_dimension(&self, key: impl Into<String>, value: impl Into<String>) {
        let (key, value) = (key.into(), value.into());
        self.inner.update(|cur| {
            let mut next = cur.clone();
            next.custom_dimensions.insert(key.clone(), value.clone());
            next
        });
    }

    /// Remove one custom dimension, if present.
    pub fn remove_custom_dimension(&self, key: &str) {
        self.inner.update(|cur| {
            let mut next = cur.clone();
            next.custom_dimensions.remove(key);
            next
        });
    }

    /// Drop all custom dimensions; identity fields are kept.
    pub fn clear_custom_dimensions(&self) {
        self.inner.update(|cur| AmbientContext { custom_dimensions: BTreeMap::new(), ..cur.clone() });
    }

    /// Forget everything.
    pub fn reset(&self) {
        self.inner.store(AmbientContext::default());
    }
}

/// Attach configuration identity and ambient context to `attributes`.
///
/// Never overwrites an attribute that is already present. Custom dimensions are attached as
/// they are.
pub fn enrich(attributes: &mut Attributes, config: &TelemetryConfig, ctx: &AmbientContext) {
    let identity = [
        (keys::CLOUD_ROLE_NAME, config.cloud_role_name()),
        (keys::CLOUD_ROLE_INSTANCE, config.cloud_role_instance()),
        (keys::APPLICATION_VERSION, config.app_version()),
        (keys::INSTRUMENTATION_KEY, config.instrumentation_key()),
        (keys::USER_ID, ctx.user_id.as_deref()),
        (keys::SESSION_ID, ctx.session_id.as_deref()),
        (keys::DEVICE_ID, ctx.device_id.as_deref()),
        (keys::APP_VERSION, ctx.app_version.as_deref()),
    ];
    for (key, value) in identity {
        if let Some(value) = value {
            insert_absent(attributes, key, value);
        }
    }

    for (key, value) in &ctx.custom_dimensions {
        insert_absent(attributes, key, value);
    }
}

fn insert_absent(attributes: &mut Attributes, key: &str, value: &str) {
    if !attributes.contains_key(key) {
        attributes.insert(key.to_string(), AttributeValue::from(value));
    }
}
