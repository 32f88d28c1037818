//! Masking of sensitive property values.
//!
//! A key is sensitive when its lowercased form *contains* any configured entry. Matching
//! replaces the value with [`REDACTED`] and keeps the key (with its original case).

use std::collections::BTreeMap;

/// Sentinel written in place of a sensitive value.
pub const REDACTED: &str = "[REDACTED]";

/// Substrings treated as sensitive when nothing else is configured.
pub const DEFAULT_SENSITIVE_KEYS: &[&str] = &[
    "password",
    "pass",
    "pwd",
    "credit_card",
    "cc",
    "ssn",
    "secret",
    "token",
    "auth",
    "authorization",
];

/// String property bag.
pub type Properties = BTreeMap<String, String>;

/// Lowercased set of sensitive key substrings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensitiveKeys {
    entries: Vec<String>,
}

impl SensitiveKeys {
    /// Build from arbitrary entries. Entries are lowercased; blanks and duplicates are dropped.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries: Vec<String> = entries
            .into_iter()
            .map(|s| s.as_ref().trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        entries.sort();
        entries.dedup();
        Self { entries }
    }

    /// Empty set: nothing is sensitive.
    pub fn none() -> Self {
        Self { entries: Vec::new() }
    }

    /// True when redaction is disabled.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured entries (lowercased, sorted).
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Whether `key` is sensitive.
    pub fn matches(&self, key: &str) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let lowered = key.to_lowercase();
        self.entries.iter().any(|s| lowered.contains(s.as_str()))
    }
}

impl Default for SensitiveKeys {
    fn default() -> Self {
        Self::new(DEFAULT_SENSITIVE_KEYS)
    }
}

/// Return a copy of `properties` with sensitive values replaced by [`REDACTED`].
///
/// The key set is unchanged and the input is never mutated. An empty key set is the identity.
pub fn redact(properties: &Properties, keys: &SensitiveKeys) -> Properties {
    properties
        .iter()
        .map(|(k, v)| {
            let value = if keys.matches(k) { REDACTED.to_string() } else { v.clone() };
            (k.clone(), value)
        })
        .collect()
}
