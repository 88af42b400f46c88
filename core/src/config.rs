//! Client configuration and per-call overrides.
//!
//! # Design
//! `ClientConfig` is fixed once a `Requester` is built. Every call may
//! override any field through `CallOptions`; the two are merged into a fresh
//! `RequestOptions` per call, which is also what gets serialized into error
//! context. JSON keys follow the camelCase names callers already use in
//! configuration files (`baseUrl`, `backupUrl`, `fallbackResponse`), and
//! `timeout` is given in milliseconds.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

pub const DEFAULT_RETRY: u32 = 1;

fn default_retry() -> u32 {
    DEFAULT_RETRY
}

/// Immutable client-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    #[serde(default)]
    pub base_url: String,

    /// Attempts against the primary URL. The backup URL always gets one.
    #[serde(default = "default_retry")]
    pub retry: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_url: Option<String>,

    #[serde(default, with = "millis", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,

    /// Returned instead of an error once every attempt has failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_response: Option<Value>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            retry: DEFAULT_RETRY,
            backup_url: None,
            timeout: None,
            fallback_response: None,
            headers: BTreeMap::new(),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::MissingBaseUrl);
        }
        Ok(())
    }

    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_backup_url(mut self, url: impl Into<String>) -> Self {
        self.backup_url = Some(url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_fallback_response(mut self, value: impl Into<Value>) -> Self {
        self.fallback_response = Some(value.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Per-call overrides. Unset fields fall back to the `ClientConfig`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_url: Option<String>,

    #[serde(default, with = "millis", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_response: Option<Value>,

    /// Merged over the client headers; a per-call value wins.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Query string pairs, appended to both the primary and the backup URL.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, String>,

    /// Sent as a JSON body on methods that carry one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn with_backup_url(mut self, url: impl Into<String>) -> Self {
        self.backup_url = Some(url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_fallback_response(mut self, value: impl Into<Value>) -> Self {
        self.fallback_response = Some(value.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Value>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// The effective settings of one call: config defaults with overrides applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    pub base_url: String,
    pub retry: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_url: Option<String>,
    #[serde(with = "millis", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_response: Option<Value>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl RequestOptions {
    pub fn merge(config: &ClientConfig, call: CallOptions) -> Self {
        let mut headers = config.headers.clone();
        headers.extend(call.headers);

        Self {
            base_url: call.base_url.unwrap_or_else(|| config.base_url.clone()),
            retry: call.retry.unwrap_or(config.retry),
            backup_url: call.backup_url.or_else(|| config.backup_url.clone()),
            timeout: call.timeout.or(config.timeout),
            fallback_response: call
                .fallback_response
                .or_else(|| config.fallback_response.clone()),
            headers,
            query: call.query,
            body: call.body,
        }
    }

    /// Primary attempts to make. A retry of zero still makes one attempt.
    pub fn attempts(&self) -> u32 {
        self.retry.max(1)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// `Option<Duration>` as whole milliseconds.
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_u64(d.as_millis() as u64),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
