use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Url;

use crate::loader::error::LoadError;

/// Correlates a `LoadRequest` with its `TelemetryRecord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

pub const OPT_TIMEOUT_MS: &str = "timeoutMs";
pub const OPT_HEADERS: &str = "headers";
pub const OPT_MAX_BYTES: &str = "maxBytes";

/// Open, host-defined configuration for a single load.
///
/// Loaders read the keys they recognise and ignore the rest. A recognised key
/// carrying the wrong value type is treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoadOptions(HashMap<String, Value>);

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.u64_key(OPT_TIMEOUT_MS).map(Duration::from_millis)
    }

    pub fn max_bytes(&self) -> Option<u64> {
        self.u64_key(OPT_MAX_BYTES)
    }

    /// Pairs that are not a valid header name and string value are skipped.
    pub fn headers(&self) -> Vec<(String, String)> {
        match self.0.get(OPT_HEADERS) {
            Some(Value::Object(map)) => map
                .iter()
                .filter_map(|(name, value)| {
                    let valid = value.as_str().filter(|v| {
                        HeaderName::from_bytes(name.as_bytes()).is_ok()
                            && HeaderValue::from_str(v).is_ok()
                    });
                    if valid.is_none() {
                        warn!("Ignoring header '{}': invalid name or value {}", name, value);
                    }
                    valid.map(|v| (name.clone(), v.to_string()))
                })
                .collect(),
            Some(other) => {
                warn!("Ignoring option '{}': expected object, got {}", OPT_HEADERS, other);
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    fn u64_key(&self, key: &str) -> Option<u64> {
        let value = self.0.get(key)?;
        let parsed = value.as_u64();
        if parsed.is_none() {
            warn!("Ignoring option '{}': expected unsigned integer, got {}", key, value);
        }
        parsed
    }
}

impl From<HashMap<String, Value>> for LoadOptions {
    fn from(map: HashMap<String, Value>) -> Self {
        Self(map)
    }
}

/// One tracked fetch attempt.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub id: RequestId,
    pub locator: String,
    pub options: LoadOptions,
    /// Opt-in, best-effort cancellation. Cancelling never produces a second delivery.
    pub cancel: CancellationToken,
}

impl LoadRequest {
    pub fn new(locator: impl Into<String>, options: Option<LoadOptions>) -> Self {
        Self {
            id: RequestId::new(),
            locator: locator.into(),
            options: options.unwrap_or_default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Rejects empty and unparseable locators. Performs no I/O.
pub fn parse_locator(locator: &str) -> Result<Url, LoadError> {
    let trimmed = locator.trim();
    if trimmed.is_empty() {
        return Err(LoadError::InvalidLocator("empty locator".to_string()));
    }
    Url::parse(trimmed).map_err(|e| LoadError::InvalidLocator(format!("{}: {}", trimmed, e)))
}
