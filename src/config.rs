use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::kernel::telemetry::recorder::DEFAULT_MAX_EVENTS;

pub const ENV_TIMEOUT_MS: &str = "APPLOADER_TIMEOUT_MS";
pub const ENV_MAX_EVENTS: &str = "APPLOADER_MAX_EVENTS";
pub const ENV_USER_AGENT: &str = "APPLOADER_USER_AGENT";

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoaderConfig {
    /// Applied when a request carries no `timeoutMs` option.
    pub default_timeout_ms: u64,
    /// Telemetry ring buffer size.
    pub max_telemetry_events: usize,
    pub user_agent: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            max_telemetry_events: DEFAULT_MAX_EVENTS,
            user_agent: format!("apploader/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl LoaderConfig {
    /// Defaults overridden by `APPLOADER_*` variables. Unparseable values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            match raw.trim().parse() {
                Ok(ms) => config.default_timeout_ms = ms,
                Err(e) => warn!("Ignoring {}={:?}: {}", ENV_TIMEOUT_MS, raw, e),
            }
        }
        if let Some(raw) = lookup(ENV_MAX_EVENTS) {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.max_telemetry_events = n,
                Ok(_) => warn!("Ignoring {}=0", ENV_MAX_EVENTS),
                Err(e) => warn!("Ignoring {}={:?}: {}", ENV_MAX_EVENTS, raw, e),
            }
        }
        if let Some(raw) = lookup(ENV_USER_AGENT) {
            if !raw.trim().is_empty() {
                config.user_agent = raw;
            }
        }

        config
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}
