//! Client configuration.

use std::time::Duration;

use fleetwatch_transport::ReconnectPolicy;

use crate::FleetError;

/// Where to connect and how to reconnect.
///
/// ```rust
/// use std::time::Duration;
/// use fleetwatch::{ClientConfig, ReconnectPolicy};
///
/// let config = ClientConfig::new("ws://fleet.example:8080/websocket")
///     .reconnect(ReconnectPolicy::new(Duration::from_secs(1), Duration::from_secs(30)));
/// assert_eq!(config.reconnect.max_delay, Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server endpoint, `ws://` or `wss://`.
    pub url: String,
    pub reconnect: ReconnectPolicy,
}

impl ClientConfig {
    pub const DEFAULT_URL: &'static str = "ws://localhost:8080/websocket";

    pub const ENV_URL: &'static str = "FLEETWATCH_URL";
    pub const ENV_RECONNECT_MIN_MS: &'static str = "FLEETWATCH_RECONNECT_MIN_MS";
    pub const ENV_RECONNECT_MAX_MS: &'static str = "FLEETWATCH_RECONNECT_MAX_MS";

    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Replaces the reconnect policy.
    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Reads the configuration from `FLEETWATCH_*` environment variables,
    /// falling back to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup(Self::ENV_URL).filter(|u| !u.trim().is_empty()) {
            config.url = url.trim().to_string();
        }
        if let Some(min) = millis(&lookup, Self::ENV_RECONNECT_MIN_MS) {
            config.reconnect.min_delay = min;
        }
        if let Some(max) = millis(&lookup, Self::ENV_RECONNECT_MAX_MS) {
            config.reconnect.max_delay = max;
        }
        config
    }

    /// Checks the URL scheme and normalizes the reconnect policy.
    ///
    /// # Errors
    /// [`FleetError::InvalidConfig`] if the URL is not `ws://` or `wss://`.
    pub fn validated(mut self) -> Result<Self, FleetError> {
        let scheme_ok = ["ws://", "wss://"]
            .iter()
            .any(|scheme| self.url.len() > scheme.len() && self.url.starts_with(scheme));
        if !scheme_ok {
            return Err(FleetError::InvalidConfig(format!(
                "url must start with ws:// or wss://, got {:?}",
                self.url
            )));
        }
        self.reconnect = self.reconnect.validated();
        Ok(self)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_URL)
    }
}

fn millis(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<Duration> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring non-numeric milliseconds");
            None
        }
    }
}
