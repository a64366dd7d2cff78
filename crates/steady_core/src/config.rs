//! Controller configuration.

use crate::error::{ControllerError, ControllerResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use steady_queue::{duration_ms, RateLimitConfig};

/// Settings for a [`Controller`](crate::Controller).
///
/// Durations are written as milliseconds when serialized; missing fields
/// take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Name of the configuration object to reconcile. `None` leaves the
    /// controller running but unable to reconcile anything.
    pub target_name: Option<String>,
    /// Number of worker threads.
    pub workers: usize,
    /// Name of the work queue, also used for thread names.
    pub queue_name: String,
    /// How often to check whether the change source has synced.
    #[serde(rename = "cache_sync_poll_interval_ms", with = "duration_ms")]
    pub cache_sync_poll_interval: Duration,
    /// Give up waiting for the change source after this long.
    #[serde(
        rename = "cache_sync_timeout_ms",
        with = "optional_duration_ms",
        skip_serializing_if = "Option::is_none"
    )]
    pub cache_sync_timeout: Option<Duration>,
    /// Retry backoff settings.
    pub rate_limit: RateLimitConfig,
}

impl ControllerConfig {
    /// Creates the default settings for the given target.
    pub fn for_target(name: impl Into<String>) -> Self {
        Self {
            target_name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Sets the target name.
    #[must_use]
    pub fn with_target_name(mut self, name: impl Into<String>) -> Self {
        self.target_name = Some(name.into());
        self
    }

    /// Sets the worker count.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the queue name.
    #[must_use]
    pub fn with_queue_name(mut self, name: impl Into<String>) -> Self {
        self.queue_name = name.into();
        self
    }

    /// Sets the cache sync poll interval.
    #[must_use]
    pub fn with_cache_sync_poll_interval(mut self, interval: Duration) -> Self {
        self.cache_sync_poll_interval = interval;
        self
    }

    /// Sets the cache sync timeout.
    #[must_use]
    pub fn with_cache_sync_timeout(mut self, timeout: Duration) -> Self {
        self.cache_sync_timeout = Some(timeout);
        self
    }

    /// Sets the retry backoff settings.
    #[must_use]
    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Checks the settings.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::InvalidConfig`] if there are no workers,
    /// the queue name or poll interval is empty, or the rate limit settings
    /// are unusable.
    pub fn validate(&self) -> ControllerResult<()> {
        if self.workers == 0 {
            return Err(ControllerError::InvalidConfig(
                "workers must be at least 1".into(),
            ));
        }
        if self.queue_name.is_empty() {
            return Err(ControllerError::InvalidConfig(
                "queue name must not be empty".into(),
            ));
        }
        if self.cache_sync_poll_interval.is_zero() {
            return Err(ControllerError::InvalidConfig(
                "cache sync poll interval must be positive".into(),
            ));
        }
        self.rate_limit
            .validate()
            .map_err(|e| ControllerError::InvalidConfig(e.to_string()))
    }

    /// Parses and validates settings from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::InvalidConfig`] if the JSON is malformed or
    /// the settings fail [`validate`](Self::validate).
    pub fn from_json_str(json: &str) -> ControllerResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ControllerError::InvalidConfig(format!("malformed config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads settings from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Io`] if the file cannot be read, otherwise
    /// as [`from_json_str`](Self::from_json_str).
    pub fn from_json_file(path: impl AsRef<Path>) -> ControllerResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            target_name: None,
            workers: 1,
            queue_name: "config".to_string(),
            cache_sync_poll_interval: Duration::from_millis(100),
            cache_sync_timeout: None,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

mod optional_duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
