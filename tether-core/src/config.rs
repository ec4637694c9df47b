//! Configuration input for the balancer core.
//!
//! Loading the file is left to the host; these types only describe its shape.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// One configured backend: where it lives and its relative weight.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BackendConfig {
    /// The backend url, also used as its identity.
    pub url: String,
    /// Relative weight, must be at least 1.
    pub weight: i64,
}

impl BackendConfig {
    /// Convenience constructor, mostly for tests and embedding.
    pub fn new(url: impl Into<String>, weight: i64) -> Self {
        Self {
            url: url.into(),
            weight,
        }
    }
}

/// Cadence and per-probe timeout of the health prober.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    /// Milliseconds between the start of consecutive ticks.
    pub interval_ms: u64,
    /// Upper bound on a single probe, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            interval_ms: 10_000,
            timeout_ms: 2_000,
        }
    }
}

impl ProbeSettings {
    /// Interval between tick starts.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Per-probe timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Rejects zero interval or timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_ms == 0 {
            return Err(ConfigError::InvalidProbeSettings("interval_ms must be positive"));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::InvalidProbeSettings("timeout_ms must be positive"));
        }
        Ok(())
    }
}

/// Everything the core needs at startup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BalancerConfig {
    /// Ordered backend list.
    pub backends: Vec<BackendConfig>,
    /// Prober cadence; defaults to a 10s interval and 2s timeout.
    #[serde(default)]
    pub probe: ProbeSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_probe_settings() {
        let settings = ProbeSettings::default();
        assert_eq!(settings.interval(), Duration::from_secs(10));
        assert_eq!(settings.timeout(), Duration::from_secs(2));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let settings = ProbeSettings {
            interval_ms: 0,
            timeout_ms: 100,
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidProbeSettings(_))
        ));
    }
}
