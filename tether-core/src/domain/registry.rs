//! Process-wide backend registry and its weight-expanded pool.

use std::collections::HashSet;

use crate::config::BackendConfig;
use crate::domain::backend::{Backend, BackendId};
use crate::error::ConfigError;

/// Weighted sampling structure.
///
/// Stores each backend once with its weight, in registry order. Iterating
/// yields the equivalent expanded sequence: each backend contributes exactly
/// `weight` consecutive entries, so `len()` equals the sum of all weights.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightedPool {
    members: Vec<(BackendId, u32)>,
    total: u64,
}

impl WeightedPool {
    /// Build a pool directly from backends.
    pub fn from_backends(backends: &[Backend]) -> Self {
        let members: Vec<_> = backends.iter().map(|b| (b.id.clone(), b.weight)).collect();
        let total = members.iter().map(|(_, w)| u64::from(*w)).sum();
        Self { members, total }
    }

    /// Total number of entries (sum of weights).
    pub fn len(&self) -> u64 {
        self.total
    }

    /// Whether the pool has no entries.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Each backend once, with its weight, in registry order.
    pub fn members(&self) -> impl Iterator<Item = (&BackendId, u32)> {
        self.members.iter().map(|(id, w)| (id, *w))
    }

    /// All entries in deterministic expansion order, produced lazily.
    pub fn iter(&self) -> impl Iterator<Item = &BackendId> {
        self.members
            .iter()
            .flat_map(|(id, w)| std::iter::repeat_n(id, *w as usize))
    }

    /// Whether `id` has any entry in the pool.
    pub fn contains(&self, id: &BackendId) -> bool {
        self.members.iter().any(|(member, _)| member == id)
    }
}

/// Immutable set of backends loaded once at startup.
#[derive(Debug, Clone)]
pub struct BackendRegistry {
    backends: Vec<Backend>,
    pool: WeightedPool,
}

impl BackendRegistry {
    /// Validate the configured list and build the registry.
    ///
    /// Fails on an empty list, an empty or duplicated url, or a weight
    /// outside `1..=u32::MAX`.
    pub fn load(config: &[BackendConfig]) -> Result<Self, ConfigError> {
        if config.is_empty() {
            return Err(ConfigError::EmptyRegistry);
        }

        let mut seen = HashSet::with_capacity(config.len());
        let mut backends = Vec::with_capacity(config.len());

        for (index, entry) in config.iter().enumerate() {
            let url = entry.url.trim();
            if url.is_empty() {
                return Err(ConfigError::EmptyUrl(index));
            }
            if entry.weight <= 0 {
                return Err(ConfigError::NonPositiveWeight {
                    url: url.to_string(),
                    weight: entry.weight,
                });
            }
            let weight = u32::try_from(entry.weight).map_err(|_| ConfigError::WeightTooLarge {
                url: url.to_string(),
                weight: entry.weight,
            })?;
            if !seen.insert(url.to_string()) {
                return Err(ConfigError::DuplicateBackend(url.to_string()));
            }
            backends.push(Backend::new(BackendId::new(url), weight));
        }

        let pool = WeightedPool::from_backends(&backends);
        Ok(Self { backends, pool })
    }

    /// Backends in configuration order.
    pub fn all(&self) -> &[Backend] {
        &self.backends
    }

    /// The cached weighted pool.
    pub fn weighted_pool(&self) -> &WeightedPool {
        &self.pool
    }

    /// Look up a backend by id.
    pub fn get(&self, id: &BackendId) -> Option<&Backend> {
        self.backends.iter().find(|b| &b.id == id)
    }

    /// Look up a backend by url.
    pub fn find_url(&self, url: &str) -> Option<&Backend> {
        self.backends.iter().find(|b| b.url() == url)
    }

    /// Number of backends.
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Always false for a loaded registry.
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}
