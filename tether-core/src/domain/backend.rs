//! Backend server models.

use std::fmt;

use serde::Serialize;

/// A unique identifier for a backend server: its url.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct BackendId(String);

impl BackendId {
    /// Wrap a url as a backend identity.
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// The url this id stands for.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BackendId {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

/// Represents a single upstream backend server.
///
/// Immutable once the registry is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    /// The unique ID of the backend
    pub id: BackendId,
    /// Relative selection weight, at least 1
    pub weight: u32,
}

impl Backend {
    /// Create a backend. Weight validation happens in the registry.
    pub fn new(id: BackendId, weight: u32) -> Self {
        Self { id, weight }
    }

    /// The backend url.
    pub fn url(&self) -> &str {
        self.id.as_str()
    }
}
