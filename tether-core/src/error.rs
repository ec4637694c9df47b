//! Error taxonomy for configuration and routing.

use thiserror::Error;

/// Errors raised while loading the backend registry or probe settings.
///
/// Any of these is fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The backend list is empty.
    #[error("backend list is empty")]
    EmptyRegistry,

    /// A backend entry has an empty url.
    #[error("backend #{0} has an empty url")]
    EmptyUrl(usize),

    /// The same url is listed more than once.
    #[error("backend '{0}' is listed more than once")]
    DuplicateBackend(String),

    /// A weight is zero or negative.
    #[error("backend '{url}' has non-positive weight {weight}")]
    NonPositiveWeight {
        /// Url of the offending backend.
        url: String,
        /// The configured weight.
        weight: i64,
    },

    /// A weight does not fit the pool's index space.
    #[error("backend '{url}' weight {weight} is too large")]
    WeightTooLarge {
        /// Url of the offending backend.
        url: String,
        /// The configured weight.
        weight: i64,
    },

    /// Probe interval or timeout is unusable.
    #[error("invalid probe settings: {0}")]
    InvalidProbeSettings(&'static str),
}

/// The only error that crosses the routing boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RoutingError {
    /// No backend in the weighted pool is currently healthy.
    #[error("no healthy backend available")]
    NoHealthyBackend,
}
