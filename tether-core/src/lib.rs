//! Tether Core functionality.
//!
//! This crate contains the backend registry, the health snapshot store and its
//! background prober, and the weighted, sticky routing primitives that decide
//! which backend should serve a client.

pub mod balancer;
pub mod config;
pub mod domain;
pub mod error;
pub mod health;
pub mod load_balancer;

pub use balancer::{Balancer, BackendStatus, RoutingDecision};
pub use config::{BackendConfig, BalancerConfig, ProbeSettings};
pub use domain::assignment::{ClientAssignment, ClientSession};
pub use domain::backend::{Backend, BackendId};
pub use domain::registry::{BackendRegistry, WeightedPool};
pub use error::{ConfigError, RoutingError};
pub use health::prober::{HealthProber, ProbeTransport, SnapshotSink};
pub use health::record::{HealthRecord, ProbeDetail};
pub use health::store::{HealthSnapshot, HealthStore};
pub use load_balancer::affinity::{Route, RouteKind};
