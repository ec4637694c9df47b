//! The decision facade called by the request-handling layer.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use tracing::debug;

use crate::domain::assignment::ClientSession;
use crate::domain::backend::BackendId;
use crate::domain::registry::BackendRegistry;
use crate::error::RoutingError;
use crate::health::record::ProbeDetail;
use crate::health::store::HealthStore;
use crate::load_balancer::affinity::{self, Route};

/// Result of [`Balancer::decide`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingDecision {
    /// Send the client to `route.backend_id` and persist `route.assignment`.
    Routed(Route),
    /// No backend is healthy; answer with a 503-equivalent.
    ServiceUnavailable,
}

/// Externally reported health of one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendStatus {
    /// Whether the backend is in the current healthy set.
    pub healthy: bool,
    /// Last probe detail, `None` if never probed.
    pub detail: Option<ProbeDetail>,
    /// When it was last probed.
    pub last_checked: Option<DateTime<Utc>>,
}

/// Ties the static registry to the live health store.
///
/// Cheap to share behind an `Arc`; every call reads one health snapshot and
/// holds no lock while deciding.
#[derive(Debug, Clone)]
pub struct Balancer {
    registry: Arc<BackendRegistry>,
    store: Arc<HealthStore>,
}

impl Balancer {
    /// Create a balancer over `registry`, reading health from `store`.
    pub fn new(registry: Arc<BackendRegistry>, store: Arc<HealthStore>) -> Self {
        Self { registry, store }
    }

    /// The backend registry.
    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    /// The health store the prober publishes into.
    pub fn store(&self) -> &Arc<HealthStore> {
        &self.store
    }

    /// Decide where `session` goes, using the thread-local RNG.
    pub fn decide(&self, session: ClientSession) -> RoutingDecision {
        self.decide_with(session, &mut rand::rng())
    }

    /// Decide where `session` goes, drawing from `rng`.
    pub fn decide_with<R: Rng + ?Sized>(&self, session: ClientSession, rng: &mut R) -> RoutingDecision {
        let snapshot = self.store.snapshot();
        let outcome = affinity::route(
            &session.client_id,
            session.assignment,
            snapshot.healthy_ids(),
            self.registry.weighted_pool(),
            rng,
            Utc::now(),
        );

        match outcome {
            Ok(route) => {
                debug!(
                    client = %route.assignment.client_id,
                    backend = %route.backend_id,
                    kind = ?route.kind,
                    generation = snapshot.generation(),
                    "Routed client"
                );
                RoutingDecision::Routed(route)
            }
            Err(RoutingError::NoHealthyBackend) => RoutingDecision::ServiceUnavailable,
        }
    }

    /// Health of every registry backend, for monitoring.
    pub fn snapshot(&self) -> BTreeMap<BackendId, BackendStatus> {
        let snapshot = self.store.snapshot();
        self.registry
            .all()
            .iter()
            .map(|backend| {
                let record = snapshot.get(&backend.id);
                let status = BackendStatus {
                    healthy: snapshot.is_healthy(&backend.id),
                    detail: record.map(|r| r.detail.clone()),
                    last_checked: record.map(|r| r.last_checked),
                };
                (backend.id.clone(), status)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use crate::domain::assignment::ClientAssignment;
    use crate::health::record::HealthRecord;
    use crate::load_balancer::affinity::RouteKind;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn balancer() -> Balancer {
        let registry = BackendRegistry::load(&[
            BackendConfig::new("http://a/", 1),
            BackendConfig::new("http://b/", 3),
        ])
        .unwrap();
        let store = HealthStore::new();
        Balancer::new(Arc::new(registry), Arc::new(store))
    }

    fn set_health(balancer: &Balancer, states: &[(&str, bool)]) {
        let now = Utc::now();
        let records = states
            .iter()
            .map(|(url, healthy)| {
                let id = BackendId::from(*url);
                let code = if *healthy { 200 } else { 502 };
                (id.clone(), HealthRecord::from_status(id, code, now))
            })
            .collect();
        balancer.store().publish(records);
    }

    #[test]
    fn test_unprobed_backends_are_unavailable() {
        let balancer = balancer();
        assert_eq!(
            balancer.decide(ClientSession::fresh("c")),
            RoutingDecision::ServiceUnavailable
        );
    }

    #[test]
    fn test_prior_for_unknown_backend_is_replaced() {
        let balancer = balancer();
        set_health(&balancer, &[("http://a/", true), ("http://b/", true)]);
        let stale = ClientAssignment::new("c", BackendId::from("http://gone/"), Utc::now());
        let mut rng = StdRng::seed_from_u64(5);

        match balancer.decide_with(ClientSession::with_assignment(stale), &mut rng) {
            RoutingDecision::Routed(route) => {
                assert_eq!(route.kind, RouteKind::Reassigned);
                assert!(balancer.registry().get(&route.backend_id).is_some());
            }
            other => panic!("expected a route, got {other:?}"),
        }
    }

    #[test]
    fn test_snapshot_reports_every_backend() {
        let balancer = balancer();
        set_health(&balancer, &[("http://a/", false)]);

        let status = balancer.snapshot();
        assert_eq!(status.len(), 2);
        let a = &status[&BackendId::from("http://a/")];
        assert!(!a.healthy);
        assert_eq!(a.detail, Some(ProbeDetail::Status(502)));
        let b = &status[&BackendId::from("http://b/")];
        assert!(!b.healthy);
        assert_eq!(b.detail, None);
    }
}
