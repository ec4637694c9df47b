//! Sticky routing on top of weighted selection.
//!
//! A client stays on its backend while that backend is healthy; otherwise it
//! is re-bound to a fresh weighted pick. Nothing here holds state between
//! calls.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::domain::assignment::ClientAssignment;
use crate::domain::backend::BackendId;
use crate::domain::registry::WeightedPool;
use crate::error::RoutingError;
use crate::load_balancer::selector;

/// How a route was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// The prior assignment was kept.
    Sticky,
    /// The client had no prior assignment.
    Assigned,
    /// The prior backend was unhealthy and the client moved.
    Reassigned,
}

/// The outcome of a routing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Backend that should serve the client now.
    pub backend_id: BackendId,
    /// Assignment the caller should persist.
    pub assignment: ClientAssignment,
    /// Whether the assignment was kept, made, or replaced.
    pub kind: RouteKind,
}

/// Keep `prior` if its backend is healthy, otherwise pick a new backend for
/// `client_id` and bind it at `now`.
pub fn route<R: Rng + ?Sized>(
    client_id: &str,
    prior: Option<ClientAssignment>,
    healthy_ids: &HashSet<BackendId>,
    pool: &WeightedPool,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<Route, RoutingError> {
    let kind = match prior {
        Some(assignment) if healthy_ids.contains(&assignment.backend_id) => {
            return Ok(Route {
                backend_id: assignment.backend_id.clone(),
                assignment,
                kind: RouteKind::Sticky,
            });
        }
        Some(_) => RouteKind::Reassigned,
        None => RouteKind::Assigned,
    };

    let backend_id = selector::pick(healthy_ids, pool, rng)?;
    Ok(Route {
        assignment: ClientAssignment::new(client_id, backend_id.clone(), now),
        backend_id,
        kind,
    })
}
