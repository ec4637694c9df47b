//! Client-to-backend bindings owned by the session layer.
//!
//! The core never stores these; it receives one per decision and hands back
//! the one the caller should persist.

use chrono::{DateTime, Utc};

use crate::domain::backend::BackendId;

/// A client's current sticky binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAssignment {
    /// Opaque client identity chosen by the session layer.
    pub client_id: String,
    /// The backend the client is bound to.
    pub backend_id: BackendId,
    /// When the binding was made.
    pub assigned_at: DateTime<Utc>,
}

impl ClientAssignment {
    /// Bind `client_id` to `backend_id` as of `assigned_at`.
    pub fn new(
        client_id: impl Into<String>,
        backend_id: BackendId,
        assigned_at: DateTime<Utc>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            backend_id,
            assigned_at,
        }
    }
}

/// What the session layer knows about the caller of a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSession {
    /// Identity used for any new assignment.
    pub client_id: String,
    /// The assignment recovered from the session, if any.
    pub assignment: Option<ClientAssignment>,
}

impl ClientSession {
    /// A client with no prior assignment.
    pub fn fresh(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            assignment: None,
        }
    }

    /// A client carrying a prior assignment.
    pub fn with_assignment(assignment: ClientAssignment) -> Self {
        Self {
            client_id: assignment.client_id.clone(),
            assignment: Some(assignment),
        }
    }
}
