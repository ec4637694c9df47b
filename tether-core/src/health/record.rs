//! Per-backend health records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::backend::BackendId;

/// What the last probe observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ProbeDetail {
    /// Not probed yet; health was assumed at startup.
    Assumed,
    /// The backend answered with this status code.
    Status(u16),
    /// No response: transport error or timeout.
    Error(String),
}

impl fmt::Display for ProbeDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeDetail::Assumed => f.write_str("assumed"),
            ProbeDetail::Status(code) => write!(f, "status {code}"),
            ProbeDetail::Error(e) => f.write_str(e),
        }
    }
}

/// Health of one backend as of its last probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthRecord {
    /// Which backend this describes.
    pub backend_id: BackendId,
    /// Whether the backend may receive new assignments.
    pub healthy: bool,
    /// When the record was produced.
    pub last_checked: DateTime<Utc>,
    /// Status code or error behind `healthy`.
    pub detail: ProbeDetail,
}

impl HealthRecord {
    /// Classify a received status code: any 2xx is healthy.
    pub fn from_status(backend_id: BackendId, status: u16, at: DateTime<Utc>) -> Self {
        Self {
            backend_id,
            healthy: (200..300).contains(&status),
            last_checked: at,
            detail: ProbeDetail::Status(status),
        }
    }

    /// A probe that got no response.
    pub fn unreachable(backend_id: BackendId, error: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            backend_id,
            healthy: false,
            last_checked: at,
            detail: ProbeDetail::Error(error.into()),
        }
    }

    /// The optimistic startup record.
    pub fn assumed_healthy(backend_id: BackendId, at: DateTime<Utc>) -> Self {
        Self {
            backend_id,
            healthy: true,
            last_checked: at,
            detail: ProbeDetail::Assumed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let id = BackendId::from("http://a/");
        let now = Utc::now();
        assert!(HealthRecord::from_status(id.clone(), 200, now).healthy);
        assert!(HealthRecord::from_status(id.clone(), 204, now).healthy);
        assert!(!HealthRecord::from_status(id.clone(), 301, now).healthy);
        assert!(!HealthRecord::from_status(id.clone(), 503, now).healthy);
        assert!(!HealthRecord::unreachable(id, "refused", now).healthy);
    }
}
