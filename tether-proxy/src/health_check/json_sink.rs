//! Writes each health snapshot to a JSON file for external inspection.

use std::error::Error;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tether_core::{BackendRegistry, HealthRecord, HealthSnapshot, ProbeDetail, SnapshotSink};

/// Replaces `path` with the latest snapshot after every probe cycle.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    /// Sink writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Target file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn entry(record: Option<&HealthRecord>) -> Value {
    match record {
        None => json!({ "status": "unknown" }),
        Some(record) => match &record.detail {
            ProbeDetail::Status(code) => json!({
                "status": if record.healthy { "healthy" } else { "unhealthy" },
                "status_code": code,
            }),
            ProbeDetail::Error(error) => json!({ "status": "unreachable", "error": error }),
            ProbeDetail::Assumed => json!({ "status": "assumed" }),
        },
    }
}

/// JSON document for `snapshot`, keyed by backend url.
pub fn render(registry: &BackendRegistry, snapshot: &HealthSnapshot) -> Value {
    let results: Map<String, Value> = registry
        .all()
        .iter()
        .map(|backend| (backend.url().to_string(), entry(snapshot.get(&backend.id))))
        .collect();
    Value::Object(results)
}

#[async_trait]
impl SnapshotSink for JsonFileSink {
    async fn write(
        &self,
        registry: &BackendRegistry,
        snapshot: &HealthSnapshot,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let body = serde_json::to_vec_pretty(&render(registry, snapshot))?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tether_core::{BackendConfig, BackendId, HealthStore};

    fn fixture() -> (BackendRegistry, HealthStore) {
        let registry = BackendRegistry::load(&[
            BackendConfig::new("http://ok/", 1),
            BackendConfig::new("http://bad/", 1),
            BackendConfig::new("http://down/", 1),
            BackendConfig::new("http://new/", 1),
        ])
        .unwrap();
        let now = Utc::now();
        let store = HealthStore::new();
        store.publish(
            [
                HealthRecord::from_status(BackendId::from("http://ok/"), 200, now),
                HealthRecord::from_status(BackendId::from("http://bad/"), 500, now),
                HealthRecord::unreachable(BackendId::from("http://down/"), "timed out", now),
            ]
            .into_iter()
            .map(|r| (r.backend_id.clone(), r))
            .collect(),
        );
        (registry, store)
    }

    #[test]
    fn test_render_matches_report_format() {
        let (registry, store) = fixture();
        let doc = render(&registry, &store.snapshot());
        assert_eq!(
            doc,
            json!({
                "http://ok/": { "status": "healthy", "status_code": 200 },
                "http://bad/": { "status": "unhealthy", "status_code": 500 },
                "http://down/": { "status": "unreachable", "error": "timed out" },
                "http://new/": { "status": "unknown" },
            })
        );
    }

    #[tokio::test]
    async fn test_write_replaces_file() {
        let (registry, store) = fixture();
        let path = std::env::temp_dir().join(format!("tether-sink-{}.json", std::process::id()));
        let sink = JsonFileSink::new(&path);

        sink.write(&registry, &store.snapshot()).await.unwrap();
        let written: Value = serde_json::from_slice(&std::fs::read(sink.path()).unwrap()).unwrap();
        assert_eq!(written["http://ok/"]["status"], "healthy");

        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_unwritable_path_is_error() {
        let (registry, store) = fixture();
        let sink = JsonFileSink::new("/nonexistent-dir/tether/health.json");
        assert!(sink.write(&registry, &store.snapshot()).await.is_err());
    }
}
