//! Background prober for active HTTP health checks.

use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ProbeSettings;
use crate::domain::backend::{Backend, BackendId};
use crate::domain::registry::BackendRegistry;
use crate::health::record::HealthRecord;
use crate::health::store::{HealthSnapshot, HealthStore};

/// HTTP-capable client used for existence probes.
#[async_trait]
pub trait ProbeTransport: Send + Sync {
    /// Issue a HEAD-equivalent request to `url` and return the status code.
    ///
    /// The prober enforces its own timeout around this call.
    async fn head(&self, url: &str) -> Result<u16, Box<dyn Error + Send + Sync>>;
}

/// Optional external writer for each published snapshot.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    /// Persist `snapshot`. Failures are logged by the prober and otherwise ignored.
    async fn write(
        &self,
        registry: &BackendRegistry,
        snapshot: &HealthSnapshot,
    ) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// Probes every registry backend once per tick and publishes the results as
/// one snapshot.
pub struct HealthProber {
    registry: Arc<BackendRegistry>,
    store: Arc<HealthStore>,
    transport: Arc<dyn ProbeTransport>,
    sink: Option<Arc<dyn SnapshotSink>>,
    settings: ProbeSettings,
}

impl HealthProber {
    /// Create a prober publishing into `store`.
    pub fn new(
        registry: Arc<BackendRegistry>,
        store: Arc<HealthStore>,
        transport: Arc<dyn ProbeTransport>,
        settings: ProbeSettings,
    ) -> Self {
        Self {
            registry,
            store,
            transport,
            sink: None,
            settings,
        }
    }

    /// Also hand every published snapshot to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn SnapshotSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    async fn probe_backend(&self, backend: &Backend) -> HealthRecord {
        let timeout = self.settings.timeout();
        let outcome = time::timeout(timeout, self.transport.head(backend.url())).await;
        let now = Utc::now();

        match outcome {
            Ok(Ok(status)) => HealthRecord::from_status(backend.id.clone(), status, now),
            Ok(Err(e)) => HealthRecord::unreachable(backend.id.clone(), e.to_string(), now),
            Err(_) => HealthRecord::unreachable(
                backend.id.clone(),
                format!("probe timed out after {}ms", timeout.as_millis()),
                now,
            ),
        }
    }

    // Probes run concurrently, so a tick lasts at most one probe timeout.
    async fn collect(&self) -> HashMap<BackendId, HealthRecord> {
        let probes = self.registry.all().iter().map(|b| self.probe_backend(b));
        join_all(probes)
            .await
            .into_iter()
            .map(|record| (record.backend_id.clone(), record))
            .collect()
    }

    fn publish(&self, records: HashMap<BackendId, HealthRecord>) -> Arc<HealthSnapshot> {
        let previous = self.store.snapshot();

        for record in records.values() {
            if !record.healthy {
                warn!(backend = %record.backend_id, detail = %record.detail, "Health probe failed");
            }
            let was_healthy = previous.is_healthy(&record.backend_id);
            if record.healthy != was_healthy {
                info!(
                    backend = %record.backend_id,
                    from = was_healthy,
                    to = record.healthy,
                    "Backend health changed"
                );
            }
        }

        let snapshot = self.store.publish(records);
        debug!(
            generation = snapshot.generation(),
            healthy = snapshot.healthy_ids().len(),
            total = self.registry.len(),
            "Published health snapshot"
        );
        snapshot
    }

    // Sink writes share the probe timeout.
    async fn emit(&self, snapshot: &HealthSnapshot) {
        let Some(sink) = &self.sink else {
            return;
        };

        let timeout = self.settings.timeout();
        match time::timeout(timeout, sink.write(&self.registry, snapshot)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to write health snapshot to sink"),
            Err(_) => warn!(
                timeout_ms = timeout.as_millis() as u64,
                "Health snapshot sink timed out"
            ),
        }
    }

    /// Run a single probe cycle and publish it.
    pub async fn tick(&self) -> Arc<HealthSnapshot> {
        let records = self.collect().await;
        let snapshot = self.publish(records);
        self.emit(&snapshot).await;
        snapshot
    }

    /// Probe on a fixed cadence until `shutdown` fires.
    ///
    /// The first tick starts immediately. A slow tick delays the next one
    /// instead of queueing extra ticks. Shutdown during a tick drops it
    /// without publishing; shutdown during a sink write abandons the write.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut interval = time::interval(self.settings.interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            backends = self.registry.len(),
            interval_ms = self.settings.interval_ms,
            timeout_ms = self.settings.timeout_ms,
            "Starting health prober"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }

            let records = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!("Shutdown during probe cycle, discarding partial results");
                    break;
                }
                records = self.collect() => records,
            };

            let snapshot = self.publish(records);

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = self.emit(&snapshot) => {}
            }
        }

        info!("Health prober stopped");
    }

    /// Spawns the prober as a background Tokio task.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
