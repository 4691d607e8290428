//! Live telemetry polling.
//!
//! [`TelemetryFeed`] keeps the latest sensor snapshot and the rolling
//! statistics in two [`SyncedResource`]s. A backend with no data yet answers
//! with an `{"error": ...}` body; that is recorded as a failure and the last
//! good value stays visible.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use growbox_types::{PlantStatus, SensorSnapshot, SensorStats};

use crate::error::Result;
use crate::poller::{PollGroup, PollOptions};
use crate::resource::{SyncOutcome, Synced, SyncedResource};
use crate::traits::DashboardApi;

/// Polls `/latest` and `/stats`.
pub struct TelemetryFeed {
    api: Arc<dyn DashboardApi>,
    latest: SyncedResource<Option<SensorSnapshot>>,
    stats: SyncedResource<Option<SensorStats>>,
    lifetime: CancellationToken,
}

impl TelemetryFeed {
    pub fn new(api: Arc<dyn DashboardApi>) -> Self {
        Self::with_lifetime(api, CancellationToken::new())
    }

    pub fn with_lifetime(api: Arc<dyn DashboardApi>, lifetime: CancellationToken) -> Self {
        Self {
            api,
            latest: SyncedResource::new("latest", None),
            stats: SyncedResource::new("stats", None),
            lifetime,
        }
    }

    /// The most recent snapshot, if any has been applied.
    pub fn latest(&self) -> Synced<Option<SensorSnapshot>> {
        self.latest.get()
    }

    /// The most recent statistics, if any have been applied.
    pub fn stats(&self) -> Synced<Option<SensorStats>> {
        self.stats.get()
    }

    /// Plant condition of the latest snapshot, if any.
    pub fn plant_status(&self) -> Option<PlantStatus> {
        self.latest.value().as_ref().map(PlantStatus::from_snapshot)
    }

    pub fn subscribe_latest(&self) -> watch::Receiver<Synced<Option<SensorSnapshot>>> {
        self.latest.subscribe()
    }

    pub fn subscribe_stats(&self) -> watch::Receiver<Synced<Option<SensorStats>>> {
        self.stats.subscribe()
    }

    pub async fn refresh_latest(&self) -> SyncOutcome {
        let outcome = self
            .latest
            .refresh_with(&self.lifetime, self.api.latest(), |snapshot, _| {
                Ok(Some(snapshot))
            })
            .await;
        match outcome {
            SyncOutcome::Applied(seq) => {
                if let Some(s) = self.latest.value() {
                    debug!(
                        seq,
                        timestamp = s.timestamp.as_deref().unwrap_or(""),
                        soil = s.soil,
                        temp = s.temp,
                        humidity = s.humidity,
                        status = %PlantStatus::from_snapshot(&s),
                        "Sensor snapshot applied"
                    );
                }
            }
            SyncOutcome::Failed => {
                warn!(error = ?self.latest.get().error, "Latest reading unavailable");
            }
            _ => {}
        }
        outcome
    }

    pub async fn refresh_stats(&self) -> SyncOutcome {
        let outcome = self
            .stats
            .refresh_with(&self.lifetime, self.api.stats(), |stats, _| Ok(Some(stats)))
            .await;
        if outcome == SyncOutcome::Failed {
            warn!(error = ?self.stats.get().error, "Statistics unavailable");
        }
        outcome
    }

    /// Refresh both resources concurrently.
    pub async fn refresh(&self) -> (SyncOutcome, SyncOutcome) {
        tokio::join!(self.refresh_latest(), self.refresh_stats())
    }

    /// Register one poller per endpoint in `group`.
    pub fn start_polling(self: &Arc<Self>, group: &mut PollGroup, every: Duration) -> Result<()> {
        let this = Arc::clone(self);
        group.spawn(PollOptions::new("latest", every), move || {
            let this = Arc::clone(&this);
            async move {
                this.refresh_latest().await;
            }
        })?;
        let this = Arc::clone(self);
        group.spawn(PollOptions::new("stats", every), move || {
            let this = Arc::clone(&this);
            async move {
                this.refresh_stats().await;
            }
        })
    }

    pub fn teardown(&self) {
        self.lifetime.cancel();
    }
}
