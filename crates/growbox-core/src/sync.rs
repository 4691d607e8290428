//! Pull-based reconciliation of control state with the backend.
//!
//! [`SettingsSynchronizer`] fetches the canonical settings and device status
//! and replaces the matching resource in the shared [`ControlStore`] in one
//! step. A snapshot is never merged field by field, and a payload that
//! violates an invariant is rejected as a whole.
//!
//! [`ControlStore`]: crate::store::ControlStore

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use growbox_types::{ControlSettings, DeviceBoard};

use crate::error::Result;
use crate::poller::{PollGroup, PollOptions};
use crate::resource::SyncOutcome;
use crate::store::SharedStore;
use crate::traits::DashboardApi;

/// Keeps a [`crate::store::ControlStore`] in step with the backend.
pub struct SettingsSynchronizer {
    api: Arc<dyn DashboardApi>,
    store: SharedStore,
    lifetime: CancellationToken,
}

impl std::fmt::Debug for SettingsSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsSynchronizer")
            .field("torn_down", &self.lifetime.is_cancelled())
            .finish()
    }
}

impl SettingsSynchronizer {
    /// Create a synchronizer with its own lifetime.
    pub fn new(api: Arc<dyn DashboardApi>, store: SharedStore) -> Self {
        Self::with_lifetime(api, store, CancellationToken::new())
    }

    /// Create a synchronizer bound to an existing lifetime token.
    pub fn with_lifetime(
        api: Arc<dyn DashboardApi>,
        store: SharedStore,
        lifetime: CancellationToken,
    ) -> Self {
        Self {
            api,
            store,
            lifetime,
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Fetch `/current-settings` and replace the settings snapshot.
    pub async fn sync_settings(&self) -> SyncOutcome {
        let outcome = self
            .store
            .settings()
            .refresh_with(&self.lifetime, self.api.current_settings(), |raw, _| {
                Ok(ControlSettings::from_wire(&raw)?)
            })
            .await;
        if let SyncOutcome::Applied(seq) = outcome {
            let settings = self.store.current_settings();
            debug!(
                seq,
                smart = settings.smart_enabled,
                pump_low = settings.pump.low(),
                pump_high = settings.pump.high(),
                lamp_low = settings.lamp.low(),
                lamp_high = settings.lamp.high(),
                "Settings snapshot applied"
            );
        }
        outcome
    }

    /// Fetch `/device-status` and replace the device board.
    pub async fn sync_devices(&self) -> SyncOutcome {
        self.store
            .devices()
            .refresh_with(&self.lifetime, self.api.device_status(), |report, seq| {
                Ok(DeviceBoard::from_report(&report, seq))
            })
            .await
    }

    /// Run both fetches concurrently.
    pub async fn sync(&self) -> (SyncOutcome, SyncOutcome) {
        tokio::join!(self.sync_settings(), self.sync_devices())
    }

    /// Register settings and device-status pollers in `group`.
    pub fn start_polling(
        self: &Arc<Self>,
        group: &mut PollGroup,
        settings_every: Duration,
        devices_every: Duration,
    ) -> Result<()> {
        let this = Arc::clone(self);
        group.spawn(PollOptions::new("settings", settings_every), move || {
            let this = Arc::clone(&this);
            async move {
                this.sync_settings().await;
            }
        })?;

        let this = Arc::clone(self);
        group.spawn(PollOptions::new("device-status", devices_every), move || {
            let this = Arc::clone(&this);
            async move {
                this.sync_devices().await;
            }
        })?;
        Ok(())
    }

    /// Drop every response that resolves from now on.
    pub fn teardown(&self) {
        if !self.lifetime.is_cancelled() {
            info!("Settings synchronizer torn down");
        }
        self.lifetime.cancel();
    }

    pub fn is_torn_down(&self) -> bool {
        self.lifetime.is_cancelled()
    }
}
