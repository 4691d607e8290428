//! Alert feed polling and fan-out.
//!
//! Every event in a poll response is surfaced once for that poll: logged and
//! broadcast to subscribers. Across polls nothing is deduplicated unless the
//! id watermark is enabled, in which case events whose id is not above the
//! highest id surfaced by an earlier poll are skipped. Events without an id
//! are always surfaced.
//!
//! The message of the last failed poll is kept in a watch channel and cleared
//! by the next successful one.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use growbox_types::AlertEvent;

use crate::error::Result;
use crate::poller::{PollGroup, PollOptions};
use crate::traits::DashboardApi;

/// Sender for surfaced alerts.
pub type AlertSender = broadcast::Sender<AlertEvent>;

/// Receiver for surfaced alerts.
pub type AlertReceiver = broadcast::Receiver<AlertEvent>;

/// Default broadcast capacity.
pub const DEFAULT_CAPACITY: usize = 100;

const NO_WATERMARK: i64 = i64::MIN;

/// Polls `/alerts` and surfaces each event.
pub struct AlertNotifier {
    api: Arc<dyn DashboardApi>,
    sender: AlertSender,
    dedupe: bool,
    watermark: AtomicI64,
    last_error: watch::Sender<Option<String>>,
    lifetime: CancellationToken,
}

impl std::fmt::Debug for AlertNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertNotifier")
            .field("dedupe", &self.dedupe)
            .field("receivers", &self.sender.receiver_count())
            .field("last_error", &*self.last_error.borrow())
            .finish()
    }
}

impl AlertNotifier {
    /// Create a notifier without cross-poll deduplication.
    pub fn new(api: Arc<dyn DashboardApi>) -> Self {
        let (sender, _) = broadcast::channel(DEFAULT_CAPACITY);
        Self {
            api,
            sender,
            dedupe: false,
            watermark: AtomicI64::new(NO_WATERMARK),
            last_error: watch::Sender::new(None),
            lifetime: CancellationToken::new(),
        }
    }

    /// Enable or disable the id watermark.
    #[must_use]
    pub fn with_dedupe(mut self, dedupe: bool) -> Self {
        self.dedupe = dedupe;
        self
    }

    /// Bind the notifier to an existing lifetime token.
    #[must_use]
    pub fn with_lifetime(mut self, lifetime: CancellationToken) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Subscribe to surfaced alerts.
    pub fn subscribe(&self) -> AlertReceiver {
        self.sender.subscribe()
    }

    /// Highest id surfaced so far, if the watermark has been set.
    pub fn watermark(&self) -> Option<i64> {
        match self.watermark.load(Ordering::SeqCst) {
            NO_WATERMARK => None,
            id => Some(id),
        }
    }

    /// Message of the last failed poll, if the most recent poll failed.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.borrow().clone()
    }

    /// Subscribe to the poll error indicator.
    pub fn subscribe_errors(&self) -> watch::Receiver<Option<String>> {
        self.last_error.subscribe()
    }

    fn set_error(&self, error: Option<String>) {
        self.last_error.send_if_modified(|current| {
            if *current == error {
                return false;
            }
            *current = error;
            true
        });
    }

    /// Fetch the feed once and surface its events in order.
    ///
    /// Returns the events that were surfaced.
    pub async fn poll(&self) -> Result<Vec<AlertEvent>> {
        if self.lifetime.is_cancelled() {
            return Ok(Vec::new());
        }
        let events = match self.api.alerts().await {
            Ok(events) => events,
            Err(e) => {
                if self.lifetime.is_cancelled() {
                    return Ok(Vec::new());
                }
                warn!(error = %e, "Alert poll failed");
                self.set_error(Some(e.to_string()));
                return Err(e);
            }
        };
        if self.lifetime.is_cancelled() {
            return Ok(Vec::new());
        }
        self.set_error(None);

        // Only ids surfaced by earlier polls are skipped.
        let floor = self.watermark.load(Ordering::SeqCst);
        let mut highest = floor;
        let mut surfaced = Vec::with_capacity(events.len());
        for event in events {
            if self.dedupe && let Some(id) = event.id {
                if id <= floor {
                    continue;
                }
                highest = highest.max(id);
            }
            info!(
                id = event.id,
                kind = event.kind.as_deref().unwrap_or("unknown"),
                timestamp = event.timestamp.as_deref().unwrap_or(""),
                message = %event.message,
                "Alert"
            );
            // No receivers is fine.
            let _ = self.sender.send(event.clone());
            surfaced.push(event);
        }
        if highest > floor {
            self.watermark.fetch_max(highest, Ordering::SeqCst);
        }
        Ok(surfaced)
    }

    /// Register an alert poller in `group`.
    pub fn start_polling(self: &Arc<Self>, group: &mut PollGroup, every: Duration) -> Result<()> {
        let this = Arc::clone(self);
        group.spawn(PollOptions::new("alerts", every), move || {
            let this = Arc::clone(&this);
            async move {
                let _ = this.poll().await;
            }
        })
    }

    /// Stop surfacing events from polls that resolve from now on.
    pub fn teardown(&self) {
        self.lifetime.cancel();
    }
}
