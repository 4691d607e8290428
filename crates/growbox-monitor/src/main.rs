//! Growbox Monitor - headless mirror of a growbox backend.
//!
//! Polls device status, control settings, telemetry, the operation log and
//! the alert feed, and logs every change.
//!
//! Run with: `cargo run -p growbox-monitor`
//!
//! The backend origin comes from `GROWBOX_API_URL` or the config file.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use growbox_core::{
    AlertNotifier, ApiClient, Config, ControlStore, DashboardApi, HistoryQueryEngine, PlantStatus,
    PollGroup, SettingsSynchronizer, TelemetryFeed, Thresholds, ViewState, format_duration,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("growbox_core=info".parse()?)
                .add_directive("growbox_monitor=info".parse()?),
        )
        .init();

    let config = Config::load_validated()?;
    info!(
        base_url = %config.api.base_url,
        timeout_secs = config.api.timeout_secs,
        "Starting growbox monitor"
    );

    let api: Arc<dyn DashboardApi> = Arc::new(ApiClient::with_timeout(
        &config.api.base_url,
        config.api.timeout(),
    )?);

    let mut group = PollGroup::new();
    let lifetime = group.lifetime();

    let store = ControlStore::shared();
    let sync = Arc::new(SettingsSynchronizer::with_lifetime(
        Arc::clone(&api),
        Arc::clone(&store),
        lifetime.clone(),
    ));
    let telemetry = Arc::new(TelemetryFeed::with_lifetime(
        Arc::clone(&api),
        lifetime.clone(),
    ));
    let history = Arc::new(HistoryQueryEngine::with_lifetime(
        Arc::clone(&api),
        config.history.default_days,
        lifetime.clone(),
    ));
    let alerts = Arc::new(
        AlertNotifier::new(Arc::clone(&api))
            .with_dedupe(config.alerts.dedupe)
            .with_lifetime(lifetime.clone()),
    );

    let thresholds = match Thresholds::load(api.as_ref()).await {
        Ok(thresholds) => thresholds,
        Err(e) => {
            warn!(error = %e, "Could not load notification settings, using defaults");
            Thresholds::default()
        }
    };

    watch_devices(store.subscribe_devices());
    watch_settings(store.subscribe_settings());
    watch_telemetry(telemetry.subscribe_latest(), thresholds);
    watch_history(history.subscribe_view());

    sync.start_polling(
        &mut group,
        config.poll.settings(),
        config.poll.device_status(),
    )?;
    telemetry.start_polling(&mut group, config.poll.telemetry())?;
    history.start_polling(&mut group, config.poll.history())?;
    alerts.start_polling(&mut group, config.poll.alerts())?;
    info!(pollers = group.len(), "Polling started");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    group.teardown();
    Ok(())
}

fn watch_devices(mut rx: watch::Receiver<growbox_core::Synced<growbox_types::DeviceBoard>>) {
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let synced = rx.borrow_and_update().clone();
            if let Some(error) = &synced.error {
                warn!(%error, "Device status stale");
                continue;
            }
            for state in synced.value.iter() {
                info!(
                    device = %state.device.display_name(),
                    status = %state.status,
                    seq = state.last_applied_seq,
                    "Device"
                );
            }
        }
    });
}

fn watch_settings(
    mut rx: watch::Receiver<growbox_core::Synced<growbox_types::ControlSettings>>,
) {
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let synced = rx.borrow_and_update().clone();
            if let Some(error) = &synced.error {
                warn!(%error, "Control settings stale");
                continue;
            }
            let s = synced.value;
            info!(
                smart = s.smart_enabled,
                pump = %format_args!("{}..{}", s.pump.low(), s.pump.high()),
                lamp = %format_args!("{}..{}", s.lamp.low(), s.lamp.high()),
                fan_interval = s.fan_interval,
                fan_duration = s.fan_duration,
                "Control settings"
            );
        }
    });
}

fn watch_telemetry(
    mut rx: watch::Receiver<growbox_core::Synced<Option<growbox_types::SensorSnapshot>>>,
    thresholds: Thresholds,
) {
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let Some(snapshot) = rx.borrow_and_update().value.clone() else {
                continue;
            };
            let status = PlantStatus::from_snapshot(&snapshot);
            if status.is_optimal() {
                info!(%status, "Plant");
            } else {
                warn!(
                    %status,
                    soil = snapshot.soil,
                    temp = snapshot.temp,
                    humidity = snapshot.humidity,
                    "Plant"
                );
            }
            for condition in thresholds.evaluate(&snapshot) {
                warn!(
                    %condition,
                    temp = snapshot.temp,
                    humidity = snapshot.humidity,
                    pressure = snapshot.pressure,
                    "Reading outside configured band"
                );
            }
        }
    });
}

fn watch_history(mut rx: watch::Receiver<ViewState>) {
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let view = rx.borrow_and_update().clone();
            match view {
                ViewState::Loading => {}
                ViewState::Error(message) => warn!(%message, "Operation log unavailable"),
                ViewState::Empty => info!("Operation log empty"),
                ViewState::Populated(records) => {
                    if let Some(latest) = records.first() {
                        info!(
                            records = records.len(),
                            device = latest.display_device(),
                            status = %latest.status,
                            started = %latest.formatted_start(),
                            duration = %format_duration(latest.duration),
                            "Operation log"
                        );
                    }
                }
            }
        }
    });
}
