//! Out-of-order responses, optimistic commands and teardown against the
//! scripted mock backend.
//!
//! Every test runs on a paused clock so scripted delays resolve
//! deterministically.

use std::sync::Arc;
use std::time::Duration;

use growbox_core::mock::default_wire_settings;
use growbox_core::{
    CommandDispatcher, ControlStore, MockBackend, PollGroup, SettingsSynchronizer, SyncOutcome,
};
use growbox_types::{DeviceKind, DeviceStatusEntry, DeviceStatusReport, Switch, pins};

fn report(entries: &[(DeviceKind, Switch)]) -> DeviceStatusReport {
    DeviceStatusReport {
        devices: entries
            .iter()
            .map(|(device, status)| DeviceStatusEntry {
                device: device.as_str().to_string(),
                status: *status,
            })
            .collect(),
    }
}

fn setup() -> (Arc<MockBackend>, Arc<SettingsSynchronizer>, CommandDispatcher) {
    let mock = Arc::new(MockBackend::new());
    let store = ControlStore::shared();
    let sync = Arc::new(SettingsSynchronizer::new(mock.clone(), store.clone()));
    let dispatcher = CommandDispatcher::new(mock.clone(), store);
    (mock, sync, dispatcher)
}

#[tokio::test(start_paused = true)]
async fn test_older_response_resolving_late_is_discarded() {
    let (mock, sync, _) = setup();
    // Issued first, resolves last.
    mock.script_device_status(
        Duration::from_millis(500),
        Ok(report(&[(DeviceKind::Pump, Switch::On)])),
    )
    .await;
    // Issued second, resolves first.
    mock.script_device_status(
        Duration::from_millis(100),
        Ok(report(&[(DeviceKind::Lamp, Switch::On)])),
    )
    .await;

    let (older, newer) = tokio::join!(sync.sync_devices(), sync.sync_devices());
    assert_eq!(newer, SyncOutcome::Applied(2));
    assert_eq!(older, SyncOutcome::Stale(1));

    let store = sync.store();
    assert_eq!(store.device_status(DeviceKind::Lamp), Switch::On);
    assert_eq!(store.device_status(DeviceKind::Pump), Switch::Off);
    assert_eq!(store.devices().get().last_applied_seq, Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_older_settings_response_resolving_late_is_discarded() {
    let (mock, sync, _) = setup();
    let mut older = default_wire_settings();
    older.insert(pins::SMART_ENABLE.to_string(), 0.0);
    older.insert(pins::PUMP_ON_THRESHOLD.to_string(), 20.0);
    let mut newer = default_wire_settings();
    newer.insert(pins::SMART_ENABLE.to_string(), 1.0);
    newer.insert(pins::PUMP_ON_THRESHOLD.to_string(), 45.0);

    mock.script_settings(Duration::from_millis(500), Ok(older)).await;
    mock.script_settings(Duration::from_millis(100), Ok(newer)).await;

    let (first, second) = tokio::join!(sync.sync_settings(), sync.sync_settings());
    assert_eq!(second, SyncOutcome::Applied(2));
    assert_eq!(first, SyncOutcome::Stale(1));

    let state = sync.store().settings().get();
    assert_eq!(state.last_applied_seq, Some(2));
    assert!(state.value.smart_enabled);
    assert_eq!(state.value.pump.low(), 45);
}

#[tokio::test(start_paused = true)]
async fn test_stale_failure_keeps_newer_state_clean() {
    let (mock, sync, _) = setup();
    mock.script_device_status(Duration::from_millis(500), Err("timeout".to_string()))
        .await;
    mock.script_device_status(
        Duration::from_millis(100),
        Ok(report(&[(DeviceKind::Fan, Switch::On)])),
    )
    .await;

    let (older, newer) = tokio::join!(sync.sync_devices(), sync.sync_devices());
    assert_eq!(older, SyncOutcome::Failed);
    assert_eq!(newer, SyncOutcome::Applied(2));

    let state = sync.store().devices().get();
    assert!(state.error.is_none());
    assert_eq!(state.value.status(DeviceKind::Fan), Switch::On);
}

#[tokio::test(start_paused = true)]
async fn test_poll_issued_before_toggle_reverts_it() {
    let (mock, sync, dispatcher) = setup();
    mock.script_device_status(
        Duration::from_millis(300),
        Ok(report(&[(DeviceKind::Pump, Switch::Off)])),
    )
    .await;

    let poll = sync.sync_devices();
    tokio::pin!(poll);
    assert!(futures::poll!(&mut poll).is_pending());

    let outcome = dispatcher.toggle_device(DeviceKind::Pump).await;
    assert!(outcome.is_ok());
    assert_eq!(sync.store().device_status(DeviceKind::Pump), Switch::On);
    assert_eq!(mock.device_commands().await.len(), 1);

    // Last applied write wins, even though the poll was issued first.
    assert!(matches!(poll.await, SyncOutcome::Applied(_)));
    assert_eq!(sync.store().device_status(DeviceKind::Pump), Switch::Off);
}

#[tokio::test(start_paused = true)]
async fn test_poll_issued_after_toggle_confirms_it() {
    let (_mock, sync, dispatcher) = setup();
    dispatcher.toggle_device(DeviceKind::Lamp).await;
    assert!(matches!(sync.sync_devices().await, SyncOutcome::Applied(_)));
    assert_eq!(sync.store().device_status(DeviceKind::Lamp), Switch::On);
}

#[tokio::test(start_paused = true)]
async fn test_failed_command_is_not_rolled_back() {
    let (mock, sync, dispatcher) = setup();
    mock.set_should_fail(true, Some("relay offline")).await;

    let outcome = dispatcher.toggle_device(DeviceKind::Fan).await;
    assert!(!outcome.is_ok());
    assert_eq!(sync.store().device_status(DeviceKind::Fan), Switch::On);
}

#[tokio::test(start_paused = true)]
async fn test_group_teardown_drops_pending_and_stops_ticking() {
    let mock = Arc::new(MockBackend::new());
    let store = ControlStore::shared();
    let mut group = PollGroup::new();
    let sync = Arc::new(SettingsSynchronizer::with_lifetime(
        mock.clone(),
        store.clone(),
        group.lifetime(),
    ));
    mock.script_device_status(
        Duration::from_secs(5),
        Ok(report(&[(DeviceKind::Pump, Switch::On)])),
    )
    .await;

    sync.start_polling(&mut group, Duration::from_secs(30), Duration::from_secs(10))
        .unwrap();
    assert_eq!(group.len(), 2);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(store.settings().get().is_synced());
    let requests = mock.request_count();

    group.teardown();
    assert!(sync.is_torn_down());

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(store.device_status(DeviceKind::Pump), Switch::Off);
    assert!(!store.devices().get().is_synced());
    assert_eq!(mock.request_count(), requests);
}
