//! In-memory backend for testing.
//!
//! [`MockBackend`] implements [`DashboardApi`] without any network, so the
//! synchronizer, dispatcher, history engine and alert notifier can be driven
//! deterministically in tests.
//!
//! # Features
//!
//! - **Live state**: settings, device statuses, history, alerts and telemetry
//!   that write commands mutate like the real backend does
//! - **Scripted responses**: queue `(delay, response)` pairs per endpoint to
//!   make overlapping requests resolve out of order
//! - **Failure injection**: fail every call, the next `n` calls, or writes to
//!   specific wire keys

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use growbox_types::{
    AlertEvent, ControlSettings, DeviceKind, DeviceStatusEntry, DeviceStatusReport, HistoryRecord,
    NotificationSettings, SensorSnapshot, SensorStats, Switch, pins,
};

use crate::commands::{DeviceCommand, SettingWrite};
use crate::error::{Error, Result};
use crate::history::HistoryQuery;
use crate::traits::DashboardApi;

/// A queued response: delay before answering, then the body or an error message.
type Scripted<T> = RwLock<VecDeque<(Duration, std::result::Result<T, String>)>>;

/// The wire map the backend serves before anything has been written.
pub fn default_wire_settings() -> BTreeMap<String, f64> {
    let d = ControlSettings::default();
    [
        (pins::SMART_ENABLE, 0.0),
        (pins::SMART_PUMP, 0.0),
        (pins::SMART_LAMP, 0.0),
        (pins::SMART_FAN, 0.0),
        (pins::PUMP_ON_THRESHOLD, f64::from(d.pump.low())),
        (pins::PUMP_OFF_THRESHOLD, f64::from(d.pump.high())),
        (pins::LAMP_ON_THRESHOLD, f64::from(d.lamp.low())),
        (pins::LAMP_OFF_THRESHOLD, f64::from(d.lamp.high())),
        (pins::FAN_INTERVAL, f64::from(d.fan_interval)),
        (pins::FAN_DURATION, f64::from(d.fan_duration)),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// A scripted growbox backend for testing.
///
/// # Example
///
/// ```
/// use growbox_core::{DashboardApi, MockBackend};
/// use growbox_types::{DeviceKind, Switch};
///
/// #[tokio::main]
/// async fn main() {
///     let backend = MockBackend::new();
///     backend.set_device(DeviceKind::Pump, Switch::On).await;
///
///     let report = backend.device_status().await.unwrap();
///     assert_eq!(report.devices.len(), 3);
/// }
/// ```
pub struct MockBackend {
    settings: RwLock<BTreeMap<String, f64>>,
    devices: RwLock<BTreeMap<DeviceKind, Switch>>,
    history: RwLock<Vec<HistoryRecord>>,
    alerts: RwLock<Vec<AlertEvent>>,
    latest: RwLock<Option<SensorSnapshot>>,
    stats: RwLock<Option<SensorStats>>,
    notification: RwLock<NotificationSettings>,

    scripted_settings: Scripted<BTreeMap<String, f64>>,
    scripted_status: Scripted<DeviceStatusReport>,
    scripted_history: Scripted<Vec<HistoryRecord>>,

    writes: RwLock<Vec<SettingWrite>>,
    commands: RwLock<Vec<DeviceCommand>>,
    history_queries: RwLock<Vec<HistoryQuery>>,
    failing_pins: RwLock<BTreeSet<String>>,

    request_count: AtomicU32,
    should_fail: AtomicBool,
    fail_message: RwLock<String>,
    remaining_failures: AtomicU32,
}

impl std::fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBackend")
            .field("request_count", &self.request_count.load(Ordering::Relaxed))
            .field("should_fail", &self.should_fail.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a backend serving default settings, all devices off and no data.
    pub fn new() -> Self {
        Self {
            settings: RwLock::new(default_wire_settings()),
            devices: RwLock::new(DeviceKind::ALL.iter().map(|d| (*d, Switch::Off)).collect()),
            history: RwLock::new(Vec::new()),
            alerts: RwLock::new(Vec::new()),
            latest: RwLock::new(None),
            stats: RwLock::new(None),
            notification: RwLock::new(NotificationSettings::default()),
            scripted_settings: RwLock::new(VecDeque::new()),
            scripted_status: RwLock::new(VecDeque::new()),
            scripted_history: RwLock::new(VecDeque::new()),
            writes: RwLock::new(Vec::new()),
            commands: RwLock::new(Vec::new()),
            history_queries: RwLock::new(Vec::new()),
            failing_pins: RwLock::new(BTreeSet::new()),
            request_count: AtomicU32::new(0),
            should_fail: AtomicBool::new(false),
            fail_message: RwLock::new("Mock failure".to_string()),
            remaining_failures: AtomicU32::new(0),
        }
    }

    async fn check_should_fail(&self) -> Result<()> {
        self.request_count.fetch_add(1, Ordering::Relaxed);

        if self.remaining_failures.load(Ordering::Relaxed) > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(Error::Backend(self.fail_message.read().await.clone()));
        }

        if self.should_fail.load(Ordering::Relaxed) {
            Err(Error::Backend(self.fail_message.read().await.clone()))
        } else {
            Ok(())
        }
    }

    /// Pop the next scripted response, if any, and wait out its delay.
    async fn next_scripted<T>(queue: &Scripted<T>) -> Option<Result<T>> {
        let (delay, response) = queue.write().await.pop_front()?;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Some(response.map_err(Error::Backend))
    }

    fn status_report(devices: &BTreeMap<DeviceKind, Switch>) -> DeviceStatusReport {
        DeviceStatusReport {
            devices: devices
                .iter()
                .map(|(device, status)| DeviceStatusEntry {
                    device: device.as_str().to_string(),
                    status: *status,
                })
                .collect(),
        }
    }

    // --- Test control methods ---

    /// Set one wire key of the settings map.
    pub async fn set_setting(&self, pin: &str, value: f64) {
        self.settings.write().await.insert(pin.to_string(), value);
    }

    /// Current value of one wire key.
    pub async fn setting(&self, pin: &str) -> Option<f64> {
        self.settings.read().await.get(pin).copied()
    }

    /// Set the status the backend reports for a device.
    pub async fn set_device(&self, device: DeviceKind, status: Switch) {
        self.devices.write().await.insert(device, status);
    }

    /// Replace the operation log.
    pub async fn set_history(&self, records: Vec<HistoryRecord>) {
        *self.history.write().await = records;
    }

    /// Queue an alert; the next `/alerts` call returns and clears it.
    pub async fn push_alert(&self, alert: AlertEvent) {
        self.alerts.write().await.push(alert);
    }

    /// Set the `/latest` body; `None` answers `{"error": "No data"}`.
    pub async fn set_latest(&self, snapshot: Option<SensorSnapshot>) {
        *self.latest.write().await = snapshot;
    }

    /// Set the `/stats` body; `None` answers `{"error": "No data"}`.
    pub async fn set_stats(&self, stats: Option<SensorStats>) {
        *self.stats.write().await = stats;
    }

    /// Stored notification settings.
    pub async fn stored_notification_settings(&self) -> NotificationSettings {
        self.notification.read().await.clone()
    }

    /// Queue a `/current-settings` response.
    pub async fn script_settings(
        &self,
        delay: Duration,
        response: std::result::Result<BTreeMap<String, f64>, String>,
    ) {
        self.scripted_settings.write().await.push_back((delay, response));
    }

    /// Queue a `/device-status` response.
    pub async fn script_device_status(
        &self,
        delay: Duration,
        response: std::result::Result<DeviceStatusReport, String>,
    ) {
        self.scripted_status.write().await.push_back((delay, response));
    }

    /// Queue a `/history` response.
    pub async fn script_history(
        &self,
        delay: Duration,
        response: std::result::Result<Vec<HistoryRecord>, String>,
    ) {
        self.scripted_history.write().await.push_back((delay, response));
    }

    /// Make writes to `pin` fail.
    pub async fn fail_pin(&self, pin: &str) {
        self.failing_pins.write().await.insert(pin.to_string());
    }

    /// Every `/current-settings` write received, in order.
    pub async fn setting_writes(&self) -> Vec<SettingWrite> {
        self.writes.read().await.clone()
    }

    /// Every `/control-device` command received, in order.
    pub async fn device_commands(&self) -> Vec<DeviceCommand> {
        self.commands.read().await.clone()
    }

    /// Every `/history` query received, in order.
    pub async fn history_queries(&self) -> Vec<HistoryQuery> {
        self.history_queries.read().await.clone()
    }

    /// Make every call fail.
    pub async fn set_should_fail(&self, fail: bool, message: Option<&str>) {
        self.should_fail.store(fail, Ordering::Relaxed);
        if let Some(msg) = message {
            *self.fail_message.write().await = msg.to_string();
        }
    }

    /// Fail the next `count` calls, then succeed.
    pub fn set_transient_failures(&self, count: u32) {
        self.remaining_failures.store(count, Ordering::Relaxed);
    }

    /// Total number of calls received.
    pub fn request_count(&self) -> u32 {
        self.request_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DashboardApi for MockBackend {
    async fn latest(&self) -> Result<SensorSnapshot> {
        self.check_should_fail().await?;
        self.latest
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::NoData("No data".to_string()))
    }

    async fn stats(&self) -> Result<SensorStats> {
        self.check_should_fail().await?;
        self.stats
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::NoData("No data".to_string()))
    }

    async fn history(&self, query: &HistoryQuery) -> Result<Vec<HistoryRecord>> {
        self.history_queries.write().await.push(query.clone());
        if let Some(response) = Self::next_scripted(&self.scripted_history).await {
            return response;
        }
        self.check_should_fail().await?;

        let device = query.get("device");
        let status = query.get("status");
        let reason = query.get("reason").map(str::to_lowercase);
        Ok(self
            .history
            .read()
            .await
            .iter()
            .filter(|r| device.is_none_or(|d| r.device == d))
            .filter(|r| status.is_none_or(|s| u8::from(r.status).to_string() == s))
            .filter(|r| {
                reason.as_ref().is_none_or(|needle| {
                    r.reason
                        .as_deref()
                        .is_some_and(|text| text.to_lowercase().contains(needle.as_str()))
                })
            })
            .cloned()
            .collect())
    }

    async fn current_settings(&self) -> Result<BTreeMap<String, f64>> {
        if let Some(response) = Self::next_scripted(&self.scripted_settings).await {
            return response;
        }
        self.check_should_fail().await?;
        Ok(self.settings.read().await.clone())
    }

    async fn write_setting(&self, write: &SettingWrite) -> Result<()> {
        self.writes.write().await.push(write.clone());
        self.check_should_fail().await?;
        if self.failing_pins.read().await.contains(&write.pin) {
            return Err(Error::Backend(format!("write to {} rejected", write.pin)));
        }
        self.settings
            .write()
            .await
            .insert(write.pin.clone(), write.value as f64);
        Ok(())
    }

    async fn device_status(&self) -> Result<DeviceStatusReport> {
        if let Some(response) = Self::next_scripted(&self.scripted_status).await {
            return response;
        }
        self.check_should_fail().await?;
        Ok(Self::status_report(&*self.devices.read().await))
    }

    async fn control_device(&self, command: &DeviceCommand) -> Result<()> {
        self.commands.write().await.push(command.clone());
        self.check_should_fail().await?;
        self.devices.write().await.insert(command.device, command.status);
        Ok(())
    }

    async fn notification_settings(&self) -> Result<NotificationSettings> {
        self.check_should_fail().await?;
        Ok(self.notification.read().await.clone())
    }

    async fn save_notification_settings(&self, settings: &NotificationSettings) -> Result<()> {
        self.check_should_fail().await?;
        *self.notification.write().await = settings.clone();
        Ok(())
    }

    async fn alerts(&self) -> Result<Vec<AlertEvent>> {
        self.check_should_fail().await?;
        Ok(std::mem::take(&mut *self.alerts.write().await))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_settings_parse() {
        let backend = MockBackend::new();
        let raw = backend.current_settings().await.unwrap();
        let settings = ControlSettings::from_wire(&raw).unwrap();
        assert_eq!(settings, ControlSettings::default());
    }

    #[tokio::test]
    async fn test_write_updates_live_state() {
        let backend = MockBackend::new();
        backend
            .write_setting(&SettingWrite::new(pins::FAN_INTERVAL, 20))
            .await
            .unwrap();
        assert_eq!(backend.setting(pins::FAN_INTERVAL).await, Some(20.0));
        assert_eq!(backend.setting_writes().await.len(), 1);
    }

    #[tokio::test]
    async fn test_control_device_updates_status() {
        let backend = MockBackend::new();
        backend
            .control_device(&DeviceCommand::manual(DeviceKind::Fan, Switch::On))
            .await
            .unwrap();
        let report = backend.device_status().await.unwrap();
        let fan = report.devices.iter().find(|e| e.device == "fan").unwrap();
        assert_eq!(fan.status, Switch::On);
    }

    #[tokio::test]
    async fn test_failing_pin() {
        let backend = MockBackend::new();
        backend.fail_pin(pins::PUMP_OFF_THRESHOLD).await;
        assert!(backend
            .write_setting(&SettingWrite::new(pins::PUMP_ON_THRESHOLD, 30))
            .await
            .is_ok());
        assert!(backend
            .write_setting(&SettingWrite::new(pins::PUMP_OFF_THRESHOLD, 50))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_no_data() {
        let backend = MockBackend::new();
        assert!(matches!(backend.latest().await, Err(Error::NoData(_))));
        backend
            .set_latest(Some(SensorSnapshot {
                temp: Some(20.0),
                ..Default::default()
            }))
            .await;
        assert_eq!(backend.latest().await.unwrap().temp, Some(20.0));
    }

    #[tokio::test]
    async fn test_alerts_drained_once() {
        let backend = MockBackend::new();
        backend
            .push_alert(AlertEvent {
                id: Some(1),
                kind: Some("cold".into()),
                message: "Too cold".into(),
                timestamp: None,
            })
            .await;
        assert_eq!(backend.alerts().await.unwrap().len(), 1);
        assert!(backend.alerts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transient_failures() {
        let backend = MockBackend::new();
        backend.set_transient_failures(2);
        assert!(backend.alerts().await.is_err());
        assert!(backend.alerts().await.is_err());
        assert!(backend.alerts().await.is_ok());
        assert_eq!(backend.request_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scripted_response_used_before_live_state() {
        let backend = MockBackend::new();
        backend
            .script_device_status(Duration::from_secs(2), Err("timeout".into()))
            .await;
        let start = tokio::time::Instant::now();
        assert!(backend.device_status().await.is_err());
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert!(backend.device_status().await.is_ok());
    }
}
