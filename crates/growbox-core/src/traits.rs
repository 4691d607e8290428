//! Trait abstraction over the growbox backend.
//!
//! This module provides the [`DashboardApi`] trait that abstracts over the
//! real HTTP backend and the scripted mock used in tests.

use std::collections::BTreeMap;

use async_trait::async_trait;

use growbox_types::{
    AlertEvent, DeviceStatusReport, HistoryRecord, NotificationSettings, SensorSnapshot,
    SensorStats,
};

use crate::commands::{DeviceCommand, SettingWrite};
use crate::error::Result;
use crate::history::HistoryQuery;

/// Operations the dashboard needs from the remote backend.
///
/// Each method maps to exactly one endpoint. Implementations must be cheap to
/// share across tasks; consumers hold them as `Arc<dyn DashboardApi>`.
///
/// # Example
///
/// ```ignore
/// use growbox_core::{DashboardApi, Result};
///
/// async fn print_temperature<A: DashboardApi + ?Sized>(api: &A) -> Result<()> {
///     let snapshot = api.latest().await?;
///     println!("temp: {:?}", snapshot.temp);
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait DashboardApi: Send + Sync {
    // --- Telemetry ---

    /// `GET /latest`. An `{"error": ...}` body is [`crate::Error::NoData`].
    async fn latest(&self) -> Result<SensorSnapshot>;

    /// `GET /stats`. An `{"error": ...}` body is [`crate::Error::NoData`].
    async fn stats(&self) -> Result<SensorStats>;

    // --- Operation log ---

    /// `GET /history` with the query's parameters, in server order.
    async fn history(&self, query: &HistoryQuery) -> Result<Vec<HistoryRecord>>;

    // --- Control ---

    /// `GET /current-settings` as a raw wire-key map.
    async fn current_settings(&self) -> Result<BTreeMap<String, f64>>;

    /// `POST /current-settings`.
    async fn write_setting(&self, write: &SettingWrite) -> Result<()>;

    /// `GET /device-status`.
    async fn device_status(&self) -> Result<DeviceStatusReport>;

    /// `POST /control-device`.
    async fn control_device(&self, command: &DeviceCommand) -> Result<()>;

    // --- Alerts ---

    /// `GET /notification-settings`.
    async fn notification_settings(&self) -> Result<NotificationSettings>;

    /// `POST /notification-settings`; succeeds only on `{"status": "ok"}`.
    async fn save_notification_settings(&self, settings: &NotificationSettings) -> Result<()>;

    /// `GET /alerts`.
    async fn alerts(&self) -> Result<Vec<AlertEvent>>;
}
