//! Environmental alert bands and their evaluation.
//!
//! # Example
//!
//! ```
//! use growbox_core::{AlertCondition, Thresholds};
//! use growbox_types::SensorSnapshot;
//!
//! let thresholds = Thresholds::default();
//! let snapshot = SensorSnapshot {
//!     temp: Some(38.0),
//!     humidity: Some(50.0),
//!     ..Default::default()
//! };
//! assert_eq!(thresholds.evaluate(&snapshot), vec![AlertCondition::Heat]);
//! ```

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use growbox_types::{NotificationSettings, SensorSnapshot};

use crate::error::Result;
use crate::traits::DashboardApi;

/// A band violated by a sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertCondition {
    /// Temperature below `min_temp`.
    Cold,
    /// Temperature above `max_temp`.
    Heat,
    /// Humidity below `min_humid`.
    Dry,
    /// Humidity above `max_humid`.
    Humid,
    /// Pressure below `min_press`.
    LowPressure,
    /// Pressure above `max_press`.
    HighPressure,
}

impl AlertCondition {
    pub const ALL: [AlertCondition; 6] = [
        AlertCondition::Cold,
        AlertCondition::Heat,
        AlertCondition::Dry,
        AlertCondition::Humid,
        AlertCondition::LowPressure,
        AlertCondition::HighPressure,
    ];

    /// Get a human-readable description of the condition.
    pub fn description(&self) -> &'static str {
        match self {
            AlertCondition::Cold => "Temperature too low",
            AlertCondition::Heat => "Temperature too high",
            AlertCondition::Dry => "Humidity too low",
            AlertCondition::Humid => "Humidity too high",
            AlertCondition::LowPressure => "Pressure too low",
            AlertCondition::HighPressure => "Pressure too high",
        }
    }

    /// Whether `settings` has this condition switched on.
    pub fn is_enabled(&self, settings: &NotificationSettings) -> bool {
        match self {
            AlertCondition::Cold => settings.cold_alert,
            AlertCondition::Heat => settings.heat_alert,
            AlertCondition::Dry => settings.dry_alert,
            AlertCondition::Humid => settings.humid_alert,
            AlertCondition::LowPressure => settings.low_press_alert,
            AlertCondition::HighPressure => settings.high_press_alert,
        }
    }

    fn triggered(&self, settings: &NotificationSettings, snapshot: &SensorSnapshot) -> bool {
        let below = |reading: Option<f64>, bound: f64| reading.is_some_and(|v| v < bound);
        let above = |reading: Option<f64>, bound: f64| reading.is_some_and(|v| v > bound);
        match self {
            AlertCondition::Cold => below(snapshot.temp, settings.min_temp),
            AlertCondition::Heat => above(snapshot.temp, settings.max_temp),
            AlertCondition::Dry => below(snapshot.humidity, settings.min_humid),
            AlertCondition::Humid => above(snapshot.humidity, settings.max_humid),
            AlertCondition::LowPressure => below(snapshot.pressure, settings.min_press),
            AlertCondition::HighPressure => above(snapshot.pressure, settings.max_press),
        }
    }
}

impl std::fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// Threshold evaluator backed by [`NotificationSettings`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Thresholds {
    settings: NotificationSettings,
}

impl Thresholds {
    pub fn new(settings: NotificationSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &NotificationSettings {
        &self.settings
    }

    /// Conditions the snapshot triggers, in [`AlertCondition::ALL`] order.
    ///
    /// A condition fires only when its flag is on and the reading is present.
    /// Bounds are exclusive.
    pub fn evaluate(&self, snapshot: &SensorSnapshot) -> Vec<AlertCondition> {
        AlertCondition::ALL
            .into_iter()
            .filter(|c| c.is_enabled(&self.settings) && c.triggered(&self.settings, snapshot))
            .collect()
    }

    /// Fetch the stored bands from the backend.
    pub async fn load(api: &dyn DashboardApi) -> Result<Self> {
        let settings = api.notification_settings().await?;
        if let Err(e) = settings.validate() {
            warn!(error = %e, "Backend returned inconsistent notification bands");
        }
        Ok(Self::new(settings))
    }

    /// Validate and store new bands.
    ///
    /// Nothing is sent when validation fails.
    pub async fn save(api: &dyn DashboardApi, settings: NotificationSettings) -> Result<Self> {
        settings.validate()?;
        api.save_notification_settings(&settings).await?;
        info!(
            min_temp = settings.min_temp,
            max_temp = settings.max_temp,
            min_humid = settings.min_humid,
            max_humid = settings.max_humid,
            min_press = settings.min_press,
            max_press = settings.max_press,
            "Notification settings saved"
        );
        Ok(Self::new(settings))
    }
}
