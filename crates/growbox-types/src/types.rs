//! Core types for growbox devices, telemetry and the operation log.

use core::fmt;
use std::collections::BTreeMap;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::error::ParseError;

/// Label shown for the end time of a record that is still in progress.
pub const RUNNING_LABEL: &str = "Running";

/// An actuator managed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DeviceKind {
    /// Water pump (soil moisture).
    Pump,
    /// Grow light.
    Lamp,
    /// Ventilation fan.
    Fan,
}

impl DeviceKind {
    /// Every actuator, in display order.
    pub const ALL: [DeviceKind; 3] = [DeviceKind::Pump, DeviceKind::Lamp, DeviceKind::Fan];

    /// Identifier used on the wire and in query parameters.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Pump => "pump",
            DeviceKind::Lamp => "lamp",
            DeviceKind::Fan => "fan",
        }
    }

    /// Human-readable name.
    ///
    /// ```
    /// use growbox_types::DeviceKind;
    ///
    /// assert_eq!(DeviceKind::Pump.display_name(), "Water Pump");
    /// ```
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            DeviceKind::Pump => "Water Pump",
            DeviceKind::Lamp => "Light",
            DeviceKind::Fan => "Fan",
        }
    }
}

impl FromStr for DeviceKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pump" => Ok(DeviceKind::Pump),
            "lamp" => Ok(DeviceKind::Lamp),
            "fan" => Ok(DeviceKind::Fan),
            _ => Err(ParseError::UnknownDevice(s.to_string())),
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// On/off status of an actuator.
///
/// Travels as the integer `0` or `1`; any other value fails to deserialize,
/// so a `Switch` can never hold a third state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "i64", into = "u8"))]
#[repr(u8)]
pub enum Switch {
    /// Actuator is off.
    #[default]
    Off = 0,
    /// Actuator is on.
    On = 1,
}

impl Switch {
    /// The opposite state.
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Switch::Off => Switch::On,
            Switch::On => Switch::Off,
        }
    }

    /// Whether the actuator is on.
    #[must_use]
    pub fn is_on(self) -> bool {
        self == Switch::On
    }
}

impl From<bool> for Switch {
    fn from(on: bool) -> Self {
        if on { Switch::On } else { Switch::Off }
    }
}

impl From<Switch> for u8 {
    fn from(value: Switch) -> Self {
        value as u8
    }
}

impl TryFrom<i64> for Switch {
    type Error = ParseError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Switch::Off),
            1 => Ok(Switch::On),
            other => Err(ParseError::InvalidStatus(other)),
        }
    }
}

impl fmt::Display for Switch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Switch::Off => write!(f, "OFF"),
            Switch::On => write!(f, "ON"),
        }
    }
}

/// Locally displayed state of one actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceState {
    /// Which actuator.
    pub device: DeviceKind,
    /// Current status.
    pub status: Switch,
    /// Sequence number of the status snapshot this state was last replaced by
    /// (0 before the first snapshot).
    pub last_applied_seq: u64,
}

impl DeviceState {
    /// A device that is off and has never been synchronized.
    pub fn initial(device: DeviceKind) -> Self {
        Self {
            device,
            status: Switch::Off,
            last_applied_seq: 0,
        }
    }
}

/// One `{device, status}` pair as reported by `/device-status`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceStatusEntry {
    /// Raw device name; unknown names are ignored when building a board.
    pub device: String,
    /// Reported status.
    pub status: Switch,
}

/// Body of `/device-status`.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceStatusReport {
    /// Per-device status list.
    #[cfg_attr(feature = "serde", serde(default))]
    pub devices: Vec<DeviceStatusEntry>,
}

/// State of every actuator, always complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceBoard {
    states: BTreeMap<DeviceKind, DeviceState>,
}

impl Default for DeviceBoard {
    fn default() -> Self {
        Self {
            states: DeviceKind::ALL
                .iter()
                .map(|&device| (device, DeviceState::initial(device)))
                .collect(),
        }
    }
}

impl DeviceBoard {
    /// Build a board from a status report tagged with sequence `seq`.
    ///
    /// The report replaces the board wholesale: devices missing from the
    /// report are OFF, entries naming unknown devices are skipped.
    pub fn from_report(report: &DeviceStatusReport, seq: u64) -> Self {
        let mut board = Self::default();
        for state in board.states.values_mut() {
            state.last_applied_seq = seq;
        }
        for entry in &report.devices {
            if let Ok(device) = entry.device.parse::<DeviceKind>()
                && let Some(state) = board.states.get_mut(&device)
            {
                state.status = entry.status;
            }
        }
        board
    }

    /// State of one device.
    pub fn get(&self, device: DeviceKind) -> DeviceState {
        self.states
            .get(&device)
            .copied()
            .unwrap_or_else(|| DeviceState::initial(device))
    }

    /// Status of one device.
    pub fn status(&self, device: DeviceKind) -> Switch {
        self.get(device).status
    }

    /// Overwrite one device's status, keeping its sequence tag.
    pub fn set_status(&mut self, device: DeviceKind, status: Switch) {
        self.states
            .entry(device)
            .or_insert_with(|| DeviceState::initial(device))
            .status = status;
    }

    /// Iterate over all device states in display order.
    pub fn iter(&self) -> impl Iterator<Item = &DeviceState> {
        self.states.values()
    }
}

/// One entry of the device operation log.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HistoryRecord {
    /// Server-assigned record id.
    pub id: i64,
    /// Raw device identifier (`pump`, `lamp`, `fan`).
    pub device: String,
    /// Display name supplied by the server, if any.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub device_name: Option<String>,
    /// Status the device was switched to.
    pub status: Switch,
    /// ISO 8601 start timestamp as sent by the server.
    pub start_time: String,
    /// ISO 8601 end timestamp; absent while running.
    #[cfg_attr(feature = "serde", serde(default))]
    pub end_time: Option<String>,
    /// Run length in seconds; absent while running.
    #[cfg_attr(feature = "serde", serde(default))]
    pub duration: Option<i64>,
    /// Why the device was switched.
    #[cfg_attr(feature = "serde", serde(default))]
    pub reason: Option<String>,
}

impl HistoryRecord {
    /// Whether the operation is still in progress.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.end_time.is_none() && self.duration.is_none()
    }

    /// Name to show for the device: server name, then known display name,
    /// then the raw identifier.
    #[must_use]
    pub fn display_device(&self) -> &str {
        if let Some(name) = self.device_name.as_deref().filter(|n| !n.is_empty()) {
            return name;
        }
        match self.device.parse::<DeviceKind>() {
            Ok(kind) => kind.display_name(),
            Err(_) => &self.device,
        }
    }

    /// Start time formatted as `yyyy-MM-dd HH:mm:ss`.
    #[must_use]
    pub fn formatted_start(&self) -> String {
        format_timestamp(&self.start_time)
    }

    /// End time formatted as `yyyy-MM-dd HH:mm:ss`, or [`RUNNING_LABEL`].
    #[must_use]
    pub fn formatted_end(&self) -> String {
        match &self.end_time {
            Some(end) => format_timestamp(end),
            None => RUNNING_LABEL.to_string(),
        }
    }
}

/// Format a backend timestamp as `yyyy-MM-dd HH:mm:ss`.
///
/// Accepts naive ISO 8601 (`T` or space separated, optional fractional
/// seconds) and RFC 3339 with an offset. Unparseable input is returned
/// verbatim.
///
/// ```
/// use growbox_types::format_timestamp;
///
/// assert_eq!(format_timestamp("2025-05-01T08:30:15.123456"), "2025-05-01 08:30:15");
/// assert_eq!(format_timestamp("yesterday"), "yesterday");
/// ```
#[must_use]
pub fn format_timestamp(raw: &str) -> String {
    let output = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let trimmed = raw.trim();

    let parsed = PrimitiveDateTime::parse(
        trimmed,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"),
    )
    .or_else(|_| {
        PrimitiveDateTime::parse(
            trimmed,
            format_description!(
                "[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]]"
            ),
        )
    })
    .or_else(|_| {
        OffsetDateTime::parse(trimmed, &time::format_description::well_known::Rfc3339)
            .map(|dt| PrimitiveDateTime::new(dt.date(), dt.time()))
    });

    parsed
        .ok()
        .and_then(|dt| dt.format(output).ok())
        .unwrap_or_else(|| raw.to_string())
}

/// Latest sensor snapshot from `/latest`.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SensorSnapshot {
    /// When the values were captured.
    #[cfg_attr(feature = "serde", serde(default))]
    pub timestamp: Option<String>,
    /// Soil moisture percentage.
    #[cfg_attr(feature = "serde", serde(default))]
    pub soil: Option<f64>,
    /// Air temperature in degrees Celsius.
    #[cfg_attr(feature = "serde", serde(default))]
    pub temp: Option<f64>,
    /// Relative humidity percentage.
    #[cfg_attr(feature = "serde", serde(default))]
    pub humidity: Option<f64>,
    /// Light level.
    #[cfg_attr(feature = "serde", serde(default))]
    pub light: Option<f64>,
    /// Atmospheric pressure in hPa.
    #[cfg_attr(feature = "serde", serde(default))]
    pub pressure: Option<f64>,
}

/// Overall plant condition derived from one snapshot.
///
/// Checks run in a fixed order and the first match wins; a missing reading
/// never matches.
///
/// ```
/// use growbox_types::{PlantStatus, SensorSnapshot};
///
/// let snapshot = SensorSnapshot {
///     soil: Some(25.0),
///     temp: Some(40.0),
///     ..Default::default()
/// };
/// assert_eq!(PlantStatus::from_snapshot(&snapshot), PlantStatus::NeedsWater);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PlantStatus {
    /// Soil moisture below 30%.
    NeedsWater,
    /// Temperature above 35 °C.
    TooHot,
    /// Temperature below 10 °C.
    TooCold,
    /// Humidity below 40%.
    LowHumidity,
    Optimal,
}

impl PlantStatus {
    pub const DRY_SOIL_BELOW: f64 = 30.0;
    pub const HOT_ABOVE: f64 = 35.0;
    pub const COLD_BELOW: f64 = 10.0;
    pub const LOW_HUMIDITY_BELOW: f64 = 40.0;

    pub fn from_snapshot(snapshot: &SensorSnapshot) -> Self {
        let below = |reading: Option<f64>, bound: f64| reading.is_some_and(|v| v < bound);
        let above = |reading: Option<f64>, bound: f64| reading.is_some_and(|v| v > bound);

        if below(snapshot.soil, Self::DRY_SOIL_BELOW) {
            PlantStatus::NeedsWater
        } else if above(snapshot.temp, Self::HOT_ABOVE) {
            PlantStatus::TooHot
        } else if below(snapshot.temp, Self::COLD_BELOW) {
            PlantStatus::TooCold
        } else if below(snapshot.humidity, Self::LOW_HUMIDITY_BELOW) {
            PlantStatus::LowHumidity
        } else {
            PlantStatus::Optimal
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PlantStatus::NeedsWater => "Needs Water",
            PlantStatus::TooHot => "Too Hot",
            PlantStatus::TooCold => "Too Cold",
            PlantStatus::LowHumidity => "Low Humidity",
            PlantStatus::Optimal => "Optimal",
        }
    }

    pub fn is_optimal(&self) -> bool {
        matches!(self, PlantStatus::Optimal)
    }
}

impl fmt::Display for PlantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Rolling-window aggregates from `/stats`.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SensorStats {
    pub avg_soil: f64,
    pub avg_temp: f64,
    pub avg_humidity: f64,
    pub avg_light: f64,
    pub avg_pressure: f64,
    pub max_temp: f64,
    pub min_temp: f64,
    pub max_humidity: f64,
    pub min_humidity: f64,
}

/// A pending alert from `/alerts`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AlertEvent {
    /// Server id, used by the optional dedup watermark.
    #[cfg_attr(feature = "serde", serde(default))]
    pub id: Option<i64>,
    /// Condition that raised the alert (`cold`, `heat`, ...).
    #[cfg_attr(feature = "serde", serde(default, rename = "type"))]
    pub kind: Option<String>,
    /// Text to show the operator.
    pub message: String,
    /// When the backend raised it.
    #[cfg_attr(feature = "serde", serde(default))]
    pub timestamp: Option<String>,
}
