//! Transport-agnostic types for the growbox sensor and actuator dashboard.
//!
//! This crate holds the domain model shared by the synchronization core
//! (growbox-core) and the runner binary.
//!
//! # Features
//!
//! - Device, status and operation-log types
//! - Control settings with enforced threshold invariants
//! - Wire key constants for the device-control channel
//! - Alert notification bands
//! - Error types for building domain values
//!
//! # Example
//!
//! ```
//! use growbox_types::{ControlSettings, DeviceKind, Switch};
//!
//! let settings = ControlSettings::default();
//! assert!(!settings.is_smart_active(DeviceKind::Pump));
//! assert_eq!(Switch::from(true), Switch::On);
//! ```

pub mod error;
pub mod notification;
pub mod pins;
pub mod settings;
pub mod types;

pub use error::{ParseError, ParseResult};
pub use notification::NotificationSettings;
pub use settings::{ControlSettings, SmartControlFlag, ThresholdKey, ThresholdSetting};
pub use types::{
    AlertEvent, DeviceBoard, DeviceKind, DeviceState, DeviceStatusEntry, DeviceStatusReport,
    HistoryRecord, PlantStatus, RUNNING_LABEL, SensorSnapshot, SensorStats, Switch,
    format_timestamp,
};
