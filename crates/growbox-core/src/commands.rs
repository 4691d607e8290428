//! Request bodies for backend write commands.

use serde::{Deserialize, Serialize};

use growbox_types::{DeviceKind, Switch};

/// Reason attached to manual device toggles.
pub const MANUAL_TOGGLE_REASON: &str = "Manual toggle from UI";

/// Body of `POST /current-settings`.
/// Format: `{"pin": "V20", "value": 40}`; booleans are sent as `1`/`0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingWrite {
    pub pin: String,
    pub value: i64,
}

impl SettingWrite {
    pub fn new(pin: impl Into<String>, value: i64) -> Self {
        Self {
            pin: pin.into(),
            value,
        }
    }
}

/// Body of `POST /control-device`.
/// Format: `{"device": "pump", "status": 1, "reason": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCommand {
    pub device: DeviceKind,
    pub status: Switch,
    pub reason: String,
}

impl DeviceCommand {
    /// A manual toggle with the default reason.
    pub fn manual(device: DeviceKind, status: Switch) -> Self {
        Self {
            device,
            status,
            reason: MANUAL_TOGGLE_REASON.to_string(),
        }
    }
}
