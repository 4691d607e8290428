//! Alert bands and enable flags stored at `/notification-settings`.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ParseResult};

/// Thresholds the backend uses to raise alerts.
///
/// Flags travel as `0`/`1` on the wire.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NotificationSettings {
    /// Below this temperature (°C) a cold alert fires.
    pub min_temp: f64,
    /// Above this temperature (°C) a heat alert fires.
    pub max_temp: f64,
    pub min_humid: f64,
    pub max_humid: f64,
    /// Pressure band in hPa.
    pub min_press: f64,
    pub max_press: f64,
    #[cfg_attr(feature = "serde", serde(with = "flag"))]
    pub cold_alert: bool,
    #[cfg_attr(feature = "serde", serde(with = "flag"))]
    pub heat_alert: bool,
    #[cfg_attr(feature = "serde", serde(with = "flag"))]
    pub dry_alert: bool,
    #[cfg_attr(feature = "serde", serde(with = "flag"))]
    pub humid_alert: bool,
    #[cfg_attr(feature = "serde", serde(with = "flag"))]
    pub low_press_alert: bool,
    #[cfg_attr(feature = "serde", serde(with = "flag"))]
    pub high_press_alert: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            min_temp: 10.0,
            max_temp: 35.0,
            min_humid: 30.0,
            max_humid: 70.0,
            min_press: 980.0,
            max_press: 1020.0,
            cold_alert: true,
            heat_alert: true,
            dry_alert: true,
            humid_alert: true,
            low_press_alert: true,
            high_press_alert: true,
        }
    }
}

impl NotificationSettings {
    /// Check that every band has `min <= max`.
    pub fn validate(&self) -> ParseResult<()> {
        let bands = [
            ("temperature band", self.min_temp, self.max_temp),
            ("humidity band", self.min_humid, self.max_humid),
            ("pressure band", self.min_press, self.max_press),
        ];
        for (what, min, max) in bands {
            if min.is_nan() || max.is_nan() {
                return Err(ParseError::InvalidValue(format!("{what} is not a number")));
            }
            if min > max {
                return Err(ParseError::inverted(what, min, max));
            }
        }
        Ok(())
    }
}

#[cfg(feature = "serde")]
mod flag {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Bool(bool),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Int(n) => n == 1,
            Raw::Bool(b) => b,
        })
    }
}
