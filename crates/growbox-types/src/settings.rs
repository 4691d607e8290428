//! Control settings: smart-control flags, threshold pairs and fan timing.
//!
//! The backend exposes these as a flat map of wire keys (see [`crate::pins`]).
//! [`ControlSettings::from_wire`] turns that map into a snapshot that always
//! satisfies `low <= high` for every threshold pair.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ParseResult};
use crate::pins;
use crate::types::DeviceKind;

/// The two sensor channels that have an on/off threshold pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ThresholdKey {
    /// Soil moisture, drives the pump.
    Pump,
    /// Light level, drives the lamp.
    Lamp,
}

impl ThresholdKey {
    /// Inclusive upper bound of the channel's domain.
    #[must_use]
    pub fn max(&self) -> u32 {
        match self {
            ThresholdKey::Pump => 100,
            ThresholdKey::Lamp => 500,
        }
    }

    /// Granularity of the channel's domain.
    #[must_use]
    pub fn step(&self) -> u32 {
        match self {
            ThresholdKey::Pump => 1,
            ThresholdKey::Lamp => 10,
        }
    }

    /// Whether `value` lies in `0..=max` on a multiple of `step`.
    #[must_use]
    pub fn accepts(&self, value: u32) -> bool {
        value <= self.max() && value % self.step() == 0
    }
}

impl std::fmt::Display for ThresholdKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThresholdKey::Pump => write!(f, "pump"),
            ThresholdKey::Lamp => write!(f, "lamp"),
        }
    }
}

/// An on/off threshold pair.
///
/// `low` turns the device ON, `high` turns it OFF. Fields are private so a
/// pair can only be built through [`ThresholdSetting::new`], which enforces
/// `low <= high`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ThresholdSetting {
    key: ThresholdKey,
    low: u32,
    high: u32,
}

impl ThresholdSetting {
    /// Build a pair, rejecting `low > high`.
    ///
    /// ```
    /// use growbox_types::{ThresholdKey, ThresholdSetting};
    ///
    /// assert!(ThresholdSetting::new(ThresholdKey::Pump, 40, 60).is_ok());
    /// assert!(ThresholdSetting::new(ThresholdKey::Pump, 70, 60).is_err());
    /// ```
    pub fn new(key: ThresholdKey, low: u32, high: u32) -> ParseResult<Self> {
        if low > high {
            return Err(ParseError::inverted(format!("{key} threshold"), low, high));
        }
        Ok(Self { key, low, high })
    }

    pub fn key(&self) -> ThresholdKey {
        self.key
    }

    pub fn low(&self) -> u32 {
        self.low
    }

    pub fn high(&self) -> u32 {
        self.high
    }

    /// Copy with a new lower bound.
    pub fn with_low(&self, low: u32) -> ParseResult<Self> {
        Self::new(self.key, low, self.high)
    }

    /// Copy with a new upper bound.
    pub fn with_high(&self, high: u32) -> ParseResult<Self> {
        Self::new(self.key, self.low, high)
    }
}

/// Per-device smart-control switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SmartControlFlag {
    pub device: DeviceKind,
    pub enabled: bool,
}

/// Canonical settings snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ControlSettings {
    /// Master smart-control switch.
    pub smart_enabled: bool,
    /// Flags for pump, lamp and fan, in that order.
    pub smart_flags: [SmartControlFlag; 3],
    pub pump: ThresholdSetting,
    pub lamp: ThresholdSetting,
    /// Minutes between fan runs.
    pub fan_interval: u32,
    /// Minutes per fan run.
    pub fan_duration: u32,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            smart_enabled: false,
            smart_flags: DeviceKind::ALL.map(|device| SmartControlFlag {
                device,
                enabled: false,
            }),
            pump: ThresholdSetting {
                key: ThresholdKey::Pump,
                low: 40,
                high: 60,
            },
            lamp: ThresholdSetting {
                key: ThresholdKey::Lamp,
                low: 300,
                high: 500,
            },
            fan_interval: 10,
            fan_duration: 5,
        }
    }
}

impl ControlSettings {
    /// Build a snapshot from the `/current-settings` map.
    ///
    /// Keys the backend omits keep their built-in default. Boolean keys are
    /// on only for exactly `1`. The result is rejected if a threshold bound
    /// lies outside its channel's domain, a pair is inverted, or a fan timing
    /// is below 1.
    pub fn from_wire(values: &BTreeMap<String, f64>) -> ParseResult<Self> {
        let defaults = Self::default();
        let flag = |key: &str, default: bool| match values.get(key) {
            Some(v) => *v == 1.0,
            None => default,
        };
        let int = |key: &str, default: u32| -> ParseResult<u32> {
            match values.get(key) {
                None => Ok(default),
                Some(v) if is_whole_u32(*v) => Ok(*v as u32),
                Some(v) => Err(ParseError::InvalidValue(format!("{key} = {v}"))),
            }
        };

        let bound = |key: ThresholdKey, pin: &str, default: u32| -> ParseResult<u32> {
            let value = int(pin, default)?;
            if key.accepts(value) {
                Ok(value)
            } else {
                Err(ParseError::InvalidValue(format!(
                    "{pin} = {value} outside the {key} domain 0..={} step {}",
                    key.max(),
                    key.step()
                )))
            }
        };

        let pump = ThresholdSetting::new(
            ThresholdKey::Pump,
            bound(ThresholdKey::Pump, pins::PUMP_ON_THRESHOLD, defaults.pump.low)?,
            bound(ThresholdKey::Pump, pins::PUMP_OFF_THRESHOLD, defaults.pump.high)?,
        )?;
        let lamp = ThresholdSetting::new(
            ThresholdKey::Lamp,
            bound(ThresholdKey::Lamp, pins::LAMP_ON_THRESHOLD, defaults.lamp.low)?,
            bound(ThresholdKey::Lamp, pins::LAMP_OFF_THRESHOLD, defaults.lamp.high)?,
        )?;
        let fan_interval = int(pins::FAN_INTERVAL, defaults.fan_interval)?;
        let fan_duration = int(pins::FAN_DURATION, defaults.fan_duration)?;
        if fan_interval < 1 {
            return Err(ParseError::InvalidValue(format!("fan interval {fan_interval} < 1")));
        }
        if fan_duration < 1 {
            return Err(ParseError::InvalidValue(format!("fan duration {fan_duration} < 1")));
        }

        Ok(Self {
            smart_enabled: flag(pins::SMART_ENABLE, defaults.smart_enabled),
            smart_flags: [
                (DeviceKind::Pump, pins::SMART_PUMP),
                (DeviceKind::Lamp, pins::SMART_LAMP),
                (DeviceKind::Fan, pins::SMART_FAN),
            ]
            .map(|(device, key)| SmartControlFlag {
                device,
                enabled: flag(key, false),
            }),
            pump,
            lamp,
            fan_interval,
            fan_duration,
        })
    }

    /// Flag for one device.
    pub fn smart_flag(&self, device: DeviceKind) -> bool {
        self.smart_flags
            .iter()
            .find(|f| f.device == device)
            .is_some_and(|f| f.enabled)
    }

    /// Set the flag for one device.
    pub fn set_smart_flag(&mut self, device: DeviceKind, enabled: bool) {
        if let Some(flag) = self.smart_flags.iter_mut().find(|f| f.device == device) {
            flag.enabled = enabled;
        }
    }

    /// Whether the device runs under smart control: master switch and the
    /// device's own flag must both be on.
    pub fn is_smart_active(&self, device: DeviceKind) -> bool {
        self.smart_enabled && self.smart_flag(device)
    }

    /// Threshold pair for a channel.
    pub fn threshold(&self, key: ThresholdKey) -> ThresholdSetting {
        match key {
            ThresholdKey::Pump => self.pump,
            ThresholdKey::Lamp => self.lamp,
        }
    }

    /// Replace a channel's threshold pair.
    pub fn set_threshold(&mut self, setting: ThresholdSetting) {
        match setting.key {
            ThresholdKey::Pump => self.pump = setting,
            ThresholdKey::Lamp => self.lamp = setting,
        }
    }
}

fn is_whole_u32(v: f64) -> bool {
    v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= f64::from(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_defaults() {
        let s = ControlSettings::default();
        assert!(!s.smart_enabled);
        assert_eq!((s.pump.low(), s.pump.high()), (40, 60));
        assert_eq!((s.lamp.low(), s.lamp.high()), (300, 500));
        assert_eq!((s.fan_interval, s.fan_duration), (10, 5));
        assert!(DeviceKind::ALL.iter().all(|d| !s.smart_flag(*d)));
    }

    #[test]
    fn test_from_wire_full() {
        let s = ControlSettings::from_wire(&wire(&[
            ("V8", 1.0),
            ("V26", 1.0),
            ("V27", 0.0),
            ("V28", 1.0),
            ("V20", 35.0),
            ("V23", 55.0),
            ("V22", 200.0),
            ("V24", 450.0),
            ("V21", 15.0),
            ("V25", 3.0),
        ]))
        .unwrap();
        assert!(s.smart_enabled);
        assert!(s.is_smart_active(DeviceKind::Pump));
        assert!(!s.is_smart_active(DeviceKind::Lamp));
        assert_eq!((s.pump.low(), s.pump.high()), (35, 55));
        assert_eq!((s.lamp.low(), s.lamp.high()), (200, 450));
        assert_eq!((s.fan_interval, s.fan_duration), (15, 3));
    }

    #[test]
    fn test_from_wire_missing_keys_use_defaults() {
        let s = ControlSettings::from_wire(&wire(&[("V20", 10.0)])).unwrap();
        assert_eq!((s.pump.low(), s.pump.high()), (10, 60));
        assert_eq!(s.lamp, ControlSettings::default().lamp);
    }

    #[test]
    fn test_from_wire_rejects_inverted_pair() {
        let err = ControlSettings::from_wire(&wire(&[("V20", 80.0), ("V23", 20.0)])).unwrap_err();
        assert!(matches!(err, ParseError::InvertedRange { .. }));
    }

    #[test]
    fn test_from_wire_rejects_out_of_domain_bounds() {
        let err = ControlSettings::from_wire(&wire(&[("V20", 150.0), ("V23", 200.0)])).unwrap_err();
        assert!(matches!(err, ParseError::InvalidValue(m) if m.contains("V20")));
        assert!(ControlSettings::from_wire(&wire(&[("V22", 305.0)])).is_err());
        assert!(ControlSettings::from_wire(&wire(&[("V24", 510.0)])).is_err());
        assert!(ControlSettings::from_wire(&wire(&[("V23", 100.0), ("V24", 500.0)])).is_ok());
    }

    #[test]
    fn test_from_wire_rejects_zero_fan_interval() {
        assert!(ControlSettings::from_wire(&wire(&[("V21", 0.0)])).is_err());
        assert!(ControlSettings::from_wire(&wire(&[("V25", 2.5)])).is_err());
    }

    #[test]
    fn test_smart_active_requires_master() {
        let mut s = ControlSettings::default();
        s.set_smart_flag(DeviceKind::Fan, true);
        assert!(!s.is_smart_active(DeviceKind::Fan));
        s.smart_enabled = true;
        assert!(s.is_smart_active(DeviceKind::Fan));
    }

    #[test]
    fn test_threshold_domains() {
        assert!(ThresholdKey::Pump.accepts(100));
        assert!(!ThresholdKey::Pump.accepts(101));
        assert!(ThresholdKey::Lamp.accepts(490));
        assert!(!ThresholdKey::Lamp.accepts(495));
        assert!(!ThresholdKey::Lamp.accepts(510));
    }

    #[test]
    fn test_with_bounds_keep_invariant() {
        let pump = ThresholdSetting::new(ThresholdKey::Pump, 40, 60).unwrap();
        assert_eq!(pump.with_low(60).unwrap().low(), 60);
        assert!(pump.with_low(61).is_err());
        assert!(pump.with_high(39).is_err());
    }
}
