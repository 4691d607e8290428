//! Optimistic command dispatch.
//!
//! Every command mutates the shared [`ControlStore`] first and then sends the
//! write. A failed write is logged and left in place: local state is not
//! rolled back, and the next settings or device-status poll is what brings it
//! back in line with the backend.
//!
//! Logical settings resolve to wire keys through one static table,
//! [`LogicalSetting::wire_key`].
//!
//! [`ControlStore`]: crate::store::ControlStore

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{info, warn};

use growbox_types::{DeviceKind, ParseError, Switch, ThresholdKey, ThresholdSetting, pins};

use crate::commands::{DeviceCommand, SettingWrite};
use crate::error::{Error, Result};
use crate::store::SharedStore;
use crate::traits::DashboardApi;

/// A user-facing setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalSetting {
    SmartEnable,
    SmartPump,
    SmartLamp,
    SmartFan,
    PumpOnThreshold,
    PumpOffThreshold,
    LampOnThreshold,
    LampOffThreshold,
    FanInterval,
    FanDuration,
}

/// Values a setting accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingDomain {
    /// On or off, sent as `1`/`0`.
    Boolean,
    /// Integers in `0..=max` on multiples of `step`.
    Range { max: u32, step: u32 },
    /// Integers of at least `min`.
    AtLeast(u32),
}

/// A value for [`CommandDispatcher::dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
}

impl From<bool> for SettingValue {
    fn from(v: bool) -> Self {
        SettingValue::Bool(v)
    }
}

impl From<i64> for SettingValue {
    fn from(v: i64) -> Self {
        SettingValue::Int(v)
    }
}

impl From<u32> for SettingValue {
    fn from(v: u32) -> Self {
        SettingValue::Int(i64::from(v))
    }
}

impl LogicalSetting {
    /// Every setting, in table order.
    pub const ALL: [LogicalSetting; 10] = [
        LogicalSetting::SmartEnable,
        LogicalSetting::SmartPump,
        LogicalSetting::SmartLamp,
        LogicalSetting::SmartFan,
        LogicalSetting::PumpOnThreshold,
        LogicalSetting::PumpOffThreshold,
        LogicalSetting::LampOnThreshold,
        LogicalSetting::LampOffThreshold,
        LogicalSetting::FanInterval,
        LogicalSetting::FanDuration,
    ];

    /// Kebab-case identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalSetting::SmartEnable => "smart-enable",
            LogicalSetting::SmartPump => "smart-pump",
            LogicalSetting::SmartLamp => "smart-lamp",
            LogicalSetting::SmartFan => "smart-fan",
            LogicalSetting::PumpOnThreshold => "pump-on-threshold",
            LogicalSetting::PumpOffThreshold => "pump-off-threshold",
            LogicalSetting::LampOnThreshold => "lamp-on-threshold",
            LogicalSetting::LampOffThreshold => "lamp-off-threshold",
            LogicalSetting::FanInterval => "fan-interval",
            LogicalSetting::FanDuration => "fan-duration",
        }
    }

    /// The one wire key this setting writes.
    pub fn wire_key(&self) -> &'static str {
        match self {
            LogicalSetting::SmartEnable => pins::SMART_ENABLE,
            LogicalSetting::SmartPump => pins::SMART_PUMP,
            LogicalSetting::SmartLamp => pins::SMART_LAMP,
            LogicalSetting::SmartFan => pins::SMART_FAN,
            LogicalSetting::PumpOnThreshold => pins::PUMP_ON_THRESHOLD,
            LogicalSetting::PumpOffThreshold => pins::PUMP_OFF_THRESHOLD,
            LogicalSetting::LampOnThreshold => pins::LAMP_ON_THRESHOLD,
            LogicalSetting::LampOffThreshold => pins::LAMP_OFF_THRESHOLD,
            LogicalSetting::FanInterval => pins::FAN_INTERVAL,
            LogicalSetting::FanDuration => pins::FAN_DURATION,
        }
    }

    pub fn domain(&self) -> SettingDomain {
        match self {
            LogicalSetting::SmartEnable
            | LogicalSetting::SmartPump
            | LogicalSetting::SmartLamp
            | LogicalSetting::SmartFan => SettingDomain::Boolean,
            LogicalSetting::PumpOnThreshold | LogicalSetting::PumpOffThreshold => {
                let key = ThresholdKey::Pump;
                SettingDomain::Range {
                    max: key.max(),
                    step: key.step(),
                }
            }
            LogicalSetting::LampOnThreshold | LogicalSetting::LampOffThreshold => {
                let key = ThresholdKey::Lamp;
                SettingDomain::Range {
                    max: key.max(),
                    step: key.step(),
                }
            }
            LogicalSetting::FanInterval | LogicalSetting::FanDuration => SettingDomain::AtLeast(1),
        }
    }

    /// Check `value` against the domain and return its wire number.
    pub fn encode(&self, value: SettingValue) -> Result<i64> {
        let reject = |reason: String| Error::invalid_value(self.as_str(), reason);
        match (self.domain(), value) {
            (SettingDomain::Boolean, SettingValue::Bool(b)) => Ok(i64::from(b)),
            (SettingDomain::Boolean, SettingValue::Int(n @ (0 | 1))) => Ok(n),
            (SettingDomain::Boolean, SettingValue::Int(n)) => {
                Err(reject(format!("{n} is not a boolean")))
            }
            (SettingDomain::Range { max, step }, SettingValue::Int(n)) => {
                if n < 0 || n > i64::from(max) {
                    Err(reject(format!("{n} is outside 0..={max}")))
                } else if n % i64::from(step) != 0 {
                    Err(reject(format!("{n} is not a multiple of {step}")))
                } else {
                    Ok(n)
                }
            }
            (SettingDomain::AtLeast(min), SettingValue::Int(n)) => {
                if n < i64::from(min) || n > i64::from(u32::MAX) {
                    Err(reject(format!("{n} must be at least {min}")))
                } else {
                    Ok(n)
                }
            }
            (_, SettingValue::Bool(_)) => Err(reject("expected an integer".to_string())),
        }
    }
}

impl FromStr for LogicalSetting {
    type Err = ParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        LogicalSetting::ALL
            .into_iter()
            .find(|setting| setting.as_str() == s)
            .ok_or_else(|| ParseError::UnknownSetting(s.to_string()))
    }
}

impl fmt::Display for LogicalSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one wire write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Wire key or device written.
    pub target: String,
    /// Value sent.
    pub value: i64,
    /// Failure message, `None` on success.
    pub error: Option<String>,
}

impl WriteOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcomes of the two writes behind [`CommandDispatcher::set_thresholds`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdReport {
    pub low: WriteOutcome,
    pub high: WriteOutcome,
}

impl ThresholdReport {
    /// Whether both writes succeeded.
    pub fn all_ok(&self) -> bool {
        self.low.is_ok() && self.high.is_ok()
    }
}

/// Sends control commands with optimistic local updates.
pub struct CommandDispatcher {
    api: Arc<dyn DashboardApi>,
    store: SharedStore,
}

impl fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDispatcher").finish_non_exhaustive()
    }
}

impl CommandDispatcher {
    pub fn new(api: Arc<dyn DashboardApi>, store: SharedStore) -> Self {
        Self { api, store }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Write one setting.
    ///
    /// Out-of-domain values, and threshold bounds that would cross their
    /// partner, are rejected before anything changes. A bound is checked
    /// against its partner as stored at the moment of the update. Otherwise
    /// the store is updated, then the write is sent; its failure is reported in the
    /// outcome and logged, never rolled back.
    pub async fn dispatch(
        &self,
        setting: LogicalSetting,
        value: impl Into<SettingValue>,
    ) -> Result<WriteOutcome> {
        let wire_value = setting.encode(value.into())?;
        // Encoded thresholds fit in u32 after the domain check.
        let bound = wire_value as u32;

        self.store
            .settings()
            .try_patch(|s| {
                let on = wire_value == 1;
                match setting {
                    LogicalSetting::SmartEnable => s.smart_enabled = on,
                    LogicalSetting::SmartPump => s.set_smart_flag(DeviceKind::Pump, on),
                    LogicalSetting::SmartLamp => s.set_smart_flag(DeviceKind::Lamp, on),
                    LogicalSetting::SmartFan => s.set_smart_flag(DeviceKind::Fan, on),
                    LogicalSetting::FanInterval => s.fan_interval = bound,
                    LogicalSetting::FanDuration => s.fan_duration = bound,
                    LogicalSetting::PumpOnThreshold => s.pump = s.pump.with_low(bound)?,
                    LogicalSetting::PumpOffThreshold => s.pump = s.pump.with_high(bound)?,
                    LogicalSetting::LampOnThreshold => s.lamp = s.lamp.with_low(bound)?,
                    LogicalSetting::LampOffThreshold => s.lamp = s.lamp.with_high(bound)?,
                }
                Ok::<(), ParseError>(())
            })
            .map_err(|e| Error::invalid_value(setting.as_str(), e.to_string()))?;

        Ok(self.send_setting(setting.wire_key(), wire_value).await)
    }

    /// Replace both bounds of a threshold pair, then write each bound.
    ///
    /// The local pair changes in one step. The two writes are independent,
    /// so one may succeed while the other fails.
    pub async fn set_thresholds(
        &self,
        key: ThresholdKey,
        low: u32,
        high: u32,
    ) -> Result<ThresholdReport> {
        let (low_setting, high_setting) = match key {
            ThresholdKey::Pump => (LogicalSetting::PumpOnThreshold, LogicalSetting::PumpOffThreshold),
            ThresholdKey::Lamp => (LogicalSetting::LampOnThreshold, LogicalSetting::LampOffThreshold),
        };
        let low_value = low_setting.encode(low.into())?;
        let high_value = high_setting.encode(high.into())?;
        let pair = ThresholdSetting::new(key, low, high)
            .map_err(|e| Error::invalid_value(format!("{key}-thresholds"), e.to_string()))?;

        self.store.settings().patch(|s| s.set_threshold(pair));

        let (low_outcome, high_outcome) = tokio::join!(
            self.send_setting(low_setting.wire_key(), low_value),
            self.send_setting(high_setting.wire_key(), high_value),
        );
        Ok(ThresholdReport {
            low: low_outcome,
            high: high_outcome,
        })
    }

    /// Manually switch a device.
    pub async fn set_device(&self, device: DeviceKind, status: Switch) -> WriteOutcome {
        self.store
            .devices()
            .patch(|board| board.set_status(device, status));
        info!(device = %device, %status, "Manual device toggle");

        let command = DeviceCommand::manual(device, status);
        let error = match self.api.control_device(&command).await {
            Ok(()) => None,
            Err(e) => {
                warn!(device = %device, %status, error = %e, "Device command failed, keeping local state");
                Some(e.to_string())
            }
        };
        WriteOutcome {
            target: device.as_str().to_string(),
            value: i64::from(u8::from(status)),
            error,
        }
    }

    /// Flip a device relative to what is currently displayed.
    pub async fn toggle_device(&self, device: DeviceKind) -> WriteOutcome {
        let next = self.store.device_status(device).toggled();
        self.set_device(device, next).await
    }

    async fn send_setting(&self, pin: &'static str, value: i64) -> WriteOutcome {
        info!(pin, value, "Sending setting write");
        let error = match self.api.write_setting(&SettingWrite::new(pin, value)).await {
            Ok(()) => None,
            Err(e) => {
                warn!(pin, value, error = %e, "Setting write failed, keeping local state");
                Some(e.to_string())
            }
        };
        WriteOutcome {
            target: pin.to_string(),
            value,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;
    use crate::store::ControlStore;
    use growbox_types::ControlSettings;
    use std::collections::HashSet;

    fn setup() -> (Arc<MockBackend>, CommandDispatcher) {
        let mock = Arc::new(MockBackend::new());
        let dispatcher = CommandDispatcher::new(mock.clone(), ControlStore::shared());
        (mock, dispatcher)
    }

    #[test]
    fn test_mapping_is_one_to_one() {
        let keys: HashSet<_> = LogicalSetting::ALL.iter().map(|s| s.wire_key()).collect();
        assert_eq!(keys.len(), LogicalSetting::ALL.len());
        for setting in LogicalSetting::ALL {
            assert!(pins::ALL.contains(&setting.wire_key()));
        }
    }

    #[test]
    fn test_names_round_trip() {
        for setting in LogicalSetting::ALL {
            assert_eq!(setting.to_string().parse::<LogicalSetting>().unwrap(), setting);
        }
        assert_eq!(
            "fan-interval".parse::<LogicalSetting>().unwrap().wire_key(),
            "V21"
        );
        assert!("fan-speed".parse::<LogicalSetting>().is_err());
    }

    #[test]
    fn test_encode_domains() {
        assert_eq!(LogicalSetting::SmartEnable.encode(true.into()).unwrap(), 1);
        assert_eq!(LogicalSetting::SmartFan.encode(SettingValue::Int(0)).unwrap(), 0);
        assert!(LogicalSetting::SmartFan.encode(SettingValue::Int(2)).is_err());
        assert!(LogicalSetting::PumpOnThreshold.encode(SettingValue::Int(101)).is_err());
        assert!(LogicalSetting::LampOnThreshold.encode(SettingValue::Int(305)).is_err());
        assert_eq!(LogicalSetting::LampOnThreshold.encode(SettingValue::Int(310)).unwrap(), 310);
        assert!(LogicalSetting::FanDuration.encode(SettingValue::Int(0)).is_err());
        assert!(LogicalSetting::FanInterval.encode(true.into()).is_err());
    }

    #[tokio::test]
    async fn test_dispatch_updates_then_writes() {
        let (mock, dispatcher) = setup();
        let outcome = dispatcher
            .dispatch(LogicalSetting::SmartEnable, true)
            .await
            .unwrap();
        assert!(outcome.is_ok());
        assert!(dispatcher.store().current_settings().smart_enabled);
        assert_eq!(mock.setting_writes().await, vec![SettingWrite::new("V8", 1)]);
    }

    #[tokio::test]
    async fn test_invalid_value_rejected_before_mutation() {
        let (mock, dispatcher) = setup();
        let err = dispatcher
            .dispatch(LogicalSetting::FanInterval, 0i64)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidValue { .. }));
        assert_eq!(dispatcher.store().current_settings().fan_interval, 10);
        assert!(mock.setting_writes().await.is_empty());
    }

    #[tokio::test]
    async fn test_single_bound_cannot_cross_partner() {
        let (mock, dispatcher) = setup();
        // Default pump pair is 40/60.
        assert!(dispatcher
            .dispatch(LogicalSetting::PumpOnThreshold, 70u32)
            .await
            .is_err());
        assert!(dispatcher
            .dispatch(LogicalSetting::PumpOffThreshold, 30u32)
            .await
            .is_err());
        assert!(mock.setting_writes().await.is_empty());

        dispatcher
            .dispatch(LogicalSetting::PumpOffThreshold, 80u32)
            .await
            .unwrap();
        assert_eq!(dispatcher.store().current_settings().pump.high(), 80);
    }

    #[tokio::test]
    async fn test_bound_checked_against_stored_partner() {
        let (mock, dispatcher) = setup();
        let settings = dispatcher.store().settings();
        let polled = ControlSettings {
            pump: ThresholdSetting::new(ThresholdKey::Pump, 10, 20).unwrap(),
            ..ControlSettings::default()
        };
        let seq = settings.issue();
        assert!(settings.apply(seq, polled.clone()));
        let mut rx = settings.subscribe();

        // 30 fits the default 40/60 pair but crosses the stored upper bound.
        let err = dispatcher
            .dispatch(LogicalSetting::PumpOnThreshold, 30u32)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidValue { .. }));
        assert_eq!(dispatcher.store().current_settings(), polled);
        assert!(!rx.has_changed().unwrap());
        assert!(mock.setting_writes().await.is_empty());

        dispatcher
            .dispatch(LogicalSetting::PumpOffThreshold, 35u32)
            .await
            .unwrap();
        let pump = dispatcher.store().current_settings().pump;
        assert_eq!((pump.low(), pump.high()), (10, 35));
        assert!(rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_failed_write_not_rolled_back() {
        let (mock, dispatcher) = setup();
        mock.set_should_fail(true, Some("offline")).await;
        let outcome = dispatcher
            .dispatch(LogicalSetting::FanDuration, 7u32)
            .await
            .unwrap();
        assert!(!outcome.is_ok());
        assert_eq!(dispatcher.store().current_settings().fan_duration, 7);
    }

    #[tokio::test]
    async fn test_set_thresholds_partial_failure() {
        let (mock, dispatcher) = setup();
        mock.fail_pin(pins::LAMP_OFF_THRESHOLD).await;

        let report = dispatcher
            .set_thresholds(ThresholdKey::Lamp, 200, 400)
            .await
            .unwrap();
        assert!(report.low.is_ok());
        assert!(!report.high.is_ok());
        assert!(!report.all_ok());

        let lamp = dispatcher.store().current_settings().lamp;
        assert_eq!((lamp.low(), lamp.high()), (200, 400));
        assert_eq!(mock.setting(pins::LAMP_ON_THRESHOLD).await, Some(200.0));
        assert_eq!(mock.setting(pins::LAMP_OFF_THRESHOLD).await, Some(500.0));
    }

    #[tokio::test]
    async fn test_set_thresholds_rejects_inverted_pair() {
        let (mock, dispatcher) = setup();
        assert!(dispatcher
            .set_thresholds(ThresholdKey::Pump, 70, 20)
            .await
            .is_err());
        assert!(mock.setting_writes().await.is_empty());
    }

    #[tokio::test]
    async fn test_set_device_optimistic() {
        let (mock, dispatcher) = setup();
        let outcome = dispatcher.set_device(DeviceKind::Pump, Switch::On).await;
        assert!(outcome.is_ok());
        assert_eq!(dispatcher.store().device_status(DeviceKind::Pump), Switch::On);

        let commands = mock.device_commands().await;
        assert_eq!(commands, vec![DeviceCommand::manual(DeviceKind::Pump, Switch::On)]);
    }

    #[tokio::test]
    async fn test_toggle_failure_keeps_local_state() {
        let (mock, dispatcher) = setup();
        mock.set_should_fail(true, None).await;
        let outcome = dispatcher.toggle_device(DeviceKind::Fan).await;
        assert!(!outcome.is_ok());
        assert_eq!(dispatcher.store().device_status(DeviceKind::Fan), Switch::On);
    }
}
