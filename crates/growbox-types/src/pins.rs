//! Wire keys ("pins") of the remote device-control channel.
//!
//! Every tunable setting of the backend is addressed by one of these keys in
//! the `/current-settings` payload and in write requests.

// --- Smart control switches ---

/// Master smart-control switch.
pub const SMART_ENABLE: &str = "V8";

/// Smart control for the water pump.
pub const SMART_PUMP: &str = "V26";

/// Smart control for the grow light.
pub const SMART_LAMP: &str = "V27";

/// Smart control for the ventilation fan.
pub const SMART_FAN: &str = "V28";

// --- Thresholds ---

/// Soil moisture below which the pump turns on.
pub const PUMP_ON_THRESHOLD: &str = "V20";

/// Soil moisture above which the pump turns off.
pub const PUMP_OFF_THRESHOLD: &str = "V23";

/// Light level below which the lamp turns on.
pub const LAMP_ON_THRESHOLD: &str = "V22";

/// Light level above which the lamp turns off.
pub const LAMP_OFF_THRESHOLD: &str = "V24";

// --- Fan schedule ---

/// Seconds between fan runs.
pub const FAN_INTERVAL: &str = "V21";

/// Fan run length.
pub const FAN_DURATION: &str = "V25";

/// All settings keys, in the order the backend documents them.
pub const ALL: [&str; 10] = [
    SMART_ENABLE,
    SMART_PUMP,
    SMART_LAMP,
    SMART_FAN,
    PUMP_ON_THRESHOLD,
    FAN_INTERVAL,
    LAMP_ON_THRESHOLD,
    PUMP_OFF_THRESHOLD,
    LAMP_OFF_THRESHOLD,
    FAN_DURATION,
];
