//! Node configuration baked in by `build.rs`.

use pulse_core::config::EnvOverrides;
use pulse_core::{ConfigError, NodeConfig};

/// The `PULSE_*` values present at build time, applied to the defaults.
pub fn node_config() -> Result<NodeConfig, ConfigError> {
    NodeConfig::from_env_strs(EnvOverrides {
        report_period_secs: option_env!("PULSE_REPORT_PERIOD_SECS"),
        pulses_per_unit: option_env!("PULSE_PULSES_PER_UNIT"),
        rate_scale_milli: option_env!("PULSE_RATE_SCALE_MILLI"),
        debounce_ms: option_env!("PULSE_DEBOUNCE_MS"),
        radio_channel: option_env!("PULSE_RADIO_CHANNEL"),
        pulse_pin: option_env!("PULSE_PIN"),
        arm_attempts: option_env!("PULSE_ARM_ATTEMPTS"),
        strategy: option_env!("PULSE_DEBOUNCE_STRATEGY"),
    })
}
