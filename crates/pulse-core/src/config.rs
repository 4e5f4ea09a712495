//! Node configuration
//!
//! Values are fixed at build time. The firmware's build script forwards
//! optional `PULSE_*` variables (from the environment or a `.env` file) and
//! [`NodeConfig::from_env_strs`] applies them on top of the defaults.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How an edge wake is turned into exactly one counted pulse.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebounceStrategy {
    /// Count and debounce in the allocation-free pre-init path, then go
    /// straight back to sleep without bringing the system up.
    WakeStub,
    /// Count after full bring-up and poll the line until it is released
    /// before re-arming sleep.
    #[default]
    PostBoot,
}

impl DebounceStrategy {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "stub" | "wake-stub" => Some(Self::WakeStub),
            "post-boot" | "poll" => Some(Self::PostBoot),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeConfig {
    /// Seconds between two reports.
    pub report_period_secs: u32,
    /// Meter calibration: pulses per reported unit (pulses per kWh).
    pub pulses_per_unit: u32,
    /// Pulses-per-second to rate-unit factor, in thousandths (3.6 for kW).
    pub rate_scale_milli: u32,
    /// Quiet time the line must stay inactive before a pulse is complete.
    pub debounce_ms: u32,
    /// Wireless channel used for the broadcast.
    pub radio_channel: u8,
    /// GPIO carrying the pulse signal (must be RTC capable).
    pub pulse_pin: u8,
    /// How many times each wake source is armed before giving up.
    pub arm_attempts: u8,
    pub strategy: DebounceStrategy,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            report_period_secs: 60,
            pulses_per_unit: 1000,
            rate_scale_milli: 3600,
            debounce_ms: 10,
            radio_channel: 1,
            pulse_pin: 25,
            arm_attempts: 3,
            strategy: DebounceStrategy::PostBoot,
        }
    }
}

/// Optional overrides, one per configurable field.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvOverrides<'a> {
    pub report_period_secs: Option<&'a str>,
    pub pulses_per_unit: Option<&'a str>,
    pub rate_scale_milli: Option<&'a str>,
    pub debounce_ms: Option<&'a str>,
    pub radio_channel: Option<&'a str>,
    pub pulse_pin: Option<&'a str>,
    pub arm_attempts: Option<&'a str>,
    pub strategy: Option<&'a str>,
}

impl NodeConfig {
    /// Apply textual overrides to the defaults.
    pub fn from_env_strs(overrides: EnvOverrides<'_>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = overrides.report_period_secs {
            config.report_period_secs = parse_nonzero("PULSE_REPORT_PERIOD_SECS", v)?;
        }
        if let Some(v) = overrides.pulses_per_unit {
            config.pulses_per_unit = parse_nonzero("PULSE_PULSES_PER_UNIT", v)?;
        }
        if let Some(v) = overrides.rate_scale_milli {
            config.rate_scale_milli = parse_nonzero("PULSE_RATE_SCALE_MILLI", v)?;
        }
        if let Some(v) = overrides.debounce_ms {
            config.debounce_ms = parse_nonzero("PULSE_DEBOUNCE_MS", v)?;
        }
        if let Some(v) = overrides.radio_channel {
            config.radio_channel = parse_nonzero("PULSE_RADIO_CHANNEL", v)?;
        }
        if let Some(v) = overrides.pulse_pin {
            config.pulse_pin = v
                .trim()
                .parse()
                .map_err(|_| ConfigError::NotANumber("PULSE_PIN"))?;
        }
        if let Some(v) = overrides.arm_attempts {
            config.arm_attempts = parse_nonzero("PULSE_ARM_ATTEMPTS", v)?;
        }
        if let Some(v) = overrides.strategy {
            config.strategy = DebounceStrategy::parse(v.trim())
                .ok_or(ConfigError::UnknownStrategy("PULSE_DEBOUNCE_STRATEGY"))?;
        }

        Ok(config)
    }

    /// Debounce interval in microseconds.
    pub const fn debounce_us(&self) -> u32 {
        self.debounce_ms.saturating_mul(1000)
    }
}

fn parse_nonzero<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: core::str::FromStr + Default + PartialEq,
{
    let parsed: T = value
        .trim()
        .parse()
        .map_err(|_| ConfigError::NotANumber(name))?;
    if parsed == T::default() {
        return Err(ConfigError::Zero(name));
    }
    Ok(parsed)
}
