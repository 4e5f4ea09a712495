//! Error types shared by the wake-cycle components

use thiserror_no_std::Error;

/// Failures of the wireless broadcast capability.
///
/// None of these abort a wake cycle: the reporting engine logs them, still
/// closes the reporting window, and the scheduler still re-arms sleep.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioError {
    #[error("radio bring-up failed on channel {0}")]
    BringUp(u8),
    #[error("broadcast send failed")]
    Send,
    #[error("radio tear-down failed")]
    TearDown,
    #[error("payload of {0} bytes does not fit a broadcast frame")]
    PayloadTooLarge(usize),
}

/// Which wake source could not be armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeSource {
    Edge,
    Timer,
}

/// A wake source refused to arm after every retry.
///
/// This is the only failure that can strand the device, so callers must not
/// power down after receiving it.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmError {
    #[error("edge wake on pin {pin} failed to arm after {attempts} attempts")]
    Edge { pin: u8, attempts: u8 },
    #[error("timer wake of {micros} us failed to arm after {attempts} attempts")]
    Timer { micros: u64, attempts: u8 },
}

impl ArmError {
    pub const fn source(&self) -> WakeSource {
        match self {
            Self::Edge { .. } => WakeSource::Edge,
            Self::Timer { .. } => WakeSource::Timer,
        }
    }
}

/// Wire payload encode/decode failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadError {
    #[error("payload does not fit the {0}-byte frame buffer")]
    Format(usize),
    #[error("payload is not a valid report record")]
    Parse,
}

/// Invalid build-time configuration value.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not a valid number")]
    NotANumber(&'static str),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("{0} names an unknown debounce strategy")]
    UnknownStrategy(&'static str),
}
