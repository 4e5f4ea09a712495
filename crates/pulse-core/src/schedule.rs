//! Sleep scheduler
//!
//! Neither wake source survives a power-down, so both are armed on every
//! cycle. A source that refuses to arm is retried; if it still refuses the
//! caller gets an [`ArmError`] and must not power down.

use log::{debug, warn};

use crate::config::NodeConfig;
use crate::counter::ActiveLevel;
use crate::error::ArmError;
use crate::retained::RetainedState;

const MICROS_PER_SEC: u64 = 1_000_000;

/// Wake source configuration, consumed by the power-down transition.
pub trait WakeArming {
    type Error: core::fmt::Debug;

    /// Wake when `pin` reaches `level`.
    fn arm_edge(&mut self, pin: u8, level: ActiveLevel) -> Result<(), Self::Error>;

    /// Wake after `micros` microseconds.
    fn arm_timer(&mut self, micros: u64) -> Result<(), Self::Error>;
}

/// How long to sleep, as decided at `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepPlan {
    pub now: u32,
    pub sleep_secs: u32,
}

impl SleepPlan {
    pub const fn timer_micros(&self) -> u64 {
        self.sleep_secs as u64 * MICROS_PER_SEC
    }
}

pub struct SleepScheduler {
    pin: u8,
    level: ActiveLevel,
    attempts: u8,
}

impl SleepScheduler {
    pub fn new(config: &NodeConfig, level: ActiveLevel) -> Self {
        Self {
            pin: config.pulse_pin,
            level,
            attempts: config.arm_attempts.max(1),
        }
    }

    /// Time until the next report deadline, clamped at zero.
    pub fn plan(&self, state: &RetainedState, now: u32) -> SleepPlan {
        SleepPlan {
            now,
            sleep_secs: state.next_report_time().saturating_sub(now),
        }
    }

    /// Arm the edge source, then the timer source.
    pub fn arm<A: WakeArming>(&self, arming: &mut A, plan: &SleepPlan) -> Result<(), ArmError> {
        self.retry("edge", || arming.arm_edge(self.pin, self.level))
            .map_err(|attempts| ArmError::Edge {
                pin: self.pin,
                attempts,
            })?;

        let micros = plan.timer_micros();
        self.retry("timer", || arming.arm_timer(micros))
            .map_err(|attempts| ArmError::Timer { micros, attempts })?;

        debug!(
            "armed edge on pin {} and timer for {} s",
            self.pin, plan.sleep_secs
        );
        Ok(())
    }

    fn retry<E: core::fmt::Debug>(
        &self,
        source: &str,
        mut arm: impl FnMut() -> Result<(), E>,
    ) -> Result<(), u8> {
        for attempt in 1..=self.attempts {
            match arm() {
                Ok(()) => return Ok(()),
                Err(e) => warn!(
                    "{} wake arming attempt {}/{} failed: {:?}",
                    source, attempt, self.attempts, e
                ),
            }
        }
        Err(self.attempts)
    }
}
