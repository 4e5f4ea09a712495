//! One wake cycle: dispatch, report if due, re-arm both wake sources.
//!
//! The cycle runs to completion and then the caller powers the chip down.
//! Every step works on the same `&mut RetainedState`; nothing is copied to
//! transient state, because transient state does not survive the power-down.

use log::{error, info};

use crate::clock::MonotonicClock;
use crate::config::NodeConfig;
use crate::counter::{ActiveLevel, PulseCounter};
use crate::error::ArmError;
use crate::report::{BroadcastRadio, ReportOutcome, ReportingEngine};
use crate::retained::RetainedState;
use crate::schedule::{SleepPlan, SleepScheduler, WakeArming};
use crate::wake::{self, Dispatched, WakeCause};

/// Everything one cycle decided, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    pub cause: WakeCause,
    pub dispatched: Dispatched,
    pub report: ReportOutcome,
    pub plan: SleepPlan,
}

pub struct WakeCycle {
    period_secs: u32,
    engine: ReportingEngine,
    scheduler: SleepScheduler,
}

impl WakeCycle {
    pub fn new(config: &NodeConfig, level: ActiveLevel) -> Self {
        Self {
            period_secs: config.report_period_secs,
            engine: ReportingEngine::new(config),
            scheduler: SleepScheduler::new(config, level),
        }
    }

    /// Run the cycle. On `Ok` both wake sources are armed and the caller
    /// may power down. On `Err` it must not.
    pub async fn run<K, C, R, A>(
        &self,
        cause: WakeCause,
        state: &mut RetainedState,
        clock: &K,
        counter: &mut C,
        radio: &mut R,
        arming: &mut A,
    ) -> Result<CycleSummary, ArmError>
    where
        K: MonotonicClock,
        C: PulseCounter,
        R: BroadcastRadio,
        A: WakeArming,
    {
        let dispatched = wake::dispatch(cause, state, clock.now_secs(), self.period_secs, counter);

        // The debounce wait may have taken a while; read the clock again.
        let report = self.engine.run_if_due(state, clock.now_secs(), radio).await;

        let plan = self.scheduler.plan(state, clock.now_secs());
        info!(
            "cycle done: cause={:?} count={} sleeping {} s",
            cause,
            state.pulse_count(),
            plan.sleep_secs
        );
        log::logger().flush();

        self.scheduler.arm(arming, &plan).inspect_err(|e| {
            error!("wake sources not armed: {}", e);
        })?;

        Ok(CycleSummary {
            cause,
            dispatched,
            report,
            plan,
        })
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use core::cell::Cell;
    use std::vec;

    use embassy_futures::block_on;

    use super::*;
    use crate::counter::PollingCounter;
    use crate::counter::mock::ScriptedLine;
    use crate::report::mock::RecordingRadio;
    use crate::schedule::mock::MockArming;

    struct FixedClock(Cell<u32>);

    impl MonotonicClock for FixedClock {
        fn now_secs(&self) -> u32 {
            self.0.get()
        }
    }

    fn cycle() -> WakeCycle {
        WakeCycle::new(&NodeConfig::default(), ActiveLevel::High)
    }

    fn counter() -> PollingCounter<ScriptedLine> {
        PollingCounter::new(ScriptedLine::new(vec![(0, 500)]), 10_000)
    }

    #[test]
    fn test_cold_boot_cycle_sleeps_full_period() {
        let mut state = RetainedState::zeroed();
        let clock = FixedClock(Cell::new(7));
        let mut radio = RecordingRadio::default();
        let mut arming = MockArming::default();

        let summary = block_on(cycle().run(
            WakeCause::ColdBoot,
            &mut state,
            &clock,
            &mut counter(),
            &mut radio,
            &mut arming,
        ))
        .unwrap();

        assert_eq!(summary.report, ReportOutcome::NotDue);
        assert_eq!(summary.plan.sleep_secs, 60);
        assert_eq!(state.next_report_time(), 67);
        assert_eq!(state.pulse_count(), 0);
        assert_eq!(arming.armed_timer, Some(60_000_000));
        assert!(radio.sent.is_empty());
    }

    #[test]
    fn test_timer_wake_one_second_early_reports() {
        let mut state = RetainedState::zeroed();
        state.cold_start();
        state.schedule_next(0, 60);
        state.record_pulse();
        let clock = FixedClock(Cell::new(59));
        let mut radio = RecordingRadio::default();
        let mut arming = MockArming::default();

        let summary = block_on(cycle().run(
            WakeCause::TimerExpired,
            &mut state,
            &clock,
            &mut counter(),
            &mut radio,
            &mut arming,
        ))
        .unwrap();

        assert!(matches!(summary.report, ReportOutcome::Sent(_)));
        assert_eq!(state.pulse_count(), 0);
        assert_eq!(state.last_report_time(), 59);
        assert_eq!(state.next_report_time(), 119);
        assert_eq!(summary.plan.sleep_secs, 60);
    }

    #[test]
    fn test_arm_failure_is_returned() {
        let mut state = RetainedState::zeroed();
        let clock = FixedClock(Cell::new(0));
        let mut radio = RecordingRadio::default();
        let mut arming = MockArming {
            edge_failures: u8::MAX,
            ..Default::default()
        };

        let result = block_on(cycle().run(
            WakeCause::ColdBoot,
            &mut state,
            &clock,
            &mut counter(),
            &mut radio,
            &mut arming,
        ));

        assert_eq!(result.unwrap_err(), ArmError::Edge { pin: 25, attempts: 3 });
        assert!(arming.armed_timer.is_none());
    }
}
