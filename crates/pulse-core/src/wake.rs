//! Wake-cause dispatch

use log::{info, warn};

use crate::counter::{PulseCounter, PulseTally};
use crate::retained::RetainedState;

/// Why the device is running right now.
///
/// Hardware causes other than the edge and timer sources (and the absence
/// of a cause on power-up) all map to [`WakeCause::ColdBoot`], so the
/// deadline is never left uninitialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeCause {
    ColdBoot,
    TimerExpired,
    EdgeTriggered,
}

impl WakeCause {
    /// A block that fails validation means there is no prior state, whatever
    /// the hardware says.
    pub fn reconcile(self, state: &RetainedState) -> Self {
        if state.is_valid() { self } else { Self::ColdBoot }
    }
}

/// What the dispatched handler did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// Deadline initialized. `fresh` is set when the counters were zeroed.
    ColdBoot { fresh: bool, next_report_time: u32 },
    Timer,
    Pulse(PulseTally),
}

/// Route one wake to exactly one handler.
pub fn dispatch<C: PulseCounter>(
    cause: WakeCause,
    state: &mut RetainedState,
    now: u32,
    period_secs: u32,
    counter: &mut C,
) -> Dispatched {
    match cause.reconcile(state) {
        WakeCause::ColdBoot => {
            let fresh = !state.is_valid();
            if fresh {
                state.cold_start();
            } else if state.rebase_window(now) {
                warn!("clock restarted behind the window, window now starts at {}", now);
            }
            state.schedule_next(now, period_secs);
            info!(
                "powered on (fresh={}), next report at {}",
                fresh,
                state.next_report_time()
            );
            Dispatched::ColdBoot {
                fresh,
                next_report_time: state.next_report_time(),
            }
        }
        WakeCause::TimerExpired => {
            info!("timer wake at {}", now);
            Dispatched::Timer
        }
        WakeCause::EdgeTriggered => Dispatched::Pulse(counter.on_edge_wake(state)),
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::vec;

    use super::*;
    use crate::counter::PollingCounter;
    use crate::config::NodeConfig;
    use crate::counter::mock::ScriptedLine;
    use crate::report::{Calibration, Metrics};

    fn counter() -> PollingCounter<ScriptedLine> {
        PollingCounter::new(ScriptedLine::new(vec![(0, 500)]), 10_000)
    }

    #[test]
    fn test_cold_boot_initializes_deadline_only() {
        let mut state = RetainedState::zeroed();

        let result = dispatch(WakeCause::ColdBoot, &mut state, 1_000, 60, &mut counter());

        assert_eq!(
            result,
            Dispatched::ColdBoot {
                fresh: true,
                next_report_time: 1_060
            }
        );
        assert!(state.is_valid());
        assert_eq!(state.pulse_count(), 0);
    }

    #[test]
    fn test_cold_boot_keeps_valid_count() {
        let mut state = RetainedState::zeroed();
        state.cold_start();
        state.record_pulse();
        state.record_pulse();

        let result = dispatch(WakeCause::ColdBoot, &mut state, 500, 60, &mut counter());

        assert!(matches!(result, Dispatched::ColdBoot { fresh: false, .. }));
        assert_eq!(state.pulse_count(), 2);
        assert_eq!(state.next_report_time(), 560);
    }

    #[test]
    fn test_cold_boot_behind_window_keeps_rate() {
        let mut state = RetainedState::zeroed();
        state.cold_start();
        state.close_window(5_000, 60);
        for _ in 0..30 {
            state.record_pulse();
        }

        dispatch(WakeCause::ColdBoot, &mut state, 10, 60, &mut counter());

        assert_eq!(state.pulse_count(), 30);
        assert_eq!(state.last_report_time(), 10);
        assert_eq!(state.next_report_time(), 70);

        let metrics = Metrics::compute(
            state.pulse_count(),
            state.last_report_time(),
            70,
            &Calibration::from(&NodeConfig::default()),
        );
        assert_eq!(metrics.rate_milli, Some(1800));
    }

    #[test]
    fn test_edge_wake_with_corrupt_block_is_cold_boot() {
        let mut state = RetainedState::zeroed();

        let result = dispatch(WakeCause::EdgeTriggered, &mut state, 10, 60, &mut counter());

        assert!(matches!(result, Dispatched::ColdBoot { fresh: true, .. }));
        assert_eq!(state.pulse_count(), 0);
        assert_eq!(state.next_report_time(), 70);
    }

    #[test]
    fn test_timer_wake_mutates_nothing() {
        let mut state = RetainedState::zeroed();
        state.cold_start();
        state.schedule_next(0, 60);
        let before = state;

        let result = dispatch(WakeCause::TimerExpired, &mut state, 59, 60, &mut counter());

        assert_eq!(result, Dispatched::Timer);
        assert_eq!(state, before);
    }

    #[test]
    fn test_edge_wake_counts_once() {
        let mut state = RetainedState::zeroed();
        state.cold_start();

        let result = dispatch(WakeCause::EdgeTriggered, &mut state, 5, 60, &mut counter());

        assert!(matches!(result, Dispatched::Pulse(PulseTally { count: 1, .. })));
        assert_eq!(state.pulse_count(), 1);
    }
}
