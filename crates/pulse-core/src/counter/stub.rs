//! Pre-init counting path.
//!
//! Runs before heap, logger, radio or the HAL are initialized. It may only
//! touch the [`RawWakeHal`] primitives and the retained block: no allocation,
//! no `log`, no async. When it handles a pulse the caller puts the chip
//! straight back to sleep with the wake sources armed by the previous cycle.

use core::fmt::Write;

use super::{EdgeLine, PulseCounter, PulseTally, wait_for_release};
use crate::retained::RetainedState;

/// Register-level primitives available before system bring-up.
pub trait RawWakeHal: EdgeLine {
    /// Whether the diagnostic UART still has bytes in flight.
    fn console_busy(&mut self) -> bool;
    /// Queue raw bytes on the diagnostic UART.
    fn console_write(&mut self, bytes: &[u8]);
    /// Stop the RTC watchdog. It keeps counting through deep sleep and
    /// would reset the chip, wiping the retained block.
    fn disarm_sleep_watchdog(&mut self);
}

/// Outcome of the pre-init path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubVerdict {
    /// Pulse counted and released; re-enter sleep immediately.
    Resleep(PulseTally),
    /// Not ours to handle; continue with the normal boot.
    ContinueBoot,
}

pub struct StubCounter<'a, H> {
    hal: &'a mut H,
    debounce_us: u32,
}

impl<'a, H: RawWakeHal> StubCounter<'a, H> {
    pub fn new(hal: &'a mut H, debounce_us: u32) -> Self {
        Self { hal, debounce_us }
    }

    fn print_count(&mut self, count: u32) {
        let mut line: heapless::String<24> = heapless::String::new();
        // Cannot overflow: "count=" plus ten digits plus newline.
        let _ = writeln!(line, "count={}", count);
        self.hal.console_write(line.as_bytes());
    }

    fn drain_console(&mut self) {
        while self.hal.console_busy() {
            self.hal.feed_watchdog();
        }
    }
}

impl<H: RawWakeHal> PulseCounter for StubCounter<'_, H> {
    fn on_edge_wake(&mut self, state: &mut RetainedState) -> PulseTally {
        let count = state.record_pulse();
        self.print_count(count);

        let release = wait_for_release(&mut *self.hal, self.debounce_us);
        self.drain_console();

        PulseTally { count, release }
    }
}

/// Decide whether the pre-init path owns this wake, and count if it does.
///
/// Only an edge wake with a valid retained block and the line still asserted
/// is handled here. Everything else, including a pulse that already ended
/// before this code ran, falls through to the full wake cycle, which counts
/// edge wakes itself. A wake is therefore never counted twice.
pub fn handle_stub_wake<H: RawWakeHal>(
    hal: &mut H,
    state: &mut RetainedState,
    edge_wake: bool,
    debounce_us: u32,
) -> StubVerdict {
    if !edge_wake || !state.is_valid() || !hal.is_active() {
        return StubVerdict::ContinueBoot;
    }

    let tally = StubCounter::new(hal, debounce_us).on_edge_wake(state);
    hal.disarm_sleep_watchdog();
    StubVerdict::Resleep(tally)
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::vec;
    use std::vec::Vec;

    use super::*;
    use crate::counter::mock::ScriptedLine;

    struct FakeRegisters {
        line: ScriptedLine,
        console: Vec<u8>,
        tx_busy_polls: u32,
        /// Console bytes still in flight when the watchdog was disarmed.
        disarmed_with_pending: Option<u32>,
    }

    impl EdgeLine for FakeRegisters {
        fn is_active(&mut self) -> bool {
            self.line.is_active()
        }

        fn feed_watchdog(&mut self) {
            self.line.feed_watchdog();
        }

        fn pause_us(&mut self, us: u32) {
            self.line.pause_us(us);
        }
    }

    impl RawWakeHal for FakeRegisters {
        fn console_busy(&mut self) -> bool {
            if self.tx_busy_polls == 0 {
                return false;
            }
            self.tx_busy_polls -= 1;
            true
        }

        fn console_write(&mut self, bytes: &[u8]) {
            self.console.extend_from_slice(bytes);
            self.tx_busy_polls = 3;
        }

        fn disarm_sleep_watchdog(&mut self) {
            self.disarmed_with_pending = Some(self.tx_busy_polls);
        }
    }

    fn registers(edges: Vec<(u64, u64)>) -> FakeRegisters {
        FakeRegisters {
            line: ScriptedLine::new(edges),
            console: Vec::new(),
            tx_busy_polls: 0,
            disarmed_with_pending: None,
        }
    }

    fn valid_state() -> RetainedState {
        let mut state = RetainedState::zeroed();
        state.cold_start();
        state
    }

    #[test]
    fn test_stub_counts_and_requests_resleep() {
        let mut hal = registers(vec![(0, 4_000)]);
        let mut state = valid_state();

        let verdict = handle_stub_wake(&mut hal, &mut state, true, 10_000);

        match verdict {
            StubVerdict::Resleep(tally) => assert_eq!(tally.count, 1),
            StubVerdict::ContinueBoot => panic!("stub should have handled the pulse"),
        }
        assert_eq!(state.pulse_count(), 1);
        assert_eq!(hal.console, b"count=1\n");
        // Console fully drained before the verdict.
        assert_eq!(hal.tx_busy_polls, 0);
    }

    #[test]
    fn test_resleep_disarms_watchdog_after_console_drains() {
        let mut hal = registers(vec![(0, 4_000)]);
        let mut state = valid_state();

        let verdict = handle_stub_wake(&mut hal, &mut state, true, 10_000);

        assert!(matches!(verdict, StubVerdict::Resleep(_)));
        assert_eq!(hal.disarmed_with_pending, Some(0));
    }

    #[test]
    fn test_full_boot_keeps_watchdog_armed() {
        let mut hal = registers(vec![]);
        let mut state = valid_state();

        let verdict = handle_stub_wake(&mut hal, &mut state, true, 10_000);

        assert_eq!(verdict, StubVerdict::ContinueBoot);
        assert_eq!(hal.disarmed_with_pending, None);
    }

    #[test]
    fn test_stub_ignores_timer_wake() {
        let mut hal = registers(vec![(0, 4_000)]);
        let mut state = valid_state();

        let verdict = handle_stub_wake(&mut hal, &mut state, false, 10_000);

        assert_eq!(verdict, StubVerdict::ContinueBoot);
        assert_eq!(state.pulse_count(), 0);
        assert!(hal.console.is_empty());
        assert_eq!(hal.disarmed_with_pending, None);
    }

    #[test]
    fn test_stub_defers_when_line_already_released() {
        let mut hal = registers(vec![]);
        let mut state = valid_state();

        let verdict = handle_stub_wake(&mut hal, &mut state, true, 10_000);

        assert_eq!(verdict, StubVerdict::ContinueBoot);
        assert_eq!(state.pulse_count(), 0);
    }

    #[test]
    fn test_stub_defers_on_invalid_block() {
        let mut hal = registers(vec![(0, 4_000)]);
        let mut state = RetainedState::zeroed();

        let verdict = handle_stub_wake(&mut hal, &mut state, true, 10_000);

        assert_eq!(verdict, StubVerdict::ContinueBoot);
        assert!(!state.is_valid());
    }

    #[test]
    fn test_stub_chatter_counts_once_per_event() {
        let mut state = valid_state();

        for _ in 0..3 {
            let mut hal = registers(vec![(0, 1_000), (4_000, 4_100), (11_500, 11_700)]);
            handle_stub_wake(&mut hal, &mut state, true, 10_000);
        }

        assert_eq!(state.pulse_count(), 3);
    }
}
