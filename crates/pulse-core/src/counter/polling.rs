//! Post-boot counting: the full system is up, the line is an `embedded-hal`
//! input, and the debounce pause is an `embedded-hal` delay.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::InputPin;
use log::{debug, info};

use super::{ActiveLevel, EdgeLine, PulseCounter, PulseTally, wait_for_release};
use crate::retained::RetainedState;

/// Supervisory watchdog that must be fed while waiting on the line.
pub trait Watchdog {
    fn feed(&mut self);
}

/// Adapts an input pin, a delay and a watchdog to [`EdgeLine`].
pub struct PollingLine<P, D, W> {
    pin: P,
    delay: D,
    watchdog: W,
    active: ActiveLevel,
}

impl<P, D, W> PollingLine<P, D, W>
where
    P: InputPin,
    D: DelayNs,
    W: Watchdog,
{
    pub const fn new(pin: P, delay: D, watchdog: W, active: ActiveLevel) -> Self {
        Self {
            pin,
            delay,
            watchdog,
            active,
        }
    }

    /// Give the parts back, e.g. to turn the pin into a wake source.
    pub fn release(self) -> (P, D, W) {
        (self.pin, self.delay, self.watchdog)
    }
}

impl<P, D, W> EdgeLine for PollingLine<P, D, W>
where
    P: InputPin,
    D: DelayNs,
    W: Watchdog,
{
    fn is_active(&mut self) -> bool {
        let reading = match self.active {
            ActiveLevel::High => self.pin.is_high(),
            ActiveLevel::Low => self.pin.is_low(),
        };
        // An unreadable line counts as still asserted.
        reading.unwrap_or(true)
    }

    fn feed_watchdog(&mut self) {
        self.watchdog.feed();
    }

    fn pause_us(&mut self, us: u32) {
        self.delay.delay_us(us);
    }
}

/// Counts once, then holds the cycle until the line is confirmed released.
pub struct PollingCounter<L> {
    line: L,
    debounce_us: u32,
}

impl<L: EdgeLine> PollingCounter<L> {
    pub const fn new(line: L, debounce_us: u32) -> Self {
        Self { line, debounce_us }
    }

    pub fn into_line(self) -> L {
        self.line
    }
}

impl<L: EdgeLine> PulseCounter for PollingCounter<L> {
    fn on_edge_wake(&mut self, state: &mut RetainedState) -> PulseTally {
        let count = state.record_pulse();
        info!("pulse counted, count={}", count);

        let release = wait_for_release(&mut self.line, self.debounce_us);
        debug!(
            "line released after {} feeds, {} bounces",
            release.watchdog_feeds, release.bounces
        );

        // Nothing may be cut off by the power-down that follows.
        log::logger().flush();

        PulseTally { count, release }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use core::cell::Cell;
    use core::convert::Infallible;
    use std::rc::Rc;
    use std::vec;
    use std::vec::Vec;

    use super::*;
    use crate::counter::mock::ScriptedLine;

    /// Input pin sharing a virtual clock with its delay.
    struct ScriptPin {
        clock: Rc<Cell<u64>>,
        high: Vec<(u64, u64)>,
    }

    struct ScriptDelay {
        clock: Rc<Cell<u64>>,
    }

    #[derive(Default)]
    struct CountingWatchdog {
        feeds: u32,
    }

    impl embedded_hal::digital::ErrorType for ScriptPin {
        type Error = Infallible;
    }

    impl InputPin for ScriptPin {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            let now = self.clock.get();
            self.clock.set(now + 20);
            Ok(self.high.iter().any(|&(s, e)| now >= s && now < e))
        }

        fn is_low(&mut self) -> Result<bool, Self::Error> {
            self.is_high().map(|h| !h)
        }
    }

    impl DelayNs for ScriptDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.clock.set(self.clock.get() + u64::from(ns / 1000));
        }
    }

    impl Watchdog for &mut CountingWatchdog {
        fn feed(&mut self) {
            self.feeds += 1;
        }
    }

    #[test]
    fn test_polling_line_honours_active_low() {
        let clock = Rc::new(Cell::new(0));
        let pin = ScriptPin {
            clock: clock.clone(),
            high: vec![(0, 1_000_000)],
        };
        let mut dog = CountingWatchdog::default();
        let mut line = PollingLine::new(
            pin,
            ScriptDelay { clock },
            &mut dog,
            ActiveLevel::Low,
        );

        // Line is high, which is the idle level for an active-low sensor.
        assert!(!line.is_active());
    }

    #[test]
    fn test_single_increment_for_bouncy_pulse() {
        let clock = Rc::new(Cell::new(0));
        let pin = ScriptPin {
            clock: clock.clone(),
            high: vec![(0, 3_000), (8_000, 8_500), (15_000, 15_100)],
        };
        let mut dog = CountingWatchdog::default();
        let line = PollingLine::new(
            pin,
            ScriptDelay {
                clock: clock.clone(),
            },
            &mut dog,
            ActiveLevel::High,
        );
        let mut counter = PollingCounter::new(line, 10_000);

        let mut state = RetainedState::zeroed();
        state.cold_start();
        let tally = counter.on_edge_wake(&mut state);

        assert_eq!(tally.count, 1);
        assert_eq!(state.pulse_count(), 1);
        drop(counter);
        assert!(dog.feeds > 0);
    }

    #[test]
    fn test_n_spaced_pulses_count_n() {
        let mut state = RetainedState::zeroed();
        state.cold_start();

        for _ in 0..5 {
            let mut counter = PollingCounter::new(ScriptedLine::new(vec![(0, 500)]), 10_000);
            counter.on_edge_wake(&mut state);
        }

        assert_eq!(state.pulse_count(), 5);
    }
}
