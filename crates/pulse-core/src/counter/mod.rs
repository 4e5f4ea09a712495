//! Pulse counting and debouncing
//!
//! An edge wake is the pulse: the count goes up once on entry and the line is
//! then watched until it has been quiet for a full debounce interval. Chatter
//! inside that window, or a line held asserted, never produces a second
//! count and never lets the device go back to sleep early.
//!
//! Two strategies share the [`PulseCounter`] interface:
//! - [`stub::StubCounter`] runs before system bring-up over raw registers.
//! - [`polling::PollingCounter`] runs after bring-up over `embedded-hal` pins.

pub mod polling;
pub mod stub;

use crate::retained::RetainedState;

pub use polling::{PollingCounter, PollingLine, Watchdog};
pub use stub::{RawWakeHal, StubCounter, StubVerdict, handle_stub_wake};

/// Electrical level at which the pulse line is asserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveLevel {
    #[default]
    High,
    Low,
}

/// The primitives the release wait needs. Nothing here may allocate.
pub trait EdgeLine {
    /// Whether the line currently reads asserted.
    fn is_active(&mut self) -> bool;
    /// Keep the supervisory watchdog from resetting the chip.
    fn feed_watchdog(&mut self);
    /// Spin for `us` microseconds.
    fn pause_us(&mut self, us: u32);
}

/// Turns one edge wake into one counted pulse.
pub trait PulseCounter {
    fn on_edge_wake(&mut self, state: &mut RetainedState) -> PulseTally;
}

/// What happened while a pulse was being counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PulseTally {
    /// Retained count after the increment.
    pub count: u32,
    /// Release-wait statistics.
    pub release: Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Release {
    /// Watchdog feeds while the line was held asserted.
    pub watchdog_feeds: u32,
    /// Times the line was asserted again after a debounce pause.
    pub bounces: u32,
}

/// Block until the line has stayed inactive for `debounce_us`.
///
/// Unbounded: a stuck line keeps the device awake with the
/// watchdog fed instead of letting it sleep into a wake storm.
pub fn wait_for_release<L: EdgeLine>(line: &mut L, debounce_us: u32) -> Release {
    let mut release = Release::default();

    loop {
        while line.is_active() {
            line.feed_watchdog();
            release.watchdog_feeds = release.watchdog_feeds.saturating_add(1);
        }

        line.pause_us(debounce_us);

        if !line.is_active() {
            return release;
        }
        release.bounces = release.bounces.saturating_add(1);
    }
}
