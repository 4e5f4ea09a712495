//! Seconds since RTC power-up, read from the slow-clock counter.
//!
//! The counter keeps running through deep sleep, so every timestamp in the
//! retained block stays in one clock domain across wakes.

use pulse_core::clock::{MonotonicClock, rtc_ticks_to_secs};

use crate::registers;

#[derive(Debug, Default, Clone, Copy)]
pub struct RtcTicksClock;

impl MonotonicClock for RtcTicksClock {
    fn now_secs(&self) -> u32 {
        rtc_ticks_to_secs(registers::rtc_ticks())
    }
}
