//! Monotonic seconds clock that keeps running through deep sleep

/// Nominal RTC slow clock frequency of the reference board.
pub const RTC_SLOW_CLOCK_HZ: u64 = 150_000;

/// Seconds since the RTC domain powered up.
///
/// Must keep counting while the CPU is in deep sleep; every timestamp in the
/// retained block is in this clock domain.
pub trait MonotonicClock {
    fn now_secs(&self) -> u32;
}

/// Convert raw RTC slow-clock ticks to whole seconds.
pub const fn rtc_ticks_to_secs(ticks: u64) -> u32 {
    let secs = ticks / RTC_SLOW_CLOCK_HZ;
    if secs > u32::MAX as u64 {
        u32::MAX
    } else {
        secs as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_truncate_to_whole_seconds() {
        assert_eq!(rtc_ticks_to_secs(0), 0);
        assert_eq!(rtc_ticks_to_secs(149_999), 0);
        assert_eq!(rtc_ticks_to_secs(150_000), 1);
        assert_eq!(rtc_ticks_to_secs(150_000 * 3600 + 1), 3600);
    }

    #[test]
    fn test_ticks_clamp_on_overflow() {
        assert_eq!(rtc_ticks_to_secs(u64::MAX), u32::MAX);
    }
}
