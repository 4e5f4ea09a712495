//! Supervisory watchdog fed during the post-boot debounce wait.

use esp_hal::rtc_cntl::{Rwdt, RwdtStage};
use esp_hal::time::Duration;
use pulse_core::counter::Watchdog;

/// Longest unfed stretch, such as radio bring-up or the arming rounds.
const TIMEOUT: Duration = Duration::from_secs(8);

pub struct RtcWatchdog<'a> {
    rwdt: &'a mut Rwdt,
}

impl<'a> RtcWatchdog<'a> {
    /// Start the RTC watchdog with the stage 0 timeout.
    pub fn start(rwdt: &'a mut Rwdt) -> Self {
        rwdt.set_timeout(RwdtStage::Stage0, TIMEOUT);
        rwdt.enable();
        Self { rwdt }
    }
}

impl Watchdog for RtcWatchdog<'_> {
    fn feed(&mut self) {
        self.rwdt.feed();
    }
}
