//! Deep sleep entry with both wake sources
//!
//! [`DeepSleepArming`] validates and records the sources during the cycle;
//! [`DeepSleepArming::power_down`] hands them to the RTC controller. Nothing
//! here survives the power-down, so this runs again on every wake.

use core::time::Duration as CoreDuration;

use esp_hal::gpio::RtcPin;
use esp_hal::rtc_cntl::Rtc;
use esp_hal::rtc_cntl::sleep::{Ext0WakeupSource, TimerWakeupSource, WakeupLevel};
use log::{error, info};
use pulse_core::counter::ActiveLevel;
use pulse_core::schedule::WakeArming;

use crate::registers;

/// Why a wake source was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmRefusal {
    /// The pad has no RTC IO, so it cannot wake the chip.
    NotRtcPin(u8),
    /// The line is already at the wake level; sleep would end at once.
    LineAsserted(u8),
}

#[derive(Debug, Default)]
pub struct DeepSleepArming {
    edge: Option<(u8, ActiveLevel)>,
    timer_micros: Option<u64>,
}

impl DeepSleepArming {
    pub const fn new() -> Self {
        Self {
            edge: None,
            timer_micros: None,
        }
    }

    /// Enter deep sleep. `pin` must be the pad that was armed.
    ///
    /// Without both sources recorded the chip is reset instead, so it can
    /// never sleep without a way to wake up.
    pub fn power_down<P: RtcPin>(self, rtc: &mut Rtc<'_>, pin: P) -> ! {
        let (Some((_, level)), Some(micros)) = (self.edge, self.timer_micros) else {
            error!("wake sources incomplete, resetting instead of sleeping");
            esp_hal::system::software_reset()
        };

        let timer = TimerWakeupSource::new(CoreDuration::from_micros(micros));
        let ext0 = Ext0WakeupSource::new(
            pin,
            match level {
                ActiveLevel::High => WakeupLevel::High,
                ActiveLevel::Low => WakeupLevel::Low,
            },
        );

        info!("entering deep sleep for {} us", micros);
        log::logger().flush();

        // The RTC watchdog keeps running in deep sleep.
        rtc.rwdt.disable();
        rtc.sleep_deep(&[&timer, &ext0])
    }
}

impl WakeArming for DeepSleepArming {
    type Error = ArmRefusal;

    fn arm_edge(&mut self, pin: u8, level: ActiveLevel) -> Result<(), ArmRefusal> {
        let rtc_io = registers::rtc_io_number(pin).ok_or(ArmRefusal::NotRtcPin(pin))?;
        let high = registers::rtc_io_level(rtc_io);
        let asserted = match level {
            ActiveLevel::High => high,
            ActiveLevel::Low => !high,
        };
        if asserted {
            return Err(ArmRefusal::LineAsserted(pin));
        }
        self.edge = Some((pin, level));
        Ok(())
    }

    fn arm_timer(&mut self, micros: u64) -> Result<(), ArmRefusal> {
        self.timer_micros = Some(micros);
        Ok(())
    }
}
