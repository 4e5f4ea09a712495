//! [`RawWakeHal`] on bare registers, for the pre-init wake path.

use pulse_core::counter::{ActiveLevel, EdgeLine, RawWakeHal};

use crate::registers;

pub struct RawWakeRegisters {
    rtc_io: u8,
    active: ActiveLevel,
}

impl RawWakeRegisters {
    /// `None` when `gpio` cannot be read from the RTC domain.
    pub const fn new(gpio: u8, active: ActiveLevel) -> Option<Self> {
        match registers::rtc_io_number(gpio) {
            Some(rtc_io) => Some(Self { rtc_io, active }),
            None => None,
        }
    }

    /// Straight back to sleep; the previous cycle's wake sources still hold.
    pub fn resleep(self) -> ! {
        registers::reenter_deep_sleep()
    }
}

impl EdgeLine for RawWakeRegisters {
    fn is_active(&mut self) -> bool {
        let high = registers::rtc_io_level(self.rtc_io);
        match self.active {
            ActiveLevel::High => high,
            ActiveLevel::Low => !high,
        }
    }

    fn feed_watchdog(&mut self) {
        registers::feed_watchdogs();
    }

    fn pause_us(&mut self, us: u32) {
        registers::rom_delay_us(us);
    }
}

impl RawWakeHal for RawWakeRegisters {
    fn console_busy(&mut self) -> bool {
        registers::uart0_busy()
    }

    fn console_write(&mut self, bytes: &[u8]) {
        registers::rom_console_write(bytes);
    }

    fn disarm_sleep_watchdog(&mut self) {
        registers::disable_rtc_watchdog();
    }
}
