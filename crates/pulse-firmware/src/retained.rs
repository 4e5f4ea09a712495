//! The counter block in RTC fast memory.
//!
//! The bootloader only loads this section on power-up, not on a deep-sleep
//! wake, so the block carries over between cycles. The seal in
//! [`RetainedState`] catches the cases where it did not.

use core::cell::Cell;

use critical_section::Mutex;
use pulse_core::RetainedState;

#[esp_hal::ram(unstable(rtc_fast))]
static mut RETAINED: RetainedState = RetainedState::zeroed();

static TAKEN: Mutex<Cell<bool>> = Mutex::new(Cell::new(false));

/// Exclusive access to the retained block. Returns `None` after the first call.
pub fn take() -> Option<&'static mut RetainedState> {
    critical_section::with(|cs| {
        if TAKEN.borrow(cs).replace(true) {
            return None;
        }
        // Only handed out once, so the reference is unique.
        Some(unsafe { &mut *core::ptr::addr_of_mut!(RETAINED) })
    })
}
