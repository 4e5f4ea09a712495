//! Raw register access for ESP32 RTC-domain peripherals
//!
//! Used by code that runs before `esp_hal::init` (the pre-init wake path) and
//! by the few readings the HAL does not expose. Addresses are ESP32 only.

use core::ptr::{read_volatile, write_volatile};

// RTC_CNTL
const RTC_CNTL_TIME_UPDATE_REG: u32 = 0x3FF4_800C;
const RTC_CNTL_TIME0_REG: u32 = 0x3FF4_8010;
const RTC_CNTL_TIME1_REG: u32 = 0x3FF4_8014;
const RTC_CNTL_STATE0_REG: u32 = 0x3FF4_8018;
const RTC_CNTL_WDTCONFIG0_REG: u32 = 0x3FF4_808C;
const RTC_CNTL_WDTFEED_REG: u32 = 0x3FF4_80A4;
const RTC_CNTL_WDTWPROTECT_REG: u32 = 0x3FF4_80A8;

const TIME_UPDATE: u32 = 1 << 31;
const TIME_VALID: u32 = 1 << 30;
const SLEEP_EN: u32 = 1 << 31;
const RTC_WDT_FEED: u32 = 1 << 31;
const RTC_WDT_EN: u32 = 1 << 31;

// RTCIO
const RTC_GPIO_IN_REG: u32 = 0x3FF4_8424;
const RTC_GPIO_IN_SHIFT: u32 = 14;

// TIMG0 main watchdog
const TIMG0_WDTFEED_REG: u32 = 0x3FF5_F060;
const TIMG0_WDTWPROTECT_REG: u32 = 0x3FF5_F064;

// UART0
const UART0_STATUS_REG: u32 = 0x3FF4_001C;
const UART_TXFIFO_CNT_MASK: u32 = 0xFF << 16;
const UART_ST_UTX_OUT_MASK: u32 = 0xF << 24;

/// Write-protect key shared by both watchdogs.
const WDT_WKEY: u32 = 0x50D8_3AA1;

/// RTC IO number of an RTC-capable GPIO, or `None` for digital-only pads.
pub const fn rtc_io_number(gpio: u8) -> Option<u8> {
    match gpio {
        36 => Some(0),
        37 => Some(1),
        38 => Some(2),
        39 => Some(3),
        34 => Some(4),
        35 => Some(5),
        25 => Some(6),
        26 => Some(7),
        33 => Some(8),
        32 => Some(9),
        4 => Some(10),
        0 => Some(11),
        2 => Some(12),
        15 => Some(13),
        13 => Some(14),
        12 => Some(15),
        14 => Some(16),
        27 => Some(17),
        _ => None,
    }
}

/// Level of an RTC IO as seen by the RTC domain.
pub fn rtc_io_level(rtc_io: u8) -> bool {
    let bits = unsafe { read_volatile(RTC_GPIO_IN_REG as *const u32) };
    (bits >> (RTC_GPIO_IN_SHIFT + u32::from(rtc_io))) & 1 == 1
}

/// Latch and read the 48-bit RTC slow-clock counter.
pub fn rtc_ticks() -> u64 {
    unsafe {
        write_volatile(RTC_CNTL_TIME_UPDATE_REG as *mut u32, TIME_UPDATE);
        while read_volatile(RTC_CNTL_TIME_UPDATE_REG as *const u32) & TIME_VALID == 0 {
            core::hint::spin_loop();
        }
        let lo = read_volatile(RTC_CNTL_TIME0_REG as *const u32);
        let hi = read_volatile(RTC_CNTL_TIME1_REG as *const u32) & 0xFFFF;
        (u64::from(hi) << 32) | u64::from(lo)
    }
}

/// Feed the TIMG0 and RTC watchdogs without going through the HAL.
pub fn feed_watchdogs() {
    unsafe {
        write_volatile(TIMG0_WDTWPROTECT_REG as *mut u32, WDT_WKEY);
        write_volatile(TIMG0_WDTFEED_REG as *mut u32, 1);
        write_volatile(TIMG0_WDTWPROTECT_REG as *mut u32, 0);

        write_volatile(RTC_CNTL_WDTWPROTECT_REG as *mut u32, WDT_WKEY);
        write_volatile(RTC_CNTL_WDTFEED_REG as *mut u32, RTC_WDT_FEED);
        write_volatile(RTC_CNTL_WDTWPROTECT_REG as *mut u32, 0);
    }
}

/// Stop the RTC watchdog, which otherwise keeps running in deep sleep.
pub fn disable_rtc_watchdog() {
    unsafe {
        write_volatile(RTC_CNTL_WDTWPROTECT_REG as *mut u32, WDT_WKEY);
        let config0 = read_volatile(RTC_CNTL_WDTCONFIG0_REG as *const u32);
        write_volatile(RTC_CNTL_WDTCONFIG0_REG as *mut u32, config0 & !RTC_WDT_EN);
        write_volatile(RTC_CNTL_WDTWPROTECT_REG as *mut u32, 0);
    }
}

/// Whether UART0 still has bytes in its FIFO or on the wire.
pub fn uart0_busy() -> bool {
    let status = unsafe { read_volatile(UART0_STATUS_REG as *const u32) };
    status & (UART_TXFIFO_CNT_MASK | UART_ST_UTX_OUT_MASK) != 0
}

/// Re-enter deep sleep with whatever wake sources the RTC domain still holds.
///
/// Stops the RTC watchdog, then toggles `SLEEP_EN`; the RTC controller
/// powers the digital core down and the function never returns.
pub fn reenter_deep_sleep() -> ! {
    disable_rtc_watchdog();
    critical_section::with(|_| unsafe {
        let state0 = read_volatile(RTC_CNTL_STATE0_REG as *const u32);
        write_volatile(RTC_CNTL_STATE0_REG as *mut u32, state0 & !SLEEP_EN);
        write_volatile(RTC_CNTL_STATE0_REG as *mut u32, state0 | SLEEP_EN);
    });
    loop {
        core::hint::spin_loop();
    }
}

unsafe extern "C" {
    fn ets_delay_us(us: u32);
    fn uart_tx_one_char(byte: u8) -> i32;
}

/// Busy-wait using the ROM delay routine.
pub fn rom_delay_us(us: u32) {
    unsafe { ets_delay_us(us) }
}

/// Push bytes into UART0 through the ROM routine.
pub fn rom_console_write(bytes: &[u8]) {
    for &byte in bytes {
        unsafe {
            uart_tx_one_char(byte);
        }
    }
}

