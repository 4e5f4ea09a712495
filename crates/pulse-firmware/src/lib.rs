//! ESP32 firmware-specific modules for pulse-node
//!
//! This crate holds the code that cannot compile on desktop targets: raw RTC
//! register access for the pre-init path, the RTC-retained counter block,
//! deep-sleep wake source arming, and the ESP-NOW broadcast radio. The
//! platform-independent logic lives in `pulse-core`.

#![no_std]

pub mod build_config;
pub mod clock;
pub mod radio;
pub mod registers;
pub mod retained;
pub mod sleep;
pub mod stub_hal;
pub mod watchdog;
