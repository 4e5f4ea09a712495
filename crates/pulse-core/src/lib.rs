//! Hardware-independent core library for pulse-node
//!
//! This crate contains the platform-agnostic wake/count/report state machine
//! of the battery meter reader: the retained state block, wake-cause
//! dispatch, pulse debouncing, the reporting engine and its wire payload,
//! and the sleep scheduler that re-arms both wake sources.
//!
//! It is `#![no_std]` so it compiles on the ESP32 target and on desktop hosts
//! (for the simulator and tests). Hardware is reached only through the
//! traits declared here; the firmware crate provides the implementations.

#![no_std]

pub mod clock;
pub mod config;
pub mod counter;
pub mod cycle;
pub mod error;
pub mod payload;
pub mod report;
pub mod retained;
pub mod schedule;
pub mod wake;

pub use config::{DebounceStrategy, NodeConfig};
pub use cycle::{CycleSummary, WakeCycle};
pub use error::{ArmError, ConfigError, PayloadError, RadioError};
pub use retained::RetainedState;
pub use wake::WakeCause;
