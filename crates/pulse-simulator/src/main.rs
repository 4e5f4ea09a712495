//! Desktop simulator for the pulse-node wake/count/report cycle.
//!
//! Drives the real `pulse-core` state machine against a synthetic meter on a
//! virtual clock. The node "sleeps" until either the next meter pulse or its
//! report deadline, then runs one wake cycle exactly as the firmware does.
//! Broadcast frames are printed and decoded again.
//!
//! # Usage
//!
//! ```text
//! pulse-simulator [minutes] [watts] [drop_every]
//! ```
//!
//! Defaults to 5 minutes at 2520 W with every frame delivered. A non-zero
//! `drop_every` makes every n-th send fail. Set `RUST_LOG=debug` for per-pulse logs.

use std::cell::Cell;
use std::convert::Infallible;
use std::rc::Rc;

use embassy_futures::block_on;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin};
use log::{info, warn};

use pulse_core::clock::MonotonicClock;
use pulse_core::counter::{ActiveLevel, PollingCounter, PollingLine, Watchdog};
use pulse_core::report::{BroadcastRadio, ReportOutcome};
use pulse_core::schedule::WakeArming;
use pulse_core::wake::Dispatched;
use pulse_core::{ArmError, NodeConfig, RadioError, RetainedState, WakeCause, WakeCycle, payload};

// ---------------------------------------------------------------------------
// Simulation constants
// ---------------------------------------------------------------------------

const DEFAULT_MINUTES: u64 = 5;
const DEFAULT_WATTS: u64 = 2520;

/// How long the meter's pulse output stays asserted.
const PULSE_WIDTH_US: u64 = 30_000;

/// Every third pulse chatters this many times after release.
const BOUNCES: u64 = 4;

/// Cost of one pin read on the virtual clock.
const PIN_READ_US: u64 = 20;

/// Time the radio needs to come up, transmit and go down.
const RADIO_AIRTIME_US: u64 = 80_000;

/// Boot time between a wake event and the first line of the cycle.
const BOOT_US: u64 = 5_000;

const MICROS_PER_SEC: u64 = 1_000_000;

// ---------------------------------------------------------------------------
// Virtual hardware
// ---------------------------------------------------------------------------

/// Shared virtual time in microseconds since power-up.
#[derive(Clone, Default)]
struct SimTime(Rc<Cell<u64>>);

impl SimTime {
    fn now_us(&self) -> u64 {
        self.0.get()
    }

    fn advance(&self, us: u64) {
        self.0.set(self.0.get() + us);
    }

    fn jump_to(&self, us: u64) {
        self.0.set(self.0.get().max(us));
    }
}

impl MonotonicClock for SimTime {
    fn now_secs(&self) -> u32 {
        u32::try_from(self.now_us() / MICROS_PER_SEC).unwrap_or(u32::MAX)
    }
}

/// A meter emitting one pulse per watt-hour-ish interval at constant load.
struct Meter {
    /// Leading edge of every real pulse.
    starts: Vec<u64>,
    /// Asserted intervals `[start, end)`, bounces included.
    asserted: Vec<(u64, u64)>,
}

impl Meter {
    fn new(watts: u64, pulses_per_unit: u32, horizon_us: u64) -> Self {
        // pulses/s = kW * pulses_per_kWh / 3600
        let per_hour = watts * u64::from(pulses_per_unit) / 1000;
        let interval_us = 3600 * MICROS_PER_SEC / per_hour.max(1);

        let mut starts = Vec::new();
        let mut asserted = Vec::new();
        let mut start = interval_us;
        while start < horizon_us {
            asserted.push((start, start + PULSE_WIDTH_US));
            if starts.len() % 3 == 2 {
                for b in 0..BOUNCES {
                    let s = start + PULSE_WIDTH_US + 400 + b * 900;
                    asserted.push((s, s + 150));
                }
            }
            starts.push(start);
            start += interval_us;
        }

        Self { starts, asserted }
    }

    fn emitted(&self) -> usize {
        self.starts.len()
    }

    fn is_asserted(&self, at_us: u64) -> bool {
        self.asserted.iter().any(|&(s, e)| at_us >= s && at_us < e)
    }

    /// Start of the first pulse at or after `after_us`, ignoring bounces.
    fn next_pulse(&self, after_us: u64) -> Option<u64> {
        self.starts.iter().copied().find(|&s| s >= after_us)
    }
}

/// The pulse input as an `embedded-hal` pin on the virtual clock.
struct SimPin {
    time: SimTime,
    meter: Rc<Meter>,
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl InputPin for SimPin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        let level = self.meter.is_asserted(self.time.now_us());
        self.time.advance(PIN_READ_US);
        Ok(level)
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        self.is_high().map(|high| !high)
    }
}

struct SimDelay(SimTime);

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0.advance(u64::from(ns).div_ceil(1000));
    }
}

struct FeedCounter(Rc<Cell<u64>>);

impl Watchdog for FeedCounter {
    fn feed(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

/// Prints each broadcast frame and decodes it back.
struct ConsoleRadio {
    time: SimTime,
    frames: u32,
    drop_every: Option<u32>,
}

impl BroadcastRadio for ConsoleRadio {
    type Link = ();

    async fn bring_up(&mut self, channel: u8) -> Result<(), RadioError> {
        self.time.advance(RADIO_AIRTIME_US / 2);
        log::debug!("radio up on channel {}", channel);
        Ok(())
    }

    async fn send(&mut self, _link: &mut (), _dst: &[u8; 6], frame: &[u8]) -> Result<(), RadioError> {
        self.frames += 1;
        if self.drop_every.is_some_and(|n| self.frames % n == 0) {
            return Err(RadioError::Send);
        }
        let text = String::from_utf8_lossy(frame);
        match payload::decode(frame) {
            Ok(p) => println!("  >> {}   (decoded: t={} kWh={:.3} kW={:.3})", text, p.t, p.kwh, p.kw),
            Err(e) => warn!("frame {} does not decode: {}", text, e),
        }
        Ok(())
    }

    async fn tear_down(&mut self, _link: ()) -> Result<(), RadioError> {
        self.time.advance(RADIO_AIRTIME_US / 2);
        Ok(())
    }
}

/// Records the wake sources and refuses the edge while the line is held.
struct SimArming {
    time: SimTime,
    meter: Rc<Meter>,
    timer_us: Option<u64>,
}

impl WakeArming for SimArming {
    type Error = &'static str;

    fn arm_edge(&mut self, _pin: u8, _level: ActiveLevel) -> Result<(), Self::Error> {
        if self.meter.is_asserted(self.time.now_us()) {
            return Err("line asserted");
        }
        Ok(())
    }

    fn arm_timer(&mut self, micros: u64) -> Result<(), Self::Error> {
        self.timer_us = Some(micros);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn arg_or(index: usize, default: u64) -> u64 {
    std::env::args()
        .nth(index)
        .and_then(|a| a.parse().ok())
        .unwrap_or(default)
}

fn main() {
    env_logger::init();

    let minutes = arg_or(1, DEFAULT_MINUTES);
    let watts = arg_or(2, DEFAULT_WATTS);
    let config = NodeConfig::default();
    let horizon_us = minutes * 60 * MICROS_PER_SEC;

    info!("Starting pulse-node simulator: {} min at {} W", minutes, watts);
    info!("config: {:?}", config);

    let time = SimTime::default();
    let meter = Rc::new(Meter::new(watts, config.pulses_per_unit, horizon_us));
    let feeds = Rc::new(Cell::new(0));

    let cycle = WakeCycle::new(&config, ActiveLevel::High);
    let mut state = RetainedState::zeroed();
    let mut radio = ConsoleRadio {
        time: time.clone(),
        frames: 0,
        drop_every: u32::try_from(arg_or(3, 0)).ok().filter(|&n| n > 0),
    };
    let mut arming = SimArming {
        time: time.clone(),
        meter: Rc::clone(&meter),
        timer_us: None,
    };

    let mut cause = WakeCause::ColdBoot;
    let mut wakes = 0u32;
    let mut counted = 0u32;
    let mut reported = 0u64;

    while time.now_us() < horizon_us {
        let line = PollingLine::new(
            SimPin {
                time: time.clone(),
                meter: Rc::clone(&meter),
            },
            SimDelay(time.clone()),
            FeedCounter(Rc::clone(&feeds)),
            ActiveLevel::High,
        );
        let mut counter = PollingCounter::new(line, config.debounce_us());

        wakes += 1;
        let result = block_on(cycle.run(cause, &mut state, &time, &mut counter, &mut radio, &mut arming));

        let summary = match result {
            Ok(summary) => summary,
            Err(ArmError::Edge { .. }) => {
                cause = WakeCause::EdgeTriggered;
                continue;
            }
            Err(e) => {
                warn!("{}, stopping", e);
                break;
            }
        };

        if let Dispatched::Pulse(_) = summary.dispatched {
            counted += 1;
        }
        if let ReportOutcome::Sent(m) | ReportOutcome::Failed { metrics: m, .. } = summary.report {
            reported += m.quantity_milli * u64::from(config.pulses_per_unit) / 1000;
        }

        // Sleep until whichever wake source fires first.
        let timer_at = time.now_us() + arming.timer_us.unwrap_or(0);
        match meter.next_pulse(time.now_us()) {
            Some(edge_at) if edge_at < timer_at => {
                time.jump_to(edge_at);
                cause = WakeCause::EdgeTriggered;
            }
            _ => {
                time.jump_to(timer_at);
                cause = WakeCause::TimerExpired;
            }
        }
        time.advance(BOOT_US);
    }

    println!();
    println!("wakes:            {}", wakes);
    println!("pulses emitted:   {}", meter.emitted());
    println!("pulses counted:   {}", counted);
    println!("pulses reported:  {} (+{} pending)", reported, state.pulse_count());
    println!("watchdog feeds:   {}", feeds.get());
    info!("Simulator exiting");
}
