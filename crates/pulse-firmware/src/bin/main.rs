#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_hal::delay::Delay;
use esp_hal::gpio::{Input, InputConfig, Pull};
use esp_hal::rtc_cntl::Rtc;
use esp_hal::system::SleepSource;
use esp_hal::timer::timg::TimerGroup;
use log::{error, info, warn};

use pulse_core::counter::{
    ActiveLevel, PollingCounter, PollingLine, StubVerdict, handle_stub_wake,
};
use pulse_core::{ArmError, DebounceStrategy, NodeConfig, WakeCause, WakeCycle};
use pulse_firmware::clock::RtcTicksClock;
use pulse_firmware::radio::EspNowRadio;
use pulse_firmware::sleep::DeepSleepArming;
use pulse_firmware::stub_hal::RawWakeRegisters;
use pulse_firmware::watchdog::RtcWatchdog;
use pulse_firmware::{build_config, retained};

/// The meter's pulse output is wired to GPIO25 (RTC IO 6).
const PULSE_GPIO: u8 = 25;
const PULSE_LEVEL: ActiveLevel = ActiveLevel::High;

/// Cycles re-run when a wake source refuses to arm before giving up.
const ARM_ROUNDS: u8 = 5;

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    // Spinning here would drain the battery.
    esp_hal::system::software_reset()
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(_spawner: Spawner) -> ! {
    let parsed = build_config::node_config();
    let mut config = parsed.unwrap_or_default();
    let wired_elsewhere = config.pulse_pin != PULSE_GPIO;
    config.pulse_pin = PULSE_GPIO;

    let state = retained::take().expect("retained block is taken once per boot");
    let cause = match esp_hal::rtc_cntl::wakeup_cause() {
        SleepSource::Ext0 => WakeCause::EdgeTriggered,
        SleepSource::Timer => WakeCause::TimerExpired,
        _ => WakeCause::ColdBoot,
    };

    // Pre-init path: no heap, no logger, no HAL.
    if config.strategy == DebounceStrategy::WakeStub
        && let Some(mut raw) = RawWakeRegisters::new(config.pulse_pin, PULSE_LEVEL)
        && let StubVerdict::Resleep(_) = handle_stub_wake(
            &mut raw,
            state,
            cause == WakeCause::EdgeTriggered,
            config.debounce_us(),
        )
    {
        raw.resleep();
    }

    rtt_target::rtt_init_log!();

    let peripherals = esp_hal::init(esp_hal::Config::default());

    esp_alloc::heap_allocator!(size: 72 * 1024);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    if let Err(e) = parsed {
        warn!("build-time configuration rejected ({}), using defaults", e);
    }
    if wired_elsewhere {
        warn!("pulse input is fixed to GPIO{}", PULSE_GPIO);
    }
    info!("wake: {:?}, config: {:?}", cause, config);

    let mut rtc = Rtc::new(peripherals.LPWR);
    let mut pulse_pin = peripherals.GPIO25;
    let mut radio = EspNowRadio::new(peripherals.WIFI);
    let mut arming = DeepSleepArming::new();
    let cycle = WakeCycle::new(&config, PULSE_LEVEL);
    let clock = RtcTicksClock;

    let mut cause = cause;
    for round in 1..=ARM_ROUNDS {
        let input = Input::new(
            pulse_pin.reborrow(),
            InputConfig::default().with_pull(Pull::None),
        );
        let line = PollingLine::new(
            input,
            Delay::new(),
            RtcWatchdog::start(&mut rtc.rwdt),
            PULSE_LEVEL,
        );
        let mut counter = PollingCounter::new(line, config.debounce_us());

        let result = cycle
            .run(cause, state, &clock, &mut counter, &mut radio, &mut arming)
            .await;
        drop(counter);

        match result {
            Ok(_) => arming.power_down(&mut rtc, pulse_pin),
            // The line came back up after the debounce: that is another pulse.
            Err(ArmError::Edge { .. }) => cause = WakeCause::EdgeTriggered,
            Err(ArmError::Timer { .. }) => cause = WakeCause::TimerExpired,
        }
        warn!("arming round {}/{} failed, running the cycle again", round, ARM_ROUNDS);
        Timer::after(Duration::from_millis(50)).await;
    }

    error!("wake sources never armed, resetting");
    log::logger().flush();
    esp_hal::system::software_reset()
}
