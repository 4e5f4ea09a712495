//! Forwards node configuration into the firmware at build time.
//!
//! Values come from the environment or an optional `.env` file next to this
//! crate. Anything not set falls back to the defaults in `pulse-core`.

const FORWARDED: [&str; 8] = [
    "PULSE_REPORT_PERIOD_SECS",
    "PULSE_PULSES_PER_UNIT",
    "PULSE_RATE_SCALE_MILLI",
    "PULSE_DEBOUNCE_MS",
    "PULSE_RADIO_CHANNEL",
    "PULSE_PIN",
    "PULSE_ARM_ATTEMPTS",
    "PULSE_DEBOUNCE_STRATEGY",
];

fn main() {
    println!("cargo:rerun-if-changed=.env");
    // A missing .env is fine; the defaults apply.
    let _ = dotenvy::dotenv();

    for key in FORWARDED {
        println!("cargo:rerun-if-env-changed={key}");
        if let Ok(value) = std::env::var(key) {
            println!("cargo:rustc-env={key}={value}");
        }
    }

    println!("cargo:rustc-link-arg=-Tlinkall.x");
}
