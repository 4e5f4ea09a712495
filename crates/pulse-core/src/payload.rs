//! Broadcast wire payload.
//!
//! One compact JSON record per report, fixed-point with three decimals:
//!
//! ```text
//! {"t":1234, "kWh":0.042, "kW": 2.520}
//! ```
//!
//! There is no version field and no checksum; delivery is best-effort.
//! Encoding goes through `core::fmt` into a fixed buffer so the exact digit
//! layout is kept; decoding (receivers, tests) uses `serde-json-core`.

use core::fmt::Write;

use serde::Deserialize;

use crate::error::PayloadError;
use crate::report::Metrics;

/// Size of the frame buffer the record is formatted into.
pub const FRAME_CAPACITY: usize = 100;

pub type Frame = heapless::String<FRAME_CAPACITY>;

/// A decoded report record.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct WirePayload {
    pub t: u32,
    #[serde(rename = "kWh")]
    pub kwh: f32,
    #[serde(rename = "kW")]
    pub kw: f32,
}

impl WirePayload {
    /// Accumulated quantity back in milli-units.
    pub fn quantity_milli(&self) -> u64 {
        to_milli(self.kwh)
    }

    /// Rate back in milli-units.
    pub fn rate_milli(&self) -> u64 {
        to_milli(self.kw)
    }
}

fn to_milli(value: f32) -> u64 {
    if value <= 0.0 {
        0
    } else {
        (value * 1000.0 + 0.5) as u64
    }
}

/// Format a report record. A missing rate is sent as `0.000`.
pub fn encode(metrics: &Metrics) -> Result<Frame, PayloadError> {
    encode_into::<FRAME_CAPACITY>(metrics)
}

/// [`encode`] into a buffer of `N` bytes.
pub fn encode_into<const N: usize>(metrics: &Metrics) -> Result<heapless::String<N>, PayloadError> {
    let mut frame = heapless::String::<N>::new();
    let rate = metrics.rate_milli.unwrap_or(0);

    write!(
        frame,
        "{{\"t\":{}, \"kWh\":{}.{:03}, \"kW\": {}.{:03}}}",
        metrics.timestamp,
        metrics.quantity_milli / 1000,
        metrics.quantity_milli % 1000,
        rate / 1000,
        rate % 1000,
    )
    .map_err(|_| PayloadError::Format(N))?;

    Ok(frame)
}

/// Parse a received record.
pub fn decode(bytes: &[u8]) -> Result<WirePayload, PayloadError> {
    serde_json_core::from_slice::<WirePayload>(bytes)
        .map(|(payload, _)| payload)
        .map_err(|_| PayloadError::Parse)
}
