//! Reporting engine
//!
//! When the deadline is reached the engine turns the retained pulse count
//! into two metrics, broadcasts them once, and starts a new window. The
//! window is closed whatever the radio did: a lost report costs one data
//! point, a device stuck awake costs the battery.

use log::{error, info, warn};

use crate::config::NodeConfig;
use crate::error::{PayloadError, RadioError};
use crate::payload;
use crate::retained::RetainedState;

/// The only destination: every receiver in range.
pub const BROADCAST_ADDRESS: [u8; 6] = [0xFF; 6];

/// Connectionless best-effort broadcast link (ESP-NOW on the device).
pub trait BroadcastRadio {
    /// An active link, valid between bring-up and tear-down.
    type Link;

    /// Power the radio up and join `channel`.
    fn bring_up(&mut self, channel: u8) -> impl Future<Output = Result<Self::Link, RadioError>>;

    /// Send one datagram. No acknowledgement, no retry.
    fn send(
        &mut self,
        link: &mut Self::Link,
        destination: &[u8; 6],
        payload: &[u8],
    ) -> impl Future<Output = Result<(), RadioError>>;

    /// Power the radio down again.
    fn tear_down(&mut self, link: Self::Link) -> impl Future<Output = Result<(), RadioError>>;
}

/// Meter calibration used to derive the metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    /// Pulses per reported unit (pulses per kWh).
    pub pulses_per_unit: u32,
    /// Pulses-per-second to rate-unit factor, in thousandths.
    pub rate_scale_milli: u32,
}

impl From<&NodeConfig> for Calibration {
    fn from(config: &NodeConfig) -> Self {
        Self {
            pulses_per_unit: config.pulses_per_unit,
            rate_scale_milli: config.rate_scale_milli,
        }
    }
}

/// Metrics for one reporting window, in milli-units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metrics {
    /// Report time, seconds in the RTC clock domain.
    pub timestamp: u32,
    /// Accumulated quantity (kWh × 1000).
    pub quantity_milli: u64,
    /// Average rate over the window (kW × 1000). `None` for an empty window.
    pub rate_milli: Option<u64>,
}

impl Metrics {
    /// Derive the window metrics. Rounds half up.
    pub fn compute(pulse_count: u32, last_report_time: u32, now: u32, cal: &Calibration) -> Self {
        let pulses = u64::from(pulse_count);
        let per_unit = u64::from(cal.pulses_per_unit.max(1));
        let quantity_milli = (pulses * 1000 + per_unit / 2) / per_unit;

        let elapsed = u64::from(now.saturating_sub(last_report_time));
        let rate_milli = (elapsed > 0)
            .then(|| (pulses * u64::from(cal.rate_scale_milli) + elapsed / 2) / elapsed);

        Self {
            timestamp: now,
            quantity_milli,
            rate_milli,
        }
    }
}

/// What the engine did this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// The deadline has not been reached.
    NotDue,
    /// The record went out.
    Sent(Metrics),
    /// The record was lost; the window was still closed.
    Failed { metrics: Metrics, error: RadioError },
    /// The record could not be formatted, so nothing was sent. The window
    /// was still closed.
    Unencodable { metrics: Metrics, error: PayloadError },
}

pub struct ReportingEngine {
    period_secs: u32,
    channel: u8,
    calibration: Calibration,
}

impl ReportingEngine {
    pub fn new(config: &NodeConfig) -> Self {
        Self {
            period_secs: config.report_period_secs,
            channel: config.radio_channel,
            calibration: Calibration::from(config),
        }
    }

    /// The deadline check, with one second of lookahead so a wake landing
    /// just before the deadline reports instead of sleeping past it.
    pub fn is_due(&self, state: &RetainedState, now: u32) -> bool {
        state.next_report_time() <= now.saturating_add(1)
    }

    /// Report if due.
    pub async fn run_if_due<R: BroadcastRadio>(
        &self,
        state: &mut RetainedState,
        now: u32,
        radio: &mut R,
    ) -> ReportOutcome {
        if !self.is_due(state, now) {
            return ReportOutcome::NotDue;
        }
        self.report(state, now, radio).await
    }

    /// Compute, broadcast, and close the window unconditionally.
    pub async fn report<R: BroadcastRadio>(
        &self,
        state: &mut RetainedState,
        now: u32,
        radio: &mut R,
    ) -> ReportOutcome {
        let metrics = Metrics::compute(
            state.pulse_count(),
            state.last_report_time(),
            now,
            &self.calibration,
        );

        let frame = match payload::encode(&metrics) {
            Ok(frame) => frame,
            Err(error) => {
                state.close_window(now, self.period_secs);
                error!("report not encoded: {}", error);
                return ReportOutcome::Unencodable { metrics, error };
            }
        };

        let result = self.broadcast(radio, frame.as_bytes()).await;
        state.close_window(now, self.period_secs);

        match result {
            Ok(()) => {
                info!(
                    "report sent t={} quantity={} rate={:?}",
                    metrics.timestamp, metrics.quantity_milli, metrics.rate_milli
                );
                ReportOutcome::Sent(metrics)
            }
            Err(error) => {
                warn!("report lost: {}", error);
                ReportOutcome::Failed { metrics, error }
            }
        }
    }

    /// Bring-up, one send, tear-down. Tear-down is attempted whenever
    /// bring-up succeeded; the first error wins.
    async fn broadcast<R: BroadcastRadio>(&self, radio: &mut R, bytes: &[u8]) -> Result<(), RadioError> {
        let mut link = radio.bring_up(self.channel).await?;
        let sent = radio.send(&mut link, &BROADCAST_ADDRESS, bytes).await;
        let torn_down = radio.tear_down(link).await;
        sent.and(torn_down)
    }
}


#[cfg(test)]
mod tests {
    use embassy_futures::block_on;

    use super::mock::RecordingRadio;
    use super::*;

    fn reference() -> Calibration {
        Calibration {
            pulses_per_unit: 1000,
            rate_scale_milli: 3600,
        }
    }

    fn state_with(pulses: u32, last: u32, next: u32) -> RetainedState {
        let mut state = RetainedState::zeroed();
        state.cold_start();
        state.close_window(last, next - last);
        for _ in 0..pulses {
            state.record_pulse();
        }
        state
    }

    #[test]
    fn test_reference_metrics() {
        let metrics = Metrics::compute(42, 100, 160, &reference());
        assert_eq!(metrics.quantity_milli, 42);
        assert_eq!(metrics.rate_milli, Some(2520));
    }

    #[test]
    fn test_zero_elapsed_omits_rate() {
        let metrics = Metrics::compute(5, 300, 300, &reference());
        assert_eq!(metrics.quantity_milli, 5);
        assert_eq!(metrics.rate_milli, None);
    }

    #[test]
    fn test_clock_behind_window_start_treated_as_empty_window() {
        let metrics = Metrics::compute(5, 300, 200, &reference());
        assert_eq!(metrics.rate_milli, None);
    }

    #[test]
    fn test_due_with_one_second_lookahead() {
        let engine = ReportingEngine::new(&NodeConfig::default());
        let state = state_with(0, 0, 60);

        assert!(!engine.is_due(&state, 58));
        assert!(engine.is_due(&state, 59));
        assert!(engine.is_due(&state, 60));
        assert!(engine.is_due(&state, 500));
    }

    #[test]
    fn test_report_closes_window_and_is_not_due_again() {
        let engine = ReportingEngine::new(&NodeConfig::default());
        let mut state = state_with(42, 100, 160);
        let mut radio = RecordingRadio::default();

        let outcome = block_on(engine.run_if_due(&mut state, 160, &mut radio));

        assert!(matches!(outcome, ReportOutcome::Sent(_)));
        assert_eq!(radio.sent.len(), 1);
        assert_eq!(radio.sent[0], r#"{"t":160, "kWh":0.042, "kW": 2.520}"#);
        assert_eq!(radio.channel, Some(1));
        assert_eq!(radio.torn_down, 1);
        assert_eq!(state.pulse_count(), 0);
        assert_eq!(state.last_report_time(), 160);
        assert_eq!(state.next_report_time(), 220);

        let again = block_on(engine.run_if_due(&mut state, 160, &mut radio));
        assert_eq!(again, ReportOutcome::NotDue);
        assert_eq!(radio.sent.len(), 1);
    }

    #[test]
    fn test_late_wake_does_not_stack_deadlines() {
        let engine = ReportingEngine::new(&NodeConfig::default());
        for now in [59, 60, 61, 150, 10_000] {
            let mut state = state_with(3, 0, 60);
            let mut radio = RecordingRadio::default();

            block_on(engine.run_if_due(&mut state, now, &mut radio));

            assert_eq!(radio.sent.len(), 1);
            assert_eq!(state.next_report_time(), now + 60);
        }
    }

    #[test]
    fn test_degenerate_window_reported_twice() {
        let engine = ReportingEngine::new(&NodeConfig::default());
        let mut state = state_with(7, 200, 260);
        let mut radio = RecordingRadio::default();

        block_on(engine.report(&mut state, 200, &mut radio));
        block_on(engine.report(&mut state, 200, &mut radio));

        assert_eq!(radio.sent[0], r#"{"t":200, "kWh":0.007, "kW": 0.000}"#);
        assert_eq!(radio.sent[1], r#"{"t":200, "kWh":0.000, "kW": 0.000}"#);
    }

    #[test]
    fn test_send_failure_still_resets_window() {
        let engine = ReportingEngine::new(&NodeConfig::default());
        let mut state = state_with(10, 0, 60);
        let mut radio = RecordingRadio {
            fail_send: true,
            ..Default::default()
        };

        let outcome = block_on(engine.run_if_due(&mut state, 60, &mut radio));

        match outcome {
            ReportOutcome::Failed { error, .. } => assert_eq!(error, RadioError::Send),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(radio.torn_down, 1, "tear-down still attempted after send failure");
        assert_eq!(state.pulse_count(), 0);
        assert_eq!(state.next_report_time(), 120);
    }

    #[test]
    fn test_bring_up_failure_skips_send_and_tear_down() {
        let engine = ReportingEngine::new(&NodeConfig::default());
        let mut state = state_with(10, 0, 60);
        let mut radio = RecordingRadio {
            fail_bring_up: true,
            ..Default::default()
        };

        let outcome = block_on(engine.run_if_due(&mut state, 60, &mut radio));

        assert!(matches!(
            outcome,
            ReportOutcome::Failed {
                error: RadioError::BringUp(1),
                ..
            }
        ));
        assert_eq!(radio.torn_down, 0);
        assert_eq!(state.last_report_time(), 60);
    }

    #[test]
    fn test_tear_down_failure_reported() {
        let engine = ReportingEngine::new(&NodeConfig::default());
        let mut state = state_with(1, 0, 60);
        let mut radio = RecordingRadio {
            fail_tear_down: true,
            ..Default::default()
        };

        let outcome = block_on(engine.run_if_due(&mut state, 60, &mut radio));

        assert!(matches!(
            outcome,
            ReportOutcome::Failed {
                error: RadioError::TearDown,
                ..
            }
        ));
        assert_eq!(radio.sent.len(), 1);
    }
}
