//! RTT/RTO estimator (C2): Jacobson/Karels smoothing with per-variant RTO
//! derivation and backoff, grounded on the Jacobson-style estimator in
//! `reliability/send_window.rs`'s `update_rto`.

use std::time::Duration;

const ALPHA: f64 = 0.125;
const BETA: f64 = 0.25;

/// Which RTO formula and backoff policy to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Fixed-window selective repeat: `rto = max(srtt + 4*rttvar, 0.1s)`,
    /// doubled explicitly on timeout up to a 2.0s cap.
    SelectiveRepeat,
    /// Reno + SACK: `rto = clamp(srtt + max(10ms, 4*rttvar), 0.2s, 3.0s)`,
    /// with backoff left to the congestion controller's timeout event.
    RenoSack,
}

/// Smoothed round-trip-time estimator and derived retransmission timeout.
#[derive(Debug, Clone)]
pub struct RttEstimator {
    variant: Variant,
    srtt: Option<f64>,
    rttvar: f64,
    rto: Duration,
}

impl RttEstimator {
    pub fn new(variant: Variant) -> Self {
        let rto = match variant {
            Variant::SelectiveRepeat => Duration::from_millis(500),
            Variant::RenoSack => Duration::from_secs(1),
        };
        Self {
            variant,
            srtt: None,
            rttvar: 0.0,
            rto,
        }
    }

    pub fn rto(&self) -> Duration {
        self.rto
    }

    /// Feeds one RTT sample, taken only from a segment sent exactly once
    /// (Karn's rule — callers must enforce that before calling this).
    pub fn on_sample(&mut self, sample: Duration) {
        let sample_secs = sample.as_secs_f64();
        match self.srtt {
            None => {
                self.srtt = Some(sample_secs);
                self.rttvar = sample_secs / 2.0;
            }
            Some(srtt) => {
                self.rttvar = (1.0 - BETA) * self.rttvar + BETA * (srtt - sample_secs).abs();
                self.srtt = Some((1.0 - ALPHA) * srtt + ALPHA * sample_secs);
            }
        }
        self.recompute();
    }

    fn recompute(&mut self) {
        let srtt = self.srtt.unwrap_or(0.0);
        let rto_secs = match self.variant {
            Variant::SelectiveRepeat => (srtt + 4.0 * self.rttvar).max(0.1),
            Variant::RenoSack => (srtt + (4.0 * self.rttvar).max(0.010)).clamp(0.2, 3.0),
        };
        self.rto = Duration::from_secs_f64(rto_secs);
    }

    /// Variant A's explicit exponential backoff on a bare timeout (no
    /// congestion response exists for Variant A). Doubles the current RTO,
    /// capped at 2.0 seconds. No-op for Variant B, whose timeout response
    /// lives in the congestion controller instead.
    pub fn backoff(&mut self) {
        if self.variant == Variant::SelectiveRepeat {
            self.rto = (self.rto * 2).min(Duration::from_secs(2));
        }
    }
}
