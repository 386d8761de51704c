//! Congestion controller (C4, Variant B only): TCP-Reno-style slow start,
//! congestion avoidance, fast retransmit/recovery, and timeout collapse.
//!
//! Structurally grounded on the `cwnd`/`ssthresh`/slow-start-exit handling in
//! `reliability/send_window.rs::handle_ack`/`tick`; the congestion-avoidance
//! growth formula itself follows the protocol's explicit `2*MSS*MSS/cwnd`
//! rate rather than the teacher's simplified `cwnd += mtu` increment.

use crate::codec::MSS as MSS_USIZE;

pub const MSS: u32 = MSS_USIZE as u32;
/// Initial slow-start threshold: high enough to act unbounded until the
/// first loss event, matching the Python reference implementation.
const INITIAL_SSTHRESH: u32 = 1_000 * MSS;
/// Safety cap against pathological buffer growth (spec §9, open question b).
pub const CWND_CAP: u32 = 10_000 * MSS;

#[derive(Debug, Clone)]
pub struct CongestionController {
    cwnd: u32,
    ssthresh: u32,
    in_slow_start: bool,
}

impl Default for CongestionController {
    fn default() -> Self {
        Self::new()
    }
}

impl CongestionController {
    pub fn new() -> Self {
        Self {
            cwnd: MSS,
            ssthresh: INITIAL_SSTHRESH,
            in_slow_start: true,
        }
    }

    pub fn cwnd(&self) -> u32 {
        self.cwnd
    }

    pub fn ssthresh(&self) -> u32 {
        self.ssthresh
    }

    pub fn in_slow_start(&self) -> bool {
        self.in_slow_start
    }

    /// A new ACK advanced the send window by `bytes_acked` bytes.
    pub fn on_new_ack(&mut self, bytes_acked: u32) {
        if bytes_acked == 0 {
            return;
        }
        if self.in_slow_start {
            self.cwnd = self.cwnd.saturating_add(bytes_acked);
            if self.cwnd >= self.ssthresh {
                self.in_slow_start = false;
            }
        } else {
            // Congestion avoidance: the protocol's explicit 2x-aggressive
            // rate above the textbook MSS^2/cwnd. Tunable, not a
            // correctness requirement (spec §9, open question a).
            let growth = (2u64 * MSS as u64 * MSS as u64) / self.cwnd.max(1) as u64;
            self.cwnd = self.cwnd.saturating_add(growth as u32);
        }
        self.cwnd = self.cwnd.min(CWND_CAP);
    }

    /// Three duplicate ACKs arrived; enter fast recovery.
    pub fn on_fast_retransmit(&mut self) {
        self.ssthresh = (self.cwnd / 2).max(2 * MSS);
        self.cwnd = self.ssthresh;
        self.in_slow_start = false;
    }

    /// The retransmission timer expired: collapse back to slow start.
    pub fn on_timeout(&mut self) {
        self.ssthresh = (self.cwnd / 2).max(2 * MSS);
        self.cwnd = MSS;
        self.in_slow_start = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_in_slow_start_at_one_mss() {
        let cc = CongestionController::new();
        assert_eq!(cc.cwnd(), MSS);
        assert!(cc.in_slow_start());
    }

    #[test]
    fn slow_start_grows_by_full_bytes_acked() {
        let mut cc = CongestionController::new();
        cc.on_new_ack(MSS);
        assert_eq!(cc.cwnd(), 2 * MSS);
        assert!(cc.in_slow_start());
    }

    #[test]
    fn exits_slow_start_once_cwnd_reaches_ssthresh() {
        let mut cc = CongestionController::new();
        cc.on_fast_retransmit(); // drives ssthresh down to something reachable
        let target = cc.ssthresh();
        while cc.in_slow_start() && cc.cwnd() < target {
            cc.on_new_ack(MSS);
        }
        assert!(!cc.in_slow_start());
    }

    #[test]
    fn congestion_avoidance_uses_the_explicit_two_x_formula() {
        let mut cc = CongestionController::new();
        cc.on_fast_retransmit();
        cc.in_slow_start = false; // ensure CA path regardless of ssthresh placement
        let cwnd_before = cc.cwnd();
        cc.on_new_ack(1);
        let expected_growth = (2u64 * MSS as u64 * MSS as u64) / cwnd_before as u64;
        assert_eq!(cc.cwnd(), cwnd_before + expected_growth as u32);
    }

    #[test]
    fn cwnd_never_exceeds_the_cap() {
        let mut cc = CongestionController::new();
        for _ in 0..100_000 {
            cc.on_new_ack(MSS * 10);
        }
        assert!(cc.cwnd() <= CWND_CAP);
    }

    #[test]
    fn fast_retransmit_halves_cwnd_into_recovery() {
        let mut cc = CongestionController::new();
        cc.on_new_ack(10 * MSS);
        let cwnd_before = cc.cwnd();
        cc.on_fast_retransmit();
        assert_eq!(cc.ssthresh(), (cwnd_before / 2).max(2 * MSS));
        assert_eq!(cc.cwnd(), cc.ssthresh());
        assert!(!cc.in_slow_start());
    }

    #[test]
    fn timeout_collapses_to_one_mss_and_restarts_slow_start() {
        let mut cc = CongestionController::new();
        cc.on_new_ack(50 * MSS);
        cc.on_timeout();
        assert_eq!(cc.cwnd(), MSS);
        assert!(cc.in_slow_start());
        assert!(cc.ssthresh() >= 2 * MSS);
    }

    #[test]
    fn invariant_cwnd_floor_and_ssthresh_floor_always_hold() {
        let mut cc = CongestionController::new();
        let events: [fn(&mut CongestionController); 3] = [
            |cc| cc.on_new_ack(MSS),
            |cc| cc.on_fast_retransmit(),
            |cc| cc.on_timeout(),
        ];
        for (i, ev) in events.iter().cycle().take(30).enumerate() {
            ev(&mut cc);
            assert!(cc.cwnd() >= MSS, "iteration {i}");
            assert!(cc.ssthresh() >= 2 * MSS, "iteration {i}");
        }
    }
}
