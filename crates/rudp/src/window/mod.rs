//! Send-window manager (C3): tracks in-flight segments, gates new
//! transmission, and identifies expired timers. Split into the two wire
//! variants since their ACK-processing rules differ (plain cumulative vs.
//! cumulative + SACK with duplicate-ACK fast retransmit).
//!
//! Grounded on the inflight-tracking shape of
//! `reliability/send_window.rs::SendWindow` (a `BTreeMap` of pending
//! datagrams keyed by sequence, `send_base`/`next_sequence_number` fields),
//! generalized to the two ACK-processing rule sets this protocol needs.

pub mod reno;
pub mod selective_repeat;

use bytes::Bytes;
use std::time::{Duration, Instant};

/// A segment the sender has transmitted at least once and not yet had
/// acknowledged. `first_sent` is frozen across retransmissions so Karn's
/// rule can tell a single-send segment from a retransmitted one.
#[derive(Debug, Clone)]
pub struct InflightEntry {
    pub payload: Bytes,
    pub first_sent: Instant,
    pub last_sent: Instant,
}

impl InflightEntry {
    pub fn new(payload: Bytes, now: Instant) -> Self {
        Self {
            payload,
            first_sent: now,
            last_sent: now,
        }
    }

    pub fn len(&self) -> u32 {
        self.payload.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// True if this segment has never been retransmitted — the condition
    /// Karn's rule requires before its RTT can be sampled.
    pub fn was_sent_exactly_once(&self) -> bool {
        self.first_sent == self.last_sent
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_sent = now;
    }
}

/// Outcome of feeding one ACK to a window manager.
#[derive(Debug, Default)]
pub struct ApplyAckResult {
    /// Bytes newly removed from the inflight set by this ACK.
    pub bytes_newly_acked: u32,
    /// RTT samples taken from single-sent segments this ACK retired
    /// (Karn's rule — retransmitted segments never contribute a sample).
    pub rtt_samples: Vec<Duration>,
    /// Set when this ACK is the third duplicate exactly at the base and a
    /// fast retransmit of that segment should fire.
    pub fast_retransmit_seq: Option<u32>,
    /// Whether `send_base` moved forward as a result of this ACK.
    pub advanced: bool,
}
