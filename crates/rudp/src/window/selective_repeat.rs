//! Variant A's send window: a fixed byte budget (`SWS`), plain cumulative
//! ACKs, and immediate retransmission of the base segment on the third
//! exact duplicate ACK.
//!
//! The duplicate-ACK-triggered retransmit is not spelled out in the
//! distilled component description, but it is how
//! `original_source/part1/p1_server.py`'s send loop actually behaves, and
//! it costs nothing to carry over since Variant A's window manager already
//! tracks a duplicate counter the same way Variant B's does.

use super::{ApplyAckResult, InflightEntry};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::time::Instant;

#[derive(Debug)]
pub struct SelectiveRepeatWindow {
    sws: u32,
    inflight: BTreeMap<u32, InflightEntry>,
    send_base: u32,
    next_seq: u32,
    dup_count: u32,
    last_ack: Option<u32>,
}

impl SelectiveRepeatWindow {
    pub fn new(sws: u32, start_seq: u32) -> Self {
        Self {
            sws,
            inflight: BTreeMap::new(),
            send_base: start_seq,
            next_seq: start_seq,
            dup_count: 0,
            last_ack: None,
        }
    }

    pub fn send_base(&self) -> u32 {
        self.send_base
    }

    pub fn next_seq(&self) -> u32 {
        self.next_seq
    }

    pub fn inflight_bytes(&self) -> u32 {
        self.inflight.values().map(InflightEntry::len).sum()
    }

    pub fn is_drained(&self) -> bool {
        self.inflight.is_empty()
    }

    pub fn can_transmit(&self, n: u32) -> bool {
        self.inflight_bytes() + n <= self.sws
    }

    /// Records a new transmission of `payload` at `seq`, advancing
    /// `next_seq` past it. Retransmissions of an already-tracked sequence
    /// only refresh `last_sent`, per the inflight-entry lifecycle.
    pub fn record_transmit(&mut self, seq: u32, payload: Bytes, now: Instant) {
        let len = payload.len() as u32;
        match self.inflight.get_mut(&seq) {
            Some(entry) => entry.touch(now),
            None => {
                self.inflight.insert(seq, InflightEntry::new(payload, now));
            }
        }
        if seq + len > self.next_seq {
            self.next_seq = seq + len;
        }
    }

    /// Applies a cumulative ACK value (the next byte offset the receiver
    /// expects). Idempotent: re-applying the same value after the first
    /// causes no state change beyond the duplicate-ACK counter.
    pub fn apply_ack(&mut self, ack: u32) -> ApplyAckResult {
        if ack < self.send_base {
            return ApplyAckResult::default();
        }

        if ack == self.send_base {
            if self.last_ack == Some(ack) {
                self.dup_count += 1;
                if self.dup_count == 3 {
                    self.dup_count = 0;
                    return ApplyAckResult {
                        fast_retransmit_seq: Some(self.send_base),
                        ..Default::default()
                    };
                }
            } else {
                self.last_ack = Some(ack);
                self.dup_count = 1;
            }
            return ApplyAckResult::default();
        }

        // ack > send_base: a genuinely new cumulative acknowledgement. The
        // RTT sample, if any, comes from the base segment — the oldest
        // entry this ACK retires — provided it was sent exactly once.
        let now = Instant::now();
        let mut bytes_newly_acked = 0u32;
        let retired: Vec<u32> = self.inflight.range(..ack).map(|(seq, _)| *seq).collect();
        let mut samples = Vec::new();
        for seq in &retired {
            if let Some(entry) = self.inflight.remove(seq) {
                bytes_newly_acked += entry.len();
                if *seq == self.send_base && entry.was_sent_exactly_once() {
                    samples.push(now.saturating_duration_since(entry.first_sent));
                }
            }
        }

        self.send_base = ack;
        self.dup_count = 0;
        self.last_ack = Some(ack);

        ApplyAckResult {
            bytes_newly_acked,
            rtt_samples: samples,
            fast_retransmit_seq: None,
            advanced: true,
        }
    }

    /// Sequences whose retransmission timer has expired.
    pub fn find_timed_out(&self, now: Instant, rto: std::time::Duration) -> Vec<u32> {
        self.inflight
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.last_sent) > rto)
            .map(|(seq, _)| *seq)
            .collect()
    }

    pub fn touch_retransmit(&mut self, seq: u32, now: Instant) {
        if let Some(entry) = self.inflight.get_mut(&seq) {
            entry.touch(now);
        }
    }

    pub fn peek_payload(&self, seq: u32) -> Option<Bytes> {
        self.inflight.get(&seq).map(|e| e.payload.clone())
    }
}
