//! Variant B's send window: congestion-window-gated transmission,
//! cumulative ACK with up to two SACK blocks, and 3-duplicate-ACK fast
//! retransmit with SACK-aware suppression.

use super::{ApplyAckResult, InflightEntry};
use crate::codec::SackBlock;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::time::Instant;

#[derive(Debug)]
pub struct RenoWindow {
    inflight: BTreeMap<u32, InflightEntry>,
    send_base: u32,
    next_seq: u32,
    dup_count: u32,
    last_ack: Option<u32>,
    sack_blocks: Vec<SackBlock>,
}

impl RenoWindow {
    pub fn new(start_seq: u32) -> Self {
        Self {
            inflight: BTreeMap::new(),
            send_base: start_seq,
            next_seq: start_seq,
            dup_count: 0,
            last_ack: None,
            sack_blocks: Vec::new(),
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

    pub fn can_transmit(&self, n: u32, cwnd: u32) -> bool {
        self.inflight_bytes() + n <= cwnd
    }

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

    fn is_sacked(&self, seq: u32, len: u32) -> bool {
        self.sack_blocks.iter().any(|b| b.covers(seq, len))
    }

    /// Applies a cumulative ACK plus up to two SACK blocks.
    pub fn apply_ack(&mut self, cumulative: u32, sacks: &[SackBlock]) -> ApplyAckResult {
        if cumulative < self.send_base {
            return ApplyAckResult::default();
        }

        if cumulative == self.send_base {
            self.sack_blocks = sacks.to_vec();
            if self.last_ack == Some(cumulative) {
                self.dup_count += 1;
                if self.dup_count == 3 {
                    self.dup_count = 0;
                    let base_len = self
                        .inflight
                        .get(&self.send_base)
                        .map(InflightEntry::len)
                        .unwrap_or(0);
                    if !self.is_sacked(self.send_base, base_len) {
                        return ApplyAckResult {
                            fast_retransmit_seq: Some(self.send_base),
                            ..Default::default()
                        };
                    }
                }
            } else {
                self.last_ack = Some(cumulative);
                self.dup_count = 1;
            }
            return ApplyAckResult::default();
        }

        // cumulative > send_base: remove every inflight entry that is
        // either cumulatively covered or sitting fully inside a SACK block.
        let now = Instant::now();
        let mut bytes_newly_acked = 0u32;
        let mut rtt_samples = Vec::new();
        let seqs: Vec<u32> = self.inflight.keys().copied().collect();
        for seq in seqs {
            let (len, is_cumulative, sacked) = {
                let entry = self.inflight.get(&seq).unwrap();
                let len = entry.len();
                let is_cumulative = seq + len <= cumulative;
                let sacked = !is_cumulative && self.is_sacked(seq, len);
                (len, is_cumulative, sacked)
            };
            if is_cumulative || sacked {
                let entry = self.inflight.remove(&seq).unwrap();
                bytes_newly_acked += len;
                if is_cumulative && entry.was_sent_exactly_once() {
                    rtt_samples.push(now.saturating_duration_since(entry.first_sent));
                }
            }
        }

        self.send_base = cumulative;
        self.dup_count = 0;
        self.last_ack = Some(cumulative);
        self.sack_blocks = sacks
            .iter()
            .copied()
            .filter(|b| b.end > self.send_base)
            .collect();

        ApplyAckResult {
            bytes_newly_acked,
            rtt_samples,
            fast_retransmit_seq: None,
            advanced: true,
        }
    }

    /// Sequences whose retransmission timer expired and are not currently
    /// covered by a SACK block (a SACK'd segment is known to have arrived).
    pub fn find_timed_out(&self, now: Instant, rto: std::time::Duration) -> Vec<u32> {
        self.inflight
            .iter()
            .filter(|(seq, entry)| {
                now.saturating_duration_since(entry.last_sent) > rto
                    && !self.is_sacked(**seq, entry.len())
            })
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
