//! Receiver reassembler (C6): buffers out-of-order segments, drains the
//! contiguous prefix to the caller for writing, and synthesizes ACKs with
//! coalesced SACK blocks.
//!
//! The in-order streaming delivery here follows
//! `original_source/part2/p2_client.py`'s `_drain_inorder_buffer`, not
//! `part1/p1_client.py`'s end-of-transfer batch write — the latter only
//! works because Variant A's session is short-lived and single-file, but
//! sequential delivery is what the data model's "no gap bypass" invariant
//! actually requires, so both variants share this implementation. The
//! SACK-block coalescing mirrors the contiguous-range-building approach in
//! `raknet/protocol/ack.rs::optimize_ack_nack_records`, adapted to the
//! fixed two-block wire shape instead of an unbounded record list.

use crate::codec::SackBlock;
use bytes::Bytes;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct Reassembler {
    next_expected: u32,
    buffered: BTreeMap<u32, Bytes>,
    saw_eof: bool,
    eof_seq: u32,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_expected(&self) -> u32 {
        self.next_expected
    }

    /// Feeds one received data packet. Returns the payloads that are now
    /// ready to be appended to the output file, in order — zero, one, or
    /// several if this arrival closed a run of previously-buffered gaps.
    pub fn on_data(&mut self, seq: u32, payload: Bytes, eof: bool) -> Vec<Bytes> {
        if eof {
            self.saw_eof = true;
            self.eof_seq = seq;
            return Vec::new();
        }

        if seq < self.next_expected {
            return Vec::new(); // duplicate, already written
        }

        if seq > self.next_expected {
            self.buffered.entry(seq).or_insert(payload);
            return Vec::new();
        }

        // seq == next_expected: writes in order, then drains any
        // now-contiguous buffered runs.
        let mut drained = vec![payload.clone()];
        self.next_expected += payload.len() as u32;
        while let Some(next) = self.buffered.remove(&self.next_expected) {
            self.next_expected += next.len() as u32;
            drained.push(next);
        }
        drained
    }

    /// True once the EOF marker has arrived and its sequence matches the
    /// length of everything written so far.
    pub fn is_complete(&self) -> bool {
        self.saw_eof && self.eof_seq == self.next_expected
    }

    /// Builds the ACK to emit: the current cumulative value plus up to two
    /// coalesced SACK blocks describing the out-of-order buffer.
    pub fn build_ack(&self) -> (u32, Vec<SackBlock>) {
        (self.next_expected, self.sack_blocks())
    }

    fn sack_blocks(&self) -> Vec<SackBlock> {
        let mut blocks = Vec::with_capacity(2);
        let mut current: Option<SackBlock> = None;
        for (&seq, payload) in self.buffered.iter() {
            let end = seq + payload.len() as u32;
            match current {
                Some(ref mut block) if seq <= block.end => {
                    block.end = block.end.max(end);
                }
                _ => {
                    if let Some(block) = current.take() {
                        blocks.push(block);
                        if blocks.len() == 2 {
                            return blocks;
                        }
                    }
                    current = Some(SackBlock { start: seq, end });
                }
            }
        }
        if let Some(block) = current {
            blocks.push(block);
        }
        blocks.truncate(2);
        blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(bytes: &[u8]) -> Bytes {
        Bytes::copy_from_slice(bytes)
    }

    #[test]
    fn in_order_arrival_is_delivered_immediately() {
        let mut r = Reassembler::new();
        let drained = r.on_data(0, payload(b"hello"), false);
        assert_eq!(drained, vec![payload(b"hello")]);
        assert_eq!(r.next_expected(), 5);
    }

    #[test]
    fn out_of_order_arrival_is_buffered_then_drained_in_one_run() {
        let mut r = Reassembler::new();
        assert!(r.on_data(5, payload(b"world"), false).is_empty());
        let drained = r.on_data(0, payload(b"hello"), false);
        assert_eq!(drained, vec![payload(b"hello"), payload(b"world")]);
        assert_eq!(r.next_expected(), 10);
    }

    #[test]
    fn duplicate_in_order_segment_is_dropped() {
        let mut r = Reassembler::new();
        r.on_data(0, payload(b"hello"), false);
        let drained = r.on_data(0, payload(b"hello"), false);
        assert!(drained.is_empty());
        assert_eq!(r.next_expected(), 5);
    }

    #[test]
    fn duplicate_buffered_segment_keeps_first_write() {
        let mut r = Reassembler::new();
        r.on_data(5, payload(b"AAAAA"), false);
        r.on_data(5, payload(b"BBBBB"), false);
        let drained = r.on_data(0, payload(b"hello"), false);
        assert_eq!(drained, vec![payload(b"hello"), payload(b"AAAAA")]);
    }

    #[test]
    fn sack_blocks_coalesce_adjacent_and_overlapping_ranges() {
        let mut r = Reassembler::new();
        r.on_data(10, payload(b"aaaaa"), false); // [10,15)
        r.on_data(15, payload(b"bbbbb"), false); // [15,20) adjacent -> merges
        r.on_data(30, payload(b"ccccc"), false); // [30,35) separate
        let (_, blocks) = r.build_ack();
        assert_eq!(
            blocks,
            vec![
                SackBlock { start: 10, end: 20 },
                SackBlock { start: 30, end: 35 },
            ]
        );
    }

    #[test]
    fn sack_reports_only_the_first_two_runs() {
        let mut r = Reassembler::new();
        r.on_data(10, payload(b"a"), false);
        r.on_data(20, payload(b"b"), false);
        r.on_data(30, payload(b"c"), false);
        let (_, blocks) = r.build_ack();
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn completion_requires_eof_seq_to_match_next_expected() {
        let mut r = Reassembler::new();
        r.on_data(0, payload(b"hello"), false);
        r.on_data(5, Bytes::new(), true);
        assert!(r.is_complete());
    }

    #[test]
    fn eof_before_gap_is_filled_does_not_complete() {
        let mut r = Reassembler::new();
        r.on_data(10, payload(b"later"), false);
        r.on_data(15, Bytes::new(), true); // EOF claims length 15, but [0,10) missing
        assert!(!r.is_complete());
        r.on_data(0, payload(b"0123456789"), false);
        assert!(r.is_complete());
    }
}
