//! Variant A sender engine (C5): single-threaded, blocking on the socket
//! with a read timeout equal to the current RTO, interleaving new
//! transmission with ACK reception exactly as
//! `original_source/part1/p1_server.py`'s main loop does.

use super::{EOF_RESEND_COUNT, EOF_RESEND_SPACING, HANDSHAKE_WAIT};
use crate::channel::SyncChannel;
use crate::codec::{decode_ack, encode_data, DATA_PAYLOAD};
use crate::error::RudpError;
use crate::rto::{RttEstimator, Variant};
use crate::window::selective_repeat::SelectiveRepeatWindow;
use std::net::SocketAddr;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

pub struct SelectiveRepeatSender {
    sws: u32,
}

impl SelectiveRepeatSender {
    /// `sws` must be large enough to hold at least one full data segment —
    /// otherwise the fill loop can never admit a single chunk and the
    /// transfer stalls forever with no progress and no error.
    pub fn new(sws: u32) -> Result<Self, RudpError> {
        if sws < DATA_PAYLOAD as u32 {
            return Err(RudpError::WindowTooSmall {
                window_bytes: sws,
                minimum: DATA_PAYLOAD as u32,
            });
        }
        Ok(Self { sws })
    }

    /// Waits for the handshake request, then transfers `file_data` to
    /// whichever peer sent it, then emits the EOF burst.
    pub fn run<C: SyncChannel>(&self, channel: &C, file_data: &[u8]) -> Result<(), RudpError> {
        let peer_addr = self.wait_for_handshake(channel)?;
        self.transfer(channel, peer_addr, file_data)?;
        self.send_eof_burst(channel, peer_addr, file_data.len() as u32)?;
        Ok(())
    }

    fn wait_for_handshake<C: SyncChannel>(&self, channel: &C) -> Result<SocketAddr, RudpError> {
        channel.set_read_timeout(Some(HANDSHAKE_WAIT)).ok();
        let mut buf = [0u8; crate::codec::MSS];
        match channel.recv_from(&mut buf) {
            Ok((n, from)) if n > 0 => {
                info!(%from, "accepted handshake request");
                Ok(from)
            }
            Ok(_) => Err(RudpError::SenderHandshakeTimeout),
            Err(e) if is_timeout(&e) => Err(RudpError::SenderHandshakeTimeout),
            Err(e) => Err(RudpError::TransientIo(e)),
        }
    }

    fn transfer<C: SyncChannel>(
        &self,
        channel: &C,
        peer_addr: SocketAddr,
        file_data: &[u8],
    ) -> Result<(), RudpError> {
        let file_size = file_data.len() as u32;
        let mut window = SelectiveRepeatWindow::new(self.sws, 0);
        let mut rto = RttEstimator::new(Variant::SelectiveRepeat);
        let mut ack_buf = [0u8; crate::codec::MSS];

        loop {
            // 1. Fill the window.
            while window.next_seq() < file_size {
                let remaining = file_size - window.next_seq();
                let chunk_len = remaining.min(DATA_PAYLOAD as u32);
                if !window.can_transmit(chunk_len) {
                    break;
                }
                let seq = window.next_seq();
                let chunk = bytes::Bytes::copy_from_slice(
                    &file_data[seq as usize..(seq + chunk_len) as usize],
                );
                let encoded = encode_data(seq, &chunk, false);
                send_or_log(channel, &encoded, peer_addr);
                window.record_transmit(seq, chunk, Instant::now());
            }

            if window.next_seq() == file_size && window.is_drained() {
                break;
            }

            // 2 & 3. Block for an ACK up to the current RTO; process it, or
            // on timeout retransmit every expired segment and back off.
            channel.set_read_timeout(Some(rto.rto())).ok();
            match channel.recv_from(&mut ack_buf) {
                Ok((n, from)) if from == peer_addr => {
                    let Ok(ack) = decode_ack(bytes::Bytes::copy_from_slice(&ack_buf[..n])) else {
                        debug!("dropping malformed ACK");
                        continue;
                    };
                    let result = window.apply_ack(ack.cumulative);
                    for sample in result.rtt_samples {
                        rto.on_sample(sample);
                    }
                    if let Some(seq) = result.fast_retransmit_seq {
                        if let Some(payload) = window.peek_payload(seq) {
                            trace!(seq, "fast retransmit on 3rd duplicate ACK");
                            let encoded = encode_data(seq, &payload, false);
                            send_or_log(channel, &encoded, peer_addr);
                            window.touch_retransmit(seq, Instant::now());
                        }
                    }
                }
                Ok(_) => { /* datagram from an unrelated address; ignore */ }
                Err(e) if is_timeout(&e) => {
                    let now = Instant::now();
                    let expired = window.find_timed_out(now, rto.rto());
                    if !expired.is_empty() {
                        warn!(count = expired.len(), "retransmission timeout");
                        for seq in expired {
                            if let Some(payload) = window.peek_payload(seq) {
                                let encoded = encode_data(seq, &payload, false);
                                send_or_log(channel, &encoded, peer_addr);
                                window.touch_retransmit(seq, now);
                            }
                        }
                        rto.backoff();
                    }
                }
                Err(e) => return Err(RudpError::TransientIo(e)),
            }
        }

        Ok(())
    }

    fn send_eof_burst<C: SyncChannel>(
        &self,
        channel: &C,
        peer_addr: SocketAddr,
        file_len: u32,
    ) -> Result<(), RudpError> {
        let eof_packet = encode_data(file_len, &[], true);
        for _ in 0..EOF_RESEND_COUNT {
            send_or_log(channel, &eof_packet, peer_addr);
            std::thread::sleep(EOF_RESEND_SPACING);
        }
        Ok(())
    }
}

fn send_or_log<C: SyncChannel>(channel: &C, buf: &[u8], target: SocketAddr) {
    if let Err(e) = channel.send_to(buf, target) {
        warn!(error = %e, "transient send failure");
    }
}

fn is_timeout(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::testing::MemoryChannel;
    use crate::codec::{decode_data, encode_ack};
    use std::net::{IpAddr, Ipv4Addr};

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    #[test]
    fn transfers_small_file_over_a_lossless_channel() {
        let (sender_chan, peer_chan) = MemoryChannel::pair(addr(10), addr(11));
        let file = b"the quick brown fox jumps over the lazy dog".to_vec();
        let file_len = file.len() as u32;

        peer_chan.send_to(b"D", sender_chan.local_addr()).unwrap();

        let handle = std::thread::spawn(move || {
            let sender = SelectiveRepeatSender::new(4096).unwrap();
            sender.run(&sender_chan, &file).unwrap();
        });

        // Act as a minimal receiver: ack every data packet cumulatively.
        let mut received = Vec::new();
        let mut next_expected = 0u32;
        let mut saw_eof = false;
        let deadline = Instant::now() + std::time::Duration::from_secs(2);
        peer_chan.set_read_timeout(Some(std::time::Duration::from_millis(50))).ok();
        let mut buf = [0u8; crate::codec::MSS];
        while Instant::now() < deadline {
            match peer_chan.recv_from(&mut buf) {
                Ok((n, _)) => {
                    let decoded = decode_data(bytes::Bytes::copy_from_slice(&buf[..n])).unwrap();
                    if decoded.eof {
                        saw_eof = decoded.seq == next_expected;
                    } else if decoded.seq == next_expected {
                        received.extend_from_slice(&decoded.payload);
                        next_expected += decoded.payload.len() as u32;
                    }
                    let ack = encode_ack(next_expected, &[]);
                    peer_chan.send_to(&ack, addr(10)).unwrap();
                    if saw_eof && next_expected == file_len {
                        break;
                    }
                }
                Err(_) => continue,
            }
        }
        handle.join().unwrap();
        assert_eq!(received, b"the quick brown fox jumps over the lazy dog");
    }

    #[test]
    fn rejects_a_window_too_small_to_hold_one_full_segment() {
        let result = SelectiveRepeatSender::new(DATA_PAYLOAD as u32 - 1);
        assert!(matches!(result, Err(RudpError::WindowTooSmall { .. })));
        assert!(SelectiveRepeatSender::new(DATA_PAYLOAD as u32).is_ok());
    }
}
