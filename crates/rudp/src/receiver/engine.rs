//! Receiver engine (C7): drives the handshake, the receive loop, and
//! termination, independent of which sender variant is on the other end —
//! the wire format and C6's reassembly logic are shared by both.
//!
//! Grounded on `original_source/part2/p2_client.py`'s `_run_handshake` /
//! `_run_download` state machine (request retry budget, per-call receive
//! timeout, consecutive-timeout abort, re-emitting the last ACK on
//! timeout as the retransmission trigger for the sender).

use crate::channel::SyncChannel;
use crate::codec::{decode_data, encode_ack};
use crate::error::RudpError;
use crate::receiver::reassembler::Reassembler;
use std::io::Write;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Single-byte handshake request; the sender treats any non-zero first
/// byte from an unknown peer as a connection request (spec §6).
const HANDSHAKE_REQUEST: &[u8] = b"D";

const RECV_BUF_LEN: usize = crate::codec::MSS;

/// Timing knobs for the handshake and transfer loops. [`Default`] matches
/// the spec exactly; tests substitute short durations so the suite stays
/// fast without changing any protocol behavior.
#[derive(Debug, Clone, Copy)]
pub struct ReceiverTiming {
    pub handshake_attempts: u32,
    pub handshake_timeout: Duration,
    pub transfer_timeout: Duration,
    /// Consecutive receive-timeouts tolerated before declaring the peer
    /// silent. Spec §4.7 says "abort after 10"; taken literally, so the
    /// 10th consecutive timeout is fatal (the Python reference aborts on
    /// the 11th — see DESIGN.md for this resolution).
    pub max_consecutive_timeouts: u32,
}

impl Default for ReceiverTiming {
    fn default() -> Self {
        Self {
            handshake_attempts: 5,
            handshake_timeout: Duration::from_secs(2),
            transfer_timeout: Duration::from_secs(1),
            max_consecutive_timeouts: 10,
        }
    }
}

pub struct ReceiverEngine {
    reassembler: Reassembler,
    timing: ReceiverTiming,
}

impl ReceiverEngine {
    pub fn new() -> Self {
        Self {
            reassembler: Reassembler::new(),
            timing: ReceiverTiming::default(),
        }
    }

    pub fn with_timing(timing: ReceiverTiming) -> Self {
        Self {
            reassembler: Reassembler::new(),
            timing,
        }
    }

    /// Runs the handshake, the transfer loop, and writes the reassembled
    /// file to `output` as bytes arrive in order. Returns once the
    /// transfer completes or a fatal error occurs.
    pub fn run<C: SyncChannel>(
        &mut self,
        channel: &C,
        server_addr: SocketAddr,
        output: &mut impl Write,
    ) -> Result<(), RudpError> {
        let first_packet = self.handshake(channel, server_addr)?;

        let mut buf = vec![0u8; RECV_BUF_LEN];
        self.handle_datagram(&first_packet, output)?;
        self.send_ack(channel, server_addr)?;

        if self.reassembler.is_complete() {
            info!("transfer complete after handshake response");
            return Ok(());
        }

        channel.set_read_timeout(Some(self.timing.transfer_timeout)).ok();
        let mut consecutive_timeouts = 0u32;
        loop {
            match channel.recv_from(&mut buf) {
                Ok((n, from)) => {
                    if from != server_addr {
                        trace!(?from, "dropping datagram from unexpected peer");
                        continue;
                    }
                    consecutive_timeouts = 0;
                    self.handle_datagram(&buf[..n], output)?;
                    self.send_ack(channel, server_addr)?;
                    if self.reassembler.is_complete() {
                        info!("transfer complete");
                        return Ok(());
                    }
                }
                Err(e) if is_timeout(&e) => {
                    consecutive_timeouts += 1;
                    debug!(consecutive_timeouts, "receive timeout, re-emitting last ACK");
                    if consecutive_timeouts >= self.timing.max_consecutive_timeouts {
                        warn!("peer silent, aborting");
                        return Err(RudpError::PeerSilent {
                            consecutive_timeouts,
                        });
                    }
                    self.send_ack(channel, server_addr)?;
                }
                Err(e) => return Err(RudpError::TransientIo(e)),
            }
        }
    }

    fn handshake<C: SyncChannel>(
        &self,
        channel: &C,
        server_addr: SocketAddr,
    ) -> Result<Vec<u8>, RudpError> {
        channel.set_read_timeout(Some(self.timing.handshake_timeout)).ok();
        let mut buf = vec![0u8; RECV_BUF_LEN];
        for attempt in 1..=self.timing.handshake_attempts {
            if let Err(e) = channel.send_to(HANDSHAKE_REQUEST, server_addr) {
                warn!(attempt, error = %e, "handshake send failed");
                continue;
            }
            match channel.recv_from(&mut buf) {
                Ok((n, _from)) => {
                    info!(attempt, "handshake succeeded");
                    return Ok(buf[..n].to_vec());
                }
                Err(e) if is_timeout(&e) => {
                    debug!(attempt, "handshake attempt timed out");
                }
                Err(e) => return Err(RudpError::TransientIo(e)),
            }
        }
        Err(RudpError::HandshakeExhausted {
            attempts: self.timing.handshake_attempts,
        })
    }

    fn handle_datagram(
        &mut self,
        datagram: &[u8],
        output: &mut impl Write,
    ) -> Result<(), RudpError> {
        let decoded = match decode_data(bytes::Bytes::copy_from_slice(datagram)) {
            Ok(d) => d,
            Err(e) => {
                debug!(error = %e, "dropping malformed data packet");
                return Ok(());
            }
        };
        for chunk in self.reassembler.on_data(decoded.seq, decoded.payload, decoded.eof) {
            output
                .write_all(&chunk)
                .map_err(RudpError::OutputWriteFailure)?;
        }
        Ok(())
    }

    fn send_ack<C: SyncChannel>(
        &self,
        channel: &C,
        server_addr: SocketAddr,
    ) -> Result<(), RudpError> {
        let (cumulative, sack_blocks) = self.reassembler.build_ack();
        let packet = encode_ack(cumulative, &sack_blocks);
        match channel.send_to(&packet, server_addr) {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(error = %e, "transient send failure emitting ACK");
                Ok(())
            }
        }
    }
}

impl Default for ReceiverEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn is_timeout(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}
