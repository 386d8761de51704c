//! Variant B sender engine (C5): two cooperating async tasks — a writer
//! that fills the window, retransmits expired segments, and emits EOF,
//! and a reader that blocks on the socket and feeds ACKs to the window
//! and congestion controller — sharing one mutex-guarded state struct.
//!
//! Grounded on the writer/reader split and lock discipline described for
//! `reliability/send_window.rs` (no I/O performed while the lock is held;
//! a fast-retransmit send happens after the lock is released).

use super::{EOF_RESEND_COUNT, EOF_RESEND_SPACING, HANDSHAKE_WAIT};
use crate::channel::AsyncChannel;
use crate::codec::{decode_ack, encode_data, DATA_PAYLOAD};
use crate::congestion::CongestionController;
use crate::error::RudpError;
use crate::rto::{RttEstimator, Variant};
use crate::window::reno::RenoWindow;
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

struct SharedState {
    window: RenoWindow,
    congestion: CongestionController,
    rto: RttEstimator,
}

pub struct RenoSender {
    _private: (),
}

impl RenoSender {
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Waits for the handshake request, then drives the writer/reader task
    /// pair until the file (plus EOF burst) has been delivered.
    pub async fn run<C: AsyncChannel + Clone + 'static>(
        &self,
        channel: C,
        file_data: Bytes,
    ) -> Result<(), RudpError> {
        let peer_addr = wait_for_handshake(&channel).await?;

        let state = Arc::new(Mutex::new(SharedState {
            window: RenoWindow::new(0),
            congestion: CongestionController::new(),
            rto: RttEstimator::new(Variant::RenoSack),
        }));
        let stop = Arc::new(AtomicBool::new(false));

        let reader_handle = tokio::spawn(reader_task(
            channel.clone(),
            state.clone(),
            peer_addr,
            stop.clone(),
        ));

        writer_task(&channel, &state, peer_addr, &file_data, &stop).await?;

        stop.store(true, Ordering::SeqCst);
        let _ = reader_handle.await;
        Ok(())
    }
}

impl Default for RenoSender {
    fn default() -> Self {
        Self::new()
    }
}

async fn wait_for_handshake<C: AsyncChannel>(channel: &C) -> Result<SocketAddr, RudpError> {
    let mut buf = [0u8; crate::codec::MSS];
    match tokio::time::timeout(HANDSHAKE_WAIT, channel.recv_from(&mut buf)).await {
        Ok(Ok((n, from))) if n > 0 => {
            info!(%from, "accepted handshake request");
            Ok(from)
        }
        Ok(Ok(_)) | Err(_) => Err(RudpError::SenderHandshakeTimeout),
        Ok(Err(e)) => Err(RudpError::TransientIo(e)),
    }
}

async fn writer_task<C: AsyncChannel>(
    channel: &C,
    state: &Arc<Mutex<SharedState>>,
    peer_addr: SocketAddr,
    file_data: &Bytes,
    stop: &Arc<AtomicBool>,
) -> Result<(), RudpError> {
    let file_size = file_data.len() as u32;

    loop {
        let mut to_send: Vec<(u32, Bytes)> = Vec::new();
        {
            let mut guard = state.lock().await;
            loop {
                let next_seq = guard.window.next_seq();
                if next_seq >= file_size {
                    break;
                }
                let remaining = file_size - next_seq;
                let chunk_len = remaining.min(DATA_PAYLOAD as u32);
                if !guard.window.can_transmit(chunk_len, guard.congestion.cwnd()) {
                    break;
                }
                let chunk =
                    file_data.slice(next_seq as usize..(next_seq + chunk_len) as usize);
                guard.window.record_transmit(next_seq, chunk.clone(), Instant::now());
                to_send.push((next_seq, chunk));
            }
        }
        for (seq, chunk) in to_send {
            send_or_log(channel, &encode_data(seq, &chunk, false), peer_addr).await;
        }

        let expired_retransmit = {
            let mut guard = state.lock().await;
            let now = Instant::now();
            let expired = guard.window.find_timed_out(now, guard.rto.rto());
            if expired.is_empty() {
                None
            } else {
                debug!(count = expired.len(), "retransmission timeout");
                guard.congestion.on_timeout();
                let lowest = *expired.iter().min().unwrap();
                guard.window.touch_retransmit(lowest, now);
                guard.window.peek_payload(lowest).map(|p| (lowest, p))
            }
        };
        if let Some((seq, payload)) = expired_retransmit {
            send_or_log(channel, &encode_data(seq, &payload, false), peer_addr).await;
        }

        let done = {
            let guard = state.lock().await;
            guard.window.next_seq() >= file_size && guard.window.is_drained()
        };
        if done {
            break;
        }

        tokio::time::sleep(Duration::from_micros(100)).await;
    }

    let eof_packet = encode_data(file_size, &[], true);
    for _ in 0..EOF_RESEND_COUNT {
        send_or_log(channel, &eof_packet, peer_addr).await;
        tokio::time::sleep(EOF_RESEND_SPACING).await;
    }
    stop.store(true, Ordering::SeqCst);
    Ok(())
}

async fn reader_task<C: AsyncChannel>(
    channel: C,
    state: Arc<Mutex<SharedState>>,
    peer_addr: SocketAddr,
    stop: Arc<AtomicBool>,
) {
    let mut buf = [0u8; crate::codec::MSS];
    loop {
        if stop.load(Ordering::SeqCst) {
            return;
        }
        let recv = tokio::time::timeout(Duration::from_millis(100), channel.recv_from(&mut buf)).await;
        let (n, from) = match recv {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                warn!(error = %e, "transient receive failure");
                continue;
            }
            Err(_elapsed) => continue,
        };
        if from != peer_addr {
            continue;
        }
        let Ok(ack) = decode_ack(Bytes::copy_from_slice(&buf[..n])) else {
            debug!("dropping malformed ACK");
            continue;
        };

        let fast_retransmit = {
            let mut guard = state.lock().await;
            let result = guard.window.apply_ack(ack.cumulative, &ack.sack_blocks);
            for sample in result.rtt_samples {
                guard.rto.on_sample(sample);
            }
            if result.bytes_newly_acked > 0 {
                guard.congestion.on_new_ack(result.bytes_newly_acked);
            }
            match result.fast_retransmit_seq {
                Some(seq) => {
                    trace!(seq, "fast retransmit on 3rd duplicate ACK");
                    guard.congestion.on_fast_retransmit();
                    guard.window.touch_retransmit(seq, Instant::now());
                    guard.window.peek_payload(seq).map(|p| (seq, p))
                }
                None => None,
            }
        };
        if let Some((seq, payload)) = fast_retransmit {
            send_or_log(&channel, &encode_data(seq, &payload, false), peer_addr).await;
        }
    }
}

async fn send_or_log<C: AsyncChannel>(channel: &C, buf: &[u8], target: SocketAddr) {
    if let Err(e) = channel.send_to(buf, target).await {
        warn!(error = %e, "transient send failure");
    }
}
