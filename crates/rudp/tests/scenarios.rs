//! End-to-end coverage for the transfer scenarios, driven against the
//! in-memory channel pair instead of real sockets so they run
//! deterministically and fast.
//!
//! Loss/reorder/dup-ack scenarios that only need the ACK-processing rules
//! themselves (duplicate-ACK fast retransmit, SACK suppression, Karn's
//! rule) are covered as unit tests next to `RenoWindow`/`SelectiveRepeatWindow`
//! — this file only exercises paths that need the full sender/receiver pair.

use bytes::Bytes;
use rudp::channel::testing::{AsyncMemoryChannel, MemoryChannel};
use rudp::channel::SyncChannel;
use rudp::receiver::engine::ReceiverTiming;
use rudp::receiver::ReceiverEngine;
use rudp::sender::{RenoSender, SelectiveRepeatSender};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

fn addr(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
}

fn fast_timing() -> ReceiverTiming {
    ReceiverTiming {
        handshake_attempts: 5,
        handshake_timeout: Duration::from_millis(50),
        transfer_timeout: Duration::from_millis(50),
        max_consecutive_timeouts: 5,
    }
}

/// Scenario 1: a lossless link delivers every byte, in order, unmodified.
#[test]
fn selective_repeat_round_trips_a_file_over_a_lossless_channel() {
    let file: Vec<u8> = (0..5_000u32).map(|i| (i % 251) as u8).collect();
    let (sender_chan, receiver_chan) = MemoryChannel::pair(addr(100), addr(101));
    let expected = file.clone();

    let sender_handle = std::thread::spawn(move || {
        let sender = SelectiveRepeatSender::new(16 * 1024).unwrap();
        sender.run(&sender_chan, &file).unwrap();
    });

    let mut engine = ReceiverEngine::with_timing(fast_timing());
    let mut output = Vec::new();
    engine
        .run(&receiver_chan, addr(100), &mut output)
        .unwrap();

    sender_handle.join().unwrap();
    assert_eq!(output, expected, "received bytes must match the source file exactly");
}

/// Same scenario, Variant B (Reno + SACK) over the async channel pair.
#[tokio::test]
async fn reno_sack_round_trips_a_file_over_a_lossless_channel() {
    let file: Vec<u8> = (0..5_000u32).map(|i| ((i * 7) % 251) as u8).collect();
    let (sender_chan, receiver_chan) = AsyncMemoryChannel::pair(addr(110), addr(111));
    let expected = file.clone();
    let file_bytes = Bytes::from(file);

    let sender_task = tokio::spawn(async move {
        let sender = RenoSender::new();
        sender.run(sender_chan, file_bytes).await.unwrap();
    });

    // The receiver engine is sync; drive it on a blocking-capable adapter
    // that bridges it to the async channel the same way the `rudp-cli`
    // receiver binary bridges a real (sync) UdpSocket — here, a small sync
    // wrapper built directly on MemoryChannel's sibling pairing is not
    // applicable since the sender side is async-only, so the receiver
    // side talks to the sender over a `tokio::net`-free, blocking bridge.
    let receiver_chan_sync = AsyncToSyncBridge::new(receiver_chan);
    let server_addr = addr(110);
    let output = tokio::task::spawn_blocking(move || {
        let mut engine = ReceiverEngine::with_timing(fast_timing());
        let mut output = Vec::new();
        engine
            .run(&receiver_chan_sync, server_addr, &mut output)
            .unwrap();
        output
    })
    .await
    .unwrap();

    sender_task.await.unwrap();
    assert_eq!(output, expected, "received bytes must match the source file exactly");
}

/// Scenario 4 (end-to-end half): datagrams queued out of order are still
/// reassembled into the correct byte stream, and the receiver's ACK
/// reports the out-of-order run as a SACK block rather than advancing the
/// cumulative ACK past the gap.
#[test]
fn receiver_reassembles_reordered_segments_and_reports_sack_for_the_gap() {
    let (receiver_chan, sender_chan) = MemoryChannel::pair(addr(120), addr(121));
    let server_addr = sender_chan.local_addr();

    // The chunk that would normally arrive second ("world") is queued
    // first; the engine's handshake treats it as the initial reply.
    sender_chan
        .send_to(
            &rudp::codec::encode_data(5, b"world", false),
            receiver_chan.local_addr(),
        )
        .unwrap();
    sender_chan
        .send_to(
            &rudp::codec::encode_data(0, b"hello", false),
            receiver_chan.local_addr(),
        )
        .unwrap();
    sender_chan
        .send_to(&rudp::codec::encode_data(10, b"", true), receiver_chan.local_addr())
        .unwrap();

    let engine_thread = std::thread::spawn(move || {
        let mut engine = ReceiverEngine::with_timing(fast_timing());
        let mut output = Vec::new();
        engine.run(&receiver_chan, server_addr, &mut output).unwrap();
        output
    });

    // First datagram out of sender_chan's inbox is the handshake request;
    // second is the ACK for the reordered "world" chunk, which must SACK
    // [5, 10) without advancing the cumulative ack past the gap at 0.
    let mut buf = [0u8; rudp::codec::MSS];
    let (n, _) = sender_chan.recv_from(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"D");
    let (n, _) = sender_chan.recv_from(&mut buf).unwrap();
    let ack = rudp::codec::decode_ack(bytes::Bytes::copy_from_slice(&buf[..n])).unwrap();
    assert_eq!(ack.cumulative, 0);
    assert_eq!(ack.sack_blocks, vec![rudp::codec::SackBlock { start: 5, end: 10 }]);

    let output = engine_thread.join().unwrap();
    assert_eq!(output, b"helloworld");
}

/// A small blocking adapter over [`AsyncMemoryChannel`] so the (sync)
/// receiver engine can run against the async channel pair used by
/// Variant B's sender in these tests, without spinning up a real socket.
struct AsyncToSyncBridge {
    inner: AsyncMemoryChannel,
    handle: tokio::runtime::Handle,
    timeout: std::sync::Mutex<Option<Duration>>,
}

impl AsyncToSyncBridge {
    fn new(inner: AsyncMemoryChannel) -> Self {
        Self {
            inner,
            handle: tokio::runtime::Handle::current(),
            timeout: std::sync::Mutex::new(None),
        }
    }
}

impl SyncChannel for AsyncToSyncBridge {
    fn send_to(&self, buf: &[u8], target: SocketAddr) -> std::io::Result<usize> {
        let inner = self.inner.clone();
        let buf = buf.to_vec();
        self.handle
            .block_on(async move { inner.send_to(&buf, target).await })
    }

    fn recv_from(&self, buf: &mut [u8]) -> std::io::Result<(usize, SocketAddr)> {
        let inner = self.inner.clone();
        let timeout = *self.timeout.lock().unwrap();
        let mut local = vec![0u8; buf.len()];
        let result = self.handle.block_on(async move {
            match timeout {
                Some(d) => tokio::time::timeout(d, inner.recv_from(&mut local))
                    .await
                    .unwrap_or_else(|_elapsed| {
                        Err(std::io::Error::new(std::io::ErrorKind::WouldBlock, "timed out"))
                    })
                    .map(|(n, from)| (n, from, local)),
                None => inner.recv_from(&mut local).await.map(|(n, from)| (n, from, local)),
            }
        });
        result.map(|(n, from, local)| {
            buf[..n].copy_from_slice(&local[..n]);
            (n, from)
        })
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        *self.timeout.lock().unwrap() = timeout;
        Ok(())
    }
}
