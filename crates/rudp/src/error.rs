//! Error taxonomy for the transport. Retransmission, duplicate ACKs, and
//! stale ACKs are protocol events, not errors — they never surface here.

use std::net::SocketAddr;
use thiserror::Error;

/// Errors that can occur while driving the reliable transport.
#[derive(Error, Debug)]
pub enum RudpError {
    /// Binding the UDP socket to the requested local address failed.
    #[error("failed to bind socket to {addr}: {source}")]
    BindFailure {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The receiver exhausted its handshake request budget without a reply.
    #[error("handshake exhausted after {attempts} attempts")]
    HandshakeExhausted { attempts: u32 },

    /// The peer went silent for too many consecutive receive timeouts.
    #[error("peer silent for {consecutive_timeouts} consecutive timeouts")]
    PeerSilent { consecutive_timeouts: u32 },

    /// No handshake request arrived within the sender's waiting window.
    #[error("no handshake request received within the waiting window")]
    SenderHandshakeTimeout,

    /// A datagram send failed transiently; the caller logs and continues.
    #[error("transient I/O error sending datagram: {0}")]
    TransientIo(std::io::Error),

    /// Writing a drained chunk to the receiver's output file failed.
    #[error("failed to write output file: {0}")]
    OutputWriteFailure(std::io::Error),

    /// Variant A's fixed byte window is too small to ever admit one full
    /// data segment, which would otherwise stall the transfer forever.
    #[error("window of {window_bytes} bytes cannot hold one segment (minimum {minimum})")]
    WindowTooSmall { window_bytes: u32, minimum: u32 },
}

/// Result alias used throughout the crate's fallible paths.
pub type Result<T> = std::result::Result<T, RudpError>;
