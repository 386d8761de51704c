//! Socket abstraction (spec §7.1 supplement): lets the sender/receiver
//! engines be driven against an in-memory, lossy test double instead of a
//! real UDP socket, so the scenarios in spec §8 can run deterministically
//! without binding anything.
//!
//! Nothing here changes wire behavior; `StdUdpChannel`/`TokioUdpChannel`
//! are thin pass-throughs to the standard sockets the engines would use
//! anyway.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

/// Blocking datagram channel, used by the single-threaded engines (Variant
/// A sender, and the receiver engine for both variants).
pub trait SyncChannel {
    fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize>;
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;
}

impl SyncChannel for std::net::UdpSocket {
    fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        std::net::UdpSocket::send_to(self, buf, target)
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        std::net::UdpSocket::recv_from(self, buf)
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        std::net::UdpSocket::set_read_timeout(self, timeout)
    }
}

/// Non-blocking datagram channel, used by Variant B's writer/reader tasks.
pub trait AsyncChannel: Send + Sync {
    fn send_to(
        &self,
        buf: &[u8],
        target: SocketAddr,
    ) -> impl std::future::Future<Output = io::Result<usize>> + Send;

    fn recv_from(
        &self,
        buf: &mut [u8],
    ) -> impl std::future::Future<Output = io::Result<(usize, SocketAddr)>> + Send;
}

impl AsyncChannel for tokio::net::UdpSocket {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        tokio::net::UdpSocket::send_to(self, buf, target).await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        tokio::net::UdpSocket::recv_from(self, buf).await
    }
}

/// Forwards to the wrapped channel — lets `Arc<tokio::net::UdpSocket>` (or
/// any other channel) satisfy `AsyncChannel + Clone` for the writer/reader
/// task split, since the underlying socket itself isn't `Clone`.
impl<T: AsyncChannel> AsyncChannel for std::sync::Arc<T> {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        T::send_to(self, buf, target).await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        T::recv_from(self, buf).await
    }
}

pub mod testing {
    //! In-memory lossy channel pair used by the test suite to exercise
    //! loss, reordering, and duplication without a real socket.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Condvar, Mutex};

    #[derive(Default)]
    struct Inbox {
        queue: VecDeque<(Vec<u8>, SocketAddr)>,
    }

    /// One endpoint of an in-memory datagram pipe. `recv_from` really
    /// blocks (via a condvar) up to whatever `set_read_timeout` last
    /// configured, so tests exercising retry/timeout timing behave like
    /// they would against a real socket.
    #[derive(Clone)]
    pub struct MemoryChannel {
        local_addr: SocketAddr,
        inbox: Arc<(Mutex<Inbox>, Condvar)>,
        peer_inbox: Arc<(Mutex<Inbox>, Condvar)>,
        read_timeout: Arc<Mutex<Option<Duration>>>,
    }

    impl MemoryChannel {
        pub fn pair(addr_a: SocketAddr, addr_b: SocketAddr) -> (Self, Self) {
            let inbox_a = Arc::new((Mutex::new(Inbox::default()), Condvar::new()));
            let inbox_b = Arc::new((Mutex::new(Inbox::default()), Condvar::new()));
            let a = MemoryChannel {
                local_addr: addr_a,
                inbox: inbox_a.clone(),
                peer_inbox: inbox_b.clone(),
                read_timeout: Arc::new(Mutex::new(None)),
            };
            let b = MemoryChannel {
                local_addr: addr_b,
                inbox: inbox_b,
                peer_inbox: inbox_a,
                read_timeout: Arc::new(Mutex::new(None)),
            };
            (a, b)
        }

        pub fn local_addr(&self) -> SocketAddr {
            self.local_addr
        }
    }

    impl SyncChannel for MemoryChannel {
        fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
            let _ = target;
            let (lock, cvar) = &*self.peer_inbox;
            lock.lock().unwrap().queue.push_back((buf.to_vec(), self.local_addr));
            cvar.notify_all();
            Ok(buf.len())
        }

        fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
            let (lock, cvar) = &*self.inbox;
            let timeout = *self.read_timeout.lock().unwrap();
            let mut guard = lock.lock().unwrap();
            loop {
                if let Some((datagram, from)) = guard.queue.pop_front() {
                    let n = datagram.len().min(buf.len());
                    buf[..n].copy_from_slice(&datagram[..n]);
                    return Ok((n, from));
                }
                match timeout {
                    Some(d) => {
                        let (next_guard, result) = cvar.wait_timeout(guard, d).unwrap();
                        guard = next_guard;
                        if result.timed_out() && guard.queue.is_empty() {
                            return Err(io::Error::new(io::ErrorKind::WouldBlock, "no datagram"));
                        }
                    }
                    None => {
                        guard = cvar.wait(guard).unwrap();
                    }
                }
            }
        }

        fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
            *self.read_timeout.lock().unwrap() = timeout;
            Ok(())
        }
    }

    /// The async counterpart of [`MemoryChannel`], used to exercise
    /// Variant B's writer/reader task split without a real socket.
    #[derive(Clone)]
    pub struct AsyncMemoryChannel {
        local_addr: SocketAddr,
        peer_addr: SocketAddr,
        tx: tokio::sync::mpsc::UnboundedSender<(Vec<u8>, SocketAddr)>,
        rx: Arc<tokio::sync::Mutex<tokio::sync::mpsc::UnboundedReceiver<(Vec<u8>, SocketAddr)>>>,
    }

    impl AsyncMemoryChannel {
        pub fn pair(addr_a: SocketAddr, addr_b: SocketAddr) -> (Self, Self) {
            let (tx_a, rx_a) = tokio::sync::mpsc::unbounded_channel();
            let (tx_b, rx_b) = tokio::sync::mpsc::unbounded_channel();
            let a = AsyncMemoryChannel {
                local_addr: addr_a,
                peer_addr: addr_b,
                tx: tx_b,
                rx: Arc::new(tokio::sync::Mutex::new(rx_a)),
            };
            let b = AsyncMemoryChannel {
                local_addr: addr_b,
                peer_addr: addr_a,
                tx: tx_a,
                rx: Arc::new(tokio::sync::Mutex::new(rx_b)),
            };
            (a, b)
        }

        pub fn local_addr(&self) -> SocketAddr {
            self.local_addr
        }

        pub fn peer_addr(&self) -> SocketAddr {
            self.peer_addr
        }
    }

    impl AsyncChannel for AsyncMemoryChannel {
        async fn send_to(&self, buf: &[u8], _target: SocketAddr) -> io::Result<usize> {
            self.tx
                .send((buf.to_vec(), self.local_addr))
                .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer dropped"))?;
            Ok(buf.len())
        }

        async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
            let mut rx = self.rx.lock().await;
            match rx.recv().await {
                Some((datagram, from)) => {
                    let n = datagram.len().min(buf.len());
                    buf[..n].copy_from_slice(&datagram[..n]);
                    Ok((n, from))
                }
                None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer dropped")),
            }
        }
    }
}
