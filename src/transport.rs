//! TCP Transport
//!
//! Owns one socket and provides the three primitives everything else is
//! built on: a timeout-bounded connect, and write/read loops that retry
//! transient stalls.
//!
//! ## Stall Accounting
//!
//! Each socket call is bounded by a short per-call timeout
//! ([`SOCKET_TIMEOUT`], 10 ms by default). A call that times out, hits a
//! transient error (would-block, interrupted, timed-out) or moves 8 bytes
//! or fewer counts as one stall. A call that moves more than 8 bytes resets
//! the counter. More than [`MAX_STALLS`] consecutive stalls ends the loop
//! with TIMEOUT:
//!
//! ```text
//!   send(>8 bytes)  -> stalls = 0
//!   send(<=8 bytes) -> stalls += 1
//!   timed out       -> stalls += 1
//!   stalls > 100    -> TIMEOUT
//!   hard error      -> NETERR
//! ```
//!
//! A partial read makes a single attempt and reports "nothing yet" as
//! `Ok(0)`; the executor does its own overall-deadline accounting on top.

use crate::error::{Error, ErrorKind, Result};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpSocket, TcpStream};
use tokio::time;
use tracing::{debug, trace};

/// Default per-call send/receive timeout; also the executor's poll quantum.
pub const SOCKET_TIMEOUT: Duration = Duration::from_millis(10);

/// Consecutive stalls tolerated before a transfer fails with TIMEOUT.
pub const MAX_STALLS: u32 = 100;

/// Transfers of this many bytes or fewer do not count as progress.
pub const STALL_BYTES: usize = 8;

/// How [`Transport::read`] waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Keep reading until the buffer is full, retrying stalls.
    Full,

    /// One attempt; `Ok(0)` means nothing was available yet.
    Partial,
}

/// A connected TCP socket with per-call timeouts.
#[derive(Debug)]
pub struct Transport {
    stream: TcpStream,
    peer: SocketAddr,
    send_timeout: Duration,
    recv_timeout: Duration,
}

impl Transport {
    /// Connects to `host:port`, giving up after `timeout`.
    ///
    /// The socket is created non-blocking and the connect completes when the
    /// socket turns writable or reports an error; the pending socket error
    /// decides success. Failures close the socket before returning.
    pub async fn connect_with_timeout(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        match time::timeout(timeout, Self::connect(host, port)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(host, port, ?timeout, "Connect timed out");
                Err(Error::new(
                    ErrorKind::Timeout,
                    format!("connect to {}:{} timed out after {:?}", host, port, timeout),
                ))
            }
        }
    }

    async fn connect(host: &str, port: u16) -> Result<Self> {
        let addr = lookup_host((host, port))
            .await
            .map_err(|e| Error::new(ErrorKind::Network, format!("resolve {}: {}", host, e)))?
            .next()
            .ok_or_else(|| Error::new(ErrorKind::Network, format!("no address for {}", host)))?;

        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4(),
            SocketAddr::V6(_) => TcpSocket::new_v6(),
        }
        .map_err(|e| Error::new(ErrorKind::System, format!("socket creation failed: {}", e)))?;

        let stream = socket
            .connect(addr)
            .await
            .map_err(|e| Error::new(ErrorKind::Network, format!("connect to {} failed: {}", addr, e)))?;

        if let Some(e) = stream.take_error().map_err(|e| network_error(&e))? {
            return Err(Error::new(
                ErrorKind::Network,
                format!("connect to {} failed: {}", addr, e),
            ));
        }

        // Requests are small; do not let Nagle hold them back.
        stream.set_nodelay(true).map_err(|e| network_error(&e))?;

        debug!(peer = %addr, "Connected");

        Ok(Self {
            stream,
            peer: addr,
            send_timeout: SOCKET_TIMEOUT,
            recv_timeout: SOCKET_TIMEOUT,
        })
    }

    pub fn set_send_timeout(&mut self, timeout: Duration) {
        self.send_timeout = timeout;
    }

    pub fn set_recv_timeout(&mut self, timeout: Duration) {
        self.recv_timeout = timeout;
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.stream.local_addr().map_err(|e| network_error(&e))
    }

    /// Writes all of `data`, retrying stalls.
    ///
    /// Returns the number of bytes written, which is always `data.len()`.
    pub async fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut written = 0;
        let mut stalls = 0;

        while written < data.len() {
            match time::timeout(self.send_timeout, self.stream.write(&data[written..])).await {
                Ok(Ok(n)) if n > 0 => {
                    track_progress(n, &mut stalls)?;
                    written += n;
                }
                Ok(Ok(_)) => stall(&mut stalls)?,
                Ok(Err(e)) if is_transient(&e) => stall(&mut stalls)?,
                Ok(Err(e)) => return Err(network_error(&e)),
                Err(_) => stall(&mut stalls)?,
            }
        }

        trace!(peer = %self.peer, bytes = written, "Sent");
        Ok(written)
    }

    /// Reads into `buf` according to `mode`.
    ///
    /// `Full` returns `buf.len()` on success; `Partial` returns whatever one
    /// attempt produced, possibly zero.
    pub async fn read(&mut self, buf: &mut [u8], mode: ReadMode) -> Result<usize> {
        match mode {
            ReadMode::Full => self.read_full(buf).await,
            ReadMode::Partial => self.read_partial(buf).await,
        }
    }

    async fn read_full(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        let mut stalls = 0;

        while filled < buf.len() {
            match time::timeout(self.recv_timeout, self.stream.read(&mut buf[filled..])).await {
                Ok(Ok(0)) => return Err(ErrorKind::NetClose.into()),
                Ok(Ok(n)) => {
                    track_progress(n, &mut stalls)?;
                    filled += n;
                }
                Ok(Err(e)) if is_transient(&e) => stall(&mut stalls)?,
                Ok(Err(e)) => return Err(network_error(&e)),
                Err(_) => stall(&mut stalls)?,
            }
        }

        Ok(filled)
    }

    async fn read_partial(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        match time::timeout(self.recv_timeout, self.stream.read(buf)).await {
            Ok(Ok(0)) => Err(Error::new(
                ErrorKind::NetClose,
                format!("connection closed by {}", self.peer),
            )),
            Ok(Ok(n)) => {
                trace!(peer = %self.peer, bytes = n, "Received");
                Ok(n)
            }
            Ok(Err(e)) if is_transient(&e) => Ok(0),
            Ok(Err(e)) => Err(network_error(&e)),
            Err(_) => Ok(0),
        }
    }
}

fn track_progress(n: usize, stalls: &mut u32) -> Result<()> {
    if n > STALL_BYTES {
        *stalls = 0;
        Ok(())
    } else {
        stall(stalls)
    }
}

fn stall(stalls: &mut u32) -> Result<()> {
    *stalls += 1;
    if *stalls > MAX_STALLS {
        return Err(Error::new(ErrorKind::Timeout, "transfer stalled"));
    }
    Ok(())
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
    )
}

fn network_error(err: &io::Error) -> Error {
    Error::new(ErrorKind::Network, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_test::assert_ok;

    async fn pair() -> (Transport, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (transport, accepted) = tokio::join!(
            Transport::connect_with_timeout("127.0.0.1", addr.port(), Duration::from_secs(1)),
            listener.accept()
        );
        (transport.unwrap(), accepted.unwrap().0)
    }

    #[tokio::test]
    async fn test_connect_and_addresses() {
        let (transport, server) = pair().await;
        assert_eq!(transport.peer_addr(), server.local_addr().unwrap());
        assert_eq!(transport.local_addr().unwrap(), server.peer_addr().unwrap());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = Transport::connect_with_timeout("127.0.0.1", port, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
    }

    #[tokio::test]
    async fn test_connect_timeout_elapses() {
        // a listener that never accepts drops SYNs once its queue is full
        let socket = tokio::net::TcpSocket::new_v4().unwrap();
        socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let listener = socket.listen(1).unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut held = Vec::new();
        let start = time::Instant::now();
        let err = loop {
            match Transport::connect_with_timeout("127.0.0.1", port, Duration::from_millis(100))
                .await
            {
                Ok(transport) => {
                    held.push(transport);
                    assert!(held.len() < 16, "accept queue never filled");
                }
                Err(e) => break e,
            }
        };

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.message().contains("timed out"));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_write_then_read_full() {
        let (mut transport, mut server) = pair().await;

        let n = assert_ok!(transport.write(b"*1\r\n$4\r\nPING\r\n").await);
        assert_eq!(n, 14);

        let mut received = [0u8; 14];
        server.read_exact(&mut received).await.unwrap();
        assert_eq!(&received, b"*1\r\n$4\r\nPING\r\n");

        server.write_all(b"+PONG\r\n").await.unwrap();
        let mut reply = [0u8; 7];
        let n = assert_ok!(transport.read(&mut reply, ReadMode::Full).await);
        assert_eq!(n, 7);
        assert_eq!(&reply, b"+PONG\r\n");
    }

    #[tokio::test]
    async fn test_read_full_survives_slow_peer() {
        let (mut transport, mut server) = pair().await;

        tokio::spawn(async move {
            for chunk in [&b"0123456789"[..], b"abcdefghij"] {
                time::sleep(Duration::from_millis(100)).await;
                server.write_all(chunk).await.unwrap();
            }
            time::sleep(Duration::from_millis(100)).await;
        });

        let mut buf = [0u8; 20];
        assert_ok!(transport.read(&mut buf, ReadMode::Full).await);
        assert_eq!(&buf, b"0123456789abcdefghij");
    }

    #[tokio::test]
    async fn test_read_full_times_out_on_silence() {
        let (mut transport, _server) = pair().await;

        let mut buf = [0u8; 4];
        let err = transport.read(&mut buf, ReadMode::Full).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_read_full_reports_close() {
        let (mut transport, mut server) = pair().await;
        server.write_all(b"ab").await.unwrap();
        drop(server);

        let mut buf = [0u8; 4];
        let err = transport.read(&mut buf, ReadMode::Full).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NetClose);
    }

    #[tokio::test]
    async fn test_read_partial() {
        let (mut transport, mut server) = pair().await;

        let mut buf = [0u8; 16];
        assert_eq!(transport.read(&mut buf, ReadMode::Partial).await.unwrap(), 0);

        server.write_all(b"+OK\r\n").await.unwrap();
        let mut n = 0;
        while n == 0 {
            n = transport.read(&mut buf, ReadMode::Partial).await.unwrap();
        }
        assert_eq!(&buf[..n], b"+OK\r\n");

        drop(server);
        let err = loop {
            match transport.read(&mut buf, ReadMode::Partial).await {
                Ok(0) => continue,
                Ok(n) => panic!("unexpected {} bytes", n),
                Err(e) => break e,
            }
        };
        assert_eq!(err.kind(), ErrorKind::NetClose);
    }

    #[test]
    fn test_stall_counter() {
        let mut stalls = 0;
        for _ in 0..MAX_STALLS {
            assert!(track_progress(STALL_BYTES, &mut stalls).is_ok());
        }
        assert!(track_progress(STALL_BYTES + 1, &mut stalls).is_ok());
        assert_eq!(stalls, 0);

        for _ in 0..MAX_STALLS {
            stall(&mut stalls).unwrap();
        }
        assert_eq!(stall(&mut stalls).unwrap_err().kind(), ErrorKind::Timeout);
    }
}
