//! Scripted loopback servers for tests.

use crate::config::EndpointConfig;
use crate::protocol::{decode, Reply};
use bytes::{Buf, Bytes, BytesMut};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub(crate) struct FakeServer {
    addr: SocketAddr,
    log: Arc<Mutex<Vec<Vec<Bytes>>>>,
    accepted: Arc<AtomicUsize>,
}

impl FakeServer {
    /// Decodes each request with the crate's codec, logs it and writes back
    /// whatever `respond` returns. An empty response writes nothing.
    pub(crate) async fn spawn<F>(respond: F) -> Self
    where
        F: Fn(&[Bytes]) -> Vec<u8> + Send + Sync + 'static,
    {
        Self::spawn_delayed(Duration::ZERO, respond).await
    }

    /// Like [`spawn`](Self::spawn), but waits `delay` before each response.
    pub(crate) async fn spawn_delayed<F>(delay: Duration, respond: F) -> Self
    where
        F: Fn(&[Bytes]) -> Vec<u8> + Send + Sync + 'static,
    {
        let respond = Arc::new(respond);
        let log = Arc::new(Mutex::new(Vec::new()));
        let handler_log = Arc::clone(&log);

        Self::start(log, move |mut stream| {
            let respond = Arc::clone(&respond);
            let log = Arc::clone(&handler_log);
            async move {
                let mut buffer = BytesMut::with_capacity(4096);
                loop {
                    while let Ok(Some((reply, consumed))) = decode(&buffer) {
                        buffer.advance(consumed);
                        let Reply::Array(args) = reply else {
                            return;
                        };
                        log.lock().unwrap().push(args.clone());
                        let out = respond(&args);
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                        if !out.is_empty() && stream.write_all(&out).await.is_err() {
                            return;
                        }
                    }
                    match stream.read_buf(&mut buffer).await {
                        Ok(0) | Err(_) => return,
                        Ok(_) => {}
                    }
                }
            }
        })
        .await
    }

    /// Hands every accepted stream to `handler`.
    pub(crate) async fn spawn_raw<F, Fut>(handler: F) -> Self
    where
        F: Fn(TcpStream) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::start(Arc::new(Mutex::new(Vec::new())), handler).await
    }

    async fn start<F, Fut>(log: Arc<Mutex<Vec<Vec<Bytes>>>>, handler: F) -> Self
    where
        F: Fn(TcpStream) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepted);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(handler(stream));
            }
        });

        Self { addr, log, accepted }
    }

    /// Endpoint with a 1 s timeout and a 64 KiB buffer.
    pub(crate) fn endpoint(&self) -> EndpointConfig {
        EndpointConfig::new("127.0.0.1", self.addr.port())
            .with_timeout(Duration::from_secs(1))
            .with_buffer_size(64 * 1024)
    }

    /// Requests received so far, as lossy text.
    pub(crate) fn requests(&self) -> Vec<Vec<String>> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .map(|args| {
                args.iter()
                    .map(|a| String::from_utf8_lossy(a).into_owned())
                    .collect()
            })
            .collect()
    }

    pub(crate) fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

/// Answers `GET key` with `key` as a bulk string, otherwise as [`reply_ok`].
pub(crate) fn reply_key(args: &[Bytes]) -> Vec<u8> {
    match (args[0].to_ascii_uppercase().as_slice(), args.get(1)) {
        (b"GET", Some(key)) => {
            let mut out = format!("${}\r\n", key.len()).into_bytes();
            out.extend_from_slice(key);
            out.extend_from_slice(b"\r\n");
            out
        }
        _ => reply_ok(args),
    }
}

/// `+PONG` for PING, password check for AUTH (`secret`), `+OK` otherwise.
pub(crate) fn reply_ok(args: &[Bytes]) -> Vec<u8> {
    match args[0].to_ascii_uppercase().as_slice() {
        b"PING" => b"+PONG\r\n".to_vec(),
        b"AUTH" if args.get(1).map(|p| &p[..]) == Some(&b"secret"[..]) => b"+OK\r\n".to_vec(),
        b"AUTH" => b"-ERR invalid password\r\n".to_vec(),
        _ => b"+OK\r\n".to_vec(),
    }
}
