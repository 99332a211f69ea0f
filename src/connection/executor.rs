//! Command Executor
//!
//! A `Connection` owns one transport and one fixed receive buffer and runs
//! one request/response cycle at a time.
//!
//! ## Execution Cycle
//!
//! ```text
//! 1. Encode the command and write it fully
//!        │
//!        ▼
//! 2. ┌────────────────────────────────────────────┐
//!    │ Partial read after the accumulated bytes   │
//!    │   nothing   -> elapsed += 10 ms            │
//!    │   bytes     -> decode the whole buffer     │
//!    │     complete   -> done                     │
//!    │     malformed  -> DATAERR                  │
//!    │     need more  -> reset elapsed if > 8 B   │
//!    │ elapsed > timeout   -> TIMEOUT             │
//!    │ buffer full         -> PARAMERR            │
//!    └────────────────────────────────────────────┘
//!        │
//!        ▼
//! 3. Record code, status and message on the connection
//! ```
//!
//! The buffer never grows. A reply that does not fit fails with PARAMERR
//! and leaves the unread remainder on the socket.
//!
//! Any failure that can leave bytes of an old reply on the socket (TIMEOUT,
//! PARAMERR, DATAERR, NETERR and friends) closes the transport, as does a
//! cycle whose future was dropped between the write and the decoded reply.
//! Further commands fail with NETCLOSE until [`Connection::reconnect`].

use crate::command::Command;
use crate::config::EndpointConfig;
use crate::error::{code, Error, ErrorKind, Result};
use crate::protocol::decode;
use crate::transport::{ReadMode, Transport, SOCKET_TIMEOUT, STALL_BYTES};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, trace, warn};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// One client connection to a RESP server.
pub struct Connection {
    id: u64,
    config: EndpointConfig,
    transport: Option<Transport>,
    buffer: Box<[u8]>,
    code: i32,
    status: i64,
    message: String,
    last_error: Option<ErrorKind>,
    // set from the request write until the reply is decoded
    in_flight: bool,
}

impl Connection {
    /// Connects to the configured endpoint and authenticates when a
    /// credential is set.
    pub async fn connect(config: EndpointConfig) -> Result<Self> {
        config.validate()?;

        let transport = open(&config).await?;
        let mut conn = Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            buffer: vec![0u8; config.buffer_size].into_boxed_slice(),
            config,
            transport: Some(transport),
            code: code::OK,
            status: 0,
            message: String::new(),
            last_error: None,
            in_flight: false,
        };

        debug!(id = conn.id, addr = %conn.config.address(), "Connection opened");

        if !conn.config.password.is_empty() {
            let password = conn.config.password.clone();
            conn.auth(&password).await?;
        }

        Ok(conn)
    }

    /// Drops the socket and connects again with the stored configuration,
    /// re-authenticating when a credential is set.
    pub async fn reconnect(&mut self) -> Result<()> {
        self.close();

        let transport = open(&self.config).await.map_err(|e| self.fail(e))?;
        self.transport = Some(transport);
        self.in_flight = false;
        self.last_error = None;
        self.code = code::OK;
        self.message.clear();

        debug!(id = self.id, addr = %self.config.address(), "Reconnected");

        if !self.config.password.is_empty() {
            let password = self.config.password.clone();
            self.auth(&password).await?;
        }
        Ok(())
    }

    /// Stores the credential and sends AUTH. An empty credential succeeds
    /// without a round trip.
    pub async fn auth(&mut self, password: &str) -> Result<()> {
        self.config.password = password.to_string();
        if password.is_empty() {
            return Ok(());
        }

        let mut cmd = Command::new("AUTH").arg(password);
        self.execute(&mut cmd).await.map_err(|e| {
            warn!(id = self.id, error = %e, "Authentication failed");
            self.code = code::AUTHFAIL;
            e.with_kind(ErrorKind::AuthFail)
        })
    }

    /// Sends `cmd` and waits for its reply.
    ///
    /// On success the reply is stored on `cmd`. The outcome is also recorded
    /// on the connection (see [`code`](Self::code),
    /// [`status`](Self::status), [`error_message`](Self::error_message)).
    ///
    /// The reply deadline is `config.timeout`, counted in 10 ms steps of
    /// empty reads. Only a read that delivers more than 8 bytes without
    /// completing the reply starts the count again, so a reply trickling in
    /// chunks of 8 bytes or fewer can fail with TIMEOUT even though bytes
    /// keep arriving.
    ///
    /// A failure that may leave part of a reply on the socket closes the
    /// connection. So does dropping this future after the request was
    /// written: the next call finds the cycle unfinished, closes the socket
    /// and fails with NETCLOSE. Call [`reconnect`](Self::reconnect) to use
    /// the connection again.
    pub async fn execute(&mut self, cmd: &mut Command) -> Result<()> {
        if cmd.is_empty() {
            let err = Error::new(ErrorKind::Param, "empty command");
            self.code = err.code();
            self.message = err.message().to_string();
            return Err(err);
        }
        if self.in_flight {
            warn!(id = self.id, "Previous command did not finish, closing");
            self.close();
        }

        let result = self.round_trip(cmd).await;
        self.in_flight = false;

        match &result {
            Ok(()) => {
                self.code = code::OK;
                self.message = cmd.message().to_string();
                self.last_error = None;
            }
            Err(e) => {
                debug!(id = self.id, cmd = %cmd.name(), kind = %e.kind(), error = %e, "Command failed");
                self.code = e.code();
                self.message = e.message().to_string();
                self.last_error = Some(e.kind());
                if e.kind().is_connection_fault() {
                    self.close();
                }
            }
        }
        self.status = cmd.status();

        result
    }

    async fn round_trip(&mut self, cmd: &mut Command) -> Result<()> {
        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| Error::new(ErrorKind::NetClose, "connection is closed"))?;
        let buffer = &mut self.buffer;
        let timeout = self.config.timeout;

        cmd.reset_result();
        let request = cmd.encode();
        self.in_flight = true;
        transport.write(&request).await?;
        trace!(id = self.id, cmd = %cmd.name(), bytes = request.len(), "Request sent");

        let mut filled = 0;
        let mut elapsed = Duration::ZERO;

        loop {
            if filled == buffer.len() {
                return Err(Error::new(
                    ErrorKind::Param,
                    format!("reply exceeds receive buffer of {} bytes", buffer.len()),
                ));
            }

            let n = transport.read(&mut buffer[filled..], ReadMode::Partial).await?;
            if n == 0 {
                elapsed += SOCKET_TIMEOUT;
                if elapsed > timeout {
                    return Err(Error::new(
                        ErrorKind::Timeout,
                        format!("no reply within {:?}", timeout),
                    ));
                }
                continue;
            }
            filled += n;

            let decoded = decode(&buffer[..filled])
                .map_err(|e| Error::new(ErrorKind::Data, format!("protocol error: {}", e)))?;

            match decoded {
                Some((reply, consumed)) => {
                    if consumed < filled {
                        warn!(
                            id = self.id,
                            extra = filled - consumed,
                            "Discarding bytes after reply"
                        );
                    }
                    trace!(id = self.id, bytes = consumed, "Reply received");
                    return cmd.apply(reply);
                }
                None if n > STALL_BYTES => elapsed = Duration::ZERO,
                None => {}
            }
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// `OK` or the code of the last failed operation.
    pub fn code(&self) -> i32 {
        self.code
    }

    /// Integer reply value of the last command (`OK` for status replies).
    pub fn status(&self) -> i64 {
        self.status
    }

    /// Message of the last command: reply text or error text.
    pub fn error_message(&self) -> &str {
        &self.message
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// False once closed, while a request is awaiting its reply, or after a
    /// failure that may have left the stream out of sync with the
    /// request/reply sequence.
    pub fn is_reusable(&self) -> bool {
        self.is_connected()
            && !self.in_flight
            && !self.last_error.is_some_and(ErrorKind::is_connection_fault)
    }

    /// Closes the socket. The receive buffer is kept for a reconnect.
    pub fn close(&mut self) {
        self.in_flight = false;
        if self.transport.take().is_some() {
            debug!(id = self.id, "Connection closed");
        }
    }

    fn fail(&mut self, err: Error) -> Error {
        self.code = err.code();
        self.message = err.message().to_string();
        self.last_error = Some(err.kind());
        err
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("addr", &self.config.address())
            .field("connected", &self.is_connected())
            .field("buffer_size", &self.buffer.len())
            .field("code", &self.code)
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

async fn open(config: &EndpointConfig) -> Result<Transport> {
    let mut transport =
        Transport::connect_with_timeout(&config.host, config.port, config.timeout).await?;
    transport.set_send_timeout(SOCKET_TIMEOUT);
    transport.set_recv_timeout(SOCKET_TIMEOUT);
    Ok(transport)
}
