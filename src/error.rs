//! Error Kinds and Result Codes
//!
//! Every public operation in rconnect returns `Result<T, Error>`. An error is
//! a closed `ErrorKind` plus a human readable message. The kind maps onto the
//! integer code space that callers of the classic client expect:
//!
//! ```text
//!   OK        1      NETERR   -4      SYSBUSY  -7      NETCLOSE -10
//!   FAIL     -1      TIMEOUT  -5      PARAMERR -8      NETDELAY -11
//!   IOERR    -2      DATAERR  -6      NOTFOUND -9      AUTHFAIL -12
//!   SYSERR   -3
//! ```
//!
//! When an error is created without a message (or with an empty one) it
//! carries the default text of its kind, so `message()` is never empty.

use std::fmt;

/// Integer result codes.
pub mod code {
    pub const OK: i32 = 1;
    pub const FAIL: i32 = -1;
    pub const IOERR: i32 = -2;
    pub const SYSERR: i32 = -3;
    pub const NETERR: i32 = -4;
    pub const TIMEOUT: i32 = -5;
    pub const DATAERR: i32 = -6;
    pub const SYSBUSY: i32 = -7;
    pub const PARAMERR: i32 = -8;
    pub const NOTFOUND: i32 = -9;
    pub const NETCLOSE: i32 = -10;
    pub const NETDELAY: i32 = -11;
    pub const AUTHFAIL: i32 = -12;
}

/// The closed set of failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The server answered with an error reply.
    Fail,
    /// Local I/O failure outside the socket path.
    Io,
    /// Local resource failure (socket creation, allocation).
    System,
    /// Unreachable peer, reset, or any hard socket error.
    Network,
    /// Connect or response deadline exceeded.
    Timeout,
    /// Malformed reply.
    Data,
    /// Local resource temporarily unavailable.
    Busy,
    /// Invalid parameter, or a reply larger than the receive buffer.
    Param,
    /// Logical null reply (key absent).
    NotFound,
    /// Peer closed the connection.
    NetClose,
    /// Transfer stalled beyond the retry budget.
    NetDelay,
    /// The server rejected the credential.
    AuthFail,
}

impl ErrorKind {
    /// Returns the integer code for this kind.
    pub const fn code(self) -> i32 {
        match self {
            ErrorKind::Fail => code::FAIL,
            ErrorKind::Io => code::IOERR,
            ErrorKind::System => code::SYSERR,
            ErrorKind::Network => code::NETERR,
            ErrorKind::Timeout => code::TIMEOUT,
            ErrorKind::Data => code::DATAERR,
            ErrorKind::Busy => code::SYSBUSY,
            ErrorKind::Param => code::PARAMERR,
            ErrorKind::NotFound => code::NOTFOUND,
            ErrorKind::NetClose => code::NETCLOSE,
            ErrorKind::NetDelay => code::NETDELAY,
            ErrorKind::AuthFail => code::AUTHFAIL,
        }
    }

    /// Maps an integer code back to its kind. `OK` and unknown codes yield `None`.
    pub const fn from_code(value: i32) -> Option<ErrorKind> {
        let kind = match value {
            code::FAIL => ErrorKind::Fail,
            code::IOERR => ErrorKind::Io,
            code::SYSERR => ErrorKind::System,
            code::NETERR => ErrorKind::Network,
            code::TIMEOUT => ErrorKind::Timeout,
            code::DATAERR => ErrorKind::Data,
            code::SYSBUSY => ErrorKind::Busy,
            code::PARAMERR => ErrorKind::Param,
            code::NOTFOUND => ErrorKind::NotFound,
            code::NETCLOSE => ErrorKind::NetClose,
            code::NETDELAY => ErrorKind::NetDelay,
            code::AUTHFAIL => ErrorKind::AuthFail,
            _ => return None,
        };
        Some(kind)
    }

    /// Default message used when nothing more specific is known.
    pub const fn default_message(self) -> &'static str {
        match self {
            ErrorKind::System => "system error",
            ErrorKind::Network => "network error",
            ErrorKind::Data => "protocol error",
            ErrorKind::Timeout => "response timeout",
            ErrorKind::NotFound => "element not found",
            _ => "unknown error",
        }
    }

    /// Returns true when a connection that produced this error may hold
    /// stray reply bytes or a dead socket and must not be reused.
    pub const fn is_connection_fault(self) -> bool {
        matches!(
            self,
            ErrorKind::Io
                | ErrorKind::System
                | ErrorKind::Network
                | ErrorKind::Timeout
                | ErrorKind::Data
                | ErrorKind::Param
                | ErrorKind::NetClose
                | ErrorKind::NetDelay
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Fail => "FAIL",
            ErrorKind::Io => "IOERR",
            ErrorKind::System => "SYSERR",
            ErrorKind::Network => "NETERR",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::Data => "DATAERR",
            ErrorKind::Busy => "SYSBUSY",
            ErrorKind::Param => "PARAMERR",
            ErrorKind::NotFound => "NOTFOUND",
            ErrorKind::NetClose => "NETCLOSE",
            ErrorKind::NetDelay => "NETDELAY",
            ErrorKind::AuthFail => "AUTHFAIL",
        };
        f.write_str(name)
    }
}

/// Error returned by every rconnect operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    /// Creates an error with an explicit message.
    ///
    /// An empty message falls back to the kind's default text.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        if message.is_empty() {
            return Self::from(kind);
        }
        Self { kind, message }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> i32 {
        self.kind.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Rewrites the kind while keeping the message.
    pub(crate) fn with_kind(self, kind: ErrorKind) -> Self {
        Self { kind, ..self }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: kind.default_message().to_string(),
        }
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
