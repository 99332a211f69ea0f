//! RESP Reply Types and Request Encoding
//!
//! A client only ever sends one shape of message: a multi-bulk request,
//! an array of length-prefixed bulk strings. It receives any of the five
//! RESP reply kinds back.
//!
//! ## Request Format
//!
//! ```text
//! SET foo bar  =>  *3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n
//! ```
//!
//! ## Reply Prefixes
//!
//! - `+` Simple String
//! - `-` Error
//! - `:` Integer
//! - `$` Bulk String (`$-1` is null)
//! - `*` Array
//!
//! All lines are terminated with CRLF (`\r\n`).

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// The CRLF terminator used in RESP protocol
pub const CRLF: &[u8] = b"\r\n";

/// RESP protocol type prefixes
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// A decoded server reply.
///
/// Arrays are flattened into their payloads: the client contract is an
/// ordered list of returned elements, not a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+OK\r\n`
    Status(String),

    /// `-ERR message\r\n`
    Error(String),

    /// `:1000\r\n`
    Integer(i64),

    /// `$5\r\nhello\r\n`
    Bulk(Bytes),

    /// `$-1\r\n` or `*-1\r\n`
    Null,

    /// `*2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n`
    ///
    /// Null elements are kept as empty placeholders so the list length
    /// always matches the declared count (for flat arrays).
    Array(Vec<Bytes>),
}

impl Reply {
    /// Returns true if this reply is a logical null.
    pub fn is_null(&self) -> bool {
        matches!(self, Reply::Null)
    }

    /// Returns true if the server answered with an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Status(s) => write!(f, "{}", s),
            Reply::Error(s) => write!(f, "(error) {}", s),
            Reply::Integer(n) => write!(f, "(integer) {}", n),
            Reply::Bulk(data) => match std::str::from_utf8(data) {
                Ok(s) => write!(f, "\"{}\"", s),
                Err(_) => write!(f, "(binary data, {} bytes)", data.len()),
            },
            Reply::Null => write!(f, "(nil)"),
            Reply::Array(items) if items.is_empty() => write!(f, "(empty array)"),
            Reply::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    writeln!(f, "{}) {}", i + 1, String::from_utf8_lossy(item))?;
                }
                Ok(())
            }
        }
    }
}

/// Serializes a command into a multi-bulk request, appending to `buf`.
pub fn encode_command<A: AsRef<[u8]>>(args: &[A], buf: &mut BytesMut) {
    let body: usize = args.iter().map(|a| a.as_ref().len() + 16).sum();
    buf.reserve(16 + body);

    buf.put_u8(prefix::ARRAY);
    put_decimal(buf, args.len());
    for arg in args {
        let arg = arg.as_ref();
        buf.put_u8(prefix::BULK_STRING);
        put_decimal(buf, arg.len());
        buf.put_slice(arg);
        buf.put_slice(CRLF);
    }
}

/// Serializes a command into a fresh buffer.
pub fn encode<A: AsRef<[u8]>>(args: &[A]) -> Bytes {
    let mut buf = BytesMut::new();
    encode_command(args, &mut buf);
    buf.freeze()
}

/// Writes `value` followed by CRLF.
fn put_decimal(buf: &mut BytesMut, value: usize) {
    buf.put_slice(value.to_string().as_bytes());
    buf.put_slice(CRLF);
}
