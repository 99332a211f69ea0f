//! RESP Protocol Codec
//!
//! Stateless functions that turn an argument list into request bytes and
//! accumulated reply bytes into a [`Reply`].
//!
//! ## Modules
//!
//! - `types`: the `Reply` enum and request encoding
//! - `parser`: the replaying reply decoder
//!
//! ## Example
//!
//! ```
//! use rconnect::protocol::{decode, encode, Reply};
//! use bytes::Bytes;
//!
//! let request = encode(&["GET", "name"]);
//! assert_eq!(&request[..], b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n");
//!
//! let (reply, _) = decode(b"$5\r\nhello\r\n").unwrap().unwrap();
//! assert_eq!(reply, Reply::Bulk(Bytes::from("hello")));
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{decode, ParseError, ParseResult, MAX_NESTING_DEPTH};
pub use types::{encode, encode_command, Reply};
