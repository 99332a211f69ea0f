//! Connection Module
//!
//! A [`Connection`] is one TCP session with a RESP server. It drives the
//! transport and the codec through one request/response cycle per call and
//! remembers the outcome of the last one.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                       Connection                          │
//! │                                                           │
//! │  Command ──> encode ──> Transport::write                  │
//! │                                                           │
//! │  Transport::read(Partial) ──> fixed buffer ──> decode     │
//! │        ▲                                        │         │
//! │        └──────────── need more ─────────────────┘         │
//! │                                                           │
//! │  Reply ──> Command { status, message, data }              │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `executor`: connect, authenticate and execute
//! - `commands`: one-line wrappers such as `get`, `hset`, `zrange`
//!
//! ## Example
//!
//! ```no_run
//! use rconnect::{Connection, EndpointConfig};
//!
//! # async fn demo() -> rconnect::Result<()> {
//! let mut conn = Connection::connect(EndpointConfig::new("127.0.0.1", 6379)).await?;
//! conn.set("greeting", "hello", 0).await?;
//! let value = conn.get("greeting").await?;
//! assert_eq!(value.as_deref(), Some(&b"hello"[..]));
//! # Ok(())
//! # }
//! ```

mod commands;
mod executor;

pub use executor::Connection;
