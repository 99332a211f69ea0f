//! # rconnect - A Lean Redis Protocol Client
//!
//! rconnect speaks RESP over TCP. It is built for services that issue
//! short request/response commands and want predictable failure modes:
//! every wait is bounded, every failure has a distinct kind, and no reply
//! can grow a buffer without limit.
//!
//! ## Features
//!
//! - **Bounded connect**: connection establishment gives up after a timeout
//! - **Stall-tolerant transport**: short per-call timeouts with a stall budget
//! - **Replay decoder**: any fragmentation of a reply decodes the same way
//! - **Fixed receive buffer**: oversized replies fail with PARAMERR
//! - **Connection pool**: up to 8 tracked connections, validated after 60 s idle
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          rconnect                           │
//! │                                                             │
//! │  ┌──────────┐   acquire   ┌──────────────┐                  │
//! │  │   Pool   │────────────>│  Connection  │                  │
//! │  │ (slots)  │<────────────│  (executor)  │                  │
//! │  └──────────┘    drop     └──────┬───────┘                  │
//! │                                  │                          │
//! │                  ┌───────────────┼───────────────┐          │
//! │                  ▼               ▼               ▼          │
//! │           ┌───────────┐   ┌────────────┐   ┌──────────┐     │
//! │           │  Command  │   │  protocol  │   │Transport │     │
//! │           │ (builder) │   │ (codec)    │   │  (TCP)   │     │
//! │           └───────────┘   └────────────┘   └──────────┘     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use rconnect::{Command, EndpointConfig, Pool, PoolConfig};
//!
//! #[tokio::main]
//! async fn main() -> rconnect::Result<()> {
//!     let endpoint = EndpointConfig::new("127.0.0.1", 6379).with_password("secret");
//!     let pool = Pool::new(PoolConfig::new(endpoint))?;
//!
//!     let mut conn = pool.acquire().await?;
//!     conn.hset("user:1", "greeting", "hello").await?;
//!
//!     let mut cmd = Command::new("HGETALL").arg("user:1");
//!     conn.execute(&mut cmd).await?;
//!     for item in cmd.data() {
//!         println!("{}", String::from_utf8_lossy(item));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`config`]: endpoint settings and environment lookup
//! - [`error`]: error kinds and their integer codes
//! - [`protocol`]: RESP request encoding and reply decoding
//! - [`transport`]: timeout-bounded TCP primitives
//! - [`command`]: argument builder and reply slots
//! - [`connection`]: the executor and command wrappers
//! - [`pool`]: the connection pool

pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod pool;
pub mod protocol;
pub mod transport;

#[cfg(test)]
mod test_support;

// Re-export commonly used types for convenience
pub use command::{Command, ToArg};
pub use config::EndpointConfig;
pub use connection::Connection;
pub use error::{code, Error, ErrorKind, Result};
pub use pool::{Pool, PoolConfig, PooledConnection};
pub use protocol::{ParseError, Reply};
pub use transport::{ReadMode, Transport};

/// Version of rconnect
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
