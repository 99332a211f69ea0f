//! # Connection Pool
//!
//! Reuses authenticated connections to one endpoint across callers.
//!
//! ## Slots
//!
//! The pool tracks at most `max_tracked` slots. Each slot is either `Idle`
//! (the pool holds the connection) or `InUse` (a [`PooledConnection`] guard
//! holds it). A guard hands its connection back when dropped.
//!
//! ```text
//! acquire()
//!   first Idle slot, returned < idle_timeout ago  -> hand out as is
//!   first Idle slot, older                        -> PING it
//!        PING fails                               -> reconnect + AUTH
//!        reconnect fails                          -> fresh connection
//!   no Idle slot                                  -> fresh connection
//!   fewer than max_tracked slots                  -> track as InUse
//!   otherwise                                     -> hand out untracked
//!
//! drop(guard)
//!   tracked and reusable  -> Idle, timestamp refreshed
//!   tracked, faulted      -> slot removed, socket closed
//!   tracked, mid-request  -> slot removed, socket closed
//!   untracked             -> socket closed
//! ```
//!
//! The slot lock is never held across an `.await`: connecting, pinging and
//! authenticating all happen outside it.

use crate::config::EndpointConfig;
use crate::connection::Connection;
use crate::error::Result;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Default number of tracked connections.
pub const POOL_MAXLEN: usize = 8;

/// Default window in which an idle connection is reused without a PING.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Pool configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Endpoint every pooled connection talks to.
    pub endpoint: EndpointConfig,
    /// Maximum number of tracked slots (idle + in use).
    pub max_tracked: usize,
    /// Idle connections older than this are validated before reuse.
    pub idle_timeout: Duration,
}

impl PoolConfig {
    pub fn new(endpoint: EndpointConfig) -> Self {
        Self {
            endpoint,
            max_tracked: POOL_MAXLEN,
            idle_timeout: IDLE_TIMEOUT,
        }
    }

    pub fn with_max_tracked(mut self, max_tracked: usize) -> Self {
        self.max_tracked = max_tracked;
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }
}

enum SlotState {
    Idle(Connection),
    InUse,
}

struct Slot {
    id: u64,
    state: SlotState,
    returned: Instant,
}

struct PoolInner {
    config: PoolConfig,
    slots: Mutex<Vec<Slot>>,
}

enum Checkout {
    Ready(Connection),
    Stale(Connection),
    Empty,
}

/// Connection pool handle. Clones share the same slots.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    /// Creates an empty pool; connections are opened on demand.
    pub fn new(config: PoolConfig) -> Result<Self> {
        config.endpoint.validate()?;

        let slots = Vec::with_capacity(config.max_tracked);
        Ok(Self {
            inner: Arc::new(PoolInner {
                config,
                slots: Mutex::new(slots),
            }),
        })
    }

    /// Borrows a connection.
    ///
    /// Fails only when every fallback fails, with the error of the last
    /// attempt.
    pub async fn acquire(&self) -> Result<PooledConnection> {
        let candidate = match self.inner.checkout_idle() {
            Checkout::Ready(conn) => {
                trace!(id = conn.id(), "Reusing idle connection");
                return Ok(self.guard(conn, true));
            }
            Checkout::Stale(conn) => Some(conn),
            Checkout::Empty => None,
        };

        let conn = self.revive_or_connect(candidate).await?;

        let tracked = self.inner.track(&conn);
        if !tracked {
            debug!(id = conn.id(), "Pool full, connection is untracked");
        }
        Ok(self.guard(conn, tracked))
    }

    async fn revive_or_connect(&self, candidate: Option<Connection>) -> Result<Connection> {
        if let Some(mut conn) = candidate {
            match conn.ping().await {
                Ok(()) => {
                    debug!(id = conn.id(), "Stale connection still alive");
                    return Ok(conn);
                }
                Err(e) => debug!(id = conn.id(), error = %e, "Stale connection failed PING"),
            }
            match conn.reconnect().await {
                Ok(()) => return Ok(conn),
                Err(e) => debug!(id = conn.id(), error = %e, "Reconnect failed"),
            }
        }

        let conn = Connection::connect(self.inner.config.endpoint.clone()).await?;
        debug!(id = conn.id(), addr = %self.inner.config.endpoint.address(), "Opened pooled connection");
        Ok(conn)
    }

    fn guard(&self, conn: Connection, tracked: bool) -> PooledConnection {
        PooledConnection {
            pool: Arc::clone(&self.inner),
            conn: Some(conn),
            tracked,
        }
    }

    /// Number of tracked slots, idle or in use.
    pub fn tracked(&self) -> usize {
        self.inner.lock().len()
    }

    /// Number of idle slots.
    pub fn idle(&self) -> usize {
        self.inner
            .lock()
            .iter()
            .filter(|slot| matches!(slot.state, SlotState::Idle(_)))
            .count()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("addr", &self.inner.config.endpoint.address())
            .field("tracked", &self.tracked())
            .field("idle", &self.idle())
            .finish()
    }
}

impl PoolInner {
    fn lock(&self) -> MutexGuard<'_, Vec<Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn checkout_idle(&self) -> Checkout {
        let mut slots = self.lock();

        let Some(pos) = slots
            .iter()
            .position(|slot| matches!(slot.state, SlotState::Idle(_)))
        else {
            return Checkout::Empty;
        };

        if slots[pos].returned.elapsed() <= self.config.idle_timeout {
            match std::mem::replace(&mut slots[pos].state, SlotState::InUse) {
                SlotState::Idle(conn) => Checkout::Ready(conn),
                SlotState::InUse => Checkout::Empty,
            }
        } else {
            match slots.remove(pos).state {
                SlotState::Idle(conn) => Checkout::Stale(conn),
                SlotState::InUse => Checkout::Empty,
            }
        }
    }

    fn track(&self, conn: &Connection) -> bool {
        let mut slots = self.lock();
        if slots.len() >= self.config.max_tracked {
            return false;
        }
        slots.push(Slot {
            id: conn.id(),
            state: SlotState::InUse,
            returned: Instant::now(),
        });
        true
    }

    fn release(&self, conn: Connection) {
        let mut slots = self.lock();
        let Some(pos) = slots.iter().position(|slot| slot.id == conn.id()) else {
            return;
        };

        if conn.is_reusable() {
            let slot = &mut slots[pos];
            slot.state = SlotState::Idle(conn);
            slot.returned = Instant::now();
        } else {
            slots.remove(pos);
            drop(slots);
            debug!(id = conn.id(), code = conn.code(), "Evicting faulted connection");
        }
    }
}

/// A borrowed connection. Dereferences to [`Connection`] and returns it to
/// the pool when dropped.
pub struct PooledConnection {
    pool: Arc<PoolInner>,
    conn: Option<Connection>,
    tracked: bool,
}

impl PooledConnection {
    /// False when the pool was full at acquire time; the connection closes
    /// on drop instead of going back to the pool.
    pub fn is_tracked(&self) -> bool {
        self.tracked
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection is present until drop")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection is present until drop")
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("conn", &self.conn)
            .field("tracked", &self.tracked)
            .finish()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if self.tracked {
            self.pool.release(conn);
        }
    }
}
