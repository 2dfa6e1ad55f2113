//! Connection Pool
//!
//! Per-address freelist of idle connections.
//!
//! ## Lifecycle
//! - `acquire`: pop an idle connection, or dial a new one
//! - `release`: push back while the freelist is under its cap, else close
//! - `discard`: close unconditionally
//!
//! A connection whose last exchange ended in a transport or framing error, or
//! that still holds unread bytes, must never go back on the freelist: the
//! text protocol cannot resynchronise, so the next request would read a stale
//! reply.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::{Connection, ServerAddr};
use crate::error::Result;

/// Idle connections for one server address
///
/// ## Concurrency:
/// - `idle`: protected by a Mutex held only for a push or pop, never across I/O
/// - All methods use `&self`
#[derive(Debug)]
pub struct ConnectionPool {
    /// Address every connection in this pool talks to
    addr: ServerAddr,

    /// Freelist, most recently released last
    idle: Mutex<Vec<Connection>>,

    /// Freelist capacity
    max_idle: usize,

    connect_timeout: Duration,
    io_timeout: Duration,
}

impl ConnectionPool {
    pub fn new(addr: ServerAddr, max_idle: usize, connect_timeout: Duration, io_timeout: Duration) -> Self {
        Self {
            addr,
            idle: Mutex::new(Vec::with_capacity(max_idle)),
            max_idle,
            connect_timeout,
            io_timeout,
        }
    }

    /// Get the server address
    pub fn addr(&self) -> &ServerAddr {
        &self.addr
    }

    /// Take an idle connection or dial a new one.
    ///
    /// Dial failures are returned as-is; there is no retry.
    pub fn acquire(self: &Arc<Self>) -> Result<PooledConnection> {
        let idle = self.idle.lock().pop();
        let conn = match idle {
            Some(conn) => conn,
            None => {
                tracing::debug!("Dialing {}", self.addr);
                Connection::connect(&self.addr, self.connect_timeout, self.io_timeout)?
            }
        };

        Ok(PooledConnection {
            pool: Arc::clone(self),
            conn: Some(conn),
        })
    }

    /// Return a healthy connection. Closed instead when the freelist is full
    /// or when unread bytes remain on it.
    pub fn release(&self, conn: Connection) {
        if conn.buffered_len() > 0 {
            tracing::warn!(
                "Discarding connection to {} with {} unread bytes",
                self.addr,
                conn.buffered_len()
            );
            return;
        }

        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(conn);
        }
    }

    /// Close a connection left in an unknown state
    pub fn discard(&self, conn: Connection) {
        tracing::debug!("Discarding connection to {}", self.addr);
        drop(conn);
    }

    /// Number of connections currently on the freelist
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }
}

/// A connection checked out of a [`ConnectionPool`]
///
/// Call [`finish`](Self::finish) with the outcome of the exchange. A guard
/// dropped without it (early return, panic) discards its connection.
#[derive(Debug)]
pub struct PooledConnection {
    pool: Arc<ConnectionPool>,
    conn: Option<Connection>,
}

impl PooledConnection {
    /// Release on success or a resumable error, discard otherwise, then hand
    /// the outcome back.
    pub fn finish<T>(mut self, result: Result<T>) -> Result<T> {
        if let Some(conn) = self.conn.take() {
            match &result {
                Err(e) if !e.is_resumable() => {
                    tracing::debug!("Connection to {} failed: {}", self.pool.addr, e);
                    self.pool.discard(conn);
                }
                _ => self.pool.release(conn),
            }
        }
        result
    }

    /// Get the live connection
    pub fn conn(&mut self) -> &mut Connection {
        // `conn` is only taken by `finish` and `drop`, both of which consume the guard
        match self.conn.as_mut() {
            Some(conn) => conn,
            None => unreachable!("pooled connection used after finish"),
        }
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.discard(conn);
        }
    }
}
