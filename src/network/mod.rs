//! Network Module
//!
//! Connections to memcached servers.
//!
//! ## Architecture
//! - `ServerAddr`: TCP or Unix-domain target
//! - `Connection`: buffered stream, one request/reply exchange at a time
//! - `ConnectionPool`: per-address freelist shared by all callers

mod addr;
mod connection;
mod pool;

pub use addr::ServerAddr;
pub use connection::Connection;
pub use pool::{ConnectionPool, PooledConnection};
