//! # memcachekv
//!
//! A memcached text-protocol client with:
//! - Per-server connection pooling with discard-on-doubt reuse rules
//! - Deterministic key → server sharding behind a pluggable selector
//! - Concurrent multi-key fetch and stats broadcast across servers
//! - TCP and Unix-domain socket transports
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Client                               │
//! │              (Memcache trait, shared by threads)             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                   ServerSelector                             │
//! │                (key → ServerAddr)                            │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │ Pool (addr) │   ...    │ Pool (addr) │
//!   │  freelist   │          │  freelist   │
//!   └──────┬──────┘          └──────┬──────┘
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │ Connection  │          │ Connection  │
//!   │   + codec   │          │   + codec   │
//!   └─────────────┘          └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use memcachekv::{Client, Item, Memcache, MemcacheError};
//!
//! let client = Client::new(&["127.0.0.1:11211", "127.0.0.1:11212"])?;
//! client.set(&Item::new("foo", "fooval").with_flags(123))?;
//!
//! let item = client.get("foo")?;
//! assert_eq!(item.value.as_ref(), b"fooval");
//!
//! match client.add(&Item::new("foo", "other")) {
//!     Err(MemcacheError::NotStored) => {}
//!     other => panic!("unexpected: {:?}", other),
//! }
//! # Ok::<(), MemcacheError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod item;

pub mod protocol;
pub mod network;
pub mod selector;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{MemcacheError, Result};
pub use config::Config;
pub use item::Item;
pub use network::ServerAddr;
pub use selector::{ServerList, ServerSelector};
pub use client::{Client, Memcache, ServerStats};
pub use protocol::Stats;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of memcachekv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
