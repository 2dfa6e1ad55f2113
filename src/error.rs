//! Error types for memcachekv
//!
//! Provides a unified error type for all client operations.

use thiserror::Error;

/// Result type alias using MemcacheError
pub type Result<T> = std::result::Result<T, MemcacheError>;

/// Unified error type for memcachekv operations
#[derive(Debug, Error)]
pub enum MemcacheError {
    // -------------------------------------------------------------------------
    // Negative Replies (well-formed, connection stays usable)
    // -------------------------------------------------------------------------
    #[error("memcache: cache miss")]
    CacheMiss,

    #[error("memcache: item not stored")]
    NotStored,

    #[error("memcache: compare-and-swap conflict")]
    CasConflict,

    // -------------------------------------------------------------------------
    // Request Validation
    // -------------------------------------------------------------------------
    #[error("memcache: key is too long or contains invalid characters")]
    MalformedKey,

    // -------------------------------------------------------------------------
    // Server Error Lines
    // -------------------------------------------------------------------------
    /// `ERROR` or `CLIENT_ERROR <msg>`: the server rejected the request.
    #[error("memcache: client error: {0}")]
    Client(String),

    /// `SERVER_ERROR <msg>`: the server failed to process the request.
    #[error("memcache: server error: {0}")]
    Server(String),

    // -------------------------------------------------------------------------
    // Routing / Configuration
    // -------------------------------------------------------------------------
    #[error("memcache: no servers configured or available")]
    NoServers,

    #[error("memcache: invalid server address: {0}")]
    InvalidAddress(String),

    // -------------------------------------------------------------------------
    // Transport / Framing (connection is discarded)
    // -------------------------------------------------------------------------
    #[error("memcache: connection failure: {0}")]
    Connection(#[from] std::io::Error),

    #[error("memcache: protocol error: {0}")]
    Protocol(String),
}

impl MemcacheError {
    /// Whether the connection that produced this error can be reused.
    ///
    /// Every variant except `Connection` and `Protocol` comes from a complete
    /// reply line (or from a check done before any I/O), so the stream is
    /// still positioned at a reply boundary.
    pub fn is_resumable(&self) -> bool {
        !matches!(
            self,
            MemcacheError::Connection(_) | MemcacheError::Protocol(_)
        )
    }

    /// Shorthand for building a protocol error from any displayable message.
    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        MemcacheError::Protocol(msg.into())
    }
}
