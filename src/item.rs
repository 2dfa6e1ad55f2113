//! Cache item and key rules.

use bytes::Bytes;

/// Longest key the server accepts.
pub const MAX_KEY_LENGTH: usize = 250;

/// One cache record as seen by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Printable, whitespace-free key of at most 250 bytes.
    pub key: String,

    /// Opaque payload, sent and returned verbatim.
    pub value: Bytes,

    /// Opaque tag stored alongside the value.
    pub flags: u32,

    /// Seconds from now, or an absolute Unix time past 30 days. 0 means never.
    pub expiration: i32,

    /// Version token, populated by `get`/`get_multi` and consumed by
    /// `compare_and_swap`.
    pub cas_id: Option<u64>,
}

impl Item {
    pub fn new(key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            flags: 0,
            expiration: 0,
            cas_id: None,
        }
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_expiration(mut self, seconds: i32) -> Self {
        self.expiration = seconds;
        self
    }
}

/// Keys must be non-empty, at most [`MAX_KEY_LENGTH`] bytes, and free of
/// spaces and control characters.
pub fn legal_key(key: &str) -> bool {
    if key.is_empty() || key.len() > MAX_KEY_LENGTH {
        return false;
    }
    key.bytes().all(|b| b > b' ' && b != 0x7f)
}
