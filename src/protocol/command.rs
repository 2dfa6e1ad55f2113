//! Command definitions
//!
//! Represents requests sent to a memcached server.

use crate::item::Item;

/// Storage command verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageVerb {
    Set,
    Add,
    Replace,
    Append,
    Prepend,
    Cas,
}

impl StorageVerb {
    /// Wire spelling of the verb
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            StorageVerb::Set => b"set",
            StorageVerb::Add => b"add",
            StorageVerb::Replace => b"replace",
            StorageVerb::Append => b"append",
            StorageVerb::Prepend => b"prepend",
            StorageVerb::Cas => b"cas",
        }
    }
}

/// A request, borrowing its keys and payload from the caller
#[derive(Debug, Clone, Copy)]
pub enum Command<'a> {
    /// `<verb> <key> <flags> <exptime> <bytes> [<cas>]` followed by the value
    Store { verb: StorageVerb, item: &'a Item },

    /// `gets <key>*`
    Gets { keys: &'a [&'a str] },

    /// `delete <key>`
    Delete { key: &'a str },

    /// `incr <key> <delta>`
    Incr { key: &'a str, delta: u64 },

    /// `decr <key> <delta>`
    Decr { key: &'a str, delta: u64 },

    /// `touch <key> <exptime>`
    Touch { key: &'a str, expiration: i32 },

    /// `stats`
    Stats,

    /// `flush_all`
    FlushAll,

    /// `version`
    Version,
}

impl Command<'_> {
    /// Verb name, used for logging
    pub fn name(&self) -> &'static str {
        match self {
            Command::Store { verb, .. } => match verb {
                StorageVerb::Set => "set",
                StorageVerb::Add => "add",
                StorageVerb::Replace => "replace",
                StorageVerb::Append => "append",
                StorageVerb::Prepend => "prepend",
                StorageVerb::Cas => "cas",
            },
            Command::Gets { .. } => "gets",
            Command::Delete { .. } => "delete",
            Command::Incr { .. } => "incr",
            Command::Decr { .. } => "decr",
            Command::Touch { .. } => "touch",
            Command::Stats => "stats",
            Command::FlushAll => "flush_all",
            Command::Version => "version",
        }
    }
}
