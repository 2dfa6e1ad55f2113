//! Response definitions
//!
//! Classifies reply lines coming back from the server. Lines are handed in
//! with their trailing CRLF already stripped.

use crate::error::MemcacheError;

/// Single-line status replies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Stored,
    NotStored,
    Exists,
    NotFound,
    Deleted,
    Touched,
    Ok,
    End,
}

impl Status {
    /// Match a whole reply line against the known status words
    pub fn from_line(line: &[u8]) -> Option<Status> {
        let status = match line {
            b"STORED" => Status::Stored,
            b"NOT_STORED" => Status::NotStored,
            b"EXISTS" => Status::Exists,
            b"NOT_FOUND" => Status::NotFound,
            b"DELETED" => Status::Deleted,
            b"TOUCHED" => Status::Touched,
            b"OK" => Status::Ok,
            b"END" => Status::End,
            _ => return None,
        };
        Some(status)
    }
}

/// Parsed `VALUE <key> <flags> <bytes> [<cas>]` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueHeader {
    pub key: String,
    pub flags: u32,
    pub len: usize,
    pub cas_id: Option<u64>,
}

/// Turn an `ERROR`, `CLIENT_ERROR <msg>` or `SERVER_ERROR <msg>` line into
/// the matching error. Returns `None` for any other line.
pub fn error_from_line(line: &[u8]) -> Option<MemcacheError> {
    if line == b"ERROR" {
        return Some(MemcacheError::Client("unknown command".to_string()));
    }
    if let Some(msg) = strip_word(line, b"CLIENT_ERROR") {
        return Some(MemcacheError::Client(msg));
    }
    if let Some(msg) = strip_word(line, b"SERVER_ERROR") {
        return Some(MemcacheError::Server(msg));
    }
    None
}

fn strip_word(line: &[u8], word: &[u8]) -> Option<String> {
    let rest = line.strip_prefix(word)?;
    match rest {
        [] => Some(String::new()),
        [b' ', msg @ ..] => Some(String::from_utf8_lossy(msg).into_owned()),
        _ => None,
    }
}
