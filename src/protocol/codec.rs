//! Protocol codec
//!
//! Encoding of requests and decoding of replies for the memcached text
//! protocol.
//!
//! ## Wire Format
//!
//! ### Storage Request
//! ```text
//! <verb> <key> <flags> <exptime> <bytes> [<cas>]\r\n
//! <data block of exactly <bytes> bytes>\r\n
//! ```
//!
//! ### Retrieval Reply
//! ```text
//! VALUE <key> <flags> <bytes> [<cas>]\r\n
//! <data block>\r\n
//! ...                       (one block per hit, misses are omitted)
//! END\r\n
//! ```
//!
//! Every reader strips the trailing CRLF into a caller-owned line buffer so a
//! connection reuses one allocation across requests.

use std::collections::HashMap;
use std::io::{self, BufRead, Read, Write};

use bytes::{BufMut, Bytes, BytesMut};

use super::{error_from_line, Command, Status, StorageVerb, ValueHeader};
use crate::error::{MemcacheError, Result};
use crate::item::Item;

/// Line terminator
pub const CRLF: &[u8] = b"\r\n";

/// Largest data block accepted in a `VALUE` reply (1 GiB, memcached's own ceiling)
pub const MAX_VALUE_SIZE: usize = 1024 * 1024 * 1024;

/// Statistics of one server, name → value
pub type Stats = HashMap<String, String>;

// =============================================================================
// Request Encoding
// =============================================================================

/// Encode a complete request, data block included
pub fn encode_command(command: &Command<'_>, buf: &mut BytesMut) {
    encode_line(command, buf);
    if let Command::Store { item, .. } = *command {
        buf.reserve(item.value.len() + CRLF.len());
        buf.put_slice(&item.value);
        buf.put_slice(CRLF);
    }
}

/// Encode only the request line (storage commands stop before the data block)
fn encode_line(command: &Command<'_>, buf: &mut BytesMut) {
    match *command {
        Command::Store { verb, item } => {
            buf.reserve(item.key.len() + 64);
            buf.put_slice(verb.as_bytes());
            buf.put_u8(b' ');
            buf.put_slice(item.key.as_bytes());
            buf.put_u8(b' ');
            put_decimal(buf, u64::from(item.flags));
            buf.put_u8(b' ');
            put_signed(buf, i64::from(item.expiration));
            buf.put_u8(b' ');
            put_decimal(buf, item.value.len() as u64);
            if verb == StorageVerb::Cas {
                buf.put_u8(b' ');
                put_decimal(buf, item.cas_id.unwrap_or(0));
            }
            buf.put_slice(CRLF);
        }
        Command::Gets { keys } => {
            buf.put_slice(b"gets");
            for key in keys {
                buf.put_u8(b' ');
                buf.put_slice(key.as_bytes());
            }
            buf.put_slice(CRLF);
        }
        Command::Delete { key } => {
            buf.put_slice(b"delete ");
            buf.put_slice(key.as_bytes());
            buf.put_slice(CRLF);
        }
        Command::Incr { key, delta } => put_arith(buf, b"incr ", key, delta),
        Command::Decr { key, delta } => put_arith(buf, b"decr ", key, delta),
        Command::Touch { key, expiration } => {
            buf.put_slice(b"touch ");
            buf.put_slice(key.as_bytes());
            buf.put_u8(b' ');
            put_signed(buf, i64::from(expiration));
            buf.put_slice(CRLF);
        }
        Command::Stats => buf.put_slice(b"stats\r\n"),
        Command::FlushAll => buf.put_slice(b"flush_all\r\n"),
        Command::Version => buf.put_slice(b"version\r\n"),
    }
}

fn put_arith(buf: &mut BytesMut, verb: &[u8], key: &str, delta: u64) {
    buf.put_slice(verb);
    buf.put_slice(key.as_bytes());
    buf.put_u8(b' ');
    put_decimal(buf, delta);
    buf.put_slice(CRLF);
}

fn put_decimal(buf: &mut BytesMut, mut n: u64) {
    let mut digits = [0u8; 20];
    let mut pos = digits.len();
    loop {
        pos -= 1;
        digits[pos] = b'0' + (n % 10) as u8;
        n /= 10;
        if n == 0 {
            break;
        }
    }
    buf.put_slice(&digits[pos..]);
}

fn put_signed(buf: &mut BytesMut, n: i64) {
    if n < 0 {
        buf.put_u8(b'-');
    }
    put_decimal(buf, n.unsigned_abs());
}

/// Write a request and flush it.
///
/// The data block of a storage command is written straight from the item, so
/// large values are never copied into the scratch buffer.
pub fn write_command<W: Write>(
    writer: &mut W,
    command: &Command<'_>,
    buf: &mut BytesMut,
) -> Result<()> {
    buf.clear();
    encode_line(command, buf);
    writer.write_all(&buf[..])?;
    if let Command::Store { item, .. } = *command {
        writer.write_all(&item.value)?;
        writer.write_all(CRLF)?;
    }
    writer.flush()?;
    Ok(())
}

// =============================================================================
// Reply Decoding
// =============================================================================

/// Read one reply line into `line`, without its CRLF.
///
/// A clean EOF is a connection failure; a line cut short is a protocol error.
pub fn read_line<R: BufRead>(reader: &mut R, line: &mut Vec<u8>) -> Result<()> {
    line.clear();
    let n = reader.read_until(b'\n', line)?;
    if n == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed by server").into());
    }
    if !line.ends_with(CRLF) {
        return Err(MemcacheError::protocol(format!(
            "unterminated reply line: {:?}",
            String::from_utf8_lossy(line)
        )));
    }
    line.truncate(line.len() - CRLF.len());
    Ok(())
}

/// `STORED` | `NOT_STORED` | `EXISTS` | `NOT_FOUND`
pub fn read_storage_reply<R: BufRead>(reader: &mut R, line: &mut Vec<u8>) -> Result<()> {
    read_line(reader, line)?;
    match Status::from_line(line) {
        Some(Status::Stored) => Ok(()),
        Some(Status::NotStored) => Err(MemcacheError::NotStored),
        Some(Status::Exists) => Err(MemcacheError::CasConflict),
        Some(Status::NotFound) => Err(MemcacheError::CacheMiss),
        _ => Err(unexpected(line)),
    }
}

/// Read `VALUE` blocks up to `END`, handing each item to `on_item`.
pub fn read_values<R, F>(reader: &mut R, line: &mut Vec<u8>, mut on_item: F) -> Result<()>
where
    R: BufRead,
    F: FnMut(Item),
{
    loop {
        read_line(reader, line)?;
        if Status::from_line(line) == Some(Status::End) {
            return Ok(());
        }
        if !line.starts_with(b"VALUE ") {
            return Err(unexpected(line));
        }
        let header = parse_value_header(line)?;
        let value = read_data_block(reader, header.len)?;
        on_item(Item {
            key: header.key,
            value,
            flags: header.flags,
            expiration: 0,
            cas_id: header.cas_id,
        });
    }
}

/// Parse `VALUE <key> <flags> <bytes> [<cas>]`
pub fn parse_value_header(line: &[u8]) -> Result<ValueHeader> {
    let malformed = || {
        MemcacheError::protocol(format!(
            "malformed VALUE line: {:?}",
            String::from_utf8_lossy(line)
        ))
    };

    let mut fields = line.split(|&b| b == b' ');
    if fields.next() != Some(&b"VALUE"[..]) {
        return Err(malformed());
    }
    let key = fields.next().filter(|k| !k.is_empty()).ok_or_else(malformed)?;
    let flags = parse_u32(fields.next().ok_or_else(malformed)?)?;
    let len = parse_u64(fields.next().ok_or_else(malformed)?)?;
    let cas_id = fields.next().map(parse_u64).transpose()?;
    if fields.next().is_some() {
        return Err(malformed());
    }

    let len = usize::try_from(len)
        .ok()
        .filter(|&len| len <= MAX_VALUE_SIZE)
        .ok_or_else(|| {
            MemcacheError::protocol(format!(
                "value too large: {} bytes (max {})",
                len, MAX_VALUE_SIZE
            ))
        })?;
    let key = String::from_utf8(key.to_vec()).map_err(|_| malformed())?;

    Ok(ValueHeader {
        key,
        flags,
        len,
        cas_id,
    })
}

/// Read exactly `len` payload bytes plus the trailing CRLF
fn read_data_block<R: Read>(reader: &mut R, len: usize) -> Result<Bytes> {
    let mut data = BytesMut::zeroed(len + CRLF.len());
    reader.read_exact(&mut data)?;
    if &data[len..] != CRLF {
        return Err(MemcacheError::protocol("data block not terminated by CRLF"));
    }
    data.truncate(len);
    Ok(data.freeze())
}

/// `DELETED` | `NOT_FOUND`
pub fn read_delete_reply<R: BufRead>(reader: &mut R, line: &mut Vec<u8>) -> Result<()> {
    read_line(reader, line)?;
    match Status::from_line(line) {
        Some(Status::Deleted) => Ok(()),
        Some(Status::NotFound) => Err(MemcacheError::CacheMiss),
        _ => Err(unexpected(line)),
    }
}

/// `TOUCHED` | `NOT_FOUND`
pub fn read_touch_reply<R: BufRead>(reader: &mut R, line: &mut Vec<u8>) -> Result<()> {
    read_line(reader, line)?;
    match Status::from_line(line) {
        Some(Status::Touched) => Ok(()),
        Some(Status::NotFound) => Err(MemcacheError::CacheMiss),
        _ => Err(unexpected(line)),
    }
}

/// New counter value | `NOT_FOUND` | `CLIENT_ERROR ...`
pub fn read_arith_reply<R: BufRead>(reader: &mut R, line: &mut Vec<u8>) -> Result<u64> {
    read_line(reader, line)?;
    if Status::from_line(line) == Some(Status::NotFound) {
        return Err(MemcacheError::CacheMiss);
    }
    if let Some(err) = error_from_line(line) {
        return Err(err);
    }
    parse_u64(line)
}

/// `STAT <name> <value>` lines up to `END`
pub fn read_stats<R: BufRead>(reader: &mut R, line: &mut Vec<u8>) -> Result<Stats> {
    let mut stats = Stats::new();
    loop {
        read_line(reader, line)?;
        let current: &[u8] = line.as_slice();
        if Status::from_line(current) == Some(Status::End) {
            return Ok(stats);
        }
        let rest = current
            .strip_prefix(b"STAT ")
            .ok_or_else(|| unexpected(current))?;
        let mut parts = rest.splitn(2, |&b| b == b' ');
        let name = parts.next().filter(|name| !name.is_empty()).ok_or_else(|| {
            MemcacheError::protocol(format!(
                "malformed STAT line: {:?}",
                String::from_utf8_lossy(current)
            ))
        })?;
        let value = parts.next().unwrap_or(&[]);
        stats.insert(
            String::from_utf8_lossy(name).into_owned(),
            String::from_utf8_lossy(value).into_owned(),
        );
    }
}

/// `OK`
pub fn read_ok_reply<R: BufRead>(reader: &mut R, line: &mut Vec<u8>) -> Result<()> {
    read_line(reader, line)?;
    match Status::from_line(line) {
        Some(Status::Ok) => Ok(()),
        _ => Err(unexpected(line)),
    }
}

/// `VERSION <version>`
pub fn read_version<R: BufRead>(reader: &mut R, line: &mut Vec<u8>) -> Result<String> {
    read_line(reader, line)?;
    match line.strip_prefix(b"VERSION ") {
        Some(version) => Ok(String::from_utf8_lossy(version).into_owned()),
        None => Err(unexpected(line)),
    }
}

/// Strict unsigned decimal: digits only, no sign, no padding, no overflow
pub fn parse_u64(field: &[u8]) -> Result<u64> {
    let invalid = || {
        MemcacheError::protocol(format!(
            "invalid decimal field: {:?}",
            String::from_utf8_lossy(field)
        ))
    };
    if field.is_empty() {
        return Err(invalid());
    }
    field
        .iter()
        .try_fold(0u64, |acc, &b| {
            if !b.is_ascii_digit() {
                return None;
            }
            acc.checked_mul(10)?.checked_add(u64::from(b - b'0'))
        })
        .ok_or_else(invalid)
}

fn parse_u32(field: &[u8]) -> Result<u32> {
    let n = parse_u64(field)?;
    u32::try_from(n).map_err(|_| MemcacheError::protocol(format!("flags out of range: {}", n)))
}

/// Server error lines become their error kind; anything else is a grammar
/// violation.
fn unexpected(line: &[u8]) -> MemcacheError {
    error_from_line(line).unwrap_or_else(|| {
        MemcacheError::protocol(format!(
            "unexpected reply: {:?}",
            String::from_utf8_lossy(line)
        ))
    })
}
