//! Server Connection
//!
//! One buffered duplex stream to a single server, and the request/reply
//! exchange for each command family.

use std::io::{self, BufReader, BufWriter, Read, Write};
use std::net::TcpStream;
#[cfg(unix)]
use std::os::unix::net::UnixStream;
use std::time::Duration;

use bytes::BytesMut;

use super::ServerAddr;
use crate::error::Result;
use crate::item::Item;
use crate::protocol::{self, Command, Stats, StorageVerb};

/// TCP or Unix-domain stream
#[derive(Debug)]
enum Stream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Stream {
    fn connect(addr: &ServerAddr, connect_timeout: Duration) -> Result<Self> {
        match addr {
            ServerAddr::Tcp(socket_addr) => {
                let stream = TcpStream::connect_timeout(socket_addr, connect_timeout)?;
                // Disable Nagle's algorithm for low latency
                stream.set_nodelay(true)?;
                Ok(Stream::Tcp(stream))
            }
            #[cfg(unix)]
            ServerAddr::Unix(path) => Ok(Stream::Unix(UnixStream::connect(path)?)),
            #[cfg(not(unix))]
            ServerAddr::Unix(path) => Err(crate::error::MemcacheError::InvalidAddress(format!(
                "unix sockets are not supported on this platform: {}",
                path.display()
            ))),
        }
    }

    fn try_clone(&self) -> io::Result<Self> {
        match self {
            Stream::Tcp(s) => s.try_clone().map(Stream::Tcp),
            #[cfg(unix)]
            Stream::Unix(s) => s.try_clone().map(Stream::Unix),
        }
    }

    fn set_timeouts(&self, timeout: Duration) -> io::Result<()> {
        match self {
            Stream::Tcp(s) => {
                s.set_read_timeout(Some(timeout))?;
                s.set_write_timeout(Some(timeout))
            }
            #[cfg(unix)]
            Stream::Unix(s) => {
                s.set_read_timeout(Some(timeout))?;
                s.set_write_timeout(Some(timeout))
            }
        }
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(s) => s.read(buf),
            #[cfg(unix)]
            Stream::Unix(s) => s.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(s) => s.write(buf),
            #[cfg(unix)]
            Stream::Unix(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::Tcp(s) => s.flush(),
            #[cfg(unix)]
            Stream::Unix(s) => s.flush(),
        }
    }
}

/// A connection to one memcached server
#[derive(Debug)]
pub struct Connection {
    /// Stream reader (buffered for line reads)
    reader: BufReader<Stream>,

    /// Stream writer (buffered so a request leaves in one flush)
    writer: BufWriter<Stream>,

    /// Reply line scratch buffer, reused across exchanges
    line: Vec<u8>,

    /// Request line scratch buffer, reused across exchanges
    request: BytesMut,

    /// Server address for logging
    addr: ServerAddr,
}

impl Connection {
    /// Dial `addr` and apply the I/O timeout to both directions
    pub fn connect(addr: &ServerAddr, connect_timeout: Duration, io_timeout: Duration) -> Result<Self> {
        let stream = Stream::connect(addr, connect_timeout)?;
        stream.set_timeouts(io_timeout)?;

        // Clone stream for separate read/write handles
        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            line: Vec::with_capacity(128),
            request: BytesMut::with_capacity(256),
            addr: addr.clone(),
        })
    }

    /// Get the server address
    pub fn addr(&self) -> &ServerAddr {
        &self.addr
    }

    fn send(&mut self, command: &Command<'_>) -> Result<()> {
        tracing::trace!("Sending {} to {}", command.name(), self.addr);
        protocol::write_command(&mut self.writer, command, &mut self.request)
    }

    // =========================================================================
    // Exchanges
    // =========================================================================

    pub fn store(&mut self, verb: StorageVerb, item: &Item) -> Result<()> {
        self.send(&Command::Store { verb, item })?;
        protocol::read_storage_reply(&mut self.reader, &mut self.line)
    }

    /// `gets` for every key in one request; hits are passed to `on_item`
    pub fn gets<F: FnMut(Item)>(&mut self, keys: &[&str], on_item: F) -> Result<()> {
        self.send(&Command::Gets { keys })?;
        protocol::read_values(&mut self.reader, &mut self.line, on_item)
    }

    pub fn delete(&mut self, key: &str) -> Result<()> {
        self.send(&Command::Delete { key })?;
        protocol::read_delete_reply(&mut self.reader, &mut self.line)
    }

    pub fn incr(&mut self, key: &str, delta: u64) -> Result<u64> {
        self.send(&Command::Incr { key, delta })?;
        protocol::read_arith_reply(&mut self.reader, &mut self.line)
    }

    pub fn decr(&mut self, key: &str, delta: u64) -> Result<u64> {
        self.send(&Command::Decr { key, delta })?;
        protocol::read_arith_reply(&mut self.reader, &mut self.line)
    }

    pub fn touch(&mut self, key: &str, expiration: i32) -> Result<()> {
        self.send(&Command::Touch { key, expiration })?;
        protocol::read_touch_reply(&mut self.reader, &mut self.line)
    }

    pub fn stats(&mut self) -> Result<Stats> {
        self.send(&Command::Stats)?;
        protocol::read_stats(&mut self.reader, &mut self.line)
    }

    pub fn flush_all(&mut self) -> Result<()> {
        self.send(&Command::FlushAll)?;
        protocol::read_ok_reply(&mut self.reader, &mut self.line)
    }

    pub fn version(&mut self) -> Result<String> {
        self.send(&Command::Version)?;
        protocol::read_version(&mut self.reader, &mut self.line)
    }

    /// Bytes received but not yet consumed by a reply parser
    pub fn buffered_len(&self) -> usize {
        self.reader.buffer().len()
    }
}
