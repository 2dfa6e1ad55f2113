//! Server addresses
//!
//! A string containing `/` names a Unix-domain socket; anything else is a
//! `host:port` pair, resolved once when the address is parsed.

use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{MemcacheError, Result};

/// Connection target of one server
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServerAddr {
    Tcp(SocketAddr),
    Unix(PathBuf),
}

impl ServerAddr {
    pub fn parse(addr: &str) -> Result<Self> {
        if addr.contains('/') {
            return Ok(ServerAddr::Unix(PathBuf::from(addr)));
        }

        let mut resolved = addr
            .to_socket_addrs()
            .map_err(|e| MemcacheError::InvalidAddress(format!("{}: {}", addr, e)))?;
        resolved
            .next()
            .map(ServerAddr::Tcp)
            .ok_or_else(|| MemcacheError::InvalidAddress(format!("{}: no addresses found", addr)))
    }
}

impl FromStr for ServerAddr {
    type Err = MemcacheError;

    fn from_str(s: &str) -> Result<Self> {
        ServerAddr::parse(s)
    }
}

impl From<SocketAddr> for ServerAddr {
    fn from(addr: SocketAddr) -> Self {
        ServerAddr::Tcp(addr)
    }
}

impl fmt::Display for ServerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerAddr::Tcp(addr) => write!(f, "{}", addr),
            ServerAddr::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}
