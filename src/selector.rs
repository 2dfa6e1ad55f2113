//! Server Selector
//!
//! Maps a key to the server responsible for it.
//!
//! Routing must be a pure function of (key, server list): the same key has to
//! reach the same server every time or it will not find what it stored.

use crate::error::{MemcacheError, Result};
use crate::network::ServerAddr;

/// Picks a server for a key, and enumerates all servers for broadcasts.
///
/// Implement this to plug in a different sharding scheme.
pub trait ServerSelector: Send + Sync {
    /// Server owning `key`. Fails with `NoServers` on an empty list.
    fn pick_server(&self, key: &str) -> Result<ServerAddr>;

    /// Call `f` once per server, stopping at the first error.
    fn each(&self, f: &mut dyn FnMut(&ServerAddr) -> Result<()>) -> Result<()>;
}

/// Static server list routed by CRC-32 (IEEE) of the key modulo the list
/// length, the scheme gomemcache and most libmemcached "modula" setups use.
#[derive(Debug, Clone, Default)]
pub struct ServerList {
    addrs: Vec<ServerAddr>,
}

impl ServerList {
    /// Parse and resolve every address up front
    pub fn new<S: AsRef<str>>(servers: &[S]) -> Result<Self> {
        let addrs = servers
            .iter()
            .map(|s| ServerAddr::parse(s.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { addrs })
    }

    pub fn from_addrs(addrs: Vec<ServerAddr>) -> Self {
        Self { addrs }
    }

    pub fn addrs(&self) -> &[ServerAddr] {
        &self.addrs
    }

    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }
}

impl ServerSelector for ServerList {
    fn pick_server(&self, key: &str) -> Result<ServerAddr> {
        match self.addrs.len() {
            0 => Err(MemcacheError::NoServers),
            1 => Ok(self.addrs[0].clone()),
            n => {
                let checksum = crc32fast::hash(key.as_bytes());
                Ok(self.addrs[(checksum % n as u32) as usize].clone())
            }
        }
    }

    fn each(&self, f: &mut dyn FnMut(&ServerAddr) -> Result<()>) -> Result<()> {
        for addr in &self.addrs {
            f(addr)?;
        }
        Ok(())
    }
}
