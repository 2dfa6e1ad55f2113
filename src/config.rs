//! Configuration for memcachekv
//!
//! Centralized client configuration with sensible defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default per-address idle connection cap.
pub const DEFAULT_MAX_IDLE_CONNS: usize = 2;

/// Default dial and socket I/O timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Main configuration for a memcachekv [`Client`](crate::Client)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Servers
    // -------------------------------------------------------------------------
    /// Server addresses, `host:port` or a Unix socket path.
    /// An empty list is legal; every operation then fails with `NoServers`.
    pub servers: Vec<String>,

    // -------------------------------------------------------------------------
    // Pool Configuration
    // -------------------------------------------------------------------------
    /// Idle connections kept per address. Extra connections are closed on release.
    pub max_idle_conns: usize,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// Bound on establishing a new connection
    pub connect_timeout: Duration,

    /// Bound on each blocking read or write
    pub io_timeout: Duration,

    // -------------------------------------------------------------------------
    // Multi-get Behaviour
    // -------------------------------------------------------------------------
    /// When set, `get_multi` returns the first per-server failure instead of
    /// dropping that server's keys from the result.
    pub strict_get_multi: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            max_idle_conns: DEFAULT_MAX_IDLE_CONNS,
            connect_timeout: DEFAULT_TIMEOUT,
            io_timeout: DEFAULT_TIMEOUT,
            strict_get_multi: false,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Idle cap with the zero value mapped to the default.
    pub(crate) fn effective_max_idle(&self) -> usize {
        match self.max_idle_conns {
            0 => DEFAULT_MAX_IDLE_CONNS,
            n => n,
        }
    }

    pub(crate) fn effective_connect_timeout(&self) -> Duration {
        non_zero_or_default(self.connect_timeout)
    }

    pub(crate) fn effective_io_timeout(&self) -> Duration {
        non_zero_or_default(self.io_timeout)
    }
}

fn non_zero_or_default(timeout: Duration) -> Duration {
    if timeout.is_zero() {
        DEFAULT_TIMEOUT
    } else {
        timeout
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Append one server address
    pub fn server(mut self, addr: impl Into<String>) -> Self {
        self.config.servers.push(addr.into());
        self
    }

    /// Replace the server list
    pub fn servers<I, S>(mut self, addrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.servers = addrs.into_iter().map(Into::into).collect();
        self
    }

    /// Set the per-address idle connection cap
    pub fn max_idle_conns(mut self, count: usize) -> Self {
        self.config.max_idle_conns = count;
        self
    }

    /// Set the dial timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the read/write timeout
    pub fn io_timeout(mut self, timeout: Duration) -> Self {
        self.config.io_timeout = timeout;
        self
    }

    /// Fail `get_multi` on the first per-server error
    pub fn strict_get_multi(mut self, strict: bool) -> Self {
        self.config.strict_get_multi = strict;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
