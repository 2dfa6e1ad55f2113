//! Client Module
//!
//! Orchestrates the selector, the per-address pools and the codec.
//!
//! ## Operation template
//! validate key → pick server → acquire connection → exchange →
//! release (success or well-formed negative reply) / discard (I/O or framing
//! failure) → typed result
//!
//! ## Fan-out
//! `get_multi` and `stats` run one scoped thread per distinct server and join
//! all of them before returning, so a slow server delays but never hides the
//! results of the others.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::Config;
use crate::error::{MemcacheError, Result};
use crate::item::{legal_key, Item};
use crate::network::{Connection, ConnectionPool, ServerAddr};
use crate::protocol::{Stats, StorageVerb};
use crate::selector::{ServerList, ServerSelector};

/// Per-server outcome of a `stats` broadcast
pub type ServerStats = HashMap<ServerAddr, Result<Stats>>;

/// The memcached operation set.
///
/// [`Client`] is the real implementation; anything else implementing this
/// trait (an in-memory double, a recording wrapper) can stand in for it.
pub trait Memcache: Send + Sync {
    /// Fetch one item. A miss is `CacheMiss`.
    fn get(&self, key: &str) -> Result<Item>;

    /// Fetch many items at once. Misses are simply absent from the map.
    fn get_multi(&self, keys: &[&str]) -> Result<HashMap<String, Item>>;

    /// Store unconditionally.
    fn set(&self, item: &Item) -> Result<()>;

    /// Store only if the key does not exist yet, else `NotStored`.
    fn add(&self, item: &Item) -> Result<()>;

    /// Store only if the key already exists, else `NotStored`.
    fn replace(&self, item: &Item) -> Result<()>;

    /// Append to an existing value, else `NotStored`. Flags and expiration
    /// of the item are ignored by the server.
    fn append(&self, item: &Item) -> Result<()>;

    /// Prepend to an existing value, else `NotStored`.
    fn prepend(&self, item: &Item) -> Result<()>;

    /// Store only if the value is unchanged since `item` was fetched.
    /// `CasConflict` if it changed, `CacheMiss` if it is gone.
    fn compare_and_swap(&self, item: &Item) -> Result<()>;

    fn delete(&self, key: &str) -> Result<()>;

    /// Add `delta` to a decimal counter; wraps at 64 bits on the server.
    fn increment(&self, key: &str, delta: u64) -> Result<u64>;

    /// Subtract `delta` from a decimal counter; floors at 0 on the server.
    fn decrement(&self, key: &str, delta: u64) -> Result<u64>;

    /// Reset the expiration of an existing key.
    fn touch(&self, key: &str, seconds: i32) -> Result<()>;

    /// Statistics of every server, keyed by address.
    fn stats(&self) -> Result<ServerStats>;

    /// Invalidate every item on every server.
    fn flush_all(&self) -> Result<()>;

    /// Check that every server answers.
    fn ping(&self) -> Result<()>;
}

/// Memcached client, safe to share between threads
///
/// ## Concurrency:
/// - `pools`: RwLock around the address → pool map, written once per new address
/// - Each pool guards its own freelist; no lock is held across network I/O
pub struct Client {
    /// Key → server routing
    selector: Box<dyn ServerSelector>,

    /// One pool per address seen so far
    pools: RwLock<HashMap<ServerAddr, Arc<ConnectionPool>>>,

    config: Config,
}

impl Client {
    /// Client for `servers` with default settings
    pub fn new<S: AsRef<str>>(servers: &[S]) -> Result<Self> {
        let config = Config::builder()
            .servers(servers.iter().map(|s| s.as_ref().to_string()))
            .build();
        Self::with_config(config)
    }

    /// Client for `config.servers`, routed by [`ServerList`]
    pub fn with_config(config: Config) -> Result<Self> {
        let selector = ServerList::new(&config.servers)?;
        Ok(Self::with_selector(config, selector))
    }

    /// Client with custom routing. `config.servers` is ignored.
    pub fn with_selector(config: Config, selector: impl ServerSelector + 'static) -> Self {
        Self {
            selector: Box::new(selector),
            pools: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Idle connections currently pooled for `addr`
    pub fn idle_connections(&self, addr: &ServerAddr) -> usize {
        self.pools
            .read()
            .get(addr)
            .map(|pool| pool.idle_count())
            .unwrap_or(0)
    }

    // =========================================================================
    // Internal Helpers
    // =========================================================================

    fn pool(&self, addr: &ServerAddr) -> Arc<ConnectionPool> {
        if let Some(pool) = self.pools.read().get(addr) {
            return Arc::clone(pool);
        }

        let mut pools = self.pools.write();
        let pool = pools.entry(addr.clone()).or_insert_with(|| {
            Arc::new(ConnectionPool::new(
                addr.clone(),
                self.config.effective_max_idle(),
                self.config.effective_connect_timeout(),
                self.config.effective_io_timeout(),
            ))
        });
        Arc::clone(pool)
    }

    /// Run one exchange on a pooled connection to `addr`
    fn with_addr_conn<T, F>(&self, addr: &ServerAddr, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut pooled = self.pool(addr).acquire()?;
        let result = f(pooled.conn());
        pooled.finish(result)
    }

    /// Validate `key`, route it, and run one exchange on its server
    fn with_key_conn<T, F>(&self, key: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        if !legal_key(key) {
            return Err(MemcacheError::MalformedKey);
        }
        let addr = self.selector.pick_server(key)?;
        self.with_addr_conn(&addr, f)
    }

    fn store(&self, verb: StorageVerb, item: &Item) -> Result<()> {
        self.with_key_conn(&item.key, |conn| conn.store(verb, item))
    }

    fn servers(&self) -> Result<Vec<ServerAddr>> {
        let mut addrs = Vec::new();
        self.selector.each(&mut |addr| {
            addrs.push(addr.clone());
            Ok(())
        })?;
        if addrs.is_empty() {
            return Err(MemcacheError::NoServers);
        }
        Ok(addrs)
    }
}

/// Run `f` once per job, one scoped thread per job, and collect every outcome.
///
/// A single job runs inline. A panic in a worker is re-raised on the caller.
fn fan_out<J, T, F>(jobs: Vec<(ServerAddr, J)>, f: F) -> Vec<(ServerAddr, Result<T>)>
where
    J: Send,
    T: Send,
    F: Fn(&ServerAddr, J) -> Result<T> + Sync,
{
    if jobs.len() <= 1 {
        return jobs
            .into_iter()
            .map(|(addr, job)| {
                let outcome = f(&addr, job);
                (addr, outcome)
            })
            .collect();
    }

    let f = &f;
    crossbeam::thread::scope(|s| {
        let handles: Vec<_> = jobs
            .into_iter()
            .map(|(addr, job)| {
                s.spawn(move |_| {
                    let outcome = f(&addr, job);
                    (addr, outcome)
                })
            })
            .collect();

        let outcomes: Vec<_> = handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect();
        outcomes
    })
    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
}

impl Memcache for Client {
    fn get(&self, key: &str) -> Result<Item> {
        let mut found = None;
        self.with_key_conn(key, |conn| {
            conn.gets(&[key], |item| {
                if item.key == key {
                    found = Some(item);
                }
            })
        })?;
        found.ok_or(MemcacheError::CacheMiss)
    }

    fn get_multi(&self, keys: &[&str]) -> Result<HashMap<String, Item>> {
        // Validate and route everything before touching the network
        let mut batches: HashMap<ServerAddr, Vec<&str>> = HashMap::new();
        let mut seen = HashSet::with_capacity(keys.len());
        for &key in keys {
            if !legal_key(key) {
                return Err(MemcacheError::MalformedKey);
            }
            let addr = self.selector.pick_server(key)?;
            if seen.insert(key) {
                batches.entry(addr).or_default().push(key);
            }
        }

        let outcomes = fan_out(batches.into_iter().collect(), |addr, batch: Vec<&str>| {
            let mut items = Vec::with_capacity(batch.len());
            self.with_addr_conn(addr, |conn| conn.gets(&batch, |item| items.push(item)))?;
            Ok(items)
        });

        let mut found = HashMap::with_capacity(keys.len());
        let mut first_err = None;
        for (addr, outcome) in outcomes {
            match outcome {
                Ok(items) => {
                    found.extend(items.into_iter().map(|item| (item.key.clone(), item)));
                }
                Err(e) => {
                    tracing::warn!("get_multi: server {} failed: {}", addr, e);
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
            }
        }

        match first_err {
            Some(e) if self.config.strict_get_multi => Err(e),
            _ => Ok(found),
        }
    }

    fn set(&self, item: &Item) -> Result<()> {
        self.store(StorageVerb::Set, item)
    }

    fn add(&self, item: &Item) -> Result<()> {
        self.store(StorageVerb::Add, item)
    }

    fn replace(&self, item: &Item) -> Result<()> {
        self.store(StorageVerb::Replace, item)
    }

    fn append(&self, item: &Item) -> Result<()> {
        self.store(StorageVerb::Append, item)
    }

    fn prepend(&self, item: &Item) -> Result<()> {
        self.store(StorageVerb::Prepend, item)
    }

    fn compare_and_swap(&self, item: &Item) -> Result<()> {
        if item.cas_id.is_none() {
            return Err(MemcacheError::Client("missing cas id".to_string()));
        }
        self.store(StorageVerb::Cas, item)
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.with_key_conn(key, |conn| conn.delete(key))
    }

    fn increment(&self, key: &str, delta: u64) -> Result<u64> {
        self.with_key_conn(key, |conn| conn.incr(key, delta))
    }

    fn decrement(&self, key: &str, delta: u64) -> Result<u64> {
        self.with_key_conn(key, |conn| conn.decr(key, delta))
    }

    fn touch(&self, key: &str, seconds: i32) -> Result<()> {
        self.with_key_conn(key, |conn| conn.touch(key, seconds))
    }

    fn stats(&self) -> Result<ServerStats> {
        let jobs = self.servers()?.into_iter().map(|addr| (addr, ())).collect();
        let outcomes = fan_out(jobs, |addr, ()| self.with_addr_conn(addr, Connection::stats));

        if outcomes.iter().all(|(_, outcome)| outcome.is_err()) {
            if let Some((addr, Err(e))) = outcomes.into_iter().next() {
                tracing::warn!("stats: every server failed, first was {}", addr);
                return Err(e);
            }
            return Err(MemcacheError::NoServers);
        }

        Ok(outcomes.into_iter().collect())
    }

    fn flush_all(&self) -> Result<()> {
        self.selector
            .each(&mut |addr| self.with_addr_conn(addr, Connection::flush_all))
    }

    fn ping(&self) -> Result<()> {
        self.selector.each(&mut |addr| {
            let version = self.with_addr_conn(addr, Connection::version)?;
            tracing::trace!("{} is running memcached {}", addr, version);
            Ok(())
        })
    }
}
