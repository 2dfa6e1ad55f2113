//! Tests for Client
//!
//! These tests verify:
//! - Single-key operations against one server
//! - Negative replies surfaced as distinct error kinds
//! - Multi-server routing and the get_multi fan-out
//! - Stats broadcast with per-server failures
//! - Unix-domain socket transport
//! - Concurrent use of one shared client

#[path = "../common/mod.rs"]
mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{dead_tcp_addr, init_tracing, FakeMemcached};
use memcachekv::{
    Client, Config, Item, Memcache, MemcacheError, ServerAddr, ServerList, ServerSelector,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_single() -> (FakeMemcached, Client) {
    init_tracing();
    let server = FakeMemcached::start();
    let client = Client::new(&[server.addr()]).unwrap();
    (server, client)
}

fn setup_pair() -> (FakeMemcached, FakeMemcached, Client) {
    init_tracing();
    let first = FakeMemcached::start();
    let second = FakeMemcached::start();
    let client = Client::new(&[first.addr(), second.addr()]).unwrap();
    (first, second, client)
}

fn addr_of(server: &FakeMemcached) -> ServerAddr {
    ServerAddr::parse(server.addr()).unwrap()
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_set_then_get() {
    let (_server, client) = setup_single();

    let foo = Item::new("foo", "fooval").with_flags(123);
    client.set(&foo).unwrap();

    let item = client.get("foo").unwrap();
    assert_eq!(item.key, "foo");
    assert_eq!(item.value.as_ref(), b"fooval");
    assert_eq!(item.flags, 123);
    assert!(item.cas_id.is_some());
}

#[test]
fn test_set_is_repeatable() {
    let (server, client) = setup_single();

    let foo = Item::new("foo", "fooval").with_flags(123);
    client.set(&foo).unwrap();
    client.set(&foo).unwrap();

    // The caller's item is left untouched
    assert_eq!(foo, Item::new("foo", "fooval").with_flags(123));
    assert_eq!(server.entry("foo").unwrap().value, b"fooval");
}

#[test]
fn test_get_missing_is_cache_miss() {
    let (_server, client) = setup_single();

    assert!(matches!(client.get("nope"), Err(MemcacheError::CacheMiss)));
}

#[test]
fn test_binary_value_roundtrip() {
    let (_server, client) = setup_single();

    let value: Vec<u8> = (0..=255).chain(b"\r\nEND\r\n".iter().copied()).collect();
    client.set(&Item::new("blob", value.clone())).unwrap();

    let item = client.get("blob").unwrap();
    assert_eq!(item.value.as_ref(), value.as_slice());
}

#[test]
fn test_empty_value_roundtrip() {
    let (_server, client) = setup_single();

    client.set(&Item::new("empty", Vec::<u8>::new())).unwrap();
    assert!(client.get("empty").unwrap().value.is_empty());
}

#[test]
fn test_add_only_when_absent() {
    let (_server, client) = setup_single();

    let bar = Item::new("bar", "barval");
    client.add(&bar).unwrap();
    assert!(matches!(client.add(&bar), Err(MemcacheError::NotStored)));
}

#[test]
fn test_replace_only_when_present() {
    let (_server, client) = setup_single();

    let item = Item::new("color", "red");
    assert!(matches!(client.replace(&item), Err(MemcacheError::NotStored)));

    client.set(&item).unwrap();
    client.replace(&Item::new("color", "blue")).unwrap();
    assert_eq!(client.get("color").unwrap().value.as_ref(), b"blue");
}

#[test]
fn test_append_and_prepend() {
    let (_server, client) = setup_single();

    assert!(matches!(
        client.append(&Item::new("list", "x")),
        Err(MemcacheError::NotStored)
    ));

    client.set(&Item::new("list", "b")).unwrap();
    client.append(&Item::new("list", "c")).unwrap();
    client.prepend(&Item::new("list", "a")).unwrap();
    assert_eq!(client.get("list").unwrap().value.as_ref(), b"abc");
}

#[test]
fn test_delete_then_get_is_miss() {
    let (_server, client) = setup_single();

    client.set(&Item::new("foo", "fooval")).unwrap();
    client.delete("foo").unwrap();
    assert!(matches!(client.get("foo"), Err(MemcacheError::CacheMiss)));
    assert!(matches!(client.delete("foo"), Err(MemcacheError::CacheMiss)));
}

#[test]
fn test_touch() {
    let (_server, client) = setup_single();

    assert!(matches!(client.touch("foo", 60), Err(MemcacheError::CacheMiss)));
    client.set(&Item::new("foo", "fooval")).unwrap();
    client.touch("foo", 60).unwrap();
}

// =============================================================================
// Counter Tests
// =============================================================================

#[test]
fn test_increment_decrement_sequence() {
    let (_server, client) = setup_single();

    client.set(&Item::new("num", "42")).unwrap();
    assert_eq!(client.increment("num", 8).unwrap(), 50);
    assert_eq!(client.decrement("num", 49).unwrap(), 1);

    client.delete("num").unwrap();
    assert!(matches!(client.increment("num", 1), Err(MemcacheError::CacheMiss)));
    assert!(matches!(client.decrement("num", 1), Err(MemcacheError::CacheMiss)));
}

#[test]
fn test_decrement_floors_at_zero() {
    let (_server, client) = setup_single();

    client.set(&Item::new("num", "3")).unwrap();
    assert_eq!(client.decrement("num", 10).unwrap(), 0);
}

#[test]
fn test_increment_non_numeric_is_client_error() {
    let (server, client) = setup_single();

    client.set(&Item::new("num", "not-numeric")).unwrap();
    let err = client.increment("num", 1).unwrap_err();
    assert!(matches!(err, MemcacheError::Client(_)));
    assert!(err.to_string().contains("client error"));
    assert!(err.to_string().contains("non-numeric"));

    // A CLIENT_ERROR line is a complete reply, the connection stays pooled
    assert_eq!(client.idle_connections(&addr_of(&server)), 1);
}

// =============================================================================
// Compare-And-Swap Tests
// =============================================================================

#[test]
fn test_compare_and_swap() {
    let (_server, client) = setup_single();

    client.set(&Item::new("doc", "v1")).unwrap();
    let mut fetched = client.get("doc").unwrap();
    let stale = fetched.clone();

    fetched.value = "v2".into();
    client.compare_and_swap(&fetched).unwrap();
    assert_eq!(client.get("doc").unwrap().value.as_ref(), b"v2");

    // The token from before the swap no longer matches
    assert!(matches!(
        client.compare_and_swap(&stale),
        Err(MemcacheError::CasConflict)
    ));

    client.delete("doc").unwrap();
    assert!(matches!(
        client.compare_and_swap(&fetched),
        Err(MemcacheError::CacheMiss)
    ));
}

#[test]
fn test_compare_and_swap_requires_token() {
    let (server, client) = setup_single();

    let err = client.compare_and_swap(&Item::new("doc", "v1")).unwrap_err();
    assert!(matches!(err, MemcacheError::Client(_)));
    assert_eq!(server.connections_accepted(), 0);
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_malformed_keys_never_reach_the_network() {
    let (server, client) = setup_single();

    let long_key = "k".repeat(251);
    for key in ["", "has space", "new\nline", long_key.as_str()] {
        assert!(matches!(client.get(key), Err(MemcacheError::MalformedKey)));
        assert!(matches!(
            client.set(&Item::new(key, "v")),
            Err(MemcacheError::MalformedKey)
        ));
        assert!(matches!(client.delete(key), Err(MemcacheError::MalformedKey)));
        assert!(matches!(client.increment(key, 1), Err(MemcacheError::MalformedKey)));
    }

    assert_eq!(server.connections_accepted(), 0);
}

#[test]
fn test_no_servers() {
    let client = Client::new::<&str>(&[]).unwrap();

    assert!(matches!(client.get("foo"), Err(MemcacheError::NoServers)));
    assert!(matches!(
        client.set(&Item::new("foo", "v")),
        Err(MemcacheError::NoServers)
    ));
    assert!(matches!(client.get_multi(&["foo"]), Err(MemcacheError::NoServers)));
    assert!(matches!(client.stats(), Err(MemcacheError::NoServers)));
}

#[test]
fn test_invalid_server_address() {
    match Client::new(&["alksdjasld"]) {
        Err(MemcacheError::InvalidAddress(_)) => {}
        Err(e) => panic!("Expected InvalidAddress, got {}", e),
        Ok(_) => panic!("Expected client construction to fail"),
    }
}

#[test]
fn test_unreachable_server_is_connection_failure() {
    let client = Client::new(&[dead_tcp_addr()]).unwrap();

    let err = client.get("foo").unwrap_err();
    assert!(matches!(err, MemcacheError::Connection(_)));
    assert!(!err.is_resumable());
}

#[test]
fn test_read_timeout_is_connection_failure() {
    init_tracing();
    let server = FakeMemcached::start();
    server.set_delay(Duration::from_millis(300));

    let config = Config::builder()
        .server(server.addr())
        .io_timeout(Duration::from_millis(50))
        .build();
    let client = Client::with_config(config).unwrap();

    assert!(matches!(client.get("foo"), Err(MemcacheError::Connection(_))));
    assert_eq!(client.idle_connections(&addr_of(&server)), 0);
}

// =============================================================================
// Multi-Server Tests
// =============================================================================

#[test]
fn test_get_multi_across_two_servers() {
    let (first, second, client) = setup_pair();

    client.set(&Item::new("foo", "fooval").with_flags(123)).unwrap();
    client.set(&Item::new("bar", "barval")).unwrap();

    // crc32("foo") is odd and crc32("bar") is even, so they live apart
    assert!(first.entry("bar").is_some());
    assert!(second.entry("foo").is_some());

    let items = client.get_multi(&["foo", "bar"]).unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items["foo"].value.as_ref(), b"fooval");
    assert_eq!(items["foo"].flags, 123);
    assert_eq!(items["bar"].value.as_ref(), b"barval");
    assert_eq!(items["bar"].flags, 0);
}

#[test]
fn test_get_multi_omits_misses_and_dedups() {
    let (first, second, client) = setup_pair();

    client.set(&Item::new("foo", "fooval")).unwrap();
    let before = first.requests_served() + second.requests_served();

    let items = client.get_multi(&["foo", "missing", "foo"]).unwrap();
    assert_eq!(items.len(), 1);
    assert!(items.contains_key("foo"));

    // One request per server that owns at least one key
    let list = ServerList::new(&[first.addr(), second.addr()]).unwrap();
    let servers_hit: HashSet<_> = ["foo", "missing"]
        .into_iter()
        .map(|key| list.pick_server(key).unwrap())
        .collect();
    let after = first.requests_served() + second.requests_served();
    assert_eq!(after - before, servers_hit.len());
}

#[test]
fn test_get_multi_empty_input() {
    let (_first, _second, client) = setup_pair();
    assert!(client.get_multi(&[]).unwrap().is_empty());
}

#[test]
fn test_get_multi_malformed_key_aborts() {
    let (first, second, client) = setup_pair();

    let result = client.get_multi(&["foo", "bad key"]);
    assert!(matches!(result, Err(MemcacheError::MalformedKey)));
    assert_eq!(first.connections_accepted() + second.connections_accepted(), 0);
}

#[test]
fn test_get_multi_drops_failed_server_keys() {
    init_tracing();
    let live = FakeMemcached::start();
    // "bar" routes to index 0 (live), "foo" to index 1 (dead)
    let client = Client::new(&[live.addr().to_string(), dead_tcp_addr()]).unwrap();

    client.set(&Item::new("bar", "barval")).unwrap();
    let items = client.get_multi(&["foo", "bar"]).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items["bar"].value.as_ref(), b"barval");
}

#[test]
fn test_get_multi_strict_reports_failed_server() {
    init_tracing();
    let live = FakeMemcached::start();
    let config = Config::builder()
        .server(live.addr())
        .server(dead_tcp_addr())
        .strict_get_multi(true)
        .build();
    let client = Client::with_config(config).unwrap();

    client.set(&Item::new("bar", "barval")).unwrap();
    assert!(matches!(
        client.get_multi(&["foo", "bar"]),
        Err(MemcacheError::Connection(_))
    ));
}

// =============================================================================
// Broadcast Tests
// =============================================================================

#[test]
fn test_stats_per_server() {
    let (first, second, client) = setup_pair();

    let stats = client.stats().unwrap();
    assert_eq!(stats.len(), 2);
    for server in [&first, &second] {
        let server_stats = stats[&addr_of(server)].as_ref().unwrap();
        assert_eq!(server_stats["pid"], "4242");
        assert_eq!(server_stats["version"], "1.6.0-fake");
    }
}

#[test]
fn test_stats_empty_is_not_an_error() {
    let (server, client) = setup_single();
    server.set_empty_stats(true);

    let stats = client.stats().unwrap();
    assert!(stats[&addr_of(&server)].as_ref().unwrap().is_empty());
}

#[test]
fn test_stats_records_unreachable_server() {
    init_tracing();
    let live = FakeMemcached::start();
    let dead = dead_tcp_addr();
    let client = Client::new(&[live.addr().to_string(), dead.clone()]).unwrap();

    let stats = client.stats().unwrap();
    assert!(stats[&addr_of(&live)].is_ok());
    assert!(matches!(
        stats[&ServerAddr::parse(&dead).unwrap()],
        Err(MemcacheError::Connection(_))
    ));
}

#[test]
fn test_stats_all_unreachable_fails() {
    let client = Client::new(&[dead_tcp_addr(), dead_tcp_addr()]).unwrap();
    assert!(matches!(client.stats(), Err(MemcacheError::Connection(_))));
}

#[test]
fn test_flush_all_and_ping() {
    let (first, second, client) = setup_pair();

    client.set(&Item::new("foo", "fooval")).unwrap();
    client.set(&Item::new("bar", "barval")).unwrap();
    client.ping().unwrap();

    client.flush_all().unwrap();
    assert_eq!(first.item_count() + second.item_count(), 0);
    assert!(matches!(client.get("foo"), Err(MemcacheError::CacheMiss)));
}

// =============================================================================
// Transport Tests
// =============================================================================

#[test]
fn test_unix_socket() {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let sock = temp_dir.path().join("memcached.sock");
    let server = FakeMemcached::start_unix(&sock);

    let client = Client::new(&[server.addr()]).unwrap();
    client.set(&Item::new("foo", "fooval").with_flags(7)).unwrap();

    let item = client.get("foo").unwrap();
    assert_eq!(item.value.as_ref(), b"fooval");
    assert_eq!(item.flags, 7);
    assert_eq!(client.idle_connections(&ServerAddr::Unix(sock)), 1);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_callers_share_one_client() {
    let (first, second, client) = setup_pair();
    let client = Arc::new(client);

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let client = Arc::clone(&client);
            thread::spawn(move || {
                for i in 0..50 {
                    let key = format!("key-{}-{}", t, i);
                    let value = format!("value-{}-{}", t, i);
                    client.set(&Item::new(key.as_str(), value.clone())).unwrap();
                    assert_eq!(client.get(&key).unwrap().value.as_ref(), value.as_bytes());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(first.item_count() + second.item_count(), 400);
    // Freelists never grow past their cap
    let max_idle = client.config().max_idle_conns;
    assert!(client.idle_connections(&addr_of(&first)) <= max_idle);
    assert!(client.idle_connections(&addr_of(&second)) <= max_idle);
}

#[test]
fn test_connections_are_reused() {
    let (server, client) = setup_single();

    for i in 0..20 {
        client.set(&Item::new("foo", format!("v{}", i))).unwrap();
    }
    assert_eq!(server.connections_accepted(), 1);
}

// =============================================================================
// Capability Trait Tests
// =============================================================================

fn remember(cache: &dyn Memcache, key: &str, value: &str) -> memcachekv::Result<String> {
    match cache.get(key) {
        Ok(item) => Ok(String::from_utf8_lossy(&item.value).into_owned()),
        Err(MemcacheError::CacheMiss) => {
            cache.set(&Item::new(key, value.to_string()))?;
            Ok(value.to_string())
        }
        Err(e) => Err(e),
    }
}

#[test]
fn test_client_as_trait_object() {
    let (server, client) = setup_single();

    assert_eq!(remember(&client, "greeting", "hello").unwrap(), "hello");
    assert_eq!(remember(&client, "greeting", "ignored").unwrap(), "hello");
    assert_eq!(server.entry("greeting").unwrap().value, b"hello");
}
