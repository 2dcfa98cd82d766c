//! Shared key-value storage.
//!
//! All durable KB state lives in a shared store so that every service
//! replica sees the same view. The [`KvStore`] trait is the contract the
//! core consumes: single-key reads and writes plus a cursor-based prefix
//! scan. [`RedisStore`] is the production implementation; [`MemoryStore`]
//! backs tests and local development.

pub mod status;

use std::collections::BTreeMap;

use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::sync::RwLock;

use crate::error::KbResult;

/// Contract for the shared key-value store.
///
/// Values are strings; structured values are serialized by the caller.
/// There are no multi-key transactions; every mutation is a single-key
/// write.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> KbResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> KbResult<()>;
    async fn delete(&self, key: &str) -> KbResult<()>;
    async fn exists(&self, key: &str) -> KbResult<bool>;
    /// All keys matching a glob pattern (`*` wildcards only).
    async fn scan(&self, pattern: &str) -> KbResult<Vec<String>>;
}

/// Redis-backed store. Cluster-mode timeouts and retries are the client's
/// concern; connection loss surfaces as `StoreUnavailable`.
pub struct RedisStore {
    manager: redis::aio::ConnectionManager,
}

impl RedisStore {
    /// Connect and verify the server responds before returning.
    pub async fn connect(url: &str) -> KbResult<Self> {
        let client = redis::Client::open(url)?;
        let mut manager = client.get_connection_manager().await?;
        let _: () = redis::cmd("PING").query_async(&mut manager).await?;
        tracing::info!(url = %url, "Connected to key-value store");
        Ok(Self { manager })
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> KbResult<Option<String>> {
        let mut conn = self.manager.clone();
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str) -> KbResult<()> {
        let mut conn = self.manager.clone();
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> KbResult<()> {
        let mut conn = self.manager.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> KbResult<bool> {
        let mut conn = self.manager.clone();
        Ok(conn.exists(key).await?)
    }

    async fn scan(&self, pattern: &str) -> KbResult<Vec<String>> {
        let mut conn = self.manager.clone();
        let mut iter = conn.scan_match::<_, String>(pattern).await?;
        let mut keys = Vec::new();
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }
}

/// In-process store with the same contract, for tests and local runs.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> KbResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> KbResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> KbResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> KbResult<bool> {
        Ok(self.entries.read().await.contains_key(key))
    }

    async fn scan(&self, pattern: &str) -> KbResult<Vec<String>> {
        Ok(self
            .entries
            .read()
            .await
            .keys()
            .filter(|k| glob_match(pattern, k))
            .cloned()
            .collect())
    }
}

/// Match a key against a glob pattern supporting only `*` wildcards.
fn glob_match(pattern: &str, key: &str) -> bool {
    let mut remaining = key;
    let mut parts = pattern.split('*').peekable();

    // The first segment is anchored at the start.
    if let Some(first) = parts.next() {
        if !remaining.starts_with(first) {
            return false;
        }
        remaining = &remaining[first.len()..];
        if parts.peek().is_none() {
            // No wildcard at all: must match exactly.
            return remaining.is_empty();
        }
    }

    while let Some(part) = parts.next() {
        if parts.peek().is_none() {
            // Last segment is anchored at the end.
            return part.is_empty() || remaining.ends_with(part);
        }
        if part.is_empty() {
            continue;
        }
        match remaining.find(part) {
            Some(pos) => remaining = &remaining[pos + part.len()..],
            None => return false,
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_matches_status_patterns() {
        assert!(glob_match("kb:ws1:*:status", "kb:ws1:k1:status"));
        assert!(glob_match("kb:*:*:docs", "kb:ws1:k1:docs"));
        assert!(glob_match("kb:*:k1:docs", "kb:ws2:k1:docs"));
        assert!(!glob_match("kb:ws1:*:status", "kb:ws2:k1:status"));
        assert!(!glob_match("kb:ws1:*:status", "kb:ws1:k1:docs"));
        assert!(!glob_match("kb:ws1:k1:status", "kb:ws1:k1:docs"));
        assert!(glob_match("kb:ws1:k1:status", "kb:ws1:k1:status"));
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryStore::new();
        store.set("kb:ws1:k1:status", "running").await.unwrap();
        assert_eq!(
            store.get("kb:ws1:k1:status").await.unwrap().as_deref(),
            Some("running")
        );
        assert!(store.exists("kb:ws1:k1:status").await.unwrap());

        store.delete("kb:ws1:k1:status").await.unwrap();
        assert!(!store.exists("kb:ws1:k1:status").await.unwrap());
        assert_eq!(store.get("kb:ws1:k1:status").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_store_scan_filters_by_pattern() {
        let store = MemoryStore::new();
        store.set("kb:ws1:k1:status", "running").await.unwrap();
        store.set("kb:ws1:k2:status", "disabled").await.unwrap();
        store.set("kb:ws2:k3:status", "running").await.unwrap();
        store.set("kb:ws1:k1:docs", "[]").await.unwrap();

        let keys = store.scan("kb:ws1:*:status").await.unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&"kb:ws1:k1:status".to_string()));
        assert!(keys.contains(&"kb:ws1:k2:status".to_string()));
    }
}
