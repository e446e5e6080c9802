//! Handler-facing cache facade for the chat API's read queries.
//!
//! Route handlers hold a [`SessionCache`] and call the typed accessors in
//! place of the data-store fetch: each accessor derives the cache key from
//! its parameters, returns the cached payload on a hit, and otherwise runs
//! the supplied async fetch, caches the result, and returns it. A failed
//! fetch propagates unchanged and caches nothing.
//!
//! Mutation handlers call the invalidation helpers after a successful
//! write:
//!
//! - session create/update/delete → [`SessionCache::invalidate_user_sessions`]
//!   (and [`SessionCache::invalidate_session_permission`] when membership
//!   changed)
//! - message create/update/delete → [`SessionCache::invalidate_message_history`]
//!
//! Forgetting the matching helper leaves readers on stale data until the
//! TTL expires; there is no cross-process invalidation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::keys::{self, CacheKey};
use crate::store::{CacheStats, MemoryCache};

/// A value returned through the cache, tagged with whether it was served
/// from the cache. Handlers use the flag for response headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cached<T> {
    pub value: T,
    pub hit: bool,
}

/// Cache facade over the chat API's three read-heavy query families.
#[derive(Clone)]
pub struct SessionCache {
    store: Arc<MemoryCache>,
    sessions_ttl: Duration,
    messages_ttl: Duration,
    permission_ttl: Duration,
}

impl SessionCache {
    /// Create a facade with its own store, sized and enabled per `config`.
    pub fn new(config: &CacheConfig) -> Self {
        let store = if config.enabled {
            MemoryCache::new(config.max_entries)
        } else {
            MemoryCache::disabled()
        };
        Self::with_store(Arc::new(store), config)
    }

    /// Create a facade over an existing store.
    pub fn with_store(store: Arc<MemoryCache>, config: &CacheConfig) -> Self {
        Self {
            store,
            sessions_ttl: config.sessions_ttl(),
            messages_ttl: config.messages_ttl(),
            permission_ttl: config.permission_ttl(),
        }
    }

    /// The underlying store, for the cleanup task and diagnostics.
    pub fn store(&self) -> Arc<MemoryCache> {
        Arc::clone(&self.store)
    }

    /// One page of a user's session list, cache-aside.
    pub async fn user_sessions<T, E, F, Fut>(
        &self,
        user_id: &str,
        page: u32,
        limit: u32,
        fetch: F,
    ) -> Result<Cached<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = keys::user_sessions(user_id, page, limit);
        self.get_or_fetch(key, self.sessions_ttl, fetch).await
    }

    /// One page of a session's message history, cache-aside.
    pub async fn message_history<T, E, F, Fut>(
        &self,
        session_id: &str,
        page: u32,
        limit: u32,
        fetch: F,
    ) -> Result<Cached<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = keys::message_history(session_id, page, limit);
        self.get_or_fetch(key, self.messages_ttl, fetch).await
    }

    /// Permission check for a (user, session) pair, cache-aside.
    pub async fn session_permission<T, E, F, Fut>(
        &self,
        user_id: &str,
        session_id: &str,
        fetch: F,
    ) -> Result<Cached<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = keys::session_permission(user_id, session_id);
        self.get_or_fetch(key, self.permission_ttl, fetch).await
    }

    /// Drop every cached session-list page for a user. Call after creating,
    /// renaming or deleting one of their sessions. Returns the number of
    /// entries removed.
    pub fn invalidate_user_sessions(&self, user_id: &str) -> usize {
        let removed = self.store.delete_family(&keys::user_sessions_family(user_id));
        tracing::debug!(user_id = %user_id, removed, "invalidated cached session lists");
        removed
    }

    /// Drop every cached message-history page for a session. Call after any
    /// message mutation in it. Returns the number of entries removed.
    pub fn invalidate_message_history(&self, session_id: &str) -> usize {
        let removed = self
            .store
            .delete_family(&keys::message_history_family(session_id));
        tracing::debug!(session_id = %session_id, removed, "invalidated cached message history");
        removed
    }

    /// Drop the cached permission check for a (user, session) pair. Call
    /// when membership or the session itself changes.
    pub fn invalidate_session_permission(&self, user_id: &str, session_id: &str) {
        let key = keys::session_permission(user_id, session_id);
        self.store.delete(key.as_str());
        tracing::debug!(user_id = %user_id, session_id = %session_id, "invalidated cached permission");
    }

    /// Remove all cached entries (shutdown, or between test runs).
    pub fn clear(&self) {
        self.store.clear();
    }

    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }

    async fn get_or_fetch<T, E, F, Fut>(
        &self,
        key: CacheKey,
        ttl: Duration,
        fetch: F,
    ) -> Result<Cached<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.store.get(key.as_str()) {
            match decode::<T>(&cached) {
                Ok(value) => {
                    tracing::debug!(key = %key, "cache hit");
                    return Ok(Cached { value, hit: true });
                }
                Err(e) => {
                    // Corrupt payload: invalidate and fall through to the
                    // fetch rather than surface an error.
                    tracing::warn!(key = %key, error = %e, "evicting undecodable cached payload");
                    self.store.delete(key.as_str());
                }
            }
        }

        tracing::debug!(key = %key, "cache miss");
        let value = fetch().await?;

        match encode(&value) {
            Ok(json) => self.store.set(&key, json, ttl),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "payload not cacheable, serving uncached");
            }
        }

        Ok(Cached { value, hit: false })
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Value, CacheError> {
    serde_json::to_value(value).map_err(CacheError::Encode)
}

fn decode<T: DeserializeOwned>(value: &Value) -> Result<T, CacheError> {
    T::deserialize(value).map_err(CacheError::Decode)
}
