//! # Token Cache
//!
//! In-memory session token cache with TTL expiry and a capacity bound.
//!
//! ## Features
//! - **Thread-safe**: Uses Arc<Mutex<>> for safe concurrent access
//! - **TTL-based expiration**: Tokens expire after a configurable duration
//! - **Memory-bounded**: Oldest entry is evicted once capacity is exceeded
//!
//! ## Usage
//! ```ignore
//! use game_gateway::store::{token_key, TokenCache};
//! use std::time::Duration;
//!
//! let cache = TokenCache::new(1000, Duration::from_secs(3600));
//! cache.store(token_key(42), "a1b2c3".to_string()).await;
//!
//! if let Some(token) = cache.fetch(&token_key(42)).await {
//!     // compare against the token the client presented
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::config::CacheConfig;
use crate::error::Result;
use crate::store::SessionCache;

#[derive(Clone, Debug)]
struct TokenEntry {
    token: String,
    created_at: SystemTime,
    ttl: Duration,
}

impl TokenEntry {
    fn is_expired(&self) -> bool {
        match self.created_at.elapsed() {
            Ok(elapsed) => elapsed > self.ttl,
            Err(_) => true, // System time went backward, treat as expired
        }
    }
}

/// Thread-safe in-memory token cache
#[derive(Clone)]
pub struct TokenCache {
    max_entries: usize,
    default_ttl: Duration,
    inner: Arc<Mutex<TokenCacheInner>>,
}

struct TokenCacheInner {
    tokens: HashMap<String, TokenEntry>,
    total_inserts: u64,
}

impl TokenCache {
    /// Create a cache holding at most `max_entries` tokens, each living `default_ttl`
    pub fn new(max_entries: usize, default_ttl: Duration) -> Self {
        Self {
            max_entries,
            default_ttl,
            inner: Arc::new(Mutex::new(TokenCacheInner {
                tokens: HashMap::with_capacity(max_entries.min(1024)),
                total_inserts: 0,
            })),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_entries, config.token_ttl)
    }

    /// Store a token, replacing any previous one under the same key
    pub async fn store<S: Into<String>>(&self, key: S, token: String) {
        let mut inner = self.inner.lock().await;

        let entry = TokenEntry {
            token,
            created_at: SystemTime::now(),
            ttl: self.default_ttl,
        };

        self.evict_expired(&mut inner);

        inner.tokens.insert(key.into(), entry);
        inner.total_inserts += 1;

        if inner.tokens.len() > self.max_entries {
            self.evict_oldest(&mut inner);
        }

        trace!(token_count = inner.tokens.len(), "Token stored in cache");
    }

    /// Fetch a token if present and not expired
    pub async fn fetch(&self, key: &str) -> Option<String> {
        let mut inner = self.inner.lock().await;

        if let Some(entry) = inner.tokens.get(key) {
            if !entry.is_expired() {
                trace!("Token cache hit");
                return Some(entry.token.clone());
            }
        }

        inner.tokens.remove(key);
        trace!("Token cache miss or expired");
        None
    }

    /// Drop a token, e.g. on logout
    pub async fn invalidate(&self, key: &str) -> bool {
        self.inner.lock().await.tokens.remove(key).is_some()
    }

    /// Clear all tokens from the cache
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        let count = inner.tokens.len();
        inner.tokens.clear();
        debug!(cleared_count = count, "Token cache cleared");
    }

    pub async fn stats(&self) -> TokenCacheStats {
        let inner = self.inner.lock().await;

        let expired_count = inner.tokens.values().filter(|e| e.is_expired()).count();

        TokenCacheStats {
            total_entries: inner.tokens.len(),
            max_entries: self.max_entries,
            expired_count,
            total_inserts: inner.total_inserts,
        }
    }

    // Called with lock held
    fn evict_expired(&self, inner: &mut TokenCacheInner) {
        let before = inner.tokens.len();
        inner.tokens.retain(|_, entry| !entry.is_expired());
        let after = inner.tokens.len();

        if before != after {
            debug!(
                removed_count = before - after,
                remaining_count = after,
                "Expired tokens evicted"
            );
        }
    }

    // Called with lock held
    fn evict_oldest(&self, inner: &mut TokenCacheInner) {
        if let Some(oldest_key) = inner
            .tokens
            .iter()
            .min_by_key(|(_, entry)| entry.created_at)
            .map(|(k, _)| k.clone())
        {
            inner.tokens.remove(&oldest_key);
            debug!("Oldest token evicted to make room");
        }
    }
}

impl SessionCache for TokenCache {
    fn put<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<()>> {
        async move {
            self.store(key, value).await;
            Ok(())
        }
        .boxed()
    }

    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
        async move { Ok(self.fetch(key).await) }.boxed()
    }
}

/// Statistics about the token cache
#[derive(Debug, Clone, Copy)]
pub struct TokenCacheStats {
    /// Current number of stored tokens
    pub total_entries: usize,
    /// Maximum capacity
    pub max_entries: usize,
    /// Number of expired but not yet evicted entries
    pub expired_count: usize,
    /// Total tokens ever inserted
    pub total_inserts: u64,
}
