//! # Collaborator Stores
//!
//! Interfaces to the account store and the session token cache, plus in-memory
//! implementations of both.
//!
//! The TCP core never reaches these through global state: they are constructed
//! once and handed to whatever needs them (command handlers, the token issuing
//! flow). Handles are object-safe so a networked backend can replace the
//! in-memory ones without touching the server.

pub mod account;
pub mod token_cache;

use futures::future::BoxFuture;

use crate::error::Result;

pub use account::{issue_token, password_digest, Account, InMemoryAccountStore, IssuedToken, NewAccount};
pub use token_cache::{TokenCache, TokenCacheStats};

/// Account records keyed by account name
pub trait AccountStore: Send + Sync {
    /// Fetch an account, `None` if it does not exist
    fn lookup<'a>(&'a self, account: &'a str) -> BoxFuture<'a, Result<Option<Account>>>;

    /// Insert a new account and return its id
    fn create(&self, account: NewAccount) -> BoxFuture<'_, Result<u64>>;
}

/// Key/value cache for session tokens
pub trait SessionCache: Send + Sync {
    fn put<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<()>>;

    /// Fetch a value, `None` on a miss or expiry
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>>;
}

/// Cache key under which the token of account `identity` is stored
pub fn token_key(identity: u64) -> String {
    format!("token_{identity}")
}
