use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use futures::future::BoxFuture;
use futures::FutureExt;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::error::{constants, ProtocolError, Result};
use crate::store::{token_key, AccountStore, SessionCache};

/// Required length of an account name
pub const ACCOUNT_NAME_LEN: usize = 11;

/// Minimum password length
pub const MIN_PASSWORD_LEN: usize = 6;

/// A stored account. The id is what clients put in the frame identity field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: u64,
    pub account: String,
    /// Hex SHA-256 of the password
    pub password_digest: String,
    pub sex: u8,
    /// Registration time, seconds since the Unix epoch
    pub registered_at: u64,
}

/// Registration request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    pub account: String,
    pub password: String,
    #[serde(default = "default_sex")]
    pub sex: u8,
}

fn default_sex() -> u8 {
    1
}

impl NewAccount {
    pub fn new(account: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            password: password.into(),
            sex: default_sex(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.account.chars().count() != ACCOUNT_NAME_LEN {
            return Err(ProtocolError::InvalidAccount(constants::ERR_ACCOUNT_LENGTH));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ProtocolError::InvalidAccount(constants::ERR_PASSWORD_LENGTH));
        }
        if self.password == self.account {
            return Err(ProtocolError::InvalidAccount(
                constants::ERR_PASSWORD_EQUALS_ACCOUNT,
            ));
        }
        if !(1..=2).contains(&self.sex) {
            return Err(ProtocolError::InvalidAccount("Sex must be 1 or 2"));
        }
        Ok(())
    }
}

/// Hex encoded SHA-256 digest of a password
pub fn password_digest(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    to_hex(&digest)
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// Account store backed by a map, for tests and single-node deployments
#[derive(Debug)]
pub struct InMemoryAccountStore {
    accounts: RwLock<HashMap<String, Account>>,
    next_id: AtomicU64,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }
}

impl Default for InMemoryAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountStore for InMemoryAccountStore {
    fn lookup<'a>(&'a self, account: &'a str) -> BoxFuture<'a, Result<Option<Account>>> {
        async move { Ok(self.accounts.read().await.get(account).cloned()) }.boxed()
    }

    fn create(&self, new: NewAccount) -> BoxFuture<'_, Result<u64>> {
        async move {
            new.validate()?;

            let mut accounts = self.accounts.write().await;
            if accounts.contains_key(&new.account) {
                return Err(ProtocolError::AccountExists(new.account));
            }

            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let registered_at = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);

            accounts.insert(
                new.account.clone(),
                Account {
                    id,
                    account: new.account,
                    password_digest: password_digest(&new.password),
                    sex: new.sex,
                    registered_at,
                },
            );
            debug!(account_id = id, "Account created");
            Ok(id)
        }
        .boxed()
    }
}

/// A token minted for a verified account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedToken {
    pub account_id: u64,
    pub token: String,
}

/// Verify credentials and mint a fresh session token into the cache.
///
/// The client then presents `account_id` as the frame identity and `token` as
/// the LOGIN_AUTH payload.
#[instrument(skip(store, cache, password))]
pub async fn issue_token(
    store: &dyn AccountStore,
    cache: &dyn SessionCache,
    account: &str,
    password: &str,
) -> Result<IssuedToken> {
    let Some(record) = store.lookup(account).await? else {
        warn!("Login for unknown account");
        return Err(ProtocolError::InvalidCredentials);
    };

    if record.password_digest != password_digest(password) {
        warn!(account_id = record.id, "Login with wrong password");
        return Err(ProtocolError::InvalidCredentials);
    }

    let raw: [u8; 16] = rand::rng().random();
    let token = to_hex(&raw);
    cache.put(&token_key(record.id), token.clone()).await?;

    info!(account_id = record.id, "Session token issued");
    Ok(IssuedToken {
        account_id: record.id,
        token,
    })
}
