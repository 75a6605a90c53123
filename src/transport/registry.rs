//! # Connection Registry
//!
//! The set of live sessions plus the one-way `closing` flag.
//!
//! `add` checks the flag under the same lock `close_all` drains the map with,
//! so once shutdown has begun no session can be added behind its back.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::join_all;
use tracing::{debug, info};

use crate::service::session::{Session, SessionId};

#[derive(Debug, Default)]
pub struct Registry {
    sessions: Mutex<HashMap<SessionId, Arc<Session>>>,
    closing: AtomicBool,
    next_id: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh session id
    pub fn next_id(&self) -> SessionId {
        SessionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Register a session. Returns `false` once the registry is closing.
    pub fn add(&self, session: Arc<Session>) -> bool {
        let mut sessions = self.lock();
        if self.closing.load(Ordering::Acquire) {
            return false;
        }
        sessions.insert(session.id(), session);
        true
    }

    /// Remove a session; removing an absent id is a no-op
    pub fn remove(&self, id: SessionId) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            debug!(session_id = %id, "Session deregistered");
        }
        removed
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Set the closing flag. Returns `true` for the call that flipped it.
    pub fn mark_closing(&self) -> bool {
        let _sessions = self.lock();
        !self.closing.swap(true, Ordering::AcqRel)
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    /// Take every member and close them concurrently.
    ///
    /// Membership is empty when this returns. Sessions that later try to
    /// deregister find nothing to remove.
    pub async fn close_all(&self) {
        let sessions: Vec<Arc<Session>> = self.lock().drain().map(|(_, s)| s).collect();
        if sessions.is_empty() {
            return;
        }

        info!(count = sessions.len(), "Closing all sessions");
        join_all(sessions.iter().map(|session| session.close())).await;
        info!(count = sessions.len(), "All sessions closed");
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, Arc<Session>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
