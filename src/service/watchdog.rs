//! Auth watchdog: closes sessions that have not authenticated within the grace period.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

use crate::service::session::Session;

/// Spawn the watchdog for `session` on `tracker`
pub fn arm(tracker: &TaskTracker, session: &Arc<Session>, grace: Duration) {
    tracker.spawn(watch(Arc::downgrade(session), session.closed_token(), grace));
}

/// Wait out `grace`, then normal-close the session if it is still unauthenticated.
///
/// Returns early once the session closes for any other reason. Holds only a
/// weak reference so an idle watchdog never keeps a session alive.
pub async fn watch(session: Weak<Session>, closed: CancellationToken, grace: Duration) {
    tokio::select! {
        _ = closed.cancelled() => return,
        _ = tokio::time::sleep(grace) => {}
    }

    let Some(session) = session.upgrade() else {
        return;
    };
    if session.is_authenticated() {
        return;
    }

    info!(
        session_id = %session.id(),
        peer = %session.peer(),
        grace_ms = grace.as_millis() as u64,
        "Authentication timeout, closing session"
    );
    session.metrics().auth_timeout();
    session.normal_close().await;
}
