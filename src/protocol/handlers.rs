//! Built-in command handlers.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::core::frame::{encode_body, Frame};
use crate::error::Result;
use crate::protocol::command::{status, LOGIN_AUTH, SIGN_DAY};
use crate::protocol::dispatcher::{Reply, SessionContext};
use crate::store::{token_key, SessionCache};

/// Check the presented token against the one cached for the frame identity.
///
/// On a match the reply grants authentication and acknowledges with `status::OK`.
/// Any mismatch, a missing token, or identity 0 is answered with `status::REJECTED`.
pub async fn login_auth(
    cache: Arc<dyn SessionCache>,
    frame: Frame,
    ctx: SessionContext,
) -> Result<Reply> {
    let identity = frame.identity();
    let reject = Reply::respond(Frame::new(identity, LOGIN_AUTH, status::REJECTED, Bytes::new()));

    if identity == 0 {
        warn!(session_id = ctx.session_id, "Login without identity");
        return Ok(reject);
    }

    let Some(presented) = frame.payload_text() else {
        warn!(session_id = ctx.session_id, identity, "Login without token");
        return Ok(reject);
    };

    match cache.get(&token_key(identity)).await? {
        Some(expected) if expected == presented => {
            debug!(session_id = ctx.session_id, identity, "Login token accepted");
            Ok(Reply::authenticated(Some(Frame::new(
                identity,
                LOGIN_AUTH,
                status::OK,
                Bytes::new(),
            ))))
        }
        _ => {
            warn!(session_id = ctx.session_id, identity, "Login token rejected");
            Ok(reject)
        }
    }
}

/// Daily sign-in. Requires an authenticated session and echoes the payload back.
pub async fn sign_day(frame: Frame, ctx: SessionContext) -> Result<Reply> {
    if !ctx.authenticated {
        return Ok(Reply::respond(Frame::new(
            frame.identity(),
            SIGN_DAY,
            status::UNAUTHENTICATED,
            Bytes::new(),
        )));
    }

    let body = match frame.payload_text() {
        Some(text) => encode_body(text.as_bytes()),
        None => Bytes::new(),
    };
    debug!(session_id = ctx.session_id, identity = ctx.identity, "Signed in for the day");
    Ok(Reply::respond(Frame::new(ctx.identity, SIGN_DAY, status::OK, body)))
}
