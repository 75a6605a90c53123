use crate::core::frame::Frame;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::command::{LOGIN_AUTH, SIGN_DAY};
use crate::protocol::handlers;
use crate::store::SessionCache;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};

type HandlerFn = dyn Fn(Frame, SessionContext) -> BoxFuture<'static, Result<Reply>> + Send + Sync + 'static;

/// Read-only view of the session a frame arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionContext {
    pub session_id: u64,
    pub peer: SocketAddr,
    /// Identity recorded at authentication, 0 before
    pub identity: u64,
    pub authenticated: bool,
}

/// Outcome of handling one frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    /// Frame to write back to the peer
    pub response: Option<Frame>,
    /// Grant authentication to the session (honoured under the login-command policy)
    pub authenticate: bool,
}

impl Reply {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn respond(frame: Frame) -> Self {
        Self {
            response: Some(frame),
            authenticate: false,
        }
    }

    pub fn authenticated(response: Option<Frame>) -> Self {
        Self {
            response,
            authenticate: true,
        }
    }
}

/// Command router keyed by main command code.
///
/// Handlers are async and receive the decoded frame plus a [`SessionContext`].
pub struct Dispatcher {
    handlers: Arc<RwLock<HashMap<u32, Arc<HandlerFn>>>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Dispatcher with LOGIN_AUTH and SIGN_DAY registered
    pub fn with_builtin_commands(cache: Arc<dyn SessionCache>) -> Result<Self> {
        let dispatcher = Self::new();
        dispatcher.register(LOGIN_AUTH, move |frame, ctx| {
            handlers::login_auth(Arc::clone(&cache), frame, ctx)
        })?;
        dispatcher.register(SIGN_DAY, handlers::sign_day)?;
        Ok(dispatcher)
    }

    /// Register `handler` for `main_command`, replacing any previous one
    pub fn register<F, Fut>(&self, main_command: u32, handler: F) -> Result<()>
    where
        F: Fn(Frame, SessionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply>> + Send + 'static,
    {
        let mut handlers = self
            .handlers
            .write()
            .map_err(|_| ProtocolError::Custom(constants::ERR_DISPATCHER_WRITE_LOCK.to_string()))?;

        let boxed: Arc<HandlerFn> = Arc::new(move |frame, ctx| handler(frame, ctx).boxed());
        handlers.insert(main_command, boxed);
        Ok(())
    }

    /// Route a frame to the handler for its main command
    pub async fn dispatch(&self, frame: Frame, ctx: SessionContext) -> Result<Reply> {
        let main_command = frame.main_command();

        // Clone the handler out so the lock is not held across the await
        let handler = {
            let handlers = self
                .handlers
                .read()
                .map_err(|_| ProtocolError::Custom(constants::ERR_DISPATCHER_READ_LOCK.to_string()))?;
            handlers
                .get(&main_command)
                .cloned()
                .ok_or(ProtocolError::UnknownCommand(main_command))?
        };

        handler(frame, ctx).await
    }
}
