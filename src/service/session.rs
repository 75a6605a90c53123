//! # Connection Session
//!
//! Per-connection state and the read loop that drives it.
//!
//! A session owns the write half of its socket; the read half is handed back
//! from [`Session::new`] and consumed by [`Session::serve`]. Every inbound
//! frame is processed while a [`DrainGuard`](crate::utils::DrainGuard) is held,
//! so a close waits (bounded) for the reply to be written before the socket
//! goes away.
//!
//! Lifecycle: `Open -> Draining -> Closed`, one way. Authentication is a
//! separate one-way flag.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::BytesMut;
use futures::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::{AuthPolicy, ServerConfig};
use crate::core::codec::FrameCodec;
use crate::core::frame::Frame;
use crate::error::{ProtocolError, Result};
use crate::protocol::{Command, Dispatcher, SessionContext};
use crate::transport::registry::Registry;
use crate::utils::metrics::{Metrics, Timer};
use crate::utils::DrainCounter;

/// Read half of a session socket, yielding raw delimited frames
pub type SessionReader = FramedRead<OwnedReadHalf, FrameCodec>;

type SessionWriter = FramedWrite<OwnedWriteHalf, FrameCodec>;

const OPEN: u8 = 0;
const DRAINING: u8 = 1;
const CLOSED: u8 = 2;

/// Registry-assigned session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Draining,
    Closed,
}

/// Per-session settings taken from the server configuration
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub auth_policy: AuthPolicy,
    pub strict_length: bool,
    pub drain_timeout: Duration,
    pub max_frame_size: usize,
}

impl From<&ServerConfig> for SessionOptions {
    fn from(config: &ServerConfig) -> Self {
        Self {
            auth_policy: config.auth_policy,
            strict_length: config.strict_length,
            drain_timeout: config.drain_timeout,
            max_frame_size: config.max_frame_size,
        }
    }
}

pub struct Session {
    id: SessionId,
    peer: SocketAddr,
    options: SessionOptions,
    writer: Mutex<Option<SessionWriter>>,
    state: AtomicU8,
    authenticated: AtomicBool,
    identity: AtomicU64,
    drain: DrainCounter,
    closed: CancellationToken,
    registry: Weak<Registry>,
    dispatcher: Arc<Dispatcher>,
    metrics: Arc<Metrics>,
}

impl Session {
    /// Wrap an accepted socket. Returns the session and the reader its loop consumes.
    pub fn new(
        id: SessionId,
        peer: SocketAddr,
        stream: TcpStream,
        options: SessionOptions,
        dispatcher: Arc<Dispatcher>,
        metrics: Arc<Metrics>,
        registry: Weak<Registry>,
    ) -> (Arc<Self>, SessionReader) {
        let (read_half, write_half) = stream.into_split();
        let codec = FrameCodec::with_max_frame_size(options.max_frame_size);

        metrics.connection_established();

        let session = Arc::new(Self {
            id,
            peer,
            options,
            writer: Mutex::new(Some(FramedWrite::new(write_half, codec.clone()))),
            state: AtomicU8::new(OPEN),
            authenticated: AtomicBool::new(false),
            identity: AtomicU64::new(0),
            drain: DrainCounter::new(),
            closed: CancellationToken::new(),
            registry,
            dispatcher,
            metrics,
        });

        (session, FramedRead::new(read_half, codec))
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    /// Identity recorded when authentication was granted, 0 before
    pub fn identity(&self) -> u64 {
        self.identity.load(Ordering::Acquire)
    }

    pub fn state(&self) -> SessionState {
        match self.state.load(Ordering::Acquire) {
            OPEN => SessionState::Open,
            DRAINING => SessionState::Draining,
            _ => SessionState::Closed,
        }
    }

    /// Operations currently in flight
    pub fn in_flight(&self) -> usize {
        self.drain.count()
    }

    /// Token cancelled once the session starts tearing down its socket
    pub fn closed_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    pub(crate) fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn context(&self) -> SessionContext {
        SessionContext {
            session_id: self.id.0,
            peer: self.peer,
            identity: self.identity(),
            authenticated: self.is_authenticated(),
        }
    }

    /// Read frames until the peer leaves, a violation occurs or the session is closed.
    ///
    /// The session always removes itself from the registry before returning.
    #[instrument(name = "session", skip_all, fields(session_id = %self.id, peer = %self.peer))]
    pub async fn serve(self: Arc<Self>, mut reader: SessionReader) {
        debug!("Session started");

        loop {
            let next = tokio::select! {
                biased;
                _ = self.closed.cancelled() => break,
                next = reader.next() => next,
            };

            match next {
                None => {
                    debug!("Peer closed the connection");
                    self.normal_close().await;
                    break;
                }
                Some(Err(ProtocolError::Io(e))) => {
                    warn!(error = %e, "Read failed");
                    self.metrics.transport_error();
                    self.normal_close().await;
                    break;
                }
                Some(Err(e)) => {
                    warn!(error = %e, "Framing violation, closing");
                    self.metrics.protocol_error();
                    self.normal_close().await;
                    break;
                }
                Some(Ok(raw)) => {
                    if self.state() != SessionState::Open {
                        break;
                    }

                    let handled = tokio::select! {
                        biased;
                        _ = self.closed.cancelled() => break,
                        handled = self.handle_frame(raw) => handled,
                    };

                    // The drain guard is released by now, so closing cannot wait on itself
                    if let Err(e) = handled {
                        if e.is_protocol_violation() {
                            warn!(error = %e, "Protocol violation, closing");
                            self.metrics.protocol_error();
                        } else {
                            warn!(error = %e, "Write failed, closing");
                            self.metrics.transport_error();
                        }
                        self.normal_close().await;
                        break;
                    }
                }
            }
        }

        self.deregister();
        debug!("Session ended");
    }

    /// Decode, authenticate, dispatch and reply to one raw frame.
    ///
    /// Returns an error only for terminal conditions; dispatch failures are
    /// logged and swallowed.
    async fn handle_frame(&self, raw: BytesMut) -> Result<()> {
        let _in_flight = self.drain.enter();
        self.metrics.frame_received(raw.len() as u64);

        let frame = if self.options.strict_length {
            Frame::decode_strict(&raw)?
        } else {
            Frame::decode(&raw)?
        };

        if self.options.auth_policy == AuthPolicy::AnyFrame {
            self.grant_auth(frame.identity());
        }

        let main_command = frame.main_command();
        let identity = frame.identity();
        let reply = {
            let _timer = Timer::start("dispatch");
            match self.dispatcher.dispatch(frame, self.context()).await {
                Ok(reply) => reply,
                Err(e) => {
                    let command = Command::from(main_command).name();
                    warn!(error = %e, main_command, command, "Dispatch failed");
                    self.metrics.dispatch_error();
                    return Ok(());
                }
            }
        };

        if reply.authenticate && self.options.auth_policy == AuthPolicy::LoginCommand {
            self.grant_auth(identity);
        }

        if let Some(response) = reply.response {
            self.send(response).await?;
        }

        Ok(())
    }

    // Only the read loop grants, so the check and the stores do not race
    fn grant_auth(&self, identity: u64) {
        if self.authenticated.load(Ordering::Acquire) {
            return;
        }
        self.identity.store(identity, Ordering::Release);
        self.authenticated.store(true, Ordering::Release);
        self.metrics.auth_granted();
        info!(session_id = %self.id, identity, "Session authenticated");
    }

    /// Write a frame to the peer. Aborted if the session is force-closed.
    pub async fn send(&self, frame: Frame) -> Result<()> {
        let byte_count = frame.encoded_len() as u64;
        let mut writer = self.writer.lock().await;
        let sink = writer.as_mut().ok_or(ProtocolError::ConnectionClosed)?;

        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(ProtocolError::ConnectionClosed),
            sent = sink.send(frame) => {
                sent?;
                self.metrics.frame_sent(byte_count);
                Ok(())
            }
        }
    }

    /// Drain in-flight work (bounded), then shut the socket down.
    ///
    /// Idempotent. Later callers wait until the first one has cancelled the
    /// session. Does not touch the registry.
    pub async fn close(&self) {
        if self
            .state
            .compare_exchange(OPEN, DRAINING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.closed.cancelled().await;
            return;
        }

        if !self.drain.wait_until_zero(self.options.drain_timeout).await {
            warn!(
                session_id = %self.id,
                in_flight = self.drain.count(),
                "Drain timeout elapsed, closing anyway"
            );
        }

        self.closed.cancel();

        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            if let Err(e) = writer.get_mut().shutdown().await {
                debug!(session_id = %self.id, error = %e, "Socket shutdown failed");
            }
        }

        self.state.store(CLOSED, Ordering::Release);
        self.metrics.connection_closed();
        debug!(session_id = %self.id, peer = %self.peer, "Session closed");
    }

    /// Close, then remove the session from the registry
    pub async fn normal_close(&self) {
        self.close().await;
        self.deregister();
    }

    fn deregister(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("state", &self.state())
            .field("authenticated", &self.is_authenticated())
            .field("identity", &self.identity())
            .finish()
    }
}
