use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};

use crate::config::ServerConfig;
use crate::error::{ProtocolError, Result};
use crate::protocol::Dispatcher;
use crate::service::session::{Session, SessionOptions};
use crate::service::watchdog;
use crate::transport::registry::Registry;
use crate::transport::signal::ShutdownSignals;
use crate::utils::metrics::Metrics;

/// TCP acceptor and lifecycle coordinator
///
/// Accepts connections, turns each into a [`Session`] with its own read loop
/// and watchdog, and on shutdown closes every session before returning.
pub struct Server {
    config: ServerConfig,
    dispatcher: Arc<Dispatcher>,
    registry: Arc<Registry>,
    metrics: Arc<Metrics>,
}

impl Server {
    pub fn new(config: ServerConfig, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            config,
            dispatcher,
            registry: Arc::new(Registry::new()),
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        TcpListener::bind(&self.config.address)
            .await
            .map_err(ProtocolError::Listen)
    }

    /// Bind and serve until a process signal arrives
    #[instrument(skip(self), fields(address = %self.config.address))]
    pub async fn start(&self) -> Result<()> {
        let listener = self.bind().await?;
        let mut signals = ShutdownSignals::install()?;
        self.serve_until(listener, async move { signals.recv().await })
            .await
    }

    /// Serve on `listener` until `signal` resolves with the name of what fired.
    pub async fn serve_until<S>(&self, listener: TcpListener, signal: S) -> Result<()>
    where
        S: Future<Output = &'static str> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let relay = tokio::spawn(async move {
            let name = signal.await;
            info!(signal = name, "Received shutdown signal");
            let _ = shutdown_tx.send(()).await;
        });

        let result = self.start_with_shutdown(listener, shutdown_rx).await;
        // Still waiting on a signal if the server stopped on an accept error
        relay.abort();
        result
    }

    /// Serve on an already bound listener until `shutdown_rx` fires.
    ///
    /// Returns once every session has been closed and its task has finished.
    /// An accept failure also triggers shutdown and is returned as
    /// [`ProtocolError::Listen`].
    #[instrument(skip_all)]
    pub async fn start_with_shutdown(
        &self,
        listener: TcpListener,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) -> Result<()> {
        match listener.local_addr() {
            Ok(addr) => info!(address = %addr, "Listening"),
            Err(e) => warn!(error = %e, "Listening on unknown address"),
        }

        let stop = CancellationToken::new();
        let tracker = TaskTracker::new();

        let bridge = {
            let stop = stop.clone();
            let registry = Arc::clone(&self.registry);
            tokio::spawn(async move {
                tokio::select! {
                    _ = shutdown_rx.recv() => info!("Shutting down, draining sessions"),
                    _ = stop.cancelled() => warn!("Accept loop stopped, draining sessions"),
                }
                stop.cancel();
                registry.mark_closing();
                registry.close_all().await;
            })
        };

        let accept_error = self.accept_loop(&listener, &stop, &tracker).await;
        drop(listener);

        tracker.close();
        tracker.wait().await;
        if let Err(e) = bridge.await {
            error!(error = %e, "Shutdown task failed");
        }

        self.metrics.log_metrics();
        info!("Server stopped");

        match accept_error {
            Some(e) => Err(ProtocolError::Listen(e)),
            None => Ok(()),
        }
    }

    async fn accept_loop(
        &self,
        listener: &TcpListener,
        stop: &CancellationToken,
        tracker: &TaskTracker,
    ) -> Option<io::Error> {
        loop {
            let accepted = tokio::select! {
                biased;
                _ = stop.cancelled() => return None,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => self.admit(stream, peer, tracker).await,
                Err(e) => {
                    error!(error = %e, "Accept failed");
                    stop.cancel();
                    return Some(e);
                }
            }
        }
    }

    async fn admit(&self, stream: TcpStream, peer: SocketAddr, tracker: &TaskTracker) {
        if self.registry.is_closing() {
            debug!(%peer, "Refusing connection, shutdown in progress");
            self.metrics.connection_refused();
            return;
        }

        if self.registry.len() >= self.config.max_connections {
            warn!(
                %peer,
                max_connections = self.config.max_connections,
                "Refusing connection, limit reached"
            );
            self.metrics.connection_refused();
            return;
        }

        if let Err(e) = stream.set_nodelay(true) {
            debug!(%peer, error = %e, "Failed to set TCP_NODELAY");
        }

        let (session, reader) = Session::new(
            self.registry.next_id(),
            peer,
            stream,
            SessionOptions::from(&self.config),
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.metrics),
            Arc::downgrade(&self.registry),
        );

        if !self.registry.add(Arc::clone(&session)) {
            debug!(%peer, "Refusing connection, shutdown in progress");
            self.metrics.connection_refused();
            session.close().await;
            return;
        }

        debug!(session_id = %session.id(), %peer, "Connection accepted");
        watchdog::arm(tracker, &session, self.config.auth_timeout);
        tracker.spawn(session.serve(reader));
    }
}
