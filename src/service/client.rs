use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, instrument};

use crate::config::ClientConfig;
use crate::core::codec::FrameCodec;
use crate::core::frame::Frame;
use crate::error::{ProtocolError, Result};
use crate::utils::timeout::with_timeout_error;

/// Async client for the gateway wire protocol
///
/// Used by integration tests and tooling. Every receive is bounded by the
/// configured response timeout.
pub struct GameClient {
    framed: Framed<TcpStream, FrameCodec>,
    response_timeout: Duration,
}

impl GameClient {
    /// Connect with default timeouts
    #[instrument]
    pub async fn connect(addr: &str) -> Result<Self> {
        let config = ClientConfig {
            address: addr.to_string(),
            ..Default::default()
        };
        Self::connect_with_config(config).await
    }

    #[instrument(skip(config), fields(address = %config.address))]
    pub async fn connect_with_config(config: ClientConfig) -> Result<Self> {
        let stream = with_timeout_error(
            async { Ok(TcpStream::connect(&config.address).await?) },
            config.connection_timeout,
        )
        .await?;
        stream.set_nodelay(true)?;
        debug!("Connected");

        Ok(Self {
            framed: Framed::new(stream, FrameCodec::new()),
            response_timeout: config.response_timeout,
        })
    }

    /// Send one frame
    pub async fn send(&mut self, frame: Frame) -> Result<()> {
        self.framed.send(frame).await
    }

    /// Write bytes as-is, bypassing the encoder
    pub async fn send_raw(&mut self, raw: &[u8]) -> Result<()> {
        let stream = self.framed.get_mut();
        stream.write_all(raw).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Receive and decode the next frame
    pub async fn recv(&mut self) -> Result<Frame> {
        let framed = &mut self.framed;
        let raw = with_timeout_error(
            async { framed.next().await.transpose() },
            self.response_timeout,
        )
        .await?;

        match raw {
            Some(raw) => Frame::decode(&raw),
            None => Err(ProtocolError::ConnectionClosed),
        }
    }

    /// Send a frame and wait for the reply
    pub async fn request(&mut self, frame: Frame) -> Result<Frame> {
        self.send(frame).await?;
        self.recv().await
    }

    /// Wait until the server closes the connection, discarding any frames.
    ///
    /// Returns [`ProtocolError::Timeout`] if it is still open after `limit`.
    pub async fn wait_closed(&mut self, limit: Duration) -> Result<()> {
        let framed = &mut self.framed;
        with_timeout_error(
            async {
                loop {
                    match framed.next().await {
                        None | Some(Err(_)) => return Ok(()),
                        Some(Ok(_)) => continue,
                    }
                }
            },
            limit,
        )
        .await
    }

    /// Shut down the write side of the connection
    pub async fn close(mut self) -> Result<()> {
        self.framed.get_mut().shutdown().await?;
        Ok(())
    }
}
