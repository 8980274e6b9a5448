//! Outbound channel to the registry.
//!
//! The agent only ever pushes text messages to an address, so the seam is a
//! small trait. [`WsTransport`] keeps one WebSocket open per address and
//! reopens it on the next send after a failure.

use async_trait::async_trait;
use futures::SinkExt;
use snoop_core::{ClientConfig, Result, SnoopError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::debug;
use url::Url;

/// Sends text messages to registry channels.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Deliver one message to `endpoint`, opening a channel if needed.
    async fn send(&self, endpoint: &Url, payload: &str) -> Result<()>;

    /// Close the channel for `endpoint` if one is open.
    async fn close(&self, _endpoint: &Url) {}
}

pub type DynTransport = Arc<dyn Transport>;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport with one cached connection per address.
pub struct WsTransport {
    channels: Mutex<HashMap<String, WsStream>>,
    connect_timeout: Duration,
    send_timeout: Duration,
}

impl WsTransport {
    pub fn new() -> Self {
        Self::with_timeouts(ClientConfig::CONNECT_TIMEOUT, ClientConfig::SEND_TIMEOUT)
    }

    pub fn with_timeouts(connect_timeout: Duration, send_timeout: Duration) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            connect_timeout,
            send_timeout,
        }
    }

    /// Number of channels currently held open.
    pub async fn open_channels(&self) -> usize {
        self.channels.lock().await.len()
    }

    async fn connect(&self, endpoint: &Url) -> Result<WsStream> {
        let connect = tokio_tungstenite::connect_async(endpoint.as_str());
        match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(Ok((stream, _response))) => {
                debug!("Opened channel to {}", endpoint);
                Ok(stream)
            }
            Ok(Err(e)) => Err(SnoopError::connection(endpoint.as_str(), e.to_string())),
            Err(_) => Err(SnoopError::Timeout {
                endpoint: endpoint.to_string(),
                timeout: self.connect_timeout,
            }),
        }
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, endpoint: &Url, payload: &str) -> Result<()> {
        let key = endpoint.to_string();
        let mut channels = self.channels.lock().await;

        let mut stream = match channels.remove(&key) {
            Some(stream) => stream,
            None => self.connect(endpoint).await?,
        };

        let send = stream.send(Message::Text(payload.to_string()));
        match tokio::time::timeout(self.send_timeout, send).await {
            Ok(Ok(())) => {
                channels.insert(key, stream);
                Ok(())
            }
            // The stream is dropped here; the next send reconnects.
            Ok(Err(e)) => Err(SnoopError::connection(endpoint.as_str(), e.to_string())),
            Err(_) => Err(SnoopError::Timeout {
                endpoint: key,
                timeout: self.send_timeout,
            }),
        }
    }

    async fn close(&self, endpoint: &Url) {
        let stream = self.channels.lock().await.remove(endpoint.as_str());
        if let Some(mut stream) = stream {
            let _ = tokio::time::timeout(self.send_timeout, stream.close(None)).await;
            debug!("Closed channel to {}", endpoint);
        }
    }
}
