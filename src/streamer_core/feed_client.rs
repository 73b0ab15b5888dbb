//! Feed transport: connection seam between StreamSession and the AIS stream
//!
//! `FeedConnector` opens one `FeedConnection` per session. The WebSocket
//! implementation talks to aisstream.io; tests script their own connector.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, Message},
    MaybeTlsStream, WebSocketStream,
};

/// Whole-globe bounding box: `[[lat_min, lon_min], [lat_max, lon_max]]`
pub const GLOBAL_BOUNDING_BOX: [[f64; 2]; 2] = [[-90.0, -180.0], [90.0, 180.0]];

#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    Connect(String),
    Send(String),
    Receive(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Connect(msg) => write!(f, "Connection error: {}", msg),
            TransportError::Send(msg) => write!(f, "Send error: {}", msg),
            TransportError::Receive(msg) => write!(f, "Receive error: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

/// Subscription request sent once per session
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionRequest {
    #[serde(rename = "APIKey")]
    pub api_key: String,
    #[serde(rename = "BoundingBoxes")]
    pub bounding_boxes: Vec<[[f64; 2]; 2]>,
}

impl SubscriptionRequest {
    /// Subscribe to every position on the globe
    pub fn global(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            bounding_boxes: vec![GLOBAL_BOUNDING_BOX],
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// One open connection to the feed
#[async_trait]
pub trait FeedConnection: Send {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Next data frame payload. `Ok(None)` means the peer closed the stream.
    ///
    /// Must be cancel-safe: the session drops this future when its deadline
    /// passes.
    async fn next_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError>;
}

#[async_trait]
pub trait FeedConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn FeedConnection>, TransportError>;

    /// Endpoint description for logging
    fn endpoint(&self) -> &str;
}

/// WebSocket connector (rustls for `wss://`)
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl FeedConnector for WebSocketConnector {
    async fn connect(&self) -> Result<Box<dyn FeedConnection>, TransportError> {
        log::info!("🔌 Connecting to AIS stream: {}", self.url);

        let (stream, response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        log::info!("✅ Connected (HTTP {})", response.status());
        Ok(Box::new(WebSocketConnection { stream }))
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

struct WebSocketConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl FeedConnection for WebSocketConnection {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn next_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        // StreamExt::next is cancel-safe; control frames are skipped here
        // (tungstenite answers pings itself on the next read/flush).
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text.into_bytes())),
                Some(Ok(Message::Binary(bytes))) => return Ok(Some(bytes)),
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {
                    continue
                }
                Some(Ok(Message::Close(frame))) => {
                    log::warn!("⚠️  Server closed stream: {:?}", frame);
                    return Ok(None);
                }
                Some(Err(tungstenite::Error::ConnectionClosed)) | None => return Ok(None),
                Some(Err(e)) => return Err(TransportError::Receive(e.to_string())),
            }
        }
    }
}
