use crate::client::AssetforgeClient;
use crate::error::{SdkError, SdkResult};
use crate::sse::SseDecoder;
use assetforge_core::HEARTBEAT_SENTINEL;
use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info};

/// Raw text frames from the push endpoint.
///
/// The stream ending or yielding an `Err` means the transport is gone; the
/// connection layer decides whether to reconnect.
pub type FrameStream = BoxStream<'static, SdkResult<String>>;

/// Opens the receive-only push channel for one user.
///
/// A successful `open` is the connection's `opened` signal.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    async fn open(&self, user_id: &str) -> SdkResult<FrameStream>;
}

/// Push stream over WebSocket.
#[derive(Clone)]
pub struct WsTransport {
    client: AssetforgeClient,
}

impl WsTransport {
    pub fn new(client: AssetforgeClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StreamTransport for WsTransport {
    async fn open(&self, user_id: &str) -> SdkResult<FrameStream> {
        let url = self.client.stream_url(user_id, true)?;
        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| SdkError::NetworkError(e.to_string()))?;
        info!(user_id, "websocket stream opened");

        // tungstenite answers pings on its own while we keep reading; control
        // frames still count as liveness.
        let frames = ws_stream
            .take_while(|msg| std::future::ready(!matches!(msg, Ok(Message::Close(_)))))
            .filter_map(|msg| async move {
                match msg {
                    Ok(Message::Text(text)) => Some(Ok(text.to_string())),
                    Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                        Ok(text) => Some(Ok(text)),
                        Err(_) => {
                            debug!("dropping non-utf8 binary frame");
                            None
                        }
                    },
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                        Some(Ok(HEARTBEAT_SENTINEL.to_string()))
                    }
                    Ok(Message::Close(_)) | Ok(Message::Frame(_)) => None,
                    Err(e) => Some(Err(SdkError::StreamError(e.to_string()))),
                }
            });

        Ok(frames.boxed())
    }
}

/// Push stream over Server-Sent Events.
#[derive(Clone)]
pub struct SseTransport {
    client: AssetforgeClient,
}

impl SseTransport {
    pub fn new(client: AssetforgeClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StreamTransport for SseTransport {
    async fn open(&self, user_id: &str) -> SdkResult<FrameStream> {
        let url = self.client.stream_url(user_id, false)?;
        let request = self
            .client
            .http()
            .get(url)
            .header("Accept", "text/event-stream")
            .header("Cache-Control", "no-cache");

        let response = self.client.authorized(request).send().await?;
        let response = response.error_for_status()?;
        info!(user_id, "event stream opened");

        let mut decoder = SseDecoder::new();
        let frames = response
            .bytes_stream()
            .map(move |chunk| match chunk {
                Ok(bytes) => decoder.push(&bytes).into_iter().map(Ok).collect::<Vec<_>>(),
                Err(e) => vec![Err(SdkError::StreamError(e.to_string()))],
            })
            .flat_map(stream::iter);

        Ok(frames.boxed())
    }
}
