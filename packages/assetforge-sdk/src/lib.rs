pub mod api;
pub mod client;
pub mod error;
pub mod sse;
pub mod transport;

pub use api::NotificationApi;
pub use assetforge_core::*;
pub use client::AssetforgeClient;
pub use error::{SdkError, SdkResult};
pub use transport::{FrameStream, SseTransport, StreamTransport, WsTransport};
