//! 通知中心客户端：推送连接、订阅分发与偏好设置

pub mod backoff;
pub mod config;
pub mod connection;
pub mod consumers;
pub mod effects;
pub mod error;
pub mod hub;
pub mod registry;
pub mod store;
pub mod unread;

#[cfg(test)]
pub(crate) mod testing;

pub use backoff::Backoff;
pub use config::{HubConfig, TransportKind};
pub use connection::{
    CloseReason, ConnectionConfig, ConnectionEvent, ConnectionState, StreamConnection,
};
pub use consumers::{ActivityFeed, UnreadBadge};
pub use effects::{
    AudioPlayer, Capabilities, DesktopNotifier, DesktopToast, EffectError, Permission, SoundCue,
};
pub use error::{HubError, HubResult};
pub use hub::{HubDeps, NotificationHub};
pub use registry::{Handler, HubEvent, SubscriberRegistry, Subscription, Topic};
pub use store::{FileStore, LocalStore, MemoryStore, PreferenceStore};
pub use unread::UnreadCounter;
