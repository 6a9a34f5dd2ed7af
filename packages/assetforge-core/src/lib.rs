use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod frame;
pub mod preferences;

pub use frame::{FrameError, HEARTBEAT_INTERVAL_SECS, HEARTBEAT_SENTINEL, StreamFrame};
pub use preferences::{
    DeliveryChannel, Frequency, InAppChannel, NotificationPreferences, PREFERENCES_STORAGE_KEY,
    TypeToggles,
};

/// 通知类型（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    #[serde(alias = "follow")]
    Follow,
    #[serde(alias = "like")]
    Like,
    #[serde(alias = "comment")]
    Comment,
    #[serde(alias = "message")]
    Message,
    #[serde(alias = "system")]
    System,
}

impl NotificationType {
    pub const ALL: [NotificationType; 5] = [
        NotificationType::Follow,
        NotificationType::Like,
        NotificationType::Comment,
        NotificationType::Message,
        NotificationType::System,
    ];

    /// Wire name, e.g. `FOLLOW`.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Follow => "FOLLOW",
            NotificationType::Like => "LIKE",
            NotificationType::Comment => "COMMENT",
            NotificationType::Message => "MESSAGE",
            NotificationType::System => "SYSTEM",
        }
    }

    /// Lowercased name used in `notification:<type>` topics.
    pub fn topic_name(&self) -> &'static str {
        match self {
            NotificationType::Follow => "follow",
            NotificationType::Like => "like",
            NotificationType::Comment => "comment",
            NotificationType::Message => "message",
            NotificationType::System => "system",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NotificationType::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown notification type: {s}"))
    }
}

/// 触发通知的用户
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sender {
    pub id: String,
    #[serde(alias = "name", alias = "username")]
    pub display_name: String,
}

/// 通知数据结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<Sender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_url: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

impl Notification {
    /// Checks the record as received from the backend.
    ///
    /// The id must be non-blank since it keys deduplication and UI lists.
    /// SYSTEM notifications have no actor, so a stray sender is dropped.
    pub fn validated(mut self) -> Result<Self, FrameError> {
        if self.id.trim().is_empty() {
            return Err(FrameError::InvalidNotification {
                message: "notification id is empty".to_string(),
            });
        }
        if self.kind == NotificationType::System {
            self.sender = None;
        }
        if self
            .link_url
            .as_deref()
            .is_some_and(|link| link.trim().is_empty())
        {
            self.link_url = None;
        }
        Ok(self)
    }
}

/// 未读数来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnreadSource {
    /// `unread_count` frame pushed over the stream
    Push,
    /// count fetched over REST after a (re)connect
    Reconcile,
}

/// 推送给 `unread_count` 订阅者的数据
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCountUpdate {
    pub unread_count: u64,
    pub source: UnreadSource,
}

/// 通知列表查询参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationQuery {
    pub page: u32,
    pub limit: u32,
    #[serde(default)]
    pub unread_only: bool,
}

impl Default for NotificationQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 20,
            unread_only: false,
        }
    }
}

/// 分页通知列表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPage {
    pub items: Vec<Notification>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

/// API 响应结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    pub data: T,
}

/// 未读数响应
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCountResponse {
    #[serde(alias = "unreadCount")]
    pub count: u64,
}

/// 标记已读请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkReadRequest {
    pub ids: Vec<String>,
}
