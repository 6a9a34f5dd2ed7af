use crate::Notification;
use serde::Deserialize;
use std::fmt;

/// Plain-text liveness frame sent by the stream endpoint.
pub const HEARTBEAT_SENTINEL: &str = "heartbeat";

/// Interval at which the backend emits heartbeats.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// 推送流中的一帧
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    /// 心跳包，仅用于保活
    Heartbeat,
    /// 新通知
    Notification(Notification),
    /// 未读数
    UnreadCount(u64),
    /// 未知类型，保持向前兼容
    Unknown(String),
}

#[derive(Deserialize)]
struct UnreadCountFrame {
    #[serde(alias = "unreadCount")]
    count: i64,
}

impl StreamFrame {
    /// Cheap check that avoids a JSON parse for the common keep-alive case.
    pub fn is_heartbeat(raw: &str) -> bool {
        let trimmed = raw.trim();
        trimmed.is_empty() || trimmed == HEARTBEAT_SENTINEL
    }

    pub fn parse(raw: &str) -> Result<Self, FrameError> {
        if Self::is_heartbeat(raw) {
            return Ok(StreamFrame::Heartbeat);
        }

        let value: serde_json::Value =
            serde_json::from_str(raw.trim()).map_err(|e| FrameError::Malformed {
                message: e.to_string(),
            })?;

        let kind = value
            .get("type")
            .and_then(|kind| kind.as_str())
            .ok_or(FrameError::MissingType)?;

        match kind {
            "heartbeat" => Ok(StreamFrame::Heartbeat),
            "notification" => {
                let data = value.get("data").ok_or_else(|| FrameError::MissingField {
                    field: "data".to_string(),
                })?;
                let notification = Notification::deserialize(data).map_err(|e| {
                    FrameError::InvalidNotification {
                        message: e.to_string(),
                    }
                })?;
                Ok(StreamFrame::Notification(notification.validated()?))
            }
            "unread_count" => {
                let frame = UnreadCountFrame::deserialize(&value).map_err(|_| {
                    FrameError::MissingField {
                        field: "count".to_string(),
                    }
                })?;
                Ok(StreamFrame::UnreadCount(frame.count.max(0) as u64))
            }
            other => Ok(StreamFrame::Unknown(other.to_string())),
        }
    }
}

/// 帧解析错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// 非法 JSON
    Malformed { message: String },
    /// 缺少 type 字段
    MissingType,
    /// 缺少必需字段
    MissingField { field: String },
    /// 通知内容不合法
    InvalidNotification { message: String },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Malformed { message } => write!(f, "Malformed frame: {}", message),
            FrameError::MissingType => write!(f, "Frame has no type field"),
            FrameError::MissingField { field } => write!(f, "Frame is missing field: {}", field),
            FrameError::InvalidNotification { message } => {
                write!(f, "Invalid notification: {}", message)
            }
        }
    }
}

impl std::error::Error for FrameError {}
