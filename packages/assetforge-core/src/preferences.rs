use crate::NotificationType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Local-storage key the cached preferences live under.
pub const PREFERENCES_STORAGE_KEY: &str = "notification_preferences";

/// 邮件/推送频率
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    Instant,
    Daily,
    Weekly,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Frequency::Instant => "instant",
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
        })
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "instant" => Ok(Frequency::Instant),
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            other => Err(format!("unknown frequency: {other}")),
        }
    }
}

/// 按通知类型的开关
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeToggles {
    pub follow: bool,
    pub like: bool,
    pub comment: bool,
    pub message: bool,
    pub system: bool,
}

impl Default for TypeToggles {
    fn default() -> Self {
        Self {
            follow: true,
            like: true,
            comment: true,
            message: true,
            system: true,
        }
    }
}

impl TypeToggles {
    pub fn allows(&self, kind: NotificationType) -> bool {
        match kind {
            NotificationType::Follow => self.follow,
            NotificationType::Like => self.like,
            NotificationType::Comment => self.comment,
            NotificationType::Message => self.message,
            NotificationType::System => self.system,
        }
    }

    pub fn set(&mut self, kind: NotificationType, enabled: bool) {
        let slot = match kind {
            NotificationType::Follow => &mut self.follow,
            NotificationType::Like => &mut self.like,
            NotificationType::Comment => &mut self.comment,
            NotificationType::Message => &mut self.message,
            NotificationType::System => &mut self.system,
        };
        *slot = enabled;
    }
}

/// 邮件或推送渠道配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeliveryChannel {
    pub enabled: bool,
    pub frequency: Frequency,
    pub types: TypeToggles,
}

impl Default for DeliveryChannel {
    fn default() -> Self {
        Self {
            enabled: true,
            frequency: Frequency::Instant,
            types: TypeToggles::default(),
        }
    }
}

/// 站内通知配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InAppChannel {
    pub enabled: bool,
    pub sound: bool,
    pub desktop: bool,
}

impl Default for InAppChannel {
    // Sound is off until the user opts in.
    fn default() -> Self {
        Self {
            enabled: true,
            sound: false,
            desktop: true,
        }
    }
}

/// 用户通知偏好
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationPreferences {
    pub email: DeliveryChannel,
    pub push: DeliveryChannel,
    pub in_app: InAppChannel,
}

impl NotificationPreferences {
    /// Whether the live stream should be opened at all.
    pub fn stream_enabled(&self) -> bool {
        self.in_app.enabled
    }

    pub fn allows_desktop(&self) -> bool {
        self.in_app.enabled && self.in_app.desktop
    }

    pub fn allows_sound(&self) -> bool {
        self.in_app.enabled && self.in_app.sound
    }
}
