//! Client-side reactions to a new notification (desktop popup, sound).
//!
//! Both are optional platform capabilities. A missing capability, a denied
//! permission or a failing backend only skips that one effect.

use assetforge_core::{Notification, NotificationPreferences, NotificationType};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

/// How long a desktop notification stays up.
pub const DESKTOP_AUTO_DISMISS: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    /// The user has not been asked yet.
    Undecided,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopToast {
    /// Notification id, lets the platform replace duplicates.
    pub tag: String,
    pub title: String,
    pub body: String,
    /// Navigation target when the popup is clicked.
    pub link_url: Option<String>,
    pub auto_dismiss: Duration,
}

impl DesktopToast {
    pub fn for_notification(notification: &Notification) -> Self {
        Self {
            tag: notification.id.clone(),
            title: desktop_title(notification.kind).to_string(),
            body: notification.content.clone(),
            link_url: notification.link_url.clone(),
            auto_dismiss: DESKTOP_AUTO_DISMISS,
        }
    }
}

pub fn desktop_title(kind: NotificationType) -> &'static str {
    match kind {
        NotificationType::Follow => "New follower",
        NotificationType::Like => "New like",
        NotificationType::Comment => "New comment",
        NotificationType::Message => "New message",
        NotificationType::System => "System notice",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundCue {
    Notification,
    Message,
}

impl SoundCue {
    pub fn for_kind(kind: NotificationType) -> Self {
        match kind {
            NotificationType::Message => SoundCue::Message,
            _ => SoundCue::Notification,
        }
    }
}

#[derive(Debug, Error)]
pub enum EffectError {
    #[error("desktop notification failed: {0}")]
    Desktop(String),
    #[error("audio playback failed: {0}")]
    Audio(String),
}

pub trait DesktopNotifier: Send + Sync {
    fn permission(&self) -> Permission;

    /// Prompts the user. Only called while the permission is undecided.
    fn request_permission(&self) -> Permission;

    /// Shows the popup; the implementation owns dismissal and click handling.
    fn show(&self, toast: DesktopToast) -> Result<(), EffectError>;
}

pub trait AudioPlayer: Send + Sync {
    fn play(&self, cue: SoundCue) -> Result<(), EffectError>;
}

/// Platform capabilities injected into the hub; `None` means unsupported.
#[derive(Clone, Default)]
pub struct Capabilities {
    pub desktop: Option<Arc<dyn DesktopNotifier>>,
    pub audio: Option<Arc<dyn AudioPlayer>>,
}

impl Capabilities {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_desktop(mut self, desktop: Arc<dyn DesktopNotifier>) -> Self {
        self.desktop = Some(desktop);
        self
    }

    pub fn with_audio(mut self, audio: Arc<dyn AudioPlayer>) -> Self {
        self.audio = Some(audio);
        self
    }

    /// Asks for desktop permission if nobody has decided yet. Best-effort.
    pub fn request_desktop_permission(&self) {
        let Some(desktop) = &self.desktop else {
            return;
        };
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            if desktop.permission() == Permission::Undecided {
                let permission = desktop.request_permission();
                debug!(?permission, "desktop notification permission requested");
            }
        }));
        if outcome.is_err() {
            error!("desktop permission request panicked");
        }
    }

    /// Runs the desktop and sound effects for one notification, each isolated
    /// from the other.
    pub fn react(&self, notification: &Notification, prefs: &NotificationPreferences) {
        if prefs.allows_desktop() {
            if let Some(desktop) = &self.desktop {
                guarded("desktop", || {
                    if desktop.permission() != Permission::Granted {
                        return Ok(());
                    }
                    desktop.show(DesktopToast::for_notification(notification))
                });
            }
        }

        if prefs.allows_sound() {
            if let Some(audio) = &self.audio {
                guarded("sound", || audio.play(SoundCue::for_kind(notification.kind)));
            }
        }
    }
}

fn guarded(effect: &'static str, run: impl FnOnce() -> Result<(), EffectError>) {
    match catch_unwind(AssertUnwindSafe(run)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(effect, error = %e, "notification side effect failed"),
        Err(_) => error!(effect, "notification side effect panicked"),
    }
}
