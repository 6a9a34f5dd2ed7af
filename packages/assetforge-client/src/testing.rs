//! In-memory doubles shared by the unit tests.

use crate::effects::{AudioPlayer, DesktopNotifier, DesktopToast, EffectError, Permission, SoundCue};
use assetforge_core::{
    Notification, NotificationPage, NotificationPreferences, NotificationQuery, NotificationType,
};
use assetforge_sdk::{FrameStream, NotificationApi, SdkError, SdkResult, StreamTransport};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures_util::StreamExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub fn notification(id: &str, kind: NotificationType) -> Notification {
    Notification {
        id: id.to_string(),
        kind,
        content: format!("{} notification {id}", kind.topic_name()),
        sender: None,
        link_url: None,
        created_at: Utc.with_ymd_and_hms(2026, 2, 3, 9, 0, 0).unwrap(),
        read: false,
    }
}

/// Stream frame carrying `notification` the way the server pushes it.
pub fn notification_frame(id: &str, kind: NotificationType) -> String {
    serde_json::json!({
        "type": "notification",
        "data": notification(id, kind),
    })
    .to_string()
}

pub fn unread_frame(count: u64) -> String {
    serde_json::json!({ "type": "unread_count", "count": count }).to_string()
}

enum MockOpen {
    Fail,
    Hang,
    Stream(mpsc::UnboundedReceiver<SdkResult<String>>),
}

/// Scripted transport: each `open` consumes the next entry. An empty script
/// fails the open.
#[derive(Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<MockOpen>>,
    opened: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_failure(&self) {
        self.script.lock().unwrap().push_back(MockOpen::Fail);
    }

    /// Queues a successful open; frames sent on the returned handle reach the
    /// stream, dropping it ends the stream.
    pub fn push_stream(&self) -> mpsc::UnboundedSender<SdkResult<String>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.script.lock().unwrap().push_back(MockOpen::Stream(rx));
        tx
    }

    /// Queues an open that never completes.
    pub fn push_hang(&self) {
        self.script.lock().unwrap().push_back(MockOpen::Hang);
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    pub fn opened_users(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl StreamTransport for MockTransport {
    async fn open(&self, user_id: &str) -> SdkResult<FrameStream> {
        self.opened.lock().unwrap().push(user_id.to_string());
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(MockOpen::Stream(rx)) => Ok(futures_util::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            })
            .boxed()),
            Some(MockOpen::Hang) => std::future::pending().await,
            Some(MockOpen::Fail) | None => {
                Err(SdkError::NetworkError("connection refused".to_string()))
            }
        }
    }
}

/// Backend double for the REST surface.
#[derive(Default)]
pub struct MockApi {
    pub unread_count: AtomicU64,
    pub fail_writes: AtomicBool,
    pub fail_reads: AtomicBool,
    pub remote_prefs: Mutex<Option<NotificationPreferences>>,
    pub saved_prefs: Mutex<Vec<NotificationPreferences>>,
    pub marked: Mutex<Vec<Vec<String>>>,
    pub mark_all_calls: AtomicUsize,
    pub unread_fetches: AtomicUsize,
    pub pages: Mutex<Vec<Notification>>,
}

impl MockApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_unread(count: u64) -> Arc<Self> {
        let api = Self::default();
        api.unread_count.store(count, Ordering::SeqCst);
        Arc::new(api)
    }

    fn check_write(&self) -> SdkResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SdkError::ApiError {
                status: "unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn check_read(&self) -> SdkResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SdkError::NetworkError("backend unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationApi for MockApi {
    async fn fetch_notifications(&self, query: &NotificationQuery) -> SdkResult<NotificationPage> {
        self.check_read()?;
        let all = self.pages.lock().unwrap().clone();
        let filtered: Vec<Notification> = all
            .into_iter()
            .filter(|item| !query.unread_only || !item.read)
            .collect();
        let total = filtered.len() as u64;
        let start = ((query.page.max(1) - 1) * query.limit) as usize;
        let items = filtered
            .into_iter()
            .skip(start)
            .take(query.limit as usize)
            .collect();
        Ok(NotificationPage {
            items,
            total,
            page: query.page,
            limit: query.limit,
        })
    }

    async fn fetch_unread_count(&self) -> SdkResult<u64> {
        self.check_read()?;
        self.unread_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.unread_count.load(Ordering::SeqCst))
    }

    async fn mark_as_read(&self, ids: &[String]) -> SdkResult<()> {
        self.check_write()?;
        self.marked.lock().unwrap().push(ids.to_vec());
        Ok(())
    }

    async fn mark_all_as_read(&self) -> SdkResult<()> {
        self.check_write()?;
        self.mark_all_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch_preferences(&self) -> SdkResult<NotificationPreferences> {
        self.check_read()?;
        Ok(self.remote_prefs.lock().unwrap().unwrap_or_default())
    }

    async fn save_preferences(&self, prefs: &NotificationPreferences) -> SdkResult<()> {
        self.check_write()?;
        self.saved_prefs.lock().unwrap().push(*prefs);
        Ok(())
    }
}

pub struct RecordingDesktop {
    permission: Mutex<Permission>,
    failing: bool,
    requests: AtomicUsize,
    shown: Mutex<Vec<DesktopToast>>,
}

impl RecordingDesktop {
    pub fn new(permission: Permission) -> Arc<Self> {
        Arc::new(Self {
            permission: Mutex::new(permission),
            failing: false,
            requests: AtomicUsize::new(0),
            shown: Mutex::new(Vec::new()),
        })
    }

    /// Granted, but every `show` errors.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            permission: Mutex::new(Permission::Granted),
            failing: true,
            requests: AtomicUsize::new(0),
            shown: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn shown(&self) -> Vec<DesktopToast> {
        self.shown.lock().unwrap().clone()
    }
}

impl DesktopNotifier for RecordingDesktop {
    fn permission(&self) -> Permission {
        *self.permission.lock().unwrap()
    }

    fn request_permission(&self) -> Permission {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let mut permission = self.permission.lock().unwrap();
        *permission = Permission::Granted;
        *permission
    }

    fn show(&self, toast: DesktopToast) -> Result<(), EffectError> {
        if self.failing {
            return Err(EffectError::Desktop("notification daemon gone".to_string()));
        }
        self.shown.lock().unwrap().push(toast);
        Ok(())
    }
}

pub struct RecordingAudio {
    panics: bool,
    cues: Mutex<Vec<SoundCue>>,
}

impl RecordingAudio {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            panics: false,
            cues: Mutex::new(Vec::new()),
        })
    }

    /// Records the attempt, then panics mid-playback.
    pub fn panicking() -> Arc<Self> {
        Arc::new(Self {
            panics: true,
            cues: Mutex::new(Vec::new()),
        })
    }

    pub fn plays(&self) -> usize {
        self.cues.lock().unwrap().len()
    }

    pub fn cues(&self) -> Vec<SoundCue> {
        self.cues.lock().unwrap().clone()
    }
}

impl AudioPlayer for RecordingAudio {
    fn play(&self, cue: SoundCue) -> Result<(), EffectError> {
        self.cues.lock().unwrap().push(cue);
        if self.panics {
            panic!("audio device disappeared");
        }
        Ok(())
    }
}
