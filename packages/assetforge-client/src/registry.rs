use assetforge_core::{Notification, NotificationType, UnreadCountUpdate};
use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::error;

/// 订阅主题
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// every notification (`notification`)
    Notification,
    /// one notification type (`notification:<type>`)
    Type(NotificationType),
    /// unread badge updates (`unread_count`)
    UnreadCount,
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Notification => f.write_str("notification"),
            Topic::Type(kind) => write!(f, "notification:{}", kind.topic_name()),
            Topic::UnreadCount => f.write_str("unread_count"),
        }
    }
}

impl FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "notification" => Ok(Topic::Notification),
            "unread_count" => Ok(Topic::UnreadCount),
            other => match other.strip_prefix("notification:") {
                Some(kind) => kind.parse().map(Topic::Type),
                None => Err(format!("unknown topic: {other}")),
            },
        }
    }
}

/// 分发给订阅者的事件
#[derive(Debug, Clone)]
pub enum HubEvent {
    Notification(Arc<Notification>),
    UnreadCount(UnreadCountUpdate),
}

pub type Handler = Arc<dyn Fn(&HubEvent) + Send + Sync>;

struct Entry {
    id: u64,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    topics: HashMap<Topic, Vec<Entry>>,
    next_id: u64,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Topic -> callbacks, with set semantics on handler identity.
#[derive(Default)]
pub struct SubscriberRegistry {
    inner: Arc<Mutex<Registry>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `topic`.
    ///
    /// Registering the same `Arc` twice for one topic keeps a single entry;
    /// the returned handle then refers to that existing entry.
    pub fn subscribe(&self, topic: Topic, handler: Handler) -> Subscription {
        let mut registry = lock(&self.inner);
        let existing = registry.topics.get(&topic).and_then(|entries| {
            entries
                .iter()
                .find(|entry| Arc::ptr_eq(&entry.handler, &handler))
                .map(|entry| entry.id)
        });

        let id = match existing {
            Some(id) => id,
            None => {
                registry.next_id += 1;
                let id = registry.next_id;
                registry
                    .topics
                    .entry(topic)
                    .or_default()
                    .push(Entry { id, handler });
                id
            }
        };

        Subscription {
            registry: Arc::downgrade(&self.inner),
            topic,
            id,
        }
    }

    /// Calls every handler registered for `topic` and returns how many ran.
    ///
    /// Handlers run on a snapshot taken before the first call, outside the
    /// lock, so they may subscribe or unsubscribe freely. A panicking handler
    /// is logged and the remaining ones still run.
    pub fn emit(&self, topic: Topic, event: &HubEvent) -> usize {
        let handlers: Vec<Handler> = {
            let registry = lock(&self.inner);
            match registry.topics.get(&topic) {
                Some(entries) => entries.iter().map(|entry| Arc::clone(&entry.handler)).collect(),
                None => return 0,
            }
        };

        for handler in &handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                error!(topic = %topic, "subscriber panicked during dispatch");
            }
        }
        handlers.len()
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        lock(&self.inner)
            .topics
            .get(&topic)
            .map_or(0, |entries| entries.len())
    }

    pub fn has_topic(&self, topic: Topic) -> bool {
        lock(&self.inner).topics.contains_key(&topic)
    }

    pub fn clear(&self) {
        lock(&self.inner).topics.clear();
    }
}

/// Handle returned by `subscribe`.
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    topic: Topic,
    id: u64,
}

impl Subscription {
    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Removes exactly this registration. Returns `false` if it was already
    /// gone (registry cleared or dropped).
    pub fn unsubscribe(self) -> bool {
        let Some(inner) = self.registry.upgrade() else {
            return false;
        };
        let mut registry = lock(&inner);
        let Some(entries) = registry.topics.get_mut(&self.topic) else {
            return false;
        };
        let Some(position) = entries.iter().position(|entry| entry.id == self.id) else {
            return false;
        };
        entries.remove(position);
        if entries.is_empty() {
            registry.topics.remove(&self.topic);
        }
        true
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("id", &self.id)
            .finish()
    }
}
