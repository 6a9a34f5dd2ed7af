//! Ready-made subscribers: an unread badge and a recent-activity feed.

use crate::hub::NotificationHub;
use crate::registry::Subscription;
use assetforge_core::{Notification, NotificationPage, NotificationType};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// 未读角标
pub struct UnreadBadge {
    count: Arc<AtomicU64>,
    subscriptions: Vec<Subscription>,
}

impl UnreadBadge {
    /// Starts from the hub's current count and follows it from then on.
    pub fn attach(hub: &NotificationHub) -> Self {
        let count = Arc::new(AtomicU64::new(hub.unread().get()));

        let on_count = Arc::clone(&count);
        let counts = hub.on_unread_count(move |update| {
            on_count.store(update.unread_count, Ordering::SeqCst);
        });

        let on_new = Arc::clone(&count);
        let arrivals = hub.on_notification(move |notification| {
            if !notification.read {
                on_new.fetch_add(1, Ordering::SeqCst);
            }
        });

        Self {
            count,
            subscriptions: vec![counts, arrivals],
        }
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    /// Optimistic decrement after the user reads `n` items; stops at zero.
    pub fn mark_read_locally(&self, n: u64) -> u64 {
        let previous = self
            .count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                Some(current.saturating_sub(n))
            })
            .unwrap_or_default();
        previous.saturating_sub(n)
    }

    pub fn detach(self) {
        for subscription in self.subscriptions {
            subscription.unsubscribe();
        }
    }
}

struct FeedItems {
    items: VecDeque<Arc<Notification>>,
    capacity: usize,
}

impl FeedItems {
    fn insert_newest(&mut self, notification: Arc<Notification>) {
        if self.items.iter().any(|item| item.id == notification.id) {
            return;
        }
        self.items.push_front(notification);
        self.items.truncate(self.capacity);
    }
}

/// Bounded most-recent-first list of notifications.
pub struct ActivityFeed {
    state: Arc<Mutex<FeedItems>>,
    filter: Option<NotificationType>,
    subscription: Subscription,
}

impl ActivityFeed {
    pub const DEFAULT_CAPACITY: usize = 50;

    /// Listens to every notification, or only `filter`'s type when given.
    pub fn attach(
        hub: &NotificationHub,
        capacity: usize,
        filter: Option<NotificationType>,
    ) -> Self {
        let state = Arc::new(Mutex::new(FeedItems {
            items: VecDeque::new(),
            capacity: capacity.max(1),
        }));

        let sink = Arc::clone(&state);
        let push = move |notification: &Notification| {
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert_newest(Arc::new(notification.clone()));
        };
        let subscription = match filter {
            Some(kind) => hub.subscribe_to_type(kind, push),
            None => hub.on_notification(push),
        };

        Self {
            state,
            filter,
            subscription,
        }
    }

    /// Seeds the feed with a fetched page (newest first, as the API returns
    /// it). Items already present are skipped.
    pub fn extend_from_page(&self, page: &NotificationPage) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        for item in &page.items {
            if self.filter.is_some_and(|kind| kind != item.kind) {
                continue;
            }
            if state.items.len() >= state.capacity {
                break;
            }
            if state.items.iter().any(|existing| existing.id == item.id) {
                continue;
            }
            state.items.push_back(Arc::new(item.clone()));
        }
    }

    pub fn items(&self) -> Vec<Arc<Notification>> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.items.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .items
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn detach(self) -> bool {
        self.subscription.unsubscribe()
    }
}
