//! The notification hub: owns the stream connection, classifies frames and
//! fans them out to subscribers, and fronts the REST calls consumers need.

use crate::connection::{ConnectionConfig, ConnectionEvent, ConnectionState, StreamConnection};
use crate::effects::Capabilities;
use crate::error::HubResult;
use crate::registry::{Handler, HubEvent, SubscriberRegistry, Subscription, Topic};
use crate::store::{LocalStore, PreferenceStore};
use crate::unread::UnreadCounter;
use assetforge_core::{
    Notification, NotificationPage, NotificationPreferences, NotificationQuery, NotificationType,
    StreamFrame, UnreadCountUpdate, UnreadSource,
};
use assetforge_sdk::{NotificationApi, StreamTransport};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Everything the hub needs from the outside world.
pub struct HubDeps {
    pub api: Arc<dyn NotificationApi>,
    pub transport: Arc<dyn StreamTransport>,
    pub store: Arc<dyn LocalStore>,
    pub capabilities: Capabilities,
    pub connection: ConnectionConfig,
}

struct HubShared {
    api: Arc<dyn NotificationApi>,
    registry: SubscriberRegistry,
    unread: UnreadCounter,
    prefs: PreferenceStore,
    capabilities: Capabilities,
    current_user: Mutex<Option<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl HubShared {
    fn is_current(&self, user_id: &str) -> bool {
        lock(&self.current_user).as_deref() == Some(user_id)
    }

    fn handle_frame(&self, raw: &str) {
        let frame = match StreamFrame::parse(raw) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "dropping malformed stream frame");
                return;
            }
        };

        match frame {
            StreamFrame::Heartbeat => trace!("heartbeat"),
            StreamFrame::Notification(notification) => self.deliver(notification),
            StreamFrame::UnreadCount(count) => self.publish_unread(count, UnreadSource::Push),
            StreamFrame::Unknown(kind) => debug!(kind, "ignoring unknown frame type"),
        }
    }

    fn deliver(&self, notification: Notification) {
        if !notification.read {
            self.unread.increment();
        }

        let notification = Arc::new(notification);
        let event = HubEvent::Notification(Arc::clone(&notification));
        let general = self.registry.emit(Topic::Notification, &event);
        let typed = self.registry.emit(Topic::Type(notification.kind), &event);
        debug!(
            id = %notification.id,
            kind = %notification.kind,
            subscribers = general + typed,
            "notification delivered"
        );

        let prefs = self.prefs.load();
        self.capabilities.react(&notification, &prefs);
    }

    fn publish_unread(&self, count: u64, source: UnreadSource) {
        self.unread.set(count);
        let event = HubEvent::UnreadCount(UnreadCountUpdate {
            unread_count: count,
            source,
        });
        self.registry.emit(Topic::UnreadCount, &event);
    }

    /// Pulls the authoritative count after `generation` opened. The result is
    /// dropped if that connection is gone by the time it arrives.
    async fn reconcile_unread(
        &self,
        connection: &StreamConnection,
        user_id: &str,
        generation: u64,
    ) {
        match self.api.fetch_unread_count().await {
            Ok(count) => {
                if !connection.is_current(generation) || !self.is_current(user_id) {
                    debug!(user_id, generation, "discarding unread count for closed stream");
                    return;
                }
                debug!(user_id, count, "unread count reconciled");
                self.publish_unread(count, UnreadSource::Reconcile);
            }
            Err(e) => warn!(user_id, error = %e, "failed to reconcile unread count"),
        }
    }
}

/// Consumes connection events for the lifetime of the hub.
///
/// Events from a connection that has since been torn down, even one for the
/// same user, are dropped before they reach subscribers.
async fn dispatch(
    shared: Arc<HubShared>,
    connection: Arc<StreamConnection>,
    mut events: mpsc::UnboundedReceiver<ConnectionEvent>,
) {
    while let Some(event) = events.recv().await {
        let generation = event.generation();
        if !connection.is_current(generation) {
            trace!(generation, "dropping event from closed stream");
            continue;
        }
        match event {
            ConnectionEvent::Opened { user_id, .. } => {
                info!(user_id, generation, "notification stream open");
                let shared = Arc::clone(&shared);
                let connection = Arc::clone(&connection);
                tokio::spawn(async move {
                    shared
                        .reconcile_unread(&connection, &user_id, generation)
                        .await
                });
            }
            ConnectionEvent::Message { user_id, raw, .. } => {
                if shared.is_current(&user_id) {
                    shared.handle_frame(&raw);
                } else {
                    debug!(user_id, "dropping frame for inactive user");
                }
            }
            ConnectionEvent::ClosedUnexpectedly { user_id, reason, .. } => {
                debug!(user_id, ?reason, "notification stream lost");
            }
            ConnectionEvent::ReconnectScheduled {
                user_id,
                attempt,
                delay,
                ..
            } => {
                let delay_ms = delay.as_millis() as u64;
                debug!(user_id, attempt, delay_ms, "waiting to reconnect");
            }
        }
    }
}

pub struct NotificationHub {
    shared: Arc<HubShared>,
    connection: Arc<StreamConnection>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl NotificationHub {
    /// Builds the hub and starts its dispatch task. Must be called inside a
    /// tokio runtime. Nothing connects until `initialize`.
    pub fn create(deps: HubDeps) -> Self {
        let (connection, events) = StreamConnection::new(deps.transport, deps.connection);
        let connection = Arc::new(connection);
        let shared = Arc::new(HubShared {
            api: deps.api,
            registry: SubscriberRegistry::new(),
            unread: UnreadCounter::default(),
            prefs: PreferenceStore::new(deps.store),
            capabilities: deps.capabilities,
            current_user: Mutex::new(None),
        });
        let dispatcher = tokio::spawn(dispatch(
            Arc::clone(&shared),
            Arc::clone(&connection),
            events,
        ));

        Self {
            shared,
            connection,
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    /// Starts push delivery for `user_id`.
    ///
    /// Returns `false` when in-app notifications are disabled; the stream is
    /// then left closed. Calling again for the same user is a no-op, another
    /// user replaces the current one.
    pub fn initialize(&self, user_id: &str) -> bool {
        let switched = {
            let mut current = lock(&self.shared.current_user);
            let switched = current.as_deref() != Some(user_id);
            *current = Some(user_id.to_string());
            switched
        };
        if switched {
            self.shared.unread.reset();
        }

        let prefs = self.shared.prefs.load();
        if !prefs.stream_enabled() {
            info!(user_id, "in-app notifications disabled, stream not started");
            self.connection.disconnect();
            return false;
        }

        self.connection.connect(user_id);
        // The permission prompt may block; the stream task is already running.
        self.shared.capabilities.request_desktop_permission();
        true
    }

    pub fn subscribe(&self, topic: Topic, handler: Handler) -> Subscription {
        self.shared.registry.subscribe(topic, handler)
    }

    pub fn subscribe_to_type(
        &self,
        kind: NotificationType,
        callback: impl Fn(&Notification) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe(Topic::Type(kind), notification_handler(callback))
    }

    pub fn on_notification(
        &self,
        callback: impl Fn(&Notification) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe(Topic::Notification, notification_handler(callback))
    }

    pub fn on_unread_count(
        &self,
        callback: impl Fn(UnreadCountUpdate) + Send + Sync + 'static,
    ) -> Subscription {
        let handler: Handler = Arc::new(move |event: &HubEvent| {
            if let HubEvent::UnreadCount(update) = event {
                callback(*update);
            }
        });
        self.subscribe(Topic::UnreadCount, handler)
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.shared.registry.subscriber_count(topic)
    }

    /// Closes the stream, drops every subscription and zeroes the count.
    pub fn disconnect(&self) {
        self.connection.disconnect();
        self.shared.registry.clear();
        self.shared.unread.reset();
        *lock(&self.shared.current_user) = None;
    }

    /// `disconnect` plus stopping the dispatch task. The hub is inert after.
    pub fn dispose(&self) {
        self.disconnect();
        if let Some(dispatcher) = lock(&self.dispatcher).take() {
            dispatcher.abort();
        }
    }

    pub fn get_preferences(&self) -> NotificationPreferences {
        self.shared.prefs.load()
    }

    /// Writes locally first, then to the backend.
    ///
    /// A local write failure is only logged. A backend failure is returned,
    /// but the local copy keeps the new value.
    pub async fn save_preferences(&self, prefs: &NotificationPreferences) -> HubResult<()> {
        if let Err(e) = self.shared.prefs.store(prefs) {
            warn!(error = %e, "failed to cache preferences locally");
        }
        self.apply_stream_preference(prefs);

        self.shared.api.save_preferences(prefs).await?;
        info!("notification preferences saved");
        Ok(())
    }

    /// Pulls preferences from the backend into the local cache.
    pub async fn refresh_preferences(&self) -> HubResult<NotificationPreferences> {
        let prefs = self.shared.api.fetch_preferences().await?;
        if let Err(e) = self.shared.prefs.store(&prefs) {
            warn!(error = %e, "failed to cache preferences locally");
        }
        self.apply_stream_preference(&prefs);
        Ok(prefs)
    }

    fn apply_stream_preference(&self, prefs: &NotificationPreferences) {
        let Some(user_id) = self.current_user() else {
            return;
        };
        if prefs.stream_enabled() {
            self.connection.connect(&user_id);
        } else {
            self.connection.disconnect();
        }
    }

    /// Backend only; the local count follows the next push or reconcile.
    pub async fn mark_as_read(&self, ids: &[String]) -> HubResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.shared.api.mark_as_read(ids).await?;
        Ok(())
    }

    pub async fn mark_all_as_read(&self) -> HubResult<()> {
        self.shared.api.mark_all_as_read().await?;
        Ok(())
    }

    pub async fn fetch_notifications(
        &self,
        query: &NotificationQuery,
    ) -> HubResult<NotificationPage> {
        Ok(self.shared.api.fetch_notifications(query).await?)
    }

    pub async fn fetch_unread_count(&self) -> HubResult<u64> {
        Ok(self.shared.api.fetch_unread_count().await?)
    }

    pub fn unread(&self) -> &UnreadCounter {
        &self.shared.unread
    }

    /// Classifies and dispatches one raw frame as if it came off the stream.
    pub fn handle_frame(&self, raw: &str) {
        self.shared.handle_frame(raw);
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn current_user(&self) -> Option<String> {
        lock(&self.shared.current_user).clone()
    }
}

impl Drop for NotificationHub {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn notification_handler(callback: impl Fn(&Notification) + Send + Sync + 'static) -> Handler {
    Arc::new(move |event: &HubEvent| {
        if let HubEvent::Notification(notification) = event {
            callback(notification);
        }
    })
}
