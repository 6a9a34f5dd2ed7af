//! One live push connection per user.
//!
//! The connection is a small state machine (`Idle -> Connecting -> Open`)
//! driven by a single spawned task per generation. That task owns the open
//! timeout, the reconnect sleep and the heartbeat watch, so aborting it is the
//! only cancellation needed. Every state change and every emitted signal is
//! checked against the generation under the lock; a task from a torn-down
//! generation can never publish into the current one.
//!
//! Events already queued when a generation ends still reach the receiver, so
//! each one carries its generation and the owner drops any that
//! [`StreamConnection::is_current`] rejects.

use crate::backoff::Backoff;
use assetforge_core::HEARTBEAT_INTERVAL_SECS;
use assetforge_sdk::{FrameStream, StreamTransport};
use futures_util::StreamExt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Nothing arrived within the heartbeat timeout.
    HeartbeatTimeout,
    /// The server ended the stream.
    EndOfStream,
    Transport(String),
}

/// Lifecycle signals delivered to the connection's owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Opened {
        user_id: String,
        generation: u64,
    },
    Message {
        user_id: String,
        generation: u64,
        raw: String,
    },
    ClosedUnexpectedly {
        user_id: String,
        generation: u64,
        reason: CloseReason,
    },
    ReconnectScheduled {
        user_id: String,
        generation: u64,
        attempt: u32,
        delay: Duration,
    },
}

impl ConnectionEvent {
    pub fn generation(&self) -> u64 {
        match self {
            ConnectionEvent::Opened { generation, .. }
            | ConnectionEvent::Message { generation, .. }
            | ConnectionEvent::ClosedUnexpectedly { generation, .. }
            | ConnectionEvent::ReconnectScheduled { generation, .. } => *generation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Interval the server sends heartbeats at.
    pub heartbeat_interval: Duration,
    pub backoff: Backoff,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(HEARTBEAT_INTERVAL_SECS),
            backoff: Backoff::default(),
        }
    }
}

impl ConnectionConfig {
    /// Silence longer than this means the stream is dead: 1.5x the interval.
    pub fn heartbeat_timeout(&self) -> Duration {
        self.heartbeat_interval * 3 / 2
    }

    /// An open still pending after this long is abandoned and retried.
    pub fn open_timeout(&self) -> Duration {
        self.heartbeat_timeout()
    }
}

struct Inner {
    state: ConnectionState,
    user_id: Option<String>,
    generation: u64,
    attempts: u32,
    last_frame_at: Option<Instant>,
    driver: Option<JoinHandle<()>>,
}

impl Inner {
    fn teardown(&mut self) {
        self.generation += 1;
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
        self.state = ConnectionState::Idle;
        self.user_id = None;
        self.attempts = 0;
        self.last_frame_at = None;
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct StreamConnection {
    transport: Arc<dyn StreamTransport>,
    config: ConnectionConfig,
    inner: Arc<Mutex<Inner>>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
}

impl StreamConnection {
    pub fn new(
        transport: Arc<dyn StreamTransport>,
        config: ConnectionConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let connection = Self {
            transport,
            config,
            inner: Arc::new(Mutex::new(Inner {
                state: ConnectionState::Idle,
                user_id: None,
                generation: 0,
                attempts: 0,
                last_frame_at: None,
                driver: None,
            })),
            events,
        };
        (connection, rx)
    }

    /// Opens the stream for `user_id` and returns the generation its events
    /// will carry.
    ///
    /// No-op while already connecting or open for the same user. A different
    /// user tears the old connection down first. Must be called from inside a
    /// tokio runtime.
    pub fn connect(&self, user_id: &str) -> u64 {
        let mut inner = lock(&self.inner);
        if inner.state != ConnectionState::Idle {
            if inner.user_id.as_deref() == Some(user_id) {
                debug!(user_id, state = ?inner.state, "connect ignored, already active");
                return inner.generation;
            }
            info!(
                previous = inner.user_id.as_deref().unwrap_or_default(),
                user_id, "switching stream to another user"
            );
            inner.teardown();
        }

        inner.generation += 1;
        inner.state = ConnectionState::Connecting;
        inner.user_id = Some(user_id.to_string());
        inner.attempts = 0;

        let driver = Driver {
            transport: Arc::clone(&self.transport),
            config: self.config,
            inner: Arc::clone(&self.inner),
            events: self.events.clone(),
            user_id: user_id.to_string(),
            generation: inner.generation,
        };
        inner.driver = Some(tokio::spawn(driver.run()));
        info!(user_id, generation = inner.generation, "stream connecting");
        inner.generation
    }

    /// Tears the stream down and cancels any pending reconnect. Idempotent.
    pub fn disconnect(&self) {
        let mut inner = lock(&self.inner);
        if inner.state == ConnectionState::Idle && inner.driver.is_none() {
            return;
        }
        let user_id = inner.user_id.clone().unwrap_or_default();
        inner.teardown();
        info!(user_id, "stream disconnected");
    }

    pub fn state(&self) -> ConnectionState {
        lock(&self.inner).state
    }

    /// Whether events tagged `generation` belong to the live connection.
    /// Always false while idle.
    pub fn is_current(&self, generation: u64) -> bool {
        let inner = lock(&self.inner);
        inner.state != ConnectionState::Idle && inner.generation == generation
    }

    pub fn user_id(&self) -> Option<String> {
        lock(&self.inner).user_id.clone()
    }

    /// Consecutive failed attempts since the last successful open.
    pub fn attempts(&self) -> u32 {
        lock(&self.inner).attempts
    }

    pub fn last_frame_at(&self) -> Option<Instant> {
        lock(&self.inner).last_frame_at
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

struct Driver {
    transport: Arc<dyn StreamTransport>,
    config: ConnectionConfig,
    inner: Arc<Mutex<Inner>>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    user_id: String,
    generation: u64,
}

impl Driver {
    async fn run(self) {
        let open_timeout = self.config.open_timeout();
        loop {
            match tokio::time::timeout(open_timeout, self.transport.open(&self.user_id)).await {
                Ok(Ok(frames)) => {
                    if !self.mark_open() {
                        return;
                    }
                    let Some(reason) = self.pump(frames).await else {
                        return;
                    };
                    warn!(user_id = %self.user_id, ?reason, "stream closed unexpectedly");
                    let reported = self.with_current(|_| {
                        let _ = self.events.send(ConnectionEvent::ClosedUnexpectedly {
                            user_id: self.user_id.clone(),
                            generation: self.generation,
                            reason,
                        });
                    });
                    if reported.is_none() {
                        return;
                    }
                }
                Ok(Err(e)) => {
                    warn!(user_id = %self.user_id, error = %e, "failed to open stream");
                }
                Err(_) => {
                    warn!(
                        user_id = %self.user_id,
                        timeout_ms = open_timeout.as_millis() as u64,
                        "stream open timed out"
                    );
                }
            }

            let Some(delay) = self.schedule_retry() else {
                return;
            };
            tokio::time::sleep(delay).await;
        }
    }

    /// Runs `f` only while this driver's generation is still current.
    fn with_current<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> Option<R> {
        let mut inner = lock(&self.inner);
        if inner.generation != self.generation {
            return None;
        }
        Some(f(&mut inner))
    }

    fn mark_open(&self) -> bool {
        self.with_current(|inner| {
            inner.state = ConnectionState::Open;
            inner.attempts = 0;
            inner.last_frame_at = Some(Instant::now());
            let _ = self.events.send(ConnectionEvent::Opened {
                user_id: self.user_id.clone(),
                generation: self.generation,
            });
        })
        .is_some()
    }

    /// Forwards frames until the stream dies. `None` means superseded.
    async fn pump(&self, mut frames: FrameStream) -> Option<CloseReason> {
        let timeout = self.config.heartbeat_timeout();
        loop {
            let raw = match tokio::time::timeout(timeout, frames.next()).await {
                Err(_) => return Some(CloseReason::HeartbeatTimeout),
                Ok(None) => return Some(CloseReason::EndOfStream),
                Ok(Some(Err(e))) => return Some(CloseReason::Transport(e.to_string())),
                Ok(Some(Ok(raw))) => raw,
            };
            self.with_current(|inner| {
                inner.last_frame_at = Some(Instant::now());
                let _ = self.events.send(ConnectionEvent::Message {
                    user_id: self.user_id.clone(),
                    generation: self.generation,
                    raw,
                });
            })?;
        }
    }

    fn schedule_retry(&self) -> Option<Duration> {
        self.with_current(|inner| {
            inner.attempts = inner.attempts.saturating_add(1);
            inner.state = ConnectionState::Connecting;
            let delay = self.config.backoff.delay(inner.attempts);
            info!(
                user_id = %self.user_id,
                attempt = inner.attempts,
                delay_ms = delay.as_millis() as u64,
                "reconnect scheduled"
            );
            let _ = self.events.send(ConnectionEvent::ReconnectScheduled {
                user_id: self.user_id.clone(),
                generation: self.generation,
                attempt: inner.attempts,
                delay,
            });
            delay
        })
    }
}
