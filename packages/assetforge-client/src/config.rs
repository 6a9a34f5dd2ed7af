use crate::backoff::{Backoff, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY};
use crate::connection::ConnectionConfig;
use crate::effects::Capabilities;
use crate::hub::HubDeps;
use crate::store::{FileStore, LocalStore};
use anyhow::{Context, Result, bail};
use assetforge_core::HEARTBEAT_INTERVAL_SECS;
use assetforge_sdk::{AssetforgeClient, SseTransport, StreamTransport, WsTransport};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_SERVER: &str = "http://127.0.0.1:3000";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    #[default]
    WebSocket,
    Sse,
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ws" | "websocket" => Ok(TransportKind::WebSocket),
            "sse" | "event-stream" => Ok(TransportKind::Sse),
            other => Err(format!("unknown transport: {other} (expected ws or sse)")),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::WebSocket => f.write_str("ws"),
            TransportKind::Sse => f.write_str("sse"),
        }
    }
}

/// Client settings, read from `ASSETFORGE_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    pub server: String,
    pub token: Option<String>,
    pub transport: TransportKind,
    pub heartbeat_interval: Duration,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub request_timeout: Duration,
    /// `None` uses the platform cache directory.
    pub cache_dir: Option<PathBuf>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            token: None,
            transport: TransportKind::default(),
            heartbeat_interval: Duration::from_secs(HEARTBEAT_INTERVAL_SECS),
            backoff_base: DEFAULT_BASE_DELAY,
            backoff_max: DEFAULT_MAX_DELAY,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            cache_dir: None,
        }
    }
}

impl HubConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(server) = var("ASSETFORGE_SERVER") {
            config.server = server.trim().to_string();
        }
        config.token = var("ASSETFORGE_TOKEN");
        if let Some(transport) = var("ASSETFORGE_TRANSPORT") {
            config.transport = transport
                .parse::<TransportKind>()
                .map_err(anyhow::Error::msg)
                .context("invalid ASSETFORGE_TRANSPORT")?;
        }
        if let Some(secs) = var("ASSETFORGE_HEARTBEAT_SECS") {
            config.heartbeat_interval =
                Duration::from_secs(parse_number(&secs, "ASSETFORGE_HEARTBEAT_SECS")?);
        }
        if let Some(ms) = var("ASSETFORGE_BACKOFF_BASE_MS") {
            config.backoff_base =
                Duration::from_millis(parse_number(&ms, "ASSETFORGE_BACKOFF_BASE_MS")?);
        }
        if let Some(ms) = var("ASSETFORGE_BACKOFF_MAX_MS") {
            config.backoff_max =
                Duration::from_millis(parse_number(&ms, "ASSETFORGE_BACKOFF_MAX_MS")?);
        }
        if let Some(secs) = var("ASSETFORGE_TIMEOUT_SECS") {
            config.request_timeout =
                Duration::from_secs(parse_number(&secs, "ASSETFORGE_TIMEOUT_SECS")?);
        }
        config.cache_dir = var("ASSETFORGE_CACHE_DIR").map(PathBuf::from);

        if config.heartbeat_interval.is_zero() {
            bail!("ASSETFORGE_HEARTBEAT_SECS must be greater than zero");
        }
        Ok(config)
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            heartbeat_interval: self.heartbeat_interval,
            backoff: Backoff::new(self.backoff_base, self.backoff_max),
        }
    }

    pub fn sdk_client(&self) -> AssetforgeClient {
        let client = AssetforgeClient::new(&self.server).with_timeout(self.request_timeout);
        match &self.token {
            Some(token) => client.with_token(token),
            None => client,
        }
    }

    pub fn transport(&self) -> Arc<dyn StreamTransport> {
        match self.transport {
            TransportKind::WebSocket => Arc::new(WsTransport::new(self.sdk_client())),
            TransportKind::Sse => Arc::new(SseTransport::new(self.sdk_client())),
        }
    }

    pub fn local_store(&self) -> Arc<dyn LocalStore> {
        match &self.cache_dir {
            Some(dir) => Arc::new(FileStore::new(dir)),
            None => Arc::new(FileStore::default_location()),
        }
    }

    /// Production wiring: REST client, configured transport, file cache.
    pub fn hub_deps(&self, capabilities: Capabilities) -> HubDeps {
        HubDeps {
            api: Arc::new(self.sdk_client()),
            transport: self.transport(),
            store: self.local_store(),
            capabilities,
            connection: self.connection_config(),
        }
    }
}

fn parse_number(value: &str, name: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .with_context(|| format!("invalid {name}: {value}"))
}
