//! Application state — everything a message handler needs, constructed once
//! at startup and passed into every handler task.
//!
//! This replaces ambient globals: the session map lives in the store, and
//! the outbound-id / seen-id tracking sets live here behind a mutex. The
//! outbound set is consulted by the inbound filter so the agent never
//! answers its own messages.

use chatclaw_config::AppConfig;
use chatclaw_core::engine::Engine;
use chatclaw_core::tool::ToolRegistry;
use chatclaw_core::transport::Transport;
use chatclaw_session::SessionStore;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared application state, lifecycle = process start → process shutdown.
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<SessionStore>,
    pub tools: Arc<ToolRegistry>,
    pub engine: Arc<dyn Engine>,
    pub transport: Arc<dyn Transport>,

    /// Identifiers of messages this process sent.
    sent_ids: Mutex<HashSet<String>>,

    /// Identifiers of inbound messages already handled.
    seen_ids: Mutex<HashSet<String>>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<SessionStore>,
        tools: Arc<ToolRegistry>,
        engine: Arc<dyn Engine>,
        transport: Arc<dyn Transport>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            store,
            tools,
            engine,
            transport,
            sent_ids: Mutex::new(HashSet::new()),
            seen_ids: Mutex::new(HashSet::new()),
        })
    }

    /// Record the identifier of an outbound send.
    pub async fn record_sent(&self, id: String) {
        self.sent_ids.lock().await.insert(id);
    }

    /// Whether an identifier belongs to a message this process sent.
    pub async fn was_sent(&self, id: &str) -> bool {
        self.sent_ids.lock().await.contains(id)
    }

    /// Mark an inbound identifier as handled. Returns false if it was
    /// already seen.
    pub async fn mark_seen(&self, id: &str) -> bool {
        self.seen_ids.lock().await.insert(id.to_string())
    }
}
