//! `chatclaw run` — start the agent daemon.
//!
//! Loads configuration, wires the security policy, tool registry, session
//! store, engine and transport into one [`AppState`], and runs the
//! orchestration loop until the transport stream ends.

use chatclaw_agent::AppState;
use chatclaw_config::AppConfig;
use chatclaw_engine::GeminiEngine;
use chatclaw_security::SecurityPolicy;
use chatclaw_session::SessionStore;
use chatclaw_tools::default_registry;
use chatclaw_transport::WhatsAppTransport;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub async fn run(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = match config_path {
        Some(path) => AppConfig::load_from(&path)?,
        None => AppConfig::load()?,
    };

    let policy = Arc::new(SecurityPolicy::new(&config.security.project_root)?);
    info!(root = %policy.root().display(), "Security root set");

    let engine = Arc::new(GeminiEngine::from_config(&config.engine)?);

    let tools = Arc::new(default_registry(
        policy.clone(),
        engine.clone(),
        config.session.artifacts_dir.clone(),
    ));
    info!(tools = ?tools.names(), "Tool registry ready");

    let store = Arc::new(SessionStore::new(
        config.session.sessions_path(),
        policy.root().to_path_buf(),
        config.session.max_turns,
    ));

    let transport = Arc::new(WhatsAppTransport::new());

    let state = AppState::new(config, store, tools, engine, transport);
    chatclaw_agent::run(state).await?;

    Ok(())
}
