//! The per-message orchestration state machine.
//!
//! RECEIVE → FILTER → BUILD_INPUT → SESSION_RESOLVE → MODEL_EXCHANGE →
//! TOOL_LOOP* → FINAL_REPLY, with a single error boundary around the whole
//! pipeline. Each inbound message runs in its own task; the only shared
//! state is [`AppState`].

use crate::state::AppState;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chatclaw_core::engine::EngineReply;
use chatclaw_core::tool::IMAGE_SENTINEL_PREFIX;
use chatclaw_core::transport::{
    InboundMessage, MediaKind, OutboundContent, Presence,
};
use chatclaw_core::turn::{Part, Turn};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Consume the transport's inbound stream, spawning one handler task per
/// message. Returns when the stream ends.
pub async fn run(state: Arc<AppState>) -> chatclaw_core::Result<()> {
    let mut rx = state.transport.start().await?;
    info!(transport = state.transport.name(), "chatclaw listening");

    while let Some(msg) = rx.recv().await {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            handle_message(state, msg).await;
        });
    }

    info!("Transport stream ended");
    Ok(())
}

/// Handle one inbound message. Never panics or propagates: any fault is
/// logged and reported outward as a short notice, leaving other sessions
/// untouched.
pub async fn handle_message(state: Arc<AppState>, msg: InboundMessage) {
    // --- RECEIVE / FILTER ---
    if msg.broadcast {
        debug!(id = %msg.id, "Dropping broadcast message");
        return;
    }
    if state.was_sent(&msg.id).await {
        debug!(id = %msg.id, "Dropping echo of own message");
        return;
    }
    if !state.mark_seen(&msg.id).await {
        debug!(id = %msg.id, "Dropping already-seen message");
        return;
    }
    if msg.from_self && !state.config.transport.allow_self {
        debug!(id = %msg.id, "Dropping self message");
        return;
    }
    if msg.text.as_deref().unwrap_or("").is_empty() && msg.media.is_empty() {
        debug!(id = %msg.id, "Dropping message with neither text nor media");
        return;
    }

    // --- ERROR boundary ---
    if let Err(e) = process_message(&state, &msg).await {
        error!(sender_id = %msg.sender_id, error = %e, "Message handling failed");
        let notice = format!("⚠️ Error: {e}");
        if let Err(send_err) = send_tracked(
            &state,
            &msg.sender_id,
            OutboundContent::Text(notice),
            None,
        )
        .await
        {
            error!(error = %send_err, "Failed to deliver error notice");
        }
    }
}

/// BUILD_INPUT through FINAL_REPLY.
async fn process_message(
    state: &AppState,
    msg: &InboundMessage,
) -> chatclaw_core::Result<()> {
    let sender = &msg.sender_id;

    // --- BUILD_INPUT ---
    let presence = if msg.media_of(MediaKind::Audio).is_some() {
        Presence::Recording
    } else {
        Presence::Composing
    };
    // Presence is cosmetic; failures never abort the message.
    let _ = state.transport.send_presence(sender, presence).await;

    let parts = build_input_parts(&state.config.transport.command_prefix, msg);
    if parts.is_empty() {
        // A bare command prefix with no media — nothing to ask.
        return Ok(());
    }

    // --- SESSION_RESOLVE ---
    let (is_new, mut history) = state.store.resolve(sender).await;
    if is_new {
        info!(sender_id = %sender, turns = history.len(), "Session ready");
    }
    history.push(Turn::user(parts));

    // --- MODEL_EXCHANGE ---
    let definitions = state.tools.definitions();
    let mut reply = state.engine.exchange(&history, &definitions).await?;
    push_reply_turn(&mut history, &reply);
    persist_quietly(state, sender, &history).await;

    // --- TOOL_LOOP ---
    while reply.wants_tools() {
        // One call per turn, even when the engine requests several: the
        // extras are dropped and the engine re-requests what it still
        // needs after seeing the first result. Deliberate backpressure.
        let call = reply.tool_calls[0].clone();
        if reply.tool_calls.len() > 1 {
            debug!(
                deferred = reply.tool_calls.len() - 1,
                "Engine requested multiple tool calls; executing the first only"
            );
        }

        info!(tool = %call.name, "Executing tool");
        let _ = send_tracked(
            state,
            sender,
            OutboundContent::Text(format!("⚡ {}...", call.name)),
            Some(&msg.id),
        )
        .await;

        let mut result = state.tools.dispatch(&call).await;
        debug!(tool = %call.name, result_len = result.len(), "Tool result");

        // Sentinel: a generated artifact is delivered outward immediately,
        // before the result feeds back to the engine.
        if let Some(rest) = result.strip_prefix(IMAGE_SENTINEL_PREFIX) {
            let path = PathBuf::from(rest.trim());
            match send_tracked(
                state,
                sender,
                OutboundContent::Media {
                    path,
                    caption: Some("🎨 Painted by chatclaw".into()),
                },
                Some(&msg.id),
            )
            .await
            {
                Ok(_) => info!("Generated image delivered"),
                Err(e) => {
                    warn!(error = %e, "Failed to deliver generated image");
                    result.push_str(
                        "\n(Note: image generated but could not be delivered to the chat)",
                    );
                }
            }
        }

        history.push(Turn::user(vec![Part::function_response(
            &call.name,
            &result,
        )]));

        reply = state.engine.exchange(&history, &definitions).await?;
        push_reply_turn(&mut history, &reply);
        persist_quietly(state, sender, &history).await;
    }

    // --- FINAL_REPLY ---
    if let Some(text) = reply.text.as_deref().filter(|t| !t.is_empty()) {
        send_tracked(
            state,
            sender,
            OutboundContent::Text(text.to_string()),
            Some(&msg.id),
        )
        .await?;
    }

    Ok(())
}

/// Assemble ordered content parts from an inbound message: optional text
/// (command prefix stripped), an audio-only hint, then image and audio
/// payloads as inline data.
fn build_input_parts(command_prefix: &str, msg: &InboundMessage) -> Vec<Part> {
    let mut parts = Vec::new();

    let text = msg.text.as_deref().unwrap_or("").trim();
    let prompt = strip_prefix_ci(text, command_prefix).trim();
    let audio = msg.media_of(MediaKind::Audio);

    if !prompt.is_empty() {
        parts.push(Part::text(prompt));
    } else if audio.is_some() {
        // Audio with no text: hint the engine at what the bytes are.
        parts.push(Part::text("Audio transcription/instruction:"));
    }

    if let Some(image) = msg.media_of(MediaKind::Image) {
        parts.push(Part::inline_data("image/jpeg", BASE64.encode(&image.data)));
    }

    if let Some(audio) = audio {
        let mime = audio
            .mime_type
            .clone()
            .unwrap_or_else(|| "audio/ogg".to_string());
        parts.push(Part::inline_data(mime, BASE64.encode(&audio.data)));
    }

    parts
}

/// Strip a leading command prefix, case-insensitively.
fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> &'a str {
    if prefix.is_empty() {
        return text;
    }
    match text.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => &text[prefix.len()..],
        _ => text,
    }
}

/// Append the engine's reply to the history as a model turn: text first,
/// then one functionCall part per requested call.
fn push_reply_turn(history: &mut Vec<Turn>, reply: &EngineReply) {
    let mut parts = Vec::new();
    if let Some(text) = reply.text.as_deref().filter(|t| !t.is_empty()) {
        parts.push(Part::text(text));
    }
    for call in &reply.tool_calls {
        parts.push(Part::function_call(&call.name, call.args.clone()));
    }
    if !parts.is_empty() {
        history.push(Turn::model(parts));
    }
}

/// Persist the session; persistence faults are logged and swallowed so the
/// turn still completes.
async fn persist_quietly(state: &AppState, sender: &str, history: &[Turn]) {
    if let Err(e) = state.store.persist(sender, history.to_vec()).await {
        warn!(sender_id = %sender, error = %e, "Failed to persist session");
    }
}

/// Send outward and record the sent identifier for echo suppression.
async fn send_tracked(
    state: &AppState,
    recipient: &str,
    content: OutboundContent,
    quote: Option<&str>,
) -> Result<String, chatclaw_core::TransportError> {
    let id = state.transport.send(recipient, content, quote).await?;
    state.record_sent(id.clone()).await;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chatclaw_config::AppConfig;
    use chatclaw_core::engine::{Engine, ToolDefinition};
    use chatclaw_core::error::{EngineError, TransportError};
    use chatclaw_core::tool::ToolCall;
    use chatclaw_core::transport::{InboundMedia, Transport};
    use chatclaw_security::SecurityPolicy;
    use chatclaw_session::SessionStore;
    use chatclaw_tools::default_registry;
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    /// Shared ordered log of externally visible events, so tests can assert
    /// interleaving between engine exchanges and outward sends.
    #[derive(Clone, Default)]
    struct EventLog(Arc<Mutex<Vec<String>>>);

    impl EventLog {
        fn push(&self, event: impl Into<String>) {
            self.0.lock().unwrap().push(event.into());
        }
        fn events(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    /// Engine whose replies are scripted per exchange.
    struct ScriptedEngine {
        replies: Mutex<VecDeque<EngineReply>>,
        histories: Mutex<Vec<Vec<Turn>>>,
        image_parts: Vec<Part>,
        fail_exchange: bool,
        log: EventLog,
    }

    impl ScriptedEngine {
        fn new(replies: Vec<EngineReply>, log: EventLog) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                histories: Mutex::new(Vec::new()),
                image_parts: vec![
                    Part::text("Here it is"),
                    Part::inline_data("image/png", BASE64.encode(b"png-bytes")),
                ],
                fail_exchange: false,
                log,
            })
        }

        fn failing(log: EventLog) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(VecDeque::new()),
                histories: Mutex::new(Vec::new()),
                image_parts: vec![],
                fail_exchange: true,
                log,
            })
        }

        fn exchange_count(&self) -> usize {
            self.histories.lock().unwrap().len()
        }

        fn history_at(&self, i: usize) -> Vec<Turn> {
            self.histories.lock().unwrap()[i].clone()
        }
    }

    #[async_trait]
    impl Engine for ScriptedEngine {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn exchange(
            &self,
            history: &[Turn],
            _tools: &[ToolDefinition],
        ) -> Result<EngineReply, EngineError> {
            self.log.push("exchange");
            self.histories.lock().unwrap().push(history.to_vec());
            if self.fail_exchange {
                return Err(EngineError::Network("connection reset".into()));
            }
            Ok(self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_default())
        }

        async fn generate_image(&self, _prompt: &str) -> Result<Vec<Part>, EngineError> {
            self.log.push("generate_image");
            Ok(self.image_parts.clone())
        }
    }

    /// Transport that records sends into the shared event log.
    struct RecordingTransport {
        sent: Mutex<Vec<(String, OutboundContent, Option<String>)>>,
        next_id: Mutex<u64>,
        fail_media: bool,
        log: EventLog,
    }

    impl RecordingTransport {
        fn new(log: EventLog) -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                next_id: Mutex::new(1),
                fail_media: false,
                log,
            })
        }

        fn failing_media(log: EventLog) -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                next_id: Mutex::new(1),
                fail_media: true,
                log,
            })
        }

        fn texts(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter_map(|(_, content, _)| match content {
                    OutboundContent::Text(t) => Some(t.clone()),
                    _ => None,
                })
                .collect()
        }

        fn media_paths(&self) -> Vec<PathBuf> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter_map(|(_, content, _)| match content {
                    OutboundContent::Media { path, .. } => Some(path.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        fn name(&self) -> &str {
            "recording"
        }

        async fn start(&self) -> Result<mpsc::Receiver<InboundMessage>, TransportError> {
            let (_tx, rx) = mpsc::channel(1);
            Ok(rx)
        }

        async fn send(
            &self,
            recipient: &str,
            content: OutboundContent,
            quote: Option<&str>,
        ) -> Result<String, TransportError> {
            if self.fail_media && matches!(content, OutboundContent::Media { .. }) {
                return Err(TransportError::DeliveryFailed {
                    recipient: recipient.into(),
                    reason: "upload rejected".into(),
                });
            }
            let kind = match &content {
                OutboundContent::Text(_) => "text",
                OutboundContent::Media { .. } => "media",
            };
            self.log.push(format!("send:{kind}"));
            let mut next = self.next_id.lock().unwrap();
            let id = format!("out-{}", *next);
            *next += 1;
            self.sent
                .lock()
                .unwrap()
                .push((recipient.into(), content, quote.map(str::to_string)));
            Ok(id)
        }
    }

    fn text_reply(text: &str) -> EngineReply {
        EngineReply {
            text: Some(text.into()),
            tool_calls: vec![],
        }
    }

    fn tool_reply(calls: Vec<(&str, serde_json::Value)>) -> EngineReply {
        EngineReply {
            text: None,
            tool_calls: calls
                .into_iter()
                .map(|(name, args)| ToolCall {
                    name: name.into(),
                    args,
                })
                .collect(),
        }
    }

    fn inbound(id: &str, sender: &str, text: &str) -> InboundMessage {
        InboundMessage {
            id: id.into(),
            sender_id: sender.into(),
            text: Some(text.into()),
            media: vec![],
            from_self: false,
            broadcast: false,
        }
    }

    fn make_state(
        dir: &Path,
        engine: Arc<ScriptedEngine>,
        transport: Arc<RecordingTransport>,
    ) -> Arc<AppState> {
        let mut config = AppConfig::default();
        config.engine.api_key = Some("test-key".into());
        config.security.project_root = dir.to_path_buf();
        config.session.artifacts_dir = dir.join("artifacts");

        let policy = Arc::new(SecurityPolicy::new(dir).unwrap());
        let tools = Arc::new(default_registry(
            policy,
            engine.clone() as Arc<dyn Engine>,
            config.session.artifacts_dir.clone(),
        ));
        let store = Arc::new(SessionStore::new(
            config.session.sessions_path(),
            dir.to_path_buf(),
            config.session.max_turns,
        ));

        AppState::new(config, store, tools, engine, transport)
    }

    #[tokio::test]
    async fn text_reply_is_delivered_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::default();
        let engine = ScriptedEngine::new(vec![text_reply("Hi there!")], log.clone());
        let transport = RecordingTransport::new(log);
        let state = make_state(dir.path(), engine.clone(), transport.clone());

        handle_message(state, inbound("m1", "u1", "hello")).await;

        // One exchange, reply delivered quoted to the originating message.
        assert_eq!(engine.exchange_count(), 1);
        let sent = transport.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert!(matches!(&sent[0].1, OutboundContent::Text(t) if t == "Hi there!"));
        assert_eq!(sent[0].2.as_deref(), Some("m1"));

        // Durable store has exactly one entry for u1: preamble + user + model.
        let record: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("artifacts/sessions.json")).unwrap(),
        )
        .unwrap();
        let senders = record.as_object().unwrap();
        assert_eq!(senders.len(), 1);
        assert_eq!(senders["u1"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn command_prefix_is_stripped() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::default();
        let engine = ScriptedEngine::new(vec![text_reply("ok")], log.clone());
        let transport = RecordingTransport::new(log);
        let state = make_state(dir.path(), engine.clone(), transport);

        handle_message(state, inbound("m1", "u1", "!AI do the thing")).await;

        let history = engine.history_at(0);
        let user_turn = &history[history.len() - 1];
        assert_eq!(user_turn.text(), "do the thing");
    }

    #[tokio::test]
    async fn broadcast_messages_are_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::default();
        let engine = ScriptedEngine::new(vec![], log.clone());
        let transport = RecordingTransport::new(log);
        let state = make_state(dir.path(), engine.clone(), transport.clone());

        let mut msg = inbound("m1", BROADCAST_SENDER_FOR_TEST, "status update");
        msg.broadcast = true;
        handle_message(state, msg).await;

        assert_eq!(engine.exchange_count(), 0);
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    const BROADCAST_SENDER_FOR_TEST: &str = "status@broadcast";

    #[tokio::test]
    async fn echo_of_own_send_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::default();
        let engine = ScriptedEngine::new(vec![], log.clone());
        let transport = RecordingTransport::new(log);
        let state = make_state(dir.path(), engine.clone(), transport);

        state.record_sent("out-42".into()).await;
        handle_message(state, inbound("out-42", "u1", "echoed")).await;

        assert_eq!(engine.exchange_count(), 0);
    }

    #[tokio::test]
    async fn duplicate_inbound_id_is_processed_once() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::default();
        let engine = ScriptedEngine::new(
            vec![text_reply("first"), text_reply("second")],
            log.clone(),
        );
        let transport = RecordingTransport::new(log);
        let state = make_state(dir.path(), engine.clone(), transport);

        handle_message(state.clone(), inbound("m1", "u1", "hello")).await;
        handle_message(state, inbound("m1", "u1", "hello")).await;

        assert_eq!(engine.exchange_count(), 1);
    }

    #[tokio::test]
    async fn empty_message_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::default();
        let engine = ScriptedEngine::new(vec![], log.clone());
        let transport = RecordingTransport::new(log);
        let state = make_state(dir.path(), engine.clone(), transport);

        let mut msg = inbound("m1", "u1", "");
        msg.text = None;
        handle_message(state, msg).await;

        assert_eq!(engine.exchange_count(), 0);
    }

    #[tokio::test]
    async fn audio_only_message_gets_hint_and_inline_part() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::default();
        let engine = ScriptedEngine::new(vec![text_reply("heard you")], log.clone());
        let transport = RecordingTransport::new(log);
        let state = make_state(dir.path(), engine.clone(), transport);

        let msg = InboundMessage {
            id: "m1".into(),
            sender_id: "u1".into(),
            text: None,
            media: vec![InboundMedia {
                kind: MediaKind::Audio,
                mime_type: None,
                data: b"opus".to_vec(),
            }],
            from_self: false,
            broadcast: false,
        };
        handle_message(state, msg).await;

        let history = engine.history_at(0);
        let user_turn = &history[history.len() - 1];
        assert_eq!(user_turn.parts.len(), 2);
        assert_eq!(
            user_turn.parts[0].as_text(),
            Some("Audio transcription/instruction:")
        );
        let inline = user_turn.parts[1].as_inline_data().unwrap();
        assert_eq!(inline.mime_type, "audio/ogg"); // default when source has none
    }

    #[tokio::test]
    async fn only_first_of_multiple_tool_calls_executes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "contents of a").unwrap();
        let log = EventLog::default();
        let engine = ScriptedEngine::new(
            vec![
                tool_reply(vec![
                    (
                        "read_file",
                        serde_json::json!({"path": dir.path().join("a.txt").to_str().unwrap()}),
                    ),
                    ("list_files", serde_json::json!({})),
                ]),
                text_reply("done"),
            ],
            log.clone(),
        );
        let transport = RecordingTransport::new(log);
        let state = make_state(dir.path(), engine.clone(), transport.clone());

        handle_message(state, inbound("m1", "u1", "read it")).await;

        // Exactly two exchanges: initial + one after the single tool result.
        assert_eq!(engine.exchange_count(), 2);

        // The second exchange's history ends with exactly one function
        // response, for the first requested call.
        let history = engine.history_at(1);
        let last = &history[history.len() - 1];
        assert_eq!(last.parts.len(), 1);
        match &last.parts[0] {
            Part::FunctionResponse { function_response } => {
                assert_eq!(function_response.name, "read_file");
                assert!(
                    function_response.response["content"]
                        .as_str()
                        .unwrap()
                        .contains("contents of a")
                );
            }
            other => panic!("Expected function response, got: {other:?}"),
        }

        // Transient "executing" notice went out before the final text.
        let texts = transport.texts();
        assert_eq!(texts[0], "⚡ read_file...");
        assert_eq!(texts[1], "done");
    }

    #[tokio::test]
    async fn zero_tool_calls_terminates_loop_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::default();
        let engine = ScriptedEngine::new(vec![text_reply("plain answer")], log.clone());
        let transport = RecordingTransport::new(log);
        let state = make_state(dir.path(), engine.clone(), transport);

        handle_message(state, inbound("m1", "u1", "just chat")).await;
        assert_eq!(engine.exchange_count(), 1);
    }

    #[tokio::test]
    async fn write_outside_root_is_denied_and_nothing_created() {
        let outside = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let escape = outside.path().join("escape.txt");
        let log = EventLog::default();
        let engine = ScriptedEngine::new(
            vec![
                tool_reply(vec![(
                    "write_file",
                    serde_json::json!({
                        "path": escape.to_str().unwrap(),
                        "content": "pwned"
                    }),
                )]),
                text_reply("Sorry, that path is off limits."),
            ],
            log.clone(),
        );
        let transport = RecordingTransport::new(log);
        let state = make_state(dir.path(), engine.clone(), transport.clone());

        handle_message(state, inbound("m1", "u2", "write it")).await;

        assert!(!escape.exists());

        // The engine saw an access-denied result and the loop continued to
        // its apology.
        let history = engine.history_at(1);
        let last = &history[history.len() - 1];
        match &last.parts[0] {
            Part::FunctionResponse { function_response } => {
                assert!(
                    function_response.response["content"]
                        .as_str()
                        .unwrap()
                        .contains("Access denied")
                );
            }
            other => panic!("Expected function response, got: {other:?}"),
        }
        assert!(
            transport
                .texts()
                .contains(&"Sorry, that path is off limits.".to_string())
        );
    }

    #[tokio::test]
    async fn dangerous_command_is_safety_blocked() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::default();
        let engine = ScriptedEngine::new(
            vec![
                tool_reply(vec![(
                    "run_terminal_command",
                    serde_json::json!({"command": "rm -rf tmp"}),
                )]),
                text_reply("That command needs confirmation."),
            ],
            log.clone(),
        );
        let transport = RecordingTransport::new(log);
        let state = make_state(dir.path(), engine.clone(), transport);

        handle_message(state, inbound("m1", "u3", "clean up")).await;

        let history = engine.history_at(1);
        let last = &history[history.len() - 1];
        match &last.parts[0] {
            Part::FunctionResponse { function_response } => {
                assert!(
                    function_response.response["content"]
                        .as_str()
                        .unwrap()
                        .contains("SAFETY BLOCK")
                );
            }
            other => panic!("Expected function response, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn generated_image_is_delivered_before_result_feeds_back() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::default();
        let engine = ScriptedEngine::new(
            vec![
                tool_reply(vec![(
                    "generate_image",
                    serde_json::json!({"prompt": "a red circle"}),
                )]),
                text_reply("There's your circle!"),
            ],
            log.clone(),
        );
        let transport = RecordingTransport::new(log.clone());
        let state = make_state(dir.path(), engine.clone(), transport.clone());

        handle_message(state, inbound("m1", "u4", "draw a red circle")).await;

        // The decoded payload landed in the artifacts store.
        let paths = transport.media_paths();
        assert_eq!(paths.len(), 1);
        assert_eq!(std::fs::read(&paths[0]).unwrap(), b"png-bytes");
        assert!(paths[0].file_name().unwrap().to_str().unwrap().starts_with("generated_"));

        // Ordering: the media send happens after the first exchange and
        // before the second (the result feeding back).
        let events = log.events();
        let media_pos = events.iter().position(|e| e == "send:media").unwrap();
        let exchanges: Vec<usize> = events
            .iter()
            .enumerate()
            .filter_map(|(i, e)| (e == "exchange").then_some(i))
            .collect();
        assert_eq!(exchanges.len(), 2);
        assert!(exchanges[0] < media_pos && media_pos < exchanges[1]);
    }

    #[tokio::test]
    async fn failed_image_delivery_appends_note_instead_of_aborting() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::default();
        let engine = ScriptedEngine::new(
            vec![
                tool_reply(vec![(
                    "generate_image",
                    serde_json::json!({"prompt": "a red circle"}),
                )]),
                text_reply("Generated, but I couldn't attach it."),
            ],
            log.clone(),
        );
        let transport = RecordingTransport::failing_media(log);
        let state = make_state(dir.path(), engine.clone(), transport.clone());

        handle_message(state, inbound("m1", "u4", "draw")).await;

        // Turn completed: the engine got the amended result.
        let history = engine.history_at(1);
        let last = &history[history.len() - 1];
        match &last.parts[0] {
            Part::FunctionResponse { function_response } => {
                let content = function_response.response["content"].as_str().unwrap();
                assert!(content.starts_with(IMAGE_SENTINEL_PREFIX));
                assert!(content.contains("could not be delivered"));
            }
            other => panic!("Expected function response, got: {other:?}"),
        }
        assert!(
            transport
                .texts()
                .contains(&"Generated, but I couldn't attach it.".to_string())
        );
    }

    #[tokio::test]
    async fn engine_failure_reports_short_notice() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::default();
        let engine = ScriptedEngine::failing(log.clone());
        let transport = RecordingTransport::new(log);
        let state = make_state(dir.path(), engine, transport.clone());

        handle_message(state, inbound("m1", "u1", "hello")).await;

        let texts = transport.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("⚠️ Error:"));
        assert!(texts[0].contains("connection reset"));
    }

    #[tokio::test]
    async fn run_spawns_handler_per_inbound_message() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::default();
        let engine = ScriptedEngine::new(
            vec![text_reply("one"), text_reply("two")],
            log.clone(),
        );

        // A transport whose start() hands back a channel we can feed.
        struct FeedTransport {
            inner: Arc<RecordingTransport>,
            rx: Mutex<Option<mpsc::Receiver<InboundMessage>>>,
        }

        #[async_trait]
        impl Transport for FeedTransport {
            fn name(&self) -> &str {
                "feed"
            }
            async fn start(&self) -> Result<mpsc::Receiver<InboundMessage>, TransportError> {
                Ok(self.rx.lock().unwrap().take().ok_or(TransportError::NotStarted)?)
            }
            async fn send(
                &self,
                recipient: &str,
                content: OutboundContent,
                quote: Option<&str>,
            ) -> Result<String, TransportError> {
                self.inner.send(recipient, content, quote).await
            }
        }

        let (tx, rx) = mpsc::channel(8);
        let recording = RecordingTransport::new(log);
        let transport = Arc::new(FeedTransport {
            inner: recording.clone(),
            rx: Mutex::new(Some(rx)),
        });

        let mut config = AppConfig::default();
        config.engine.api_key = Some("test-key".into());
        config.security.project_root = dir.path().to_path_buf();
        config.session.artifacts_dir = dir.path().join("artifacts");
        let policy = Arc::new(SecurityPolicy::new(dir.path()).unwrap());
        let tools = Arc::new(default_registry(
            policy,
            engine.clone() as Arc<dyn Engine>,
            config.session.artifacts_dir.clone(),
        ));
        let store = Arc::new(SessionStore::new(
            config.session.sessions_path(),
            dir.path().to_path_buf(),
            config.session.max_turns,
        ));
        let state = AppState::new(config, store, tools, engine.clone(), transport);

        let runner = tokio::spawn(run(state));

        tx.send(inbound("m1", "alice", "hi")).await.unwrap();
        tx.send(inbound("m2", "bob", "hi")).await.unwrap();
        drop(tx);
        runner.await.unwrap().unwrap();

        // Give spawned handlers a moment to finish.
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        assert_eq!(engine.exchange_count(), 2);
        assert_eq!(recording.texts().len(), 2);
    }
}
