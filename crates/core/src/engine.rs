//! Engine trait — the abstraction over the conversational generative engine.
//!
//! The engine is an external collaborator exchanging structured turns and
//! tool-call requests. chatclaw never implements generation itself; it sends
//! the accumulated turn history plus tool declarations and receives either
//! final text or requested tool calls.

use crate::error::EngineError;
use crate::tool::ToolCall;
use crate::turn::{Part, Turn};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A tool definition declared to the engine so it knows what it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name.
    pub name: String,

    /// Description of what the tool does.
    pub description: String,

    /// JSON Schema describing the tool's parameters.
    pub parameters: serde_json::Value,
}

/// One engine response: final text, one-or-more requested tool calls, or both.
#[derive(Debug, Clone, Default)]
pub struct EngineReply {
    /// Text content of the reply, if any.
    pub text: Option<String>,

    /// Tool calls the engine wants executed before it can answer.
    pub tool_calls: Vec<ToolCall>,
}

impl EngineReply {
    /// Whether this reply carries at least one tool call.
    pub fn wants_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// The core Engine trait.
///
/// The orchestration loop calls `exchange()` with the full turn history
/// (including the newest user turn) and the declared tools, without knowing
/// which backend is serving the session.
#[async_trait]
pub trait Engine: Send + Sync {
    /// A human-readable name for this engine (e.g., "gemini").
    fn name(&self) -> &str;

    /// Submit the full history and receive the next reply.
    async fn exchange(
        &self,
        history: &[Turn],
        tools: &[ToolDefinition],
    ) -> std::result::Result<EngineReply, EngineError>;

    /// Generate an image for the given prompt, returning the raw content
    /// parts of the engine's response. Callers scan the parts for inline
    /// binary data; text parts may precede it.
    async fn generate_image(
        &self,
        prompt: &str,
    ) -> std::result::Result<Vec<Part>, EngineError>;
}
