//! Error types for the chatclaw domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.
//!
//! Tool errors are special: their `Display` strings are what the
//! conversational engine sees. The dispatcher converts every `ToolError`
//! into an ordinary string result, so the engine can react to and explain
//! failures instead of the orchestration loop crashing on them.

use thiserror::Error;

/// The top-level error type for all chatclaw operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Engine errors ---
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    // --- Transport errors ---
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    // --- Session errors ---
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to parse engine response: {0}")]
    ResponseParse(String),

    #[error("Engine response carried no candidates")]
    EmptyResponse,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Message delivery failed to {recipient}: {reason}")]
    DeliveryFailed { recipient: String, reason: String },

    #[error("Transport connection lost: {0}")]
    ConnectionLost(String),

    #[error("Transport not started")]
    NotStarted,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupt session record: {0}")]
    CorruptRecord(String),
}

/// Tool-level faults. The `Display` string of each variant is returned to
/// the engine verbatim by the dispatcher, so these messages are written for
/// the model, not for a human operator.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Error: Access denied. You can only access files within {root}")]
    AccessDenied { root: String },

    #[error("Error: File not found: {0}")]
    NotFound(String),

    #[error(
        "⚠️ SAFETY BLOCK: This command contains destructive keywords. Ask the user for confirmation, then retry with override_safety set to true."
    )]
    SafetyBlocked,

    #[error("Error executing {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Error: {tool_name} timed out after {timeout_secs}s\n{output}")]
    Timeout {
        tool_name: String,
        timeout_secs: u64,
        output: String,
    },

    #[error("Error: Invalid tool arguments: {0}")]
    InvalidArguments(String),
}
