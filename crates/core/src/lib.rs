//! # chatclaw Core
//!
//! Domain types, traits, and error definitions for the chatclaw agent runtime.
//! This crate has **zero framework dependencies** — it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is defined as a trait here: the conversational
//! engine, the chat transport, and each tool. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod turn;
pub mod tool;
pub mod engine;
pub mod transport;

// Re-export key types at crate root for ergonomics
pub use error::{EngineError, Error, Result, SessionError, ToolError, TransportError};
pub use turn::{FunctionCall, FunctionResponse, InlineData, Part, Role, Turn};
pub use tool::{IMAGE_SENTINEL_PREFIX, TOOL_NOT_FOUND, Tool, ToolCall, ToolRegistry};
pub use engine::{Engine, EngineReply, ToolDefinition};
pub use transport::{
    InboundMedia, InboundMessage, MediaKind, OutboundContent, Presence, Transport,
};
