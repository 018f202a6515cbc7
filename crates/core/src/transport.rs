//! Transport trait — the abstraction over the chat platform.
//!
//! A Transport connects chatclaw to a messaging platform. Connection,
//! pairing, and reconnection are the adapter's concern; the core only sees
//! inbound events with media bytes already fetched, and outbound sends.

use crate::error::TransportError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Kind of inbound media attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Audio,
}

/// An inbound media payload, bytes already downloaded by the adapter.
#[derive(Debug, Clone)]
pub struct InboundMedia {
    pub kind: MediaKind,

    /// MIME type as reported by the platform, if any.
    pub mime_type: Option<String>,

    /// Raw payload bytes.
    pub data: Vec<u8>,
}

/// A message received from the transport.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Platform message identifier (used for echo suppression and dedup).
    pub id: String,

    /// Sender identity — the session key.
    pub sender_id: String,

    /// Text content, if any.
    pub text: Option<String>,

    /// Media attachments, if any.
    pub media: Vec<InboundMedia>,

    /// Whether this message was sent by the connected account itself.
    pub from_self: bool,

    /// Whether this message arrived on a broadcast channel.
    pub broadcast: bool,
}

impl InboundMessage {
    /// First attached media of the given kind, if any.
    pub fn media_of(&self, kind: MediaKind) -> Option<&InboundMedia> {
        self.media.iter().find(|m| m.kind == kind)
    }
}

/// Content of an outbound send.
#[derive(Debug, Clone)]
pub enum OutboundContent {
    /// Plain text.
    Text(String),

    /// A binary artifact on disk, with an optional caption.
    Media {
        path: std::path::PathBuf,
        caption: Option<String>,
    },
}

/// Presence indicator shown to the remote user while the agent works.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Composing,
    Recording,
}

/// The core Transport trait.
///
/// Implementations handle platform-specific connection logic and message
/// formatting. `send` returns the platform identifier of the sent message so
/// the orchestration loop can record it for bot-echo suppression.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Human-readable transport name (e.g., "whatsapp").
    fn name(&self) -> &str;

    /// Start listening for incoming messages.
    ///
    /// Returns a receiver that yields inbound messages. The adapter handles
    /// polling, sockets, or webhooks internally.
    async fn start(
        &self,
    ) -> std::result::Result<tokio::sync::mpsc::Receiver<InboundMessage>, TransportError>;

    /// Send content to a recipient, optionally quoting a prior message.
    /// Returns the platform identifier of the sent message.
    async fn send(
        &self,
        recipient: &str,
        content: OutboundContent,
        quote: Option<&str>,
    ) -> std::result::Result<String, TransportError>;

    /// Show a presence indicator (if the platform supports it).
    async fn send_presence(
        &self,
        _recipient: &str,
        _presence: Presence,
    ) -> std::result::Result<(), TransportError> {
        Ok(()) // No-op default
    }

    /// Stop the transport gracefully.
    async fn stop(&self) -> std::result::Result<(), TransportError> {
        Ok(())
    }
}
