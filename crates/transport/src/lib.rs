//! Chat transport adapters for chatclaw.
//!
//! Connection, pairing, and reconnection belong to the platform adapter —
//! the core only sees the [`chatclaw_core::Transport`] trait. The WhatsApp
//! adapter here runs in stub mode: messages are injected in-process and
//! sends are recorded, which is also what the orchestration tests drive.

pub mod whatsapp;

pub use whatsapp::{BROADCAST_SENDER, SentRecord, WhatsAppTransport};
