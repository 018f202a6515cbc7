//! WhatsApp transport adapter (stub).
//!
//! Implements the Transport trait for WhatsApp. In production this would
//! sit on a socket library handling pairing and reconnection; here it is a
//! stub that receives injected messages and records sends via an in-process
//! channel, which keeps the orchestration loop fully exercisable.

use async_trait::async_trait;
use chatclaw_core::error::TransportError;
use chatclaw_core::transport::{InboundMessage, OutboundContent, Presence, Transport};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, mpsc};
use tracing::info;

/// Sender identity of WhatsApp status broadcasts. The orchestration filter
/// discards anything arriving from it.
pub const BROADCAST_SENDER: &str = "status@broadcast";

/// One recorded outbound send.
#[derive(Debug, Clone)]
pub struct SentRecord {
    pub id: String,
    pub recipient: String,
    pub content: OutboundContent,
    pub quote: Option<String>,
}

/// WhatsApp transport adapter.
pub struct WhatsAppTransport {
    /// Sender for injecting inbound messages (stub mode / tests).
    inject_tx: Mutex<Option<mpsc::Sender<InboundMessage>>>,

    /// Every outbound send, in order.
    sent: Mutex<Vec<SentRecord>>,

    /// Monotonic counter for outbound message ids.
    next_id: AtomicU64,
}

impl WhatsAppTransport {
    pub fn new() -> Self {
        Self {
            inject_tx: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Inject a message as if it arrived from the platform.
    pub async fn inject_message(&self, msg: InboundMessage) -> Result<(), TransportError> {
        let guard = self.inject_tx.lock().await;
        if let Some(tx) = guard.as_ref() {
            tx.send(msg)
                .await
                .map_err(|_| TransportError::ConnectionLost("message channel closed".into()))
        } else {
            Err(TransportError::NotStarted)
        }
    }

    /// Snapshot of everything sent so far.
    pub async fn sent_messages(&self) -> Vec<SentRecord> {
        self.sent.lock().await.clone()
    }
}

impl Default for WhatsAppTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for WhatsAppTransport {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn start(&self) -> Result<mpsc::Receiver<InboundMessage>, TransportError> {
        info!("WhatsApp transport starting (stub mode)");
        let (tx, rx) = mpsc::channel(64);
        *self.inject_tx.lock().await = Some(tx);
        // In production: spawn the socket event loop here
        Ok(rx)
    }

    async fn send(
        &self,
        recipient: &str,
        content: OutboundContent,
        quote: Option<&str>,
    ) -> Result<String, TransportError> {
        let id = format!("wa-out-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        info!(
            recipient = %recipient,
            id = %id,
            quote = ?quote,
            "WhatsApp send (stub)"
        );
        self.sent.lock().await.push(SentRecord {
            id: id.clone(),
            recipient: recipient.to_string(),
            content,
            quote: quote.map(str::to_string),
        });
        Ok(id)
    }

    async fn send_presence(
        &self,
        recipient: &str,
        presence: Presence,
    ) -> Result<(), TransportError> {
        info!(recipient = %recipient, presence = ?presence, "WhatsApp presence (stub)");
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        info!("WhatsApp transport stopping");
        *self.inject_tx.lock().await = None;
        Ok(())
    }
}
