//! Per-sender session cache and durable record.
//!
//! Sessions live in an in-memory map for the process lifetime and mirror
//! into one JSON document on disk (sender identity → full turn history),
//! rewritten in full on every persisted turn. All read-modify-write cycles
//! against the document run under the store's write lock, so concurrent
//! tasks for different senders cannot lose each other's updates.
//!
//! Invariant: once a sender is in the in-memory map, the durable record is
//! never consulted again for that sender while the process runs.

pub mod seed;

use chatclaw_core::error::SessionError;
use chatclaw_core::turn::Turn;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// The on-disk shape: sender identity → ordered turn history. A BTreeMap
/// keeps the serialized document stable, so persisting the same state twice
/// produces byte-identical output.
type DurableRecord = BTreeMap<String, Vec<Turn>>;

/// Resolves, seeds, and persists per-sender conversation history.
pub struct SessionStore {
    /// Path of the durable record document.
    path: PathBuf,

    /// Security root, named in the seed preamble so the model knows its scope.
    root: PathBuf,

    /// Retention cap per sender; see [`SessionStore::persist`].
    max_turns: usize,

    /// In-memory cache, authoritative for the process lifetime.
    sessions: RwLock<BTreeMap<String, Vec<Turn>>>,
}

impl SessionStore {
    pub fn new(path: PathBuf, root: PathBuf, max_turns: usize) -> Self {
        Self {
            path,
            root,
            max_turns,
            sessions: RwLock::new(BTreeMap::new()),
        }
    }

    /// Resolve the history for a sender.
    ///
    /// Returns `(is_new, history)` where `is_new` marks a session created by
    /// this call. A cached sender returns its in-memory history untouched.
    /// An uncached sender is looked up in the durable record: with no prior
    /// history the session is seeded with the fixed two-turn preamble; with
    /// prior history the capability-upgrade turns are appended so restored
    /// agents learn about tools added since the history was recorded.
    pub async fn resolve(&self, sender_id: &str) -> (bool, Vec<Turn>) {
        {
            let sessions = self.sessions.read().await;
            if let Some(history) = sessions.get(sender_id) {
                debug!(sender_id = %sender_id, turns = history.len(), "Resuming cached session");
                return (false, history.clone());
            }
        }

        let mut sessions = self.sessions.write().await;
        // Double-check: another task may have seeded while we waited.
        if let Some(history) = sessions.get(sender_id) {
            return (false, history.clone());
        }

        let record = load_record(&self.path);
        let history = match record.get(sender_id) {
            Some(stored) if !stored.is_empty() => {
                info!(
                    sender_id = %sender_id,
                    turns = stored.len(),
                    "Restored session from durable record"
                );
                let mut history = stored.clone();
                history.extend(seed::capability_upgrade());
                history
            }
            _ => {
                info!(sender_id = %sender_id, "Seeding new session");
                seed::preamble(&self.root)
            }
        };

        sessions.insert(sender_id.to_string(), history.clone());
        (true, history)
    }

    /// Persist a sender's full history: update the cache, load the durable
    /// record (or an empty one), overwrite the sender's entry, and rewrite
    /// the whole document. Idempotent — persisting the same history twice
    /// produces the same stored bytes.
    ///
    /// Histories longer than the retention cap keep the two preamble turns
    /// plus the newest remainder.
    pub async fn persist(&self, sender_id: &str, history: Vec<Turn>) -> Result<(), SessionError> {
        let history = self.trim(history);

        let mut sessions = self.sessions.write().await;
        sessions.insert(sender_id.to_string(), history.clone());

        let mut record = load_record(&self.path);
        record.insert(sender_id.to_string(), history);
        self.flush(&record)
    }

    /// Apply the retention cap.
    fn trim(&self, history: Vec<Turn>) -> Vec<Turn> {
        if history.len() <= self.max_turns {
            return history;
        }
        let keep_tail = self.max_turns - 2;
        let cut = history.len() - keep_tail;
        let mut trimmed: Vec<Turn> = history[..2].to_vec();
        trimmed.extend_from_slice(&history[cut..]);
        debug!(
            dropped = cut - 2,
            kept = trimmed.len(),
            "Trimmed session history past retention cap"
        );
        trimmed
    }

    /// Rewrite the durable document.
    fn flush(&self, record: &DurableRecord) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SessionError::Storage(format!("failed to create session directory: {e}"))
            })?;
        }

        let content = serde_json::to_string_pretty(record)
            .map_err(|e| SessionError::Storage(format!("failed to serialize sessions: {e}")))?;

        std::fs::write(&self.path, content)
            .map_err(|e| SessionError::Storage(format!("failed to write session file: {e}")))
    }
}

/// Load the durable record, treating a missing or corrupt document as empty.
fn load_record(path: &Path) -> DurableRecord {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return DurableRecord::new(),
    };

    match serde_json::from_str(&content) {
        Ok(record) => record,
        Err(e) => {
            warn!(error = %e, path = %path.display(), "Corrupt session record, starting empty");
            DurableRecord::new()
        }
    }
}
