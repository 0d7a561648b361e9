//! In-memory `SessionStore` (§4.13 collaborator contract).
//!
//! An `RwLock<HashMap<..>>`-backed design storing the plain
//! `sessionId -> Vec<SessionMessage>` history the orchestrator's
//! contract asks for. Persistence is optional JSONL under a configured
//! directory, using a one-line-per-event append pattern rather than a
//! whole-session snapshot file, since the contract needs ordered
//! append, not whole-session rewrite.

use std::collections::HashMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;

use sa_domain::error::{Error, Result};
use sa_domain::message::{MessageContent, SessionMessage, SessionMessageKind};
use sa_domain::traits::SessionStore;

struct SessionRecord {
    messages: Vec<SessionMessage>,
    updated_at: String,
}

impl SessionRecord {
    fn new() -> Self {
        Self { messages: Vec::new(), updated_at: Utc::now().to_rfc3339() }
    }
}

/// An in-memory [`SessionStore`], with an optional JSONL transcript
/// mirrored to disk as each message is appended. Dropping the process
/// loses in-memory state; the JSONL file (if configured) survives it
/// and can be replayed with [`InMemorySessionStore::load_from_disk`].
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, SessionRecord>>,
    transcript_dir: Option<PathBuf>,
}

impl InMemorySessionStore {
    /// A store with no disk persistence — history lives only in memory
    /// for the lifetime of the process.
    pub fn new() -> Self {
        Self { sessions: RwLock::new(HashMap::new()), transcript_dir: None }
    }

    /// A store that mirrors every appended message as a JSONL line
    /// under `transcript_dir/<session_id>.jsonl`.
    pub fn with_transcript_dir(transcript_dir: impl Into<PathBuf>) -> Self {
        Self { sessions: RwLock::new(HashMap::new()), transcript_dir: Some(transcript_dir.into()) }
    }

    /// Replay a session's history back into memory from its JSONL
    /// transcript file, if one exists. No-op if this store has no
    /// configured `transcript_dir` or the file doesn't exist yet.
    pub fn load_from_disk(&self, session_id: &str) -> Result<()> {
        let Some(dir) = &self.transcript_dir else { return Ok(()) };
        let path = transcript_path(dir, session_id);
        if !path.exists() {
            return Ok(());
        }

        let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
        let mut messages = Vec::new();
        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let msg: SessionMessage = serde_json::from_str(line)?;
            messages.push(msg);
        }

        let mut sessions = self.sessions.write();
        let record = sessions.entry(session_id.to_string()).or_insert_with(SessionRecord::new);
        record.messages = messages;
        record.updated_at = Utc::now().to_rfc3339();
        Ok(())
    }

    fn append_to_disk(&self, session_id: &str, message: &SessionMessage) -> Result<()> {
        let Some(dir) = &self.transcript_dir else { return Ok(()) };
        std::fs::create_dir_all(dir).map_err(Error::Io)?;
        let path = transcript_path(dir, session_id);
        let mut file = std::fs::OpenOptions::new().create(true).append(true).open(&path).map_err(Error::Io)?;
        let line = serde_json::to_string(message)?;
        writeln!(file, "{line}").map_err(Error::Io)?;
        Ok(())
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn transcript_path(dir: &Path, session_id: &str) -> PathBuf {
    dir.join(format!("{session_id}.jsonl"))
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn append(
        &self,
        session_id: &str,
        kind: SessionMessageKind,
        content: MessageContent,
        parent_id: Option<String>,
    ) -> Result<SessionMessage> {
        let message = SessionMessage { id: uuid::Uuid::new_v4().to_string(), kind, content, parent_id };

        {
            let mut sessions = self.sessions.write();
            let record = sessions.entry(session_id.to_string()).or_insert_with(SessionRecord::new);
            record.messages.push(message.clone());
            record.updated_at = Utc::now().to_rfc3339();
        }

        self.append_to_disk(session_id, &message)?;
        tracing::debug!(session_id, message_id = %message.id, kind = ?message.kind, "session message appended");
        Ok(message)
    }

    async fn get_messages(&self, session_id: &str) -> Result<Vec<SessionMessage>> {
        Ok(self.sessions.read().get(session_id).map(|r| r.messages.clone()).unwrap_or_default())
    }

    async fn get_metadata(&self, session_id: &str) -> Result<Value> {
        let sessions = self.sessions.read();
        match sessions.get(session_id) {
            Some(record) => Ok(serde_json::json!({
                "updatedAt": record.updated_at,
                "messageCount": record.messages.len(),
            })),
            None => Ok(serde_json::json!({ "updatedAt": "", "messageCount": 0 })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_then_get_messages_returns_them_in_order() {
        let store = InMemorySessionStore::new();
        store.append("s1", SessionMessageKind::User, MessageContent::Text("hi".into()), None).await.unwrap();
        store.append("s1", SessionMessageKind::Assistant, MessageContent::Text("hello".into()), None).await.unwrap();

        let messages = store.get_messages("s1").await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content.extract_all_text(), "hi");
        assert_eq!(messages[1].content.extract_all_text(), "hello");
    }

    #[tokio::test]
    async fn get_messages_on_unknown_session_is_empty_not_an_error() {
        let store = InMemorySessionStore::new();
        let messages = store.get_messages("nonexistent").await.unwrap();
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn metadata_tracks_message_count_and_advances_updated_at() {
        let store = InMemorySessionStore::new();
        let before = store.get_metadata("s1").await.unwrap();
        assert_eq!(before["messageCount"], 0);

        store.append("s1", SessionMessageKind::User, MessageContent::Text("hi".into()), None).await.unwrap();
        let after = store.get_metadata("s1").await.unwrap();
        assert_eq!(after["messageCount"], 1);
        assert_ne!(after["updatedAt"], before["updatedAt"]);
    }

    #[tokio::test]
    async fn transcript_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemorySessionStore::with_transcript_dir(dir.path());
        store.append("s1", SessionMessageKind::User, MessageContent::Text("persisted".into()), None).await.unwrap();

        let reloaded = InMemorySessionStore::with_transcript_dir(dir.path());
        reloaded.load_from_disk("s1").unwrap();
        let messages = reloaded.get_messages("s1").await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content.extract_all_text(), "persisted");
    }

    #[tokio::test]
    async fn load_from_disk_on_missing_file_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemorySessionStore::with_transcript_dir(dir.path());
        store.load_from_disk("never-appended").unwrap();
        assert!(store.get_messages("never-appended").await.unwrap().is_empty());
    }
}
