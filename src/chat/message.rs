use std::fmt;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ChatError, ChatResult};

/// Server-assigned conversation id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub i64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(SessionId)
    }
}

/// A named conversation thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// Message ids come back from the backend either as numbers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    Int(i64),
    Text(String),
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Int(id) => write!(f, "{}", id),
            MessageId::Text(id) => f.write_str(id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Assistant => "Assistant",
        }
    }
}

/// File reference attached to a persisted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerFile {
    pub file_id: MessageId,
    pub file_url: String,
    pub filename: String,
}

/// A message as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub content: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<ServerFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

const WELCOME_TEXT: &str =
    "Hello! I'm your AI trading assistant. How can I help you today with your trading journey?";

impl Message {
    /// Built-in greeting shown when no session is active. Never cached.
    pub fn welcome() -> Self {
        Self {
            id: MessageId::Text("welcome".to_string()),
            content: WELCOME_TEXT.to_string(),
            role: Role::Assistant,
            files: Vec::new(),
            created_at: None,
        }
    }
}

/// A local file staged for upload. The bytes are shared so the optimistic
/// message and the outgoing request can both hold the same handle.
#[derive(Clone, PartialEq, Eq)]
pub struct FileHandle {
    pub name: String,
    pub mime: String,
    pub data: Arc<[u8]>,
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("size", &self.data.len())
            .finish()
    }
}

impl FileHandle {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            data: data.into(),
        }
    }

    /// Reads a file from disk and guesses its MIME type from the extension.
    pub fn from_path(path: &Path) -> ChatResult<Self> {
        let data = std::fs::read(path)
            .map_err(|e| ChatError::Io(format!("{}: {}", path.display(), e)))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());
        let mime = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Ok(Self::new(name, mime, data))
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Human-readable size, e.g. `12.3 KB`.
    pub fn size_label(&self) -> String {
        format!("{:.1} KB", self.size() as f64 / 1024.0)
    }

    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }
}

/// A user message created locally before the server has confirmed it.
///
/// The local id is unique for the lifetime of the optimistic entry and has
/// no relation to the id the server will eventually assign.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimisticMessage {
    pub local_id: Uuid,
    pub content: String,
    pub attachments: Vec<FileHandle>,
    pub created_at: DateTime<Utc>,
}

impl OptimisticMessage {
    pub fn user(content: impl Into<String>, attachments: Vec<FileHandle>) -> Self {
        Self {
            local_id: Uuid::new_v4(),
            content: content.into(),
            attachments,
            created_at: Utc::now(),
        }
    }
}

/// Entry of the per-session message list.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedMessage {
    Optimistic(OptimisticMessage),
    Confirmed(Message),
}

impl CachedMessage {
    pub fn content(&self) -> &str {
        match self {
            CachedMessage::Optimistic(m) => &m.content,
            CachedMessage::Confirmed(m) => &m.content,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            CachedMessage::Optimistic(_) => Role::User,
            CachedMessage::Confirmed(m) => m.role,
        }
    }

    pub fn is_optimistic(&self) -> bool {
        matches!(self, CachedMessage::Optimistic(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_ids_accept_numbers_and_strings() {
        let raw = r#"[
            {"id": 7, "content": "hi", "role": "user"},
            {"id": "a1", "content": "hello", "role": "assistant",
             "files": [{"file_id": 3, "file_url": "https://cdn/x.png", "filename": "x.png"}],
             "created_at": "2025-03-01T10:00:00Z"}
        ]"#;
        let messages: Vec<Message> = serde_json::from_str(raw).unwrap();
        assert_eq!(messages[0].id, MessageId::Int(7));
        assert_eq!(messages[1].id, MessageId::Text("a1".into()));
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].files[0].filename, "x.png");
        assert!(messages[0].files.is_empty());
    }

    #[test]
    fn from_path_guesses_mime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();

        let handle = FileHandle::from_path(&path).unwrap();
        assert_eq!(handle.name, "chart.png");
        assert_eq!(handle.mime, "image/png");
        assert_eq!(handle.size(), 4);
        assert!(handle.is_image());
    }

    #[test]
    fn optimistic_ids_are_distinct() {
        let a = OptimisticMessage::user("one", Vec::new());
        let b = OptimisticMessage::user("one", Vec::new());
        assert_ne!(a.local_id, b.local_id);
    }
}
