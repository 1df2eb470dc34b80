//! In-memory backend used by the unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::api::ChatBackend;
use crate::chat::message::{FileHandle, Message, MessageId, Role, ServerFile, Session, SessionId};
use crate::error::{ChatError, ChatResult};

#[derive(Debug, Clone)]
pub struct PostedMessage {
    pub session_id: SessionId,
    pub content: String,
    pub filenames: Vec<String>,
}

#[derive(Default)]
struct Inner {
    sessions: Vec<Session>,
    messages: HashMap<SessionId, Vec<Message>>,
    next_id: i64,
    fetches: usize,
    posted: Vec<PostedMessage>,
    fail_next_post: Option<ChatError>,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Stores sessions and messages in memory and answers every post with an
/// assistant reply, like the real backend does.
#[derive(Default)]
pub struct MemoryBackend {
    inner: Mutex<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_session(&self, id: i64, title: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.sessions.push(Session {
            id: SessionId(id),
            title: title.to_string(),
            created_at: Utc::now(),
        });
        inner.messages.insert(SessionId(id), Vec::new());
    }

    pub fn push_message(&self, session: i64, role: Role, content: &str) {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id();
        inner
            .messages
            .entry(SessionId(session))
            .or_default()
            .push(Message {
                id: MessageId::Int(id),
                content: content.to_string(),
                role,
                files: Vec::new(),
                created_at: Some(Utc::now()),
            });
    }

    pub fn fail_next_post(&self, error: ChatError) {
        self.inner.lock().unwrap().fail_next_post = Some(error);
    }

    pub fn fetch_count(&self) -> usize {
        self.inner.lock().unwrap().fetches
    }

    pub fn post_count(&self) -> usize {
        self.inner.lock().unwrap().posted.len()
    }

    pub fn posted(&self) -> Vec<PostedMessage> {
        self.inner.lock().unwrap().posted.clone()
    }
}

fn not_found(id: SessionId) -> ChatError {
    ChatError::Server {
        status: 404,
        message: format!("Session {} not found", id),
    }
}

#[async_trait]
impl ChatBackend for MemoryBackend {
    async fn list_sessions(&self) -> ChatResult<Vec<Session>> {
        Ok(self.inner.lock().unwrap().sessions.clone())
    }

    async fn create_session(&self, title: &str) -> ChatResult<Session> {
        let mut inner = self.inner.lock().unwrap();
        let id = SessionId(inner.next_id());
        let session = Session {
            id,
            title: title.to_string(),
            created_at: Utc::now(),
        };
        inner.sessions.push(session.clone());
        inner.messages.insert(id, Vec::new());
        Ok(session)
    }

    async fn delete_session(&self, id: SessionId) -> ChatResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.messages.remove(&id).is_none() {
            return Err(not_found(id));
        }
        inner.sessions.retain(|s| s.id != id);
        Ok(())
    }

    async fn list_messages(&self, id: SessionId) -> ChatResult<Vec<Message>> {
        let mut inner = self.inner.lock().unwrap();
        inner.fetches += 1;
        inner.messages.get(&id).cloned().ok_or_else(|| not_found(id))
    }

    async fn post_message(
        &self,
        id: SessionId,
        content: &str,
        files: &[FileHandle],
    ) -> ChatResult<Message> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(error) = inner.fail_next_post.take() {
            return Err(error);
        }
        if !inner.messages.contains_key(&id) {
            return Err(not_found(id));
        }

        inner.posted.push(PostedMessage {
            session_id: id,
            content: content.to_string(),
            filenames: files.iter().map(|f| f.name.clone()).collect(),
        });

        let user_id = inner.next_id();
        let reply_id = inner.next_id();
        let server_files = files
            .iter()
            .enumerate()
            .map(|(i, f)| ServerFile {
                file_id: MessageId::Int(i as i64 + 1),
                file_url: format!("https://files.example/{}", f.name),
                filename: f.name.clone(),
            })
            .collect();
        let user = Message {
            id: MessageId::Int(user_id),
            content: content.to_string(),
            role: Role::User,
            files: server_files,
            created_at: Some(Utc::now()),
        };
        let reply = Message {
            id: MessageId::Int(reply_id),
            content: format!("Thanks, looking into: {}", content),
            role: Role::Assistant,
            files: Vec::new(),
            created_at: Some(Utc::now()),
        };

        let list = inner.messages.entry(id).or_default();
        list.push(user.clone());
        list.push(reply);
        Ok(user)
    }
}
