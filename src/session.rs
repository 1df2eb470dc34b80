use crate::api::ChatBackend;
use crate::chat::message::{Session, SessionId};
use crate::error::{ChatError, ChatResult};
use crate::events::{AppEvent, EventSink, Notification};

/// Which conversation is active across the chat surface.
#[derive(Debug, Clone)]
pub struct SessionStore {
    active: Option<SessionId>,
    events: EventSink,
}

impl SessionStore {
    pub fn new(events: EventSink) -> Self {
        Self {
            active: None,
            events,
        }
    }

    /// Replaces the active session. The id is not checked against the
    /// session list.
    pub fn set_active(&mut self, id: Option<SessionId>) {
        if self.active != id {
            tracing::debug!(from = ?self.active, to = ?id, "active session changed");
            self.active = id;
            self.events.emit(AppEvent::ActiveSessionChanged(id));
        }
    }

    pub fn active(&self) -> Option<SessionId> {
        self.active
    }
}

/// Cached list of the user's sessions plus the create/delete flows.
#[derive(Debug, Clone, Default)]
pub struct SessionDirectory {
    sessions: Vec<Session>,
    loaded: bool,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Replaces the cached list with the server's.
    pub async fn refresh(&mut self, backend: &dyn ChatBackend) -> ChatResult<()> {
        self.sessions = backend.list_sessions().await?;
        self.loaded = true;
        Ok(())
    }

    /// Creates a session and makes it the active one.
    pub async fn create(
        &mut self,
        backend: &dyn ChatBackend,
        store: &mut SessionStore,
        title: &str,
    ) -> ChatResult<Session> {
        let title = title.trim();
        if title.is_empty() {
            let err = ChatError::validation("Session name cannot be empty.");
            store.events.notify(Notification::error(err.user_message()));
            return Err(err);
        }

        let session = match backend.create_session(title).await {
            Ok(session) => session,
            Err(err) => {
                store.events.notify(
                    Notification::error("Session Creation Failed").with_description(err.user_message()),
                );
                return Err(err);
            }
        };

        tracing::info!(session = %session.id, title, "session created");
        store.set_active(Some(session.id));
        if let Err(err) = self.refresh(backend).await {
            tracing::warn!("Failed to refresh sessions after create: {}", err);
            self.sessions.push(session.clone());
        }
        store.events.notify(Notification::success("Session created successfully!"));
        Ok(session)
    }

    /// Deletes a session; clears the active reference only if it pointed at it.
    pub async fn delete(
        &mut self,
        backend: &dyn ChatBackend,
        store: &mut SessionStore,
        id: SessionId,
    ) -> ChatResult<()> {
        if let Err(err) = backend.delete_session(id).await {
            store.events.notify(
                Notification::error("Session Deletion Failed").with_description(err.user_message()),
            );
            return Err(err);
        }

        tracing::info!(session = %id, "session deleted");
        self.sessions.retain(|s| s.id != id);
        if store.active() == Some(id) {
            store.set_active(None);
        }
        store.events.notify(Notification::success("Session deleted successfully!"));
        Ok(())
    }
}
