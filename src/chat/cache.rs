//! Per-session message lists.
//!
//! A list is filled from the server and then only appended to locally
//! (optimistic entries) until it is invalidated. The next load replaces it
//! wholesale with the server's list; optimistic entries are superseded,
//! never merged.

use std::collections::HashMap;

use crate::api::ChatBackend;
use crate::chat::message::{CachedMessage, Message, OptimisticMessage, SessionId};
use crate::error::ChatResult;

#[derive(Debug, Clone, Default)]
struct CacheSlot {
    messages: Vec<CachedMessage>,
    /// True until a load has filled the slot, and again after `invalidate`.
    stale: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MessageCache {
    slots: HashMap<SessionId, CacheSlot>,
}

impl MessageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the messages of a session, fetching them if the cached list
    /// is missing or stale.
    ///
    /// With no session this yields the built-in welcome message, which is
    /// never stored. An empty server list stays empty.
    pub async fn load(
        &mut self,
        backend: &dyn ChatBackend,
        session_id: Option<SessionId>,
    ) -> ChatResult<Vec<CachedMessage>> {
        let Some(session_id) = session_id else {
            return Ok(vec![CachedMessage::Confirmed(Message::welcome())]);
        };

        if let Some(slot) = self.slots.get(&session_id) {
            if !slot.stale {
                return Ok(slot.messages.clone());
            }
        }

        let fetched = backend
            .list_messages(session_id)
            .await
            .map_err(|e| e.into_fetch(session_id))?;
        tracing::debug!(session = %session_id, count = fetched.len(), "message list refreshed");

        let messages: Vec<CachedMessage> = fetched.into_iter().map(CachedMessage::Confirmed).collect();
        self.slots.insert(
            session_id,
            CacheSlot {
                messages: messages.clone(),
                stale: false,
            },
        );
        Ok(messages)
    }

    /// Appends a locally-built message to the end of the session's list
    /// without touching the server.
    pub fn append_optimistic(&mut self, session_id: SessionId, message: OptimisticMessage) {
        let slot = self.slots.entry(session_id).or_insert_with(|| CacheSlot {
            messages: Vec::new(),
            stale: true,
        });
        slot.messages.push(CachedMessage::Optimistic(message));
    }

    /// Forces the next `load` of this session to refetch.
    pub fn invalidate(&mut self, session_id: SessionId) {
        if let Some(slot) = self.slots.get_mut(&session_id) {
            tracing::debug!(session = %session_id, "message list invalidated");
            slot.stale = true;
        }
    }

    /// Current cached list without fetching. Empty if nothing is cached.
    pub fn messages(&self, session_id: SessionId) -> &[CachedMessage] {
        self.slots
            .get(&session_id)
            .map(|slot| slot.messages.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_cached(&self, session_id: SessionId) -> bool {
        self.slots.contains_key(&session_id)
    }

    pub fn is_stale(&self, session_id: SessionId) -> bool {
        self.slots.get(&session_id).map(|slot| slot.stale).unwrap_or(true)
    }

    /// Drops a session's list entirely, e.g. after the session was deleted.
    pub fn remove(&mut self, session_id: SessionId) {
        self.slots.remove(&session_id);
    }
}
