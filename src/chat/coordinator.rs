//! Turns composed text and staged files into a sent message.
//!
//! A send runs in three steps so the optimistic phase can be observed
//! before the network answers:
//!
//! 1. [`ChatController::begin_send`] guards the request, appends the
//!    optimistic user message, raises `typing` and clears the compose box
//!    and attachment buffer.
//! 2. [`PendingSend::dispatch`] performs the upload. It borrows nothing from
//!    the controller, so the user may switch sessions meanwhile.
//! 3. [`ChatController::finish_send`] drops `typing` and either reconciles
//!    the captured session with a refetch, or reports the error and leaves
//!    the optimistic message in place.

use crate::api::ChatBackend;
use crate::chat::cache::MessageCache;
use crate::chat::message::{CachedMessage, FileHandle, Message, OptimisticMessage, SessionId};
use crate::chat::staging::{AddFilesReport, AttachmentBuffer, RejectReason};
use crate::config::{AttachmentConfig, PickerMode};
use crate::error::{ChatError, ChatResult};
use crate::events::{AppEvent, EventSink, Notification};
use crate::session::SessionStore;

pub const NO_SESSION_WARNING: &str = "Please create or select a session first";

/// Where a batch of attachment candidates came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachSource {
    Picker,
    Paste,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    Idle,
    Sending { session_id: SessionId },
}

/// Why `begin_send` did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendSkipped {
    /// No text and no attachments.
    Empty,
    /// No active session; the user was warned.
    NoSession,
    /// A send is already in flight; the trigger is disabled.
    InFlight,
}

/// A send that has been applied locally and is waiting for the network.
#[derive(Debug, Clone)]
pub struct PendingSend {
    pub session_id: SessionId,
    pub content: String,
    pub files: Vec<FileHandle>,
}

impl PendingSend {
    pub async fn dispatch(&self, backend: &dyn ChatBackend) -> ChatResult<Message> {
        backend
            .post_message(self.session_id, &self.content, &self.files)
            .await
    }
}

/// Result of a completed send, after reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    Skipped(SendSkipped),
    /// Server accepted the message; the cache now holds its list.
    Delivered { session_id: SessionId, messages: Vec<CachedMessage> },
    /// Upload failed; the optimistic message stays visible.
    Failed { session_id: SessionId, error: ChatError },
}

/// Client-side conversation manager for one user.
pub struct ChatController {
    sessions: SessionStore,
    cache: MessageCache,
    attachments: AttachmentBuffer,
    picker_mode: PickerMode,
    input: String,
    typing: bool,
    state: SendState,
    events: EventSink,
}

impl ChatController {
    pub fn new(config: &AttachmentConfig, events: EventSink) -> Self {
        Self {
            sessions: SessionStore::new(events.clone()),
            cache: MessageCache::new(),
            attachments: AttachmentBuffer::new(config.max_files),
            picker_mode: config.picker_mode,
            input: String::new(),
            typing: false,
            state: SendState::Idle,
            events,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn sessions_mut(&mut self) -> &mut SessionStore {
        &mut self.sessions
    }

    pub fn active_session(&self) -> Option<SessionId> {
        self.sessions.active()
    }

    pub fn set_active_session(&mut self, id: Option<SessionId>) {
        self.sessions.set_active(id);
    }

    pub fn cache(&self) -> &MessageCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut MessageCache {
        &mut self.cache
    }

    pub fn attachments(&self) -> &AttachmentBuffer {
        &self.attachments
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn is_typing(&self) -> bool {
        self.typing
    }

    pub fn state(&self) -> SendState {
        self.state
    }

    /// The compose trigger is disabled while a send is in flight.
    pub fn can_send(&self) -> bool {
        self.state == SendState::Idle
    }

    /// Messages of the active session (or the welcome message).
    pub async fn load_active(&mut self, backend: &dyn ChatBackend) -> ChatResult<Vec<CachedMessage>> {
        let active = self.sessions.active();
        self.cache.load(backend, active).await
    }

    /// Stages files from the picker or the clipboard and notifies the user
    /// about what happened.
    pub fn attach(&mut self, source: AttachSource, files: Vec<FileHandle>) -> AddFilesReport {
        let replacing = source == AttachSource::Picker
            && self.picker_mode == PickerMode::Replace
            && !self.attachments.is_empty()
            && files.iter().any(|f| crate::chat::staging::is_supported_mime(&f.mime));
        if replacing {
            self.attachments.clear();
            self.events.notify(
                Notification::info("Previous attachment replaced")
                    .with_description("Picking files replaces what was attached"),
            );
        }

        let report = self.attachments.add_files(files);

        for file in &report.accepted {
            self.events.notify(
                Notification::success("File attached")
                    .with_description(format!("{} ({})", file.name, file.size_label())),
            );
        }
        match report.rejected_reason {
            Some(RejectReason::UnsupportedType) => self.events.notify(
                Notification::error("Unsupported file type")
                    .with_description("Only images and PDF files are supported"),
            ),
            Some(RejectReason::LimitExceeded) => self.events.notify(
                Notification::info("Attachment limit reached").with_description(format!(
                    "Only {} files can be attached to a message",
                    self.attachments.limit()
                )),
            ),
            None => {}
        }
        report
    }

    pub fn remove_attachment(&mut self, index: usize) -> Option<FileHandle> {
        self.attachments.remove_one(index)
    }

    pub fn clear_attachments(&mut self) {
        self.attachments.clear();
    }

    /// Synchronous half of a send: guard, optimistic append, `typing` on,
    /// compose box and attachments cleared.
    pub fn begin_send(&mut self) -> Result<PendingSend, SendSkipped> {
        if !self.can_send() {
            self.events
                .notify(Notification::warning("Please wait for the current message to finish"));
            return Err(SendSkipped::InFlight);
        }
        if self.input.trim().is_empty() && self.attachments.is_empty() {
            return Err(SendSkipped::Empty);
        }
        let Some(session_id) = self.sessions.active() else {
            self.events.notify(Notification::warning(NO_SESSION_WARNING));
            return Err(SendSkipped::NoSession);
        };

        let content = std::mem::take(&mut self.input);
        let files = self.attachments.take();

        self.cache
            .append_optimistic(session_id, OptimisticMessage::user(content.clone(), files.clone()));
        self.set_typing(true);
        self.state = SendState::Sending { session_id };
        tracing::debug!(session = %session_id, files = files.len(), "send started");

        Ok(PendingSend {
            session_id,
            content,
            files,
        })
    }

    /// Applies the server's answer to the session captured at send time.
    pub async fn finish_send(
        &mut self,
        backend: &dyn ChatBackend,
        pending: PendingSend,
        result: ChatResult<Message>,
    ) -> SendOutcome {
        let session_id = pending.session_id;
        self.state = SendState::Idle;
        self.set_typing(false);

        match result {
            Ok(_) => {
                tracing::debug!(session = %session_id, "send delivered, reconciling");
                self.cache.invalidate(session_id);
                match self.cache.load(backend, Some(session_id)).await {
                    Ok(messages) => SendOutcome::Delivered { session_id, messages },
                    Err(error) => {
                        // The message went through; only the refresh failed.
                        tracing::warn!(session = %session_id, "refetch after send failed: {}", error);
                        self.report_error("Failed to refresh messages", &error);
                        SendOutcome::Delivered {
                            session_id,
                            messages: self.cache.messages(session_id).to_vec(),
                        }
                    }
                }
            }
            Err(error) => {
                tracing::warn!(session = %session_id, "send failed: {}", error);
                self.report_error("Failed to send message", &error);
                SendOutcome::Failed { session_id, error }
            }
        }
    }

    /// Full send: `begin_send`, upload, `finish_send`.
    pub async fn send(&mut self, backend: &dyn ChatBackend) -> SendOutcome {
        let pending = match self.begin_send() {
            Ok(pending) => pending,
            Err(skipped) => return SendOutcome::Skipped(skipped),
        };
        let result = pending.dispatch(backend).await;
        self.finish_send(backend, pending, result).await
    }

    fn set_typing(&mut self, typing: bool) {
        if self.typing != typing {
            self.typing = typing;
            self.events.emit(AppEvent::TypingChanged(typing));
        }
    }

    /// Auth failures are left to the global login handler.
    fn report_error(&self, title: &str, error: &ChatError) {
        if !error.is_auth() {
            self.events
                .notify(Notification::error(title).with_description(error.user_message()));
        }
    }
}
