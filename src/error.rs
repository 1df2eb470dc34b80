//! Error taxonomy for the chat client.
//!
//! Every failure here is recoverable: validation errors block an action
//! before it reaches the network, auth errors are handled globally by the
//! [`AuthContext`](crate::auth::AuthContext), and network/server errors are
//! surfaced to the user as a transient notification.

use thiserror::Error;

use crate::chat::message::SessionId;

/// Shown when neither the response body nor the transport says anything useful.
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred. Please try again.";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// Client-side rejection; never sent to the server.
    #[error("{0}")]
    Validation(String),

    /// 401 from the backend, or no credential available at all.
    #[error("Authentication required: {message}")]
    Auth { message: String },

    /// The request never produced an HTTP response.
    #[error("Network error: {0}")]
    Network(String),

    /// The backend answered with a non-success status.
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Loading the message list of a session failed.
    #[error("Failed to load messages for session {session_id}: {message}")]
    Fetch { session_id: SessionId, message: String },

    #[error("IO error: {0}")]
    Io(String),

    /// A response body did not have the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ChatError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ChatError::Auth { .. })
    }

    /// Text suitable for a toast description.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Validation(message) => message.clone(),
            ChatError::Auth { message } => message.clone(),
            ChatError::Network(message) => message.clone(),
            ChatError::Server { message, .. } => message.clone(),
            ChatError::Fetch { message, .. } => message.clone(),
            ChatError::Io(message) | ChatError::Decode(message) => message.clone(),
        }
    }

    /// Wraps a failure of the messages endpoint so callers know which
    /// session could not be loaded.
    pub fn into_fetch(self, session_id: SessionId) -> Self {
        match self {
            ChatError::Auth { .. } | ChatError::Fetch { .. } => self,
            other => ChatError::Fetch {
                session_id,
                message: other.user_message(),
            },
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ChatError::Decode(err.to_string())
        } else {
            ChatError::Network(err.to_string())
        }
    }
}

impl From<std::io::Error> for ChatError {
    fn from(err: std::io::Error) -> Self {
        ChatError::Io(err.to_string())
    }
}

pub type ChatResult<T> = Result<T, ChatError>;

/// Picks the best human-readable message out of a failed response.
///
/// Precedence: a JSON `error` field, then a JSON `message` field, then the
/// transport error text, then [`GENERIC_ERROR_MESSAGE`].
pub fn extract_error_message(body: Option<&str>, transport: Option<&str>) -> String {
    if let Some(json) = body.and_then(|b| serde_json::from_str::<serde_json::Value>(b).ok()) {
        for field in ["error", "message"] {
            if let Some(text) = json.get(field).and_then(|v| v.as_str()) {
                if !text.trim().is_empty() {
                    return text.to_string();
                }
            }
        }
    }

    match transport {
        Some(text) if !text.trim().is_empty() => text.to_string(),
        _ => GENERIC_ERROR_MESSAGE.to_string(),
    }
}
