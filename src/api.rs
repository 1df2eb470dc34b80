use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{AuthContext, UserProfile};
use crate::chat::message::{FileHandle, Message, Session, SessionId};
use crate::config::Config;
use crate::error::{ChatError, ChatResult, extract_error_message};
use crate::events::{AppEvent, EventSink};

const LOGIN_PATH: &str = "api/auth/login";
const REGISTER_PATH: &str = "api/auth/register";
const PROFILE_PATH: &str = "api/auth/profile";
const CHANGE_PASSWORD_PATH: &str = "api/auth/change-password";
const SESSIONS_PATH: &str = "api/assistant/sessions";

/// The slice of the backend the conversation manager depends on.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn list_sessions(&self) -> ChatResult<Vec<Session>>;

    async fn create_session(&self, title: &str) -> ChatResult<Session>;

    async fn delete_session(&self, id: SessionId) -> ChatResult<()>;

    /// Authoritative, ordered message list of a session.
    async fn list_messages(&self, id: SessionId) -> ChatResult<Vec<Message>>;

    /// Uploads a user message. The assistant reply shows up in the next
    /// `list_messages`.
    async fn post_message(
        &self,
        id: SessionId,
        content: &str,
        files: &[FileHandle],
    ) -> ChatResult<Message>;
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct UpdateProfileRequest<'a> {
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct ChangePasswordRequest<'a> {
    current_password: &'a str,
    new_password: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateSessionRequest<'a> {
    title: &'a str,
}

/// Body returned by a successful login.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}

/// Body of a profile update. The backend may omit fields it did not change.
#[derive(Debug, Clone, Deserialize)]
struct ProfileResponse {
    #[serde(default)]
    token: Option<String>,
    user: ProfileUser,
}

#[derive(Debug, Clone, Deserialize)]
struct ProfileUser {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    email: Option<String>,
    name: String,
}

/// Whether a 401 on `path` means the stored credential is no longer valid.
/// Login and registration answer 401 for bad input, not for a stale token.
pub fn rejects_credential(path: &str, status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED && !path.contains(LOGIN_PATH) && !path.contains(REGISTER_PATH)
}

/// HTTP client for the assistant backend.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
    auth: Arc<AuthContext>,
    events: EventSink,
}

impl ApiClient {
    pub fn new(config: &Config, auth: Arc<AuthContext>, events: EventSink) -> ChatResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| ChatError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            client,
            auth,
            events,
        })
    }

    pub fn auth(&self) -> &Arc<AuthContext> {
        &self.auth
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self.client.request(method, self.url(path));
        if let Some(token) = self.auth.token() {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// Fails early for endpoints that are pointless without a credential.
    fn require_token(&self) -> ChatResult<()> {
        if self.auth.is_authenticated() {
            Ok(())
        } else {
            Err(ChatError::auth("No token available"))
        }
    }

    async fn send(&self, path: &str, builder: RequestBuilder) -> ChatResult<Response> {
        let response = builder.send().await.map_err(|e| {
            tracing::warn!(path, error = %e, "request failed before a response");
            ChatError::Network(extract_error_message(None, Some(&e.to_string())))
        })?;

        let status = response.status();
        tracing::debug!(path, status = status.as_u16(), "response received");

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.ok();
        let message = extract_error_message(body.as_deref(), status.canonical_reason());

        if rejects_credential(path, status) {
            tracing::warn!(path, "credential rejected, clearing auth state");
            if let Err(e) = self.auth.clear() {
                tracing::error!("Failed to clear auth state: {:#}", e);
            }
            self.events.emit(AppEvent::LoginRequired);
            return Err(ChatError::Auth { message });
        }

        tracing::error!(path, status = status.as_u16(), %message, "request rejected");
        Err(ChatError::Server {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, path: &str, builder: RequestBuilder) -> ChatResult<T> {
        let response = self.send(path, builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ChatError::Decode(e.to_string()))
    }

    pub async fn login(&self, email: &str, password: &str) -> ChatResult<LoginResponse> {
        let builder = self
            .request(Method::POST, LOGIN_PATH)
            .json(&LoginRequest { email, password });
        let login: LoginResponse = self.send_json(LOGIN_PATH, builder).await?;

        self.auth
            .set_auth(login.token.clone(), login.user.clone())
            .map_err(|e| ChatError::Io(format!("{:#}", e)))?;
        tracing::info!(email, "logged in");
        Ok(login)
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> ChatResult<serde_json::Value> {
        let builder = self
            .request(Method::POST, REGISTER_PATH)
            .json(&RegisterRequest { name, email, password });
        self.send_json(REGISTER_PATH, builder).await
    }

    /// Renames the logged-in user and stores the returned profile.
    pub async fn update_profile(&self, name: &str) -> ChatResult<UserProfile> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ChatError::validation("Name cannot be empty."));
        }
        self.require_token()?;

        let builder = self
            .request(Method::PUT, PROFILE_PATH)
            .json(&UpdateProfileRequest { name });
        let response: ProfileResponse = self.send_json(PROFILE_PATH, builder).await?;

        let previous = self.auth.user();
        let user = UserProfile {
            id: response
                .user
                .id
                .or_else(|| previous.as_ref().map(|u| u.id.clone()))
                .unwrap_or_default(),
            email: response
                .user
                .email
                .or_else(|| previous.as_ref().map(|u| u.email.clone()))
                .unwrap_or_default(),
            name: response.user.name,
        };

        let stored = match response.token {
            Some(token) => self.auth.set_auth(token, user.clone()),
            None => self.auth.set_user(user.clone()),
        };
        stored.map_err(|e| ChatError::Io(format!("{:#}", e)))?;
        tracing::info!(name = %user.name, "profile updated");
        Ok(user)
    }

    pub async fn change_password(&self, current: &str, new: &str) -> ChatResult<()> {
        if current.is_empty() || new.is_empty() {
            return Err(ChatError::validation("Both the current and the new password are required."));
        }
        self.require_token()?;

        let builder = self
            .request(Method::PUT, CHANGE_PASSWORD_PATH)
            .json(&ChangePasswordRequest {
                current_password: current,
                new_password: new,
            });
        self.send(CHANGE_PASSWORD_PATH, builder).await?;
        tracing::info!("password changed");
        Ok(())
    }
}

fn session_path(id: SessionId) -> String {
    format!("{}/{}", SESSIONS_PATH, id)
}

fn messages_path(id: SessionId) -> String {
    format!("{}/{}/messages", SESSIONS_PATH, id)
}

/// Multipart body for a new message: `content` only when non-empty, then
/// one `files` part per attachment.
fn message_form(content: &str, files: &[FileHandle]) -> ChatResult<Form> {
    let mut form = Form::new();
    if !content.is_empty() {
        form = form.text("content", content.to_string());
    }
    for file in files {
        let part = Part::bytes(file.data.to_vec())
            .file_name(file.name.clone())
            .mime_str(&file.mime)
            .map_err(|e| ChatError::validation(format!("Invalid MIME type {}: {}", file.mime, e)))?;
        form = form.part("files", part);
    }
    Ok(form)
}

#[async_trait]
impl ChatBackend for ApiClient {
    async fn list_sessions(&self) -> ChatResult<Vec<Session>> {
        self.require_token()?;
        let builder = self.request(Method::GET, SESSIONS_PATH);
        self.send_json(SESSIONS_PATH, builder).await
    }

    async fn create_session(&self, title: &str) -> ChatResult<Session> {
        self.require_token()?;
        let builder = self
            .request(Method::POST, SESSIONS_PATH)
            .json(&CreateSessionRequest { title });
        self.send_json(SESSIONS_PATH, builder).await
    }

    async fn delete_session(&self, id: SessionId) -> ChatResult<()> {
        self.require_token()?;
        let path = session_path(id);
        let builder = self.request(Method::DELETE, &path);
        self.send(&path, builder).await?;
        Ok(())
    }

    async fn list_messages(&self, id: SessionId) -> ChatResult<Vec<Message>> {
        self.require_token()?;
        let path = messages_path(id);
        let builder = self.request(Method::GET, &path);
        self.send_json(&path, builder).await
    }

    async fn post_message(
        &self,
        id: SessionId,
        content: &str,
        files: &[FileHandle],
    ) -> ChatResult<Message> {
        self.require_token()?;
        let path = messages_path(id);
        let form = message_form(content, files)?;
        tracing::debug!(session = %id, files = files.len(), "posting message");
        let builder = self.request(Method::POST, &path).multipart(form);
        self.send_json(&path, builder).await
    }
}
