//! Minimal stand-in for the assistant backend, served over real HTTP.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde_json::{Value, json};

use pipchat::Config;
use pipchat::api::ApiClient;
use pipchat::auth::AuthContext;
use pipchat::events::EventSink;

pub const GOOD_TOKEN: &str = "good-token";
pub const PASSWORD: &str = "secret";

#[derive(Debug, Clone, Default)]
pub struct Upload {
    pub content: Option<String>,
    pub files: Vec<(String, String)>,
}

#[derive(Default)]
pub struct ServerState {
    pub sessions: BTreeMap<i64, (String, Vec<Value>)>,
    pub next_id: i64,
    pub uploads: Vec<Upload>,
    pub message_fetches: usize,
}

impl ServerState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

pub type Shared = Arc<Mutex<ServerState>>;

pub struct TestServer {
    pub base_url: String,
    pub state: Shared,
}

impl TestServer {
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(ServerState::default()));
        let app = Router::new()
            .route("/api/auth/login", post(login))
            .route("/api/auth/profile", put(update_profile))
            .route("/api/auth/change-password", put(change_password))
            .route("/api/assistant/sessions", get(list_sessions).post(create_session))
            .route("/api/assistant/sessions/:id", delete(delete_session))
            .route(
                "/api/assistant/sessions/:id/messages",
                get(list_messages).post(post_message),
            )
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}/", addr),
            state,
        }
    }

    pub fn add_session(&self, title: &str) -> i64 {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.sessions.insert(id, (title.to_string(), Vec::new()));
        id
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.state.lock().unwrap().uploads.clone()
    }

    pub fn message_fetches(&self) -> usize {
        self.state.lock().unwrap().message_fetches
    }

    pub fn config(&self) -> Config {
        Config {
            api_base_url: self.base_url.clone(),
            ..Config::default()
        }
    }

    pub fn client(&self, auth: Arc<AuthContext>, events: EventSink) -> ApiClient {
        ApiClient::new(&self.config(), auth, events).unwrap()
    }
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Token expired" }))).into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", GOOD_TOKEN))
        .unwrap_or(false)
}

async fn login(State(_state): State<Shared>, Json(body): Json<Value>) -> Response {
    if body["password"] == PASSWORD {
        Json(json!({
            "token": GOOD_TOKEN,
            "user": { "id": "1", "email": body["email"], "name": "Trader" }
        }))
        .into_response()
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Invalid credentials" }))).into_response()
    }
}

async fn update_profile(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(json!({ "user": { "name": body["name"] } })).into_response()
}

async fn change_password(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    if body["current_password"] == PASSWORD && body["new_password"].is_string() {
        Json(json!({ "message": "Password updated" })).into_response()
    } else {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": "Current password is incorrect" }))).into_response()
    }
}

fn session_json(id: i64, title: &str) -> Value {
    json!({ "id": id, "title": title, "created_at": "2025-01-02T03:04:05Z" })
}

async fn list_sessions(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let state = state.lock().unwrap();
    let sessions: Vec<Value> = state
        .sessions
        .iter()
        .map(|(id, (title, _))| session_json(*id, title))
        .collect();
    Json(sessions).into_response()
}

async fn create_session(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let title = body["title"].as_str().unwrap_or_default().to_string();
    let mut state = state.lock().unwrap();
    let id = state.next_id();
    state.sessions.insert(id, (title.clone(), Vec::new()));
    Json(session_json(id, &title)).into_response()
}

async fn delete_session(State(state): State<Shared>, Path(id): Path<i64>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let mut state = state.lock().unwrap();
    match state.sessions.remove(&id) {
        Some(_) => Json(json!({ "message": "deleted" })).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({ "error": "Session not found" }))).into_response(),
    }
}

async fn list_messages(State(state): State<Shared>, Path(id): Path<i64>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let mut state = state.lock().unwrap();
    state.message_fetches += 1;
    match state.sessions.get(&id) {
        Some((_, messages)) => Json(messages.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({ "error": "Session not found" }))).into_response(),
    }
}

async fn post_message(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }

    let mut upload = Upload::default();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "content" => upload.content = field.text().await.ok(),
            "files" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let mime = field.content_type().unwrap_or_default().to_string();
                let _ = field.bytes().await;
                upload.files.push((filename, mime));
            }
            _ => {}
        }
    }

    let mut state = state.lock().unwrap();
    state.uploads.push(upload.clone());

    let content = upload.content.clone().unwrap_or_default();
    if content == "boom" {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "message": "Model overloaded" })))
            .into_response();
    }

    let user_id = state.next_id();
    let reply_id = state.next_id();
    let Some((_, messages)) = state.sessions.get_mut(&id) else {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "Session not found" }))).into_response();
    };

    let files: Vec<Value> = upload
        .files
        .iter()
        .enumerate()
        .map(|(i, (name, _))| json!({ "file_id": i + 1, "file_url": format!("https://cdn.test/{}", name), "filename": name }))
        .collect();
    let user = json!({ "id": user_id, "content": content, "role": "user", "files": files });
    messages.push(user.clone());
    messages.push(json!({
        "id": format!("r{}", reply_id),
        "content": format!("Reply to: {}", content),
        "role": "assistant"
    }));
    Json(user).into_response()
}
