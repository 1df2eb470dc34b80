use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::api::ApiClient;
use crate::auth::AuthContext;
use crate::chat::coordinator::ChatController;
use crate::chat::message::{CachedMessage, FileHandle, Role};
use crate::config::Config;
use crate::events::{self, AppEvent, EventSink};
use crate::session::SessionDirectory;

/// Where event lines are written.
#[derive(Debug, Clone, Default)]
pub enum Console {
    #[default]
    Stdout,
    Captured(Arc<Mutex<Vec<String>>>),
}

impl Console {
    pub fn captured() -> Self {
        Console::Captured(Arc::default())
    }

    fn say(&self, line: String) {
        match self {
            Console::Stdout => println!("{}", line),
            Console::Captured(lines) => {
                if let Ok(mut lines) = lines.lock() {
                    lines.push(line);
                }
            }
        }
    }

    /// Lines written so far; always empty for stdout.
    pub fn lines(&self) -> Vec<String> {
        match self {
            Console::Stdout => Vec::new(),
            Console::Captured(lines) => lines.lock().map(|l| l.clone()).unwrap_or_default(),
        }
    }
}

pub const TYPING_LINE: &str = "🤖 Assistant is typing...";

/// Everything one running client owns, wired together at startup.
pub struct App {
    pub config: Config,
    pub auth: Arc<AuthContext>,
    pub api: ApiClient,
    pub chat: ChatController,
    pub directory: SessionDirectory,
    pub console: Console,
    events_rx: mpsc::UnboundedReceiver<AppEvent>,
}

impl App {
    /// Hydrates credentials and builds the HTTP client and controller.
    pub fn bootstrap(config: Config) -> Result<Self> {
        let auth = Arc::new(
            AuthContext::hydrate(config.auth_path())
                .context("Failed to load saved credentials")?,
        );
        Self::with_auth(config, auth)
    }

    pub fn with_auth(config: Config, auth: Arc<AuthContext>) -> Result<Self> {
        let (sink, events_rx) = EventSink::channel();
        let api = ApiClient::new(&config, auth.clone(), sink.clone())
            .context("Failed to create API client")?;
        let chat = ChatController::new(&config.attachments, sink);

        Ok(Self {
            config,
            auth,
            api,
            chat,
            directory: SessionDirectory::new(),
            console: Console::default(),
            events_rx,
        })
    }

    /// Prints and consumes queued events. Returns true if the credential was
    /// rejected and the user has to log in again.
    pub fn flush_events(&mut self) -> bool {
        let mut login_required = false;
        for event in events::drain(&mut self.events_rx) {
            match event {
                AppEvent::Notify(note) => match &note.description {
                    Some(description) => self
                        .console
                        .say(format!("{} {}: {}", note.icon(), note.title, description)),
                    None => self.console.say(format!("{} {}", note.icon(), note.title)),
                },
                AppEvent::TypingChanged(true) => self.console.say(TYPING_LINE.to_string()),
                AppEvent::TypingChanged(false) => {}
                AppEvent::ActiveSessionChanged(Some(id)) => {
                    let title = self
                        .directory
                        .get(id)
                        .map(|s| s.title.clone())
                        .unwrap_or_else(|| "Current Session".to_string());
                    self.console.say(format!("💬 Session {}: {}", id, title));
                }
                AppEvent::ActiveSessionChanged(None) => self.console.say("💬 No active session".to_string()),
                AppEvent::LoginRequired => {
                    self.console.say(
                        "🔒 Your session has expired. Run 'pipchat login' to sign in again.".to_string(),
                    );
                    login_required = true;
                }
            }
        }
        login_required
    }
}

/// Renders a message list the way the chat transcript shows it.
pub fn print_messages(messages: &[CachedMessage]) {
    if messages.is_empty() {
        println!("(no messages yet)");
        return;
    }
    for message in messages {
        print_message(message);
    }
}

pub fn print_message(message: &CachedMessage) {
    let icon = match message.role() {
        Role::User => "👤",
        Role::Assistant => "🤖",
    };
    let pending = if message.is_optimistic() { " (sending)" } else { "" };
    println!("{} {}{}", icon, message.role().display_name(), pending);
    for line in message.content().lines() {
        println!("   {}", line);
    }

    match message {
        CachedMessage::Optimistic(m) => {
            for file in &m.attachments {
                println!("   📎 {} ({})", file.name, file.size_label());
            }
        }
        CachedMessage::Confirmed(m) => {
            for file in &m.files {
                println!("   📎 {} <{}>", file.filename, file.file_url);
            }
        }
    }
    println!();
}

pub fn print_staged(files: &[FileHandle]) {
    for (index, file) in files.iter().enumerate() {
        println!("   {}. 📎 {} ({}, {})", index + 1, file.name, file.mime, file.size_label());
    }
}
