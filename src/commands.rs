use anyhow::{Context, Result, anyhow};
use std::io::{self, Write};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::api::ChatBackend;
use crate::app::{self, App};
use crate::chat::coordinator::{AttachSource, ChatController, SendOutcome, SendSkipped};
use crate::chat::message::{FileHandle, SessionId};
use crate::error::ChatResult;
use crate::session::SessionDirectory;
use crate::slash::{ParsedCommand, SlashCommand, get_help_text, parse_slash_command};

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .context("Failed to read user input")?;
    Ok(input.trim().to_string())
}

fn password_from_env_or_prompt() -> Result<String> {
    match std::env::var("PIPCHAT_PASSWORD") {
        Ok(password) if !password.is_empty() => Ok(password),
        _ => prompt("🔑 Password: "),
    }
}

pub async fn login(app: &mut App, email: Option<String>) -> Result<()> {
    let email = match email {
        Some(email) => email,
        None => prompt("📧 Email: ")?,
    };
    if email.is_empty() {
        println!("❌ Email cannot be empty.");
        return Ok(());
    }
    let password = password_from_env_or_prompt()?;

    let login = app.api.login(&email, &password).await?;
    println!("✅ Logged in as {} <{}>", login.user.name, login.user.email);
    Ok(())
}

pub async fn register(app: &mut App, name: String, email: String) -> Result<()> {
    let password = password_from_env_or_prompt()?;
    app.api.register(&name, &email, &password).await?;
    println!("🎉 Account created for {}. Check your inbox to verify your email.", email);
    Ok(())
}

pub async fn rename(app: &mut App, name: &str) -> Result<()> {
    ensure_logged_in(app)?;
    let result = app.api.update_profile(name).await;
    app.flush_events();
    match result {
        Ok(user) => {
            println!("✅ Profile updated successfully! You are now {}.", user.name);
            Ok(())
        }
        Err(e) => Err(anyhow!("Failed to update profile: {}", e.user_message())),
    }
}

pub async fn change_password(app: &mut App) -> Result<()> {
    ensure_logged_in(app)?;
    let current = password_from_env_or_prompt()?;
    let new = prompt("🔑 New password: ")?;
    let result = app.api.change_password(&current, &new).await;
    app.flush_events();
    match result {
        Ok(()) => {
            println!("✅ Password changed successfully!");
            Ok(())
        }
        Err(e) => Err(anyhow!("Failed to change password: {}", e.user_message())),
    }
}

pub fn logout(app: &mut App) -> Result<()> {
    app.auth.clear()?;
    println!("👋 Logged out.");
    Ok(())
}

fn ensure_logged_in(app: &App) -> Result<()> {
    if app.auth.is_authenticated() {
        Ok(())
    } else {
        Err(anyhow!("Not logged in. Run 'pipchat login' first."))
    }
}

pub async fn list_sessions(app: &mut App) -> Result<()> {
    ensure_logged_in(app)?;
    let result = app.directory.refresh(&app.api).await;
    app.flush_events();
    result?;
    print_session_list(app);
    Ok(())
}

fn print_session_list(app: &App) {
    let sessions = app.directory.sessions();
    if sessions.is_empty() {
        println!("📭 No sessions yet. Create one with 'pipchat sessions create <title>'.");
        return;
    }

    println!("💬 Your chat sessions:");
    println!("{}", "=".repeat(50));
    let active = app.chat.active_session();
    for session in sessions {
        let marker = if Some(session.id) == active { "▶" } else { " " };
        println!(
            "{} {:>5}  {}  ({})",
            marker,
            session.id,
            session.title,
            session.created_at.format("%Y-%m-%d %H:%M")
        );
    }
}

pub async fn create_session(app: &mut App, title: &str) -> Result<()> {
    ensure_logged_in(app)?;
    let result = app
        .directory
        .create(&app.api, app.chat.sessions_mut(), title)
        .await;
    app.flush_events();
    result?;
    Ok(())
}

pub async fn delete_session(app: &mut App, id: SessionId) -> Result<()> {
    ensure_logged_in(app)?;
    let result = remove_session(&mut app.directory, &mut app.chat, &app.api, id).await;
    app.flush_events();
    result?;
    Ok(())
}

/// Deletes a session and drops its cached messages once the server agreed.
async fn remove_session(
    directory: &mut SessionDirectory,
    chat: &mut ChatController,
    backend: &dyn ChatBackend,
    id: SessionId,
) -> ChatResult<()> {
    directory.delete(backend, chat.sessions_mut(), id).await?;
    chat.cache_mut().remove(id);
    Ok(())
}

/// Runs the three send steps, printing queued events (the typing line)
/// before the upload starts.
async fn send_composed(app: &mut App, backend: &dyn ChatBackend) -> SendOutcome {
    let pending = match app.chat.begin_send() {
        Ok(pending) => pending,
        Err(skipped) => return SendOutcome::Skipped(skipped),
    };
    app.flush_events();
    let result = pending.dispatch(backend).await;
    app.chat.finish_send(backend, pending, result).await
}

fn load_files(paths: &[PathBuf]) -> Vec<FileHandle> {
    paths
        .iter()
        .filter_map(|path| match FileHandle::from_path(path) {
            Ok(file) => Some(file),
            Err(e) => {
                println!("❌ {}", e);
                None
            }
        })
        .collect()
}

/// One-shot send, for scripts.
pub async fn send_once(app: &mut App, session: SessionId, text: String, files: Vec<PathBuf>) -> Result<()> {
    ensure_logged_in(app)?;
    app.chat.set_active_session(Some(session));
    app.chat.attach(AttachSource::Picker, load_files(&files));
    app.chat.set_input(text);

    let api = app.api.clone();
    let outcome = send_composed(app, &api).await;
    app.flush_events();
    match outcome {
        SendOutcome::Delivered { messages, .. } => {
            if let Some(reply) = messages.last() {
                app::print_message(reply);
            }
            Ok(())
        }
        SendOutcome::Failed { error, .. } => Err(error.into()),
        SendOutcome::Skipped(SendSkipped::Empty) => Err(anyhow!("Nothing to send")),
        SendOutcome::Skipped(reason) => Err(anyhow!("Message not sent: {:?}", reason)),
    }
}

async fn show_active(app: &mut App) {
    let backend: &dyn ChatBackend = &app.api;
    match app.chat.load_active(backend).await {
        Ok(messages) => app::print_messages(&messages),
        Err(e) => println!("❌ {}", e.user_message()),
    }
}

/// Interactive chat loop.
pub async fn run_chat(app: &mut App, session: Option<SessionId>) -> Result<()> {
    ensure_logged_in(app)?;

    if let Err(e) = app.directory.refresh(&app.api).await {
        println!("❌ Could not load sessions: {}", e.user_message());
    }
    app.chat.set_active_session(session);
    if app.flush_events() {
        return Ok(());
    }

    println!("📈 AI Trading Assistant");
    println!("{}", "=".repeat(50));
    println!("Type a message and press Enter. /help lists commands.");
    println!();
    show_active(app).await;
    if app.chat.active_session().is_none() {
        println!("Create a session with /new <title> or pick one with /switch <id>.");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };

        if let Some(command) = parse_slash_command(&line) {
            let keep_going = handle_slash_command(app, command).await?;
            if app.flush_events() || !keep_going {
                break;
            }
            continue;
        }

        app.chat.set_input(line);
        let api = app.api.clone();
        let outcome = send_composed(app, &api).await;
        let login_required = app.flush_events();
        if let SendOutcome::Delivered { messages, .. } = &outcome {
            if let Some(reply) = messages.last() {
                app::print_message(reply);
            }
        }
        if login_required {
            break;
        }
    }

    println!("👋 Bye!");
    Ok(())
}

fn attach_paths(app: &mut App, source: AttachSource, paths: &[PathBuf]) {
    if paths.is_empty() {
        println!("Usage: /{} <path>...", if source == AttachSource::Paste { "paste" } else { "attach" });
        return;
    }
    app.chat.attach(source, load_files(paths));
    app.flush_events();
    app::print_staged(app.chat.attachments().files());
}

/// Returns false when the loop should end.
async fn handle_slash_command(app: &mut App, command: ParsedCommand) -> Result<bool> {
    match command.command {
        SlashCommand::New => match command.argument() {
            Some(title) => {
                let title = title.to_string();
                let created = app
                    .directory
                    .create(&app.api, app.chat.sessions_mut(), &title)
                    .await;
                app.flush_events();
                if created.is_ok() {
                    show_active(app).await;
                }
            }
            None => println!("Usage: /new <title>"),
        },
        SlashCommand::Sessions => {
            if let Err(e) = app.directory.refresh(&app.api).await {
                println!("❌ {}", e.user_message());
            }
            print_session_list(app);
        }
        SlashCommand::Switch => match command.session_target() {
            Some(id) => {
                app.chat.set_active_session(Some(id));
                app.flush_events();
                show_active(app).await;
            }
            None => println!("Usage: /switch <id>"),
        },
        SlashCommand::Delete => {
            let target = command.session_target().or(app.chat.active_session());
            match target {
                Some(id) => {
                    if let Err(e) = remove_session(&mut app.directory, &mut app.chat, &app.api, id).await {
                        tracing::debug!(session = %id, "delete failed: {}", e);
                    }
                }
                None => println!("Usage: /delete <id>"),
            }
        }
        SlashCommand::Attach => attach_paths(app, AttachSource::Picker, &command.paths()),
        SlashCommand::Paste => attach_paths(app, AttachSource::Paste, &command.paths()),
        SlashCommand::Remove => match command.index().and_then(|i| app.chat.remove_attachment(i)) {
            Some(file) => {
                println!("🗑️  Removed {}", file.name);
                app::print_staged(app.chat.attachments().files());
            }
            None => println!("Usage: /remove <n> (see the numbered list of staged files)"),
        },
        SlashCommand::Clear => {
            app.chat.clear_attachments();
            println!("🗑️  Attachments cleared");
        }
        SlashCommand::History => show_active(app).await,
        SlashCommand::Help => println!("{}", get_help_text()),
        SlashCommand::Bye => return Ok(false),
    }

    Ok(true)
}
