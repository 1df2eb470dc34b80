use std::path::PathBuf;
use std::str::FromStr;

use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::chat::message::SessionId;

/// Commands that can be invoked by starting a chat line with a slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Create a session and switch to it
    New,
    /// List sessions
    Sessions,
    /// Switch the active session
    Switch,
    /// Delete a session
    Delete,
    /// Stage files through the picker path
    Attach,
    /// Stage files through the clipboard path
    Paste,
    /// Unstage one file
    Remove,
    /// Unstage everything
    Clear,
    /// Reprint the active session
    History,
    /// Show help
    Help,
    /// Exit the chat
    Bye,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: SlashCommand,
    pub argument: Option<String>,
}

impl ParsedCommand {
    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }

    pub fn session_target(&self) -> Option<SessionId> {
        self.argument()?.parse().ok()
    }

    /// Whitespace-separated paths for `/attach` and `/paste`.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.argument()
            .map(|arg| arg.split_whitespace().map(PathBuf::from).collect())
            .unwrap_or_default()
    }

    /// 1-based index as typed by the user, converted to 0-based.
    pub fn index(&self) -> Option<usize> {
        self.argument()?
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|i| i.checked_sub(1))
    }
}

impl SlashCommand {
    /// User-visible description shown in help.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::New => "create a session and switch to it (/new <title>)",
            SlashCommand::Sessions => "list your sessions",
            SlashCommand::Switch => "switch to another session (/switch <id>)",
            SlashCommand::Delete => "delete a session (/delete [id], defaults to the active one)",
            SlashCommand::Attach => "attach images or PDFs from the file picker (/attach <path>...)",
            SlashCommand::Paste => "attach images or PDFs as if pasted (/paste <path>...)",
            SlashCommand::Remove => "remove one staged attachment (/remove <n>)",
            SlashCommand::Clear => "remove all staged attachments",
            SlashCommand::History => "show the messages of the active session",
            SlashCommand::Help => "show available commands",
            SlashCommand::Bye => "exit the chat",
        }
    }

    /// Command string without the leading '/'.
    pub fn command(self) -> &'static str {
        self.into()
    }
}

/// Parse a slash command from user input
pub fn parse_slash_command(input: &str) -> Option<ParsedCommand> {
    let input = input.trim_start();
    if !input.starts_with('/') {
        return None;
    }

    let mut parts = input[1..].splitn(2, char::is_whitespace);
    let head = parts.next()?;
    let rest = parts.next().map(str::trim).filter(|s| !s.is_empty());

    let command = SlashCommand::from_str(head).ok().or_else(|| match head.to_lowercase().as_str() {
        "q" | "quit" | "exit" => Some(SlashCommand::Bye),
        "ls" | "list" => Some(SlashCommand::Sessions),
        "s" | "use" => Some(SlashCommand::Switch),
        "rm" => Some(SlashCommand::Remove),
        "h" | "?" => Some(SlashCommand::Help),
        _ => None,
    })?;

    Some(ParsedCommand {
        command,
        argument: rest.map(|s| s.to_string()),
    })
}

/// Get help text for all available commands
pub fn get_help_text() -> String {
    let mut help = String::from("Available commands:\n\n");
    for command in SlashCommand::iter() {
        help.push_str(&format!("/{} - {}\n", command.command(), command.description()));
    }

    help.push_str("\nAliases: /q for /bye, /ls for /sessions, /s for /switch, /rm for /remove");
    help.push_str("\nAnything that is not a command is sent to the assistant.");

    help
}
