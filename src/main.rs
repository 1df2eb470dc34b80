use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use pipchat::app::App;
use pipchat::chat::SessionId;
use pipchat::{Config, commands};

#[derive(Parser)]
#[command(name = "pipchat")]
#[command(version)]
#[command(about = "Chat with your AI trading assistant", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the credential
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Create an account
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
    /// Forget the stored credential
    Logout,
    /// Update your profile
    Account {
        #[command(subcommand)]
        command: AccountCommands,
    },
    /// Manage chat sessions
    Sessions {
        #[command(subcommand)]
        command: Option<SessionCommands>,
    },
    /// Interactive chat
    Chat {
        /// Session to open
        #[arg(long)]
        session: Option<SessionId>,
    },
    /// Send a single message and print the reply
    Send {
        #[arg(long)]
        session: SessionId,
        /// Image or PDF to attach (repeatable, at most 4)
        #[arg(long = "file")]
        files: Vec<PathBuf>,
        text: Vec<String>,
    },
}

#[derive(Subcommand)]
enum AccountCommands {
    /// Change your display name
    Name { name: Vec<String> },
    /// Change your password
    Password,
}

#[derive(Subcommand)]
enum SessionCommands {
    /// List sessions
    List,
    /// Create a session
    Create { title: Vec<String> },
    /// Delete a session
    Delete { id: SessionId },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pipchat=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    let mut app = App::bootstrap(config)?;

    match cli.command {
        Commands::Login { email } => commands::login(&mut app, email).await,
        Commands::Register { name, email } => commands::register(&mut app, name, email).await,
        Commands::Logout => commands::logout(&mut app),
        Commands::Account { command } => match command {
            AccountCommands::Name { name } => commands::rename(&mut app, &name.join(" ")).await,
            AccountCommands::Password => commands::change_password(&mut app).await,
        },
        Commands::Sessions { command } => match command.unwrap_or(SessionCommands::List) {
            SessionCommands::List => commands::list_sessions(&mut app).await,
            SessionCommands::Create { title } => {
                commands::create_session(&mut app, &title.join(" ")).await
            }
            SessionCommands::Delete { id } => commands::delete_session(&mut app, id).await,
        },
        Commands::Chat { session } => commands::run_chat(&mut app, session).await,
        Commands::Send { session, files, text } => {
            commands::send_once(&mut app, session, text.join(" "), files).await
        }
    }
}
