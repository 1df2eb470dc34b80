//! Client core for the trading assistant chat.
//!
//! [`chat::ChatController`] owns the conversation state: the active session,
//! cached message lists with optimistic entries, staged attachments and the
//! send state machine. [`api::ApiClient`] talks to the REST backend and
//! [`auth::AuthContext`] holds the bearer credential.

pub mod api;
pub mod app;
pub mod auth;
pub mod chat;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod session;
pub mod slash;

pub use config::Config;
pub use error::{ChatError, ChatResult};
