//! Conversation core: message cache, attachment staging and the send flow.

pub mod cache;
pub mod coordinator;
pub mod message;
pub mod staging;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::MessageCache;
pub use coordinator::{AttachSource, ChatController, PendingSend, SendOutcome, SendSkipped, SendState};
pub use message::{CachedMessage, FileHandle, Message, MessageId, OptimisticMessage, Role, Session, SessionId};
pub use staging::{AddFilesReport, AttachmentBuffer, RejectReason};
