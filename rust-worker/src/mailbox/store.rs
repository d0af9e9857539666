//! Mail store collaborator traits.
//!
//! The seen flag lives on the server. Nothing here caches it; every check and
//! update is a call on the session.

use async_trait::async_trait;

use crate::error::MailboxError;

/// Opens sessions against a mailbox.
#[async_trait]
pub trait MailStore: Send + Sync {
    type Session: MailSession;

    /// Connect, authenticate and select the configured mailbox.
    async fn connect(&self) -> Result<Self::Session, MailboxError>;
}

/// An open session with the mailbox selected.
#[async_trait]
pub trait MailSession: Send {
    /// UIDs of messages without the seen flag, ascending.
    async fn unseen(&mut self) -> Result<Vec<u32>, MailboxError>;

    /// Raw header block of a message, without the body. Must not set the
    /// seen flag.
    async fn headers(&mut self, uid: u32) -> Result<Vec<u8>, MailboxError>;

    /// Raw RFC 5322 source of a message. Must not set the seen flag.
    async fn fetch(&mut self, uid: u32) -> Result<Vec<u8>, MailboxError>;

    /// Set the seen flag on a message.
    async fn mark_seen(&mut self, uid: u32) -> Result<(), MailboxError>;

    /// End the session.
    async fn close(&mut self) -> Result<(), MailboxError>;
}
