//! Traits for mailbox access

use crate::error::Result;
use crate::types::MessageId;
use async_trait::async_trait;

/// Opens mailbox sessions
///
/// Each poll cycle asks for a fresh session and closes it before sleeping, so
/// implementations should not cache connections.
#[async_trait]
pub trait MailboxConnector: Send + Sync {
    /// Connect, authenticate, and select the watched mailbox
    ///
    /// # Errors
    ///
    /// [`crate::Error::Connection`] when the server is unreachable or rejects
    /// the credentials, [`crate::Error::Protocol`] when selecting fails.
    async fn connect(&self) -> Result<Box<dyn MailboxSession>>;

    /// Name of this connector implementation, for logging
    fn name(&self) -> &'static str;
}

/// An authenticated session with a mailbox selected
#[async_trait]
pub trait MailboxSession: Send {
    /// All message identifiers in the selected mailbox, ascending
    async fn list_ids(&mut self) -> Result<Vec<MessageId>>;

    /// The full raw message (RFC 822) for an identifier
    async fn fetch_message(&mut self, id: MessageId) -> Result<Vec<u8>>;

    /// Close the mailbox and log out
    async fn close(&mut self) -> Result<()>;
}
