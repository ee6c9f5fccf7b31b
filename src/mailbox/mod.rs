//! Mailbox access
//!
//! The poll loop only needs four things from a mailbox: open an authenticated
//! session on the watched folder, list message identifiers in order, fetch a
//! full message, and tear the session down. [`MailboxConnector`] and
//! [`MailboxSession`] capture exactly that, so the loop can be driven by a
//! fake in tests.
//!
//! - [`ImapConnector`]: IMAP over implicit TLS

mod imap;
mod traits;

pub use imap::ImapConnector;
pub use traits::{MailboxConnector, MailboxSession};
