//! Test fixtures: an in-memory mailbox and email builders

use async_trait::async_trait;
use inbox_dl::mailbox::{MailboxConnector, MailboxSession};
use inbox_dl::{Error, MessageId, Result};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct MailboxState {
    messages: BTreeMap<MessageId, Vec<u8>>,
    sessions_opened: usize,
    sessions_closed: usize,
    offline: bool,
}

/// In-memory mailbox whose identifiers are plain sequence numbers
#[derive(Clone, Default)]
pub struct MemoryMailbox {
    state: Arc<Mutex<MailboxState>>,
}

impl MemoryMailbox {
    /// Append a message, returning its identifier
    pub fn deliver(&self, raw: impl Into<Vec<u8>>) -> MessageId {
        let mut state = self.state.lock().unwrap();
        let id = state.messages.keys().next_back().copied().unwrap_or(0) + 1;
        state.messages.insert(id, raw.into());
        id
    }

    /// Make subsequent connects fail
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }

    /// (opened, closed) session counts
    pub fn session_counts(&self) -> (usize, usize) {
        let state = self.state.lock().unwrap();
        (state.sessions_opened, state.sessions_closed)
    }
}

struct MemorySession {
    state: Arc<Mutex<MailboxState>>,
}

#[async_trait]
impl MailboxConnector for MemoryMailbox {
    async fn connect(&self) -> Result<Box<dyn MailboxSession>> {
        let mut state = self.state.lock().unwrap();
        if state.offline {
            return Err(Error::Connection("network unreachable".into()));
        }
        state.sessions_opened += 1;
        Ok(Box::new(MemorySession {
            state: self.state.clone(),
        }))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl MailboxSession for MemorySession {
    async fn list_ids(&mut self) -> Result<Vec<MessageId>> {
        Ok(self.state.lock().unwrap().messages.keys().copied().collect())
    }

    async fn fetch_message(&mut self, id: MessageId) -> Result<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .messages
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::Protocol(format!("no message {id}")))
    }

    async fn close(&mut self) -> Result<()> {
        self.state.lock().unwrap().sessions_closed += 1;
        Ok(())
    }
}

/// A multipart/alternative email whose HTML part is quoted-printable encoded
pub fn share_email(subject: &str, html: &str) -> String {
    let encoded = html.replace('=', "=3D");
    format!(
        "From: share@files.example\r\n\
         To: me@example.com\r\n\
         Subject: {subject}\r\n\
         MIME-Version: 1.0\r\n\
         Content-Type: multipart/alternative; boundary=\"sep\"\r\n\
         \r\n\
         --sep\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         \r\n\
         Your files are ready.\r\n\
         --sep\r\n\
         Content-Type: text/html; charset=utf-8\r\n\
         Content-Transfer-Encoding: quoted-printable\r\n\
         \r\n\
         {encoded}\r\n\
         --sep--\r\n"
    )
}

/// A plain-text email with no links
pub fn plain_email(subject: &str) -> String {
    format!(
        "From: friend@example.com\r\n\
         Subject: {subject}\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         \r\n\
         Lunch tomorrow?\r\n"
    )
}
