//! IMAP mailbox connector

use super::traits::{MailboxConnector, MailboxSession};
use crate::config::MailboxConfig;
use crate::error::{Error, Result};
use crate::types::MessageId;
use async_imap::Session;
use async_imap::types::Fetch;
use async_trait::async_trait;
use futures::TryStreamExt;
use tokio::net::TcpStream;
use tokio_native_tls::TlsStream;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};
use tracing::{debug, warn};

type TlsSession = Session<Compat<TlsStream<TcpStream>>>;

/// Connects to an IMAP server over implicit TLS
///
/// # Examples
///
/// ```no_run
/// use inbox_dl::config::MailboxConfig;
/// use inbox_dl::mailbox::{ImapConnector, MailboxConnector};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let connector = ImapConnector::new(MailboxConfig {
///     username: "me@example.com".into(),
///     password: "app-password".into(),
///     ..Default::default()
/// });
///
/// let mut session = connector.connect().await?;
/// let ids = session.list_ids().await?;
/// println!("{} messages", ids.len());
/// session.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ImapConnector {
    config: MailboxConfig,
}

impl ImapConnector {
    /// Create a connector for the given mailbox settings
    pub fn new(config: MailboxConfig) -> Self {
        Self { config }
    }

    async fn open_tls(&self) -> Result<TlsStream<TcpStream>> {
        let host = self.config.host.as_str();
        let tcp = TcpStream::connect((host, self.config.port))
            .await
            .map_err(|e| {
                Error::Connection(format!(
                    "failed to reach {}:{}: {}",
                    host, self.config.port, e
                ))
            })?;

        let connector = tokio_native_tls::native_tls::TlsConnector::new()
            .map_err(|e| Error::Connection(format!("failed to build TLS connector: {e}")))?;

        tokio_native_tls::TlsConnector::from(connector)
            .connect(host, tcp)
            .await
            .map_err(|e| Error::Connection(format!("TLS handshake with {host} failed: {e}")))
    }
}

#[async_trait]
impl MailboxConnector for ImapConnector {
    async fn connect(&self) -> Result<Box<dyn MailboxSession>> {
        debug!(host = %self.config.host, port = self.config.port, "Connecting to the IMAP server");
        let tls = self.open_tls().await?;

        let client = async_imap::Client::new(tls.compat());
        let mut session = client
            .login(&self.config.username, &self.config.password)
            .await
            .map_err(|(e, _client)| Error::Connection(format!("login failed: {e}")))?;

        if let Err(e) = session.select(&self.config.mailbox).await {
            if let Err(logout) = session.logout().await {
                warn!(error = %logout, "Logout after failed SELECT also failed");
            }
            return Err(e.into());
        }
        debug!(mailbox = %self.config.mailbox, "Mailbox selected");

        Ok(Box::new(ImapSession { session }))
    }

    fn name(&self) -> &'static str {
        "imap"
    }
}

struct ImapSession {
    session: TlsSession,
}

#[async_trait]
impl MailboxSession for ImapSession {
    async fn list_ids(&mut self) -> Result<Vec<MessageId>> {
        let mut ids: Vec<MessageId> = self.session.search("ALL").await?.into_iter().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn fetch_message(&mut self, id: MessageId) -> Result<Vec<u8>> {
        let fetches: Vec<Fetch> = self
            .session
            .fetch(id.to_string(), "(RFC822)")
            .await?
            .try_collect()
            .await?;

        fetches
            .iter()
            .find_map(|fetch| fetch.body().map(<[u8]>::to_vec))
            .ok_or_else(|| Error::MessageParse(format!("server returned no body for message {id}")))
    }

    async fn close(&mut self) -> Result<()> {
        self.session.close().await?;
        self.session.logout().await?;
        Ok(())
    }
}
