//! The poll loop
//!
//! Each cycle opens a fresh mailbox session, lists identifiers, asks the
//! [`MailboxCursor`] what is new, and pushes every new message through
//! extraction, resolution and fetching. The session is closed at the end of
//! every cycle that managed to open one, whatever happened in between.
//!
//! Failures inside one message are logged and the next message is handled.
//! Connection and protocol failures end the cycle; the loop sleeps and tries
//! again with a new session.

use crate::config::Config;
use crate::cursor::MailboxCursor;
use crate::error::{Error, Result};
use crate::extract::LinkExtractor;
use crate::fetcher::FileFetcher;
use crate::mailbox::{ImapConnector, MailboxConnector, MailboxSession};
use crate::message::parse_message;
use crate::resolver::{LinkResolver, build_resolver};
use crate::types::{CycleReport, MessageId, PollState};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Drives mailbox polling and the download pipeline
pub struct Poller {
    connector: Arc<dyn MailboxConnector>,
    cursor: MailboxCursor,
    extractor: LinkExtractor,
    resolver: Box<dyn LinkResolver>,
    fetcher: FileFetcher,
    interval: Duration,
}

impl Poller {
    /// Assemble a poller from its parts
    pub fn new(
        connector: Arc<dyn MailboxConnector>,
        extractor: LinkExtractor,
        resolver: Box<dyn LinkResolver>,
        fetcher: FileFetcher,
        interval: Duration,
    ) -> Self {
        Self {
            connector,
            cursor: MailboxCursor::new(),
            extractor,
            resolver,
            fetcher,
            interval,
        }
    }

    /// Build the IMAP-backed poller described by `config`
    ///
    /// # Errors
    ///
    /// Returns error if the extraction pattern is invalid or an HTTP client
    /// cannot be created
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            Arc::new(ImapConnector::new(config.mailbox.clone())),
            LinkExtractor::new(&config.extraction)?,
            build_resolver(&config.resolver)?,
            FileFetcher::new(&config.fetch)?,
            config.poll_interval,
        ))
    }

    /// The cursor's current position
    pub fn cursor(&self) -> &MailboxCursor {
        &self.cursor
    }

    /// Run a single poll cycle
    ///
    /// # Errors
    ///
    /// Returns error if the mailbox cannot be reached, or a connection or
    /// protocol failure ends the cycle early. Per-message failures are logged
    /// and do not surface here.
    pub async fn poll_once(&mut self) -> Result<CycleReport> {
        let mut report = CycleReport::default();

        debug!(state = %PollState::Connecting, connector = self.connector.name(), "Opening mailbox session");
        let mut session = self.connector.connect().await?;
        report.reached = Some(PollState::Authenticated);
        debug!(state = %PollState::Authenticated, "Mailbox session ready");

        let outcome = self.process_session(session.as_mut(), &mut report).await;

        debug!(state = %PollState::Disconnecting, "Closing mailbox session");
        if let Err(e) = session.close().await {
            warn!(error = %e, "Failed to close mailbox session cleanly");
        }

        outcome.map(|()| report)
    }

    async fn process_session(
        &mut self,
        session: &mut dyn MailboxSession,
        report: &mut CycleReport,
    ) -> Result<()> {
        report.reached = Some(PollState::Listing);
        let ids = session.list_ids().await?;
        let delta = self.cursor.diff(&ids);

        if delta.is_empty() {
            self.cursor.commit(&delta);
            report.reached = Some(PollState::Idle);
            return Ok(());
        }

        report.reached = Some(PollState::Processing);
        for &id in &delta.new_ids {
            report.new_messages.push(id);
            if let Err(e) = self.process_message(session, id, report).await {
                if e.ends_cycle() {
                    return Err(e);
                }
                warn!(
                    message_id = id,
                    error = %e,
                    category = e.category().as_str(),
                    "Failed to process message, continuing with the next one"
                );
            }
        }

        // Only a finished batch moves the marker; a broken cycle retries it
        self.cursor.commit(&delta);
        Ok(())
    }

    async fn process_message(
        &self,
        session: &mut dyn MailboxSession,
        id: MessageId,
        report: &mut CycleReport,
    ) -> Result<()> {
        let raw = session.fetch_message(id).await?;
        let content = parse_message(&raw)?;
        info!(
            message_id = id,
            subject = content.subject.as_deref().unwrap_or("<no subject>"),
            "Processing email"
        );

        let Some(html) = content.html else {
            debug!(message_id = id, "Message has no HTML part");
            return Ok(());
        };
        let Some(link) = self.extractor.extract(&html) else {
            return Ok(());
        };
        report.links_found += 1;

        let downloads = match self.resolver.resolve(&link.url).await {
            Ok(downloads) => downloads,
            Err(e) => {
                report.failed += 1;
                return Err(e);
            }
        };
        if downloads.is_empty() {
            info!(message_id = id, url = %link.url, resolver = self.resolver.name(), "Link resolved to no downloads");
        }

        for download in downloads {
            let result = self
                .fetcher
                .fetch(&download.url, download.filename.as_deref())
                .await;
            report.record(&result);
        }
        Ok(())
    }

    /// Poll forever, sleeping a fixed interval between cycles
    ///
    /// Never returns on its own; stop it by dropping the future (see
    /// [`crate::run_with_shutdown`]).
    pub async fn run(mut self) {
        info!(interval = ?self.interval, resolver = self.resolver.name(), "Watching mailbox");
        loop {
            match self.poll_once().await {
                Ok(report) => {
                    if !report.new_messages.is_empty() {
                        info!(
                            messages = report.new_messages.len(),
                            links = report.links_found,
                            succeeded = report.succeeded,
                            rejected = report.rejected,
                            skipped = report.skipped,
                            failed = report.failed,
                            "Cycle complete"
                        );
                    }
                }
                Err(e) => log_cycle_error(&e),
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}

fn log_cycle_error(e: &Error) {
    error!(error = %e, category = e.category().as_str(), "Poll cycle failed");
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExtractionConfig, FetchConfig};
    use crate::types::ResolvedDownload;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MailboxState {
        ids: Vec<MessageId>,
        messages: HashMap<MessageId, Vec<u8>>,
        broken: HashMap<MessageId, fn() -> Error>,
        connects: usize,
        closes: usize,
        refuse: bool,
    }

    #[derive(Clone, Default)]
    struct FakeMailbox(Arc<Mutex<MailboxState>>);

    impl FakeMailbox {
        fn deliver(&self, id: MessageId, raw: String) {
            let mut state = self.0.lock().unwrap();
            state.ids.push(id);
            state.messages.insert(id, raw.into_bytes());
        }

        fn closes(&self) -> usize {
            self.0.lock().unwrap().closes
        }
    }

    struct FakeSession(Arc<Mutex<MailboxState>>);

    #[async_trait]
    impl MailboxConnector for FakeMailbox {
        async fn connect(&self) -> Result<Box<dyn MailboxSession>> {
            let mut state = self.0.lock().unwrap();
            if state.refuse {
                return Err(Error::Connection("connection refused".into()));
            }
            state.connects += 1;
            Ok(Box::new(FakeSession(self.0.clone())))
        }

        fn name(&self) -> &'static str {
            "fake"
        }
    }

    #[async_trait]
    impl MailboxSession for FakeSession {
        async fn list_ids(&mut self) -> Result<Vec<MessageId>> {
            Ok(self.0.lock().unwrap().ids.clone())
        }

        async fn fetch_message(&mut self, id: MessageId) -> Result<Vec<u8>> {
            let state = self.0.lock().unwrap();
            if let Some(make_error) = state.broken.get(&id) {
                return Err(make_error());
            }
            Ok(state.messages.get(&id).cloned().unwrap_or_default())
        }

        async fn close(&mut self) -> Result<()> {
            self.0.lock().unwrap().closes += 1;
            Ok(())
        }
    }

    /// Records resolved URLs and yields nothing to download
    #[derive(Clone, Default)]
    struct RecordingResolver(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl LinkResolver for RecordingResolver {
        async fn resolve(&self, url: &str) -> Result<Vec<ResolvedDownload>> {
            self.0.lock().unwrap().push(url.to_string());
            if url.contains("browser-down") {
                return Err(Error::Render("session not created".into()));
            }
            Ok(Vec::new())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    fn email(subject: &str, href: &str) -> String {
        format!(
            "Subject: {subject}\r\n\
             MIME-Version: 1.0\r\n\
             Content-Type: text/html; charset=utf-8\r\n\
             \r\n\
             <html><body><a href=\"{href}\">Download</a></body></html>\r\n"
        )
    }

    fn poller(mailbox: &FakeMailbox, resolver: &RecordingResolver) -> Poller {
        Poller::new(
            Arc::new(mailbox.clone()),
            LinkExtractor::new(&ExtractionConfig::default()).unwrap(),
            Box::new(resolver.clone()),
            FileFetcher::new(&FetchConfig::default()).unwrap(),
            Duration::from_millis(10),
        )
    }

    #[tokio::test]
    async fn first_cycle_only_sets_baseline() {
        let mailbox = FakeMailbox::default();
        mailbox.deliver(1, email("old", "https://x.test/old"));
        mailbox.deliver(2, email("old", "https://x.test/old2"));
        let resolver = RecordingResolver::default();
        let mut poller = poller(&mailbox, &resolver);

        let report = poller.poll_once().await.unwrap();

        assert_eq!(report.reached, Some(PollState::Idle));
        assert!(report.new_messages.is_empty());
        assert_eq!(poller.cursor().marker(), Some(2));
        assert!(resolver.0.lock().unwrap().is_empty());
        assert_eq!(mailbox.closes(), 1);
    }

    #[tokio::test]
    async fn new_messages_are_processed_newest_first() {
        let mailbox = FakeMailbox::default();
        for id in 1..=5 {
            mailbox.deliver(id, email("old", "https://x.test/old"));
        }
        let resolver = RecordingResolver::default();
        let mut poller = poller(&mailbox, &resolver);
        poller.poll_once().await.unwrap();

        mailbox.deliver(6, email("six", "https://x.test/six"));
        mailbox.deliver(7, email("seven", "https://x.test/seven"));
        let report = poller.poll_once().await.unwrap();

        assert_eq!(report.reached, Some(PollState::Processing));
        assert_eq!(report.new_messages, vec![7, 6]);
        assert_eq!(report.links_found, 2);
        assert_eq!(
            *resolver.0.lock().unwrap(),
            vec!["https://x.test/seven", "https://x.test/six"]
        );
        assert_eq!(poller.cursor().marker(), Some(7));
        assert_eq!(mailbox.closes(), 2);

        // Nothing new on the next cycle
        let report = poller.poll_once().await.unwrap();
        assert_eq!(report.reached, Some(PollState::Idle));
        assert_eq!(resolver.0.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failing_message_does_not_stop_the_others() {
        let mailbox = FakeMailbox::default();
        mailbox.deliver(1, email("old", "https://x.test/old"));
        let resolver = RecordingResolver::default();
        let mut poller = poller(&mailbox, &resolver);
        poller.poll_once().await.unwrap();

        mailbox.deliver(2, email("good", "https://x.test/good"));
        mailbox.deliver(3, email("unparseable", "https://x.test/never"));
        mailbox.deliver(4, email("renderer down", "https://x.test/browser-down"));
        mailbox
            .0
            .lock()
            .unwrap()
            .broken
            .insert(3, || Error::MessageParse("truncated".into()));

        let report = poller.poll_once().await.unwrap();

        assert_eq!(report.new_messages, vec![4, 3, 2]);
        assert_eq!(report.failed, 1);
        assert_eq!(
            *resolver.0.lock().unwrap(),
            vec!["https://x.test/browser-down", "https://x.test/good"]
        );
    }

    #[tokio::test]
    async fn protocol_error_ends_cycle_but_closes_session() {
        let mailbox = FakeMailbox::default();
        mailbox.deliver(1, email("old", "https://x.test/old"));
        let resolver = RecordingResolver::default();
        let mut poller = poller(&mailbox, &resolver);
        poller.poll_once().await.unwrap();

        mailbox.deliver(2, email("a", "https://x.test/a"));
        mailbox.deliver(3, email("b", "https://x.test/b"));
        mailbox
            .0
            .lock()
            .unwrap()
            .broken
            .insert(3, || Error::Protocol("connection reset".into()));

        let result = poller.poll_once().await;

        assert!(matches!(result, Err(Error::Protocol(_))));
        assert_eq!(mailbox.closes(), 2);
        assert!(resolver.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn interrupted_batch_is_retried_next_cycle() {
        let mailbox = FakeMailbox::default();
        mailbox.deliver(1, email("old", "https://x.test/1"));
        let resolver = RecordingResolver::default();
        let mut poller = poller(&mailbox, &resolver);
        poller.poll_once().await.unwrap();

        mailbox.deliver(2, email("two", "https://x.test/2"));
        mailbox.deliver(3, email("three", "https://x.test/3"));
        mailbox
            .0
            .lock()
            .unwrap()
            .broken
            .insert(2, || Error::Connection("connection reset".into()));

        assert!(poller.poll_once().await.is_err());
        assert_eq!(poller.cursor().marker(), Some(1));
        assert_eq!(*resolver.0.lock().unwrap(), vec!["https://x.test/3"]);

        mailbox.0.lock().unwrap().broken.clear();
        let report = poller.poll_once().await.unwrap();

        assert_eq!(report.new_messages, vec![3, 2]);
        assert_eq!(poller.cursor().marker(), Some(3));
        assert_eq!(
            *resolver.0.lock().unwrap(),
            vec!["https://x.test/3", "https://x.test/3", "https://x.test/2"]
        );

        let report = poller.poll_once().await.unwrap();
        assert!(report.new_messages.is_empty());
    }

    #[tokio::test]
    async fn connect_failure_is_reported() {
        let mailbox = FakeMailbox::default();
        mailbox.0.lock().unwrap().refuse = true;
        let resolver = RecordingResolver::default();
        let mut poller = poller(&mailbox, &resolver);

        let result = poller.poll_once().await;

        match result {
            Err(e) => assert_eq!(e.category(), crate::error::ErrorCategory::ConnectionError),
            Ok(report) => panic!("Expected connection error, got {report:?}"),
        }
        assert_eq!(mailbox.closes(), 0);
        assert_eq!(poller.cursor().marker(), None);
    }

    #[tokio::test]
    async fn message_without_link_is_ignored() {
        let mailbox = FakeMailbox::default();
        mailbox.deliver(1, email("old", "https://x.test/old"));
        let resolver = RecordingResolver::default();
        let mut poller = poller(&mailbox, &resolver);
        poller.poll_once().await.unwrap();

        mailbox.deliver(
            2,
            "Subject: hello\r\nContent-Type: text/plain\r\n\r\njust text\r\n".to_string(),
        );
        let report = poller.poll_once().await.unwrap();

        assert_eq!(report.new_messages, vec![2]);
        assert_eq!(report.links_found, 0);
        assert!(resolver.0.lock().unwrap().is_empty());
    }
}
