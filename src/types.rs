//! Core types for inbox-dl

use std::path::PathBuf;

/// Mailbox message identifier (IMAP sequence number)
pub type MessageId = u32;

/// How an extracted link was found
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkProvenance {
    /// The anchor's href matched the configured link pattern
    Pattern,
    /// The anchor's visible text matched the download text heuristic
    Text,
}

/// A download URL pulled out of an HTML message body, already normalized
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedLink {
    /// Decoded URL
    pub url: String,
    /// Which heuristic produced the link
    pub provenance: LinkProvenance,
}

/// A concrete (filename, URL) pair ready to be fetched
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedDownload {
    /// Display filename. `None` leaves naming to the fetcher.
    pub filename: Option<String>,
    /// Final download URL
    pub url: String,
}

impl ResolvedDownload {
    /// A download whose name the fetcher will infer from the response
    pub fn unnamed(url: impl Into<String>) -> Self {
        Self {
            filename: None,
            url: url.into(),
        }
    }

    /// A download with an explicit filename
    pub fn named(filename: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            filename: Some(filename.into()),
            url: url.into(),
        }
    }
}

/// Outcome of a single fetch attempt
#[must_use]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DownloadResult {
    /// The archive was written to disk
    Succeeded {
        /// Where the file was written
        path: PathBuf,
        /// Number of body bytes written
        bytes: u64,
    },
    /// The server answered 200 with something other than the expected archive type
    Rejected {
        /// The content-type the server sent, if any
        content_type: Option<String>,
    },
    /// A file with the same name already exists and the collision policy is skip
    Skipped {
        /// The existing file
        path: PathBuf,
    },
    /// Non-200 status, network failure, or local write failure
    Failed {
        /// HTTP status, when a response was received
        status: Option<u16>,
        /// Response text or error message for diagnostics
        message: String,
    },
}

impl DownloadResult {
    /// Whether bytes landed on disk
    pub fn is_success(&self) -> bool {
        matches!(self, DownloadResult::Succeeded { .. })
    }
}

/// Poll loop states, in the order a cycle moves through them
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PollState {
    /// Opening the TCP/TLS connection
    Connecting,
    /// Logged in and mailbox selected
    Authenticated,
    /// Listing message identifiers
    Listing,
    /// Nothing new this cycle
    Idle,
    /// Handling new messages
    Processing,
    /// Closing the mailbox and logging out
    Disconnecting,
}

impl std::fmt::Display for PollState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PollState::Connecting => "connecting",
            PollState::Authenticated => "authenticated",
            PollState::Listing => "listing",
            PollState::Idle => "idle",
            PollState::Processing => "processing",
            PollState::Disconnecting => "disconnecting",
        };
        f.write_str(name)
    }
}

/// Summary of one poll cycle
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Furthest state reached before disconnecting (`None` if connecting failed)
    pub reached: Option<PollState>,
    /// New message identifiers, in the order they were processed
    pub new_messages: Vec<MessageId>,
    /// Messages that yielded a download link
    pub links_found: usize,
    /// Downloads written to disk
    pub succeeded: usize,
    /// Downloads refused because of their content-type
    pub rejected: usize,
    /// Downloads left alone because the target already existed
    pub skipped: usize,
    /// Downloads (or resolutions) that failed
    pub failed: usize,
}

impl CycleReport {
    /// Fold a download outcome into the counters
    pub fn record(&mut self, result: &DownloadResult) {
        match result {
            DownloadResult::Succeeded { .. } => self.succeeded += 1,
            DownloadResult::Rejected { .. } => self.rejected += 1,
            DownloadResult::Skipped { .. } => self.skipped += 1,
            DownloadResult::Failed { .. } => self.failed += 1,
        }
    }
}
