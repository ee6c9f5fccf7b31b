//! # inbox-dl
//!
//! Watches an IMAP mailbox and downloads the archives that new emails link to.
//!
//! Every few seconds the poller opens a session, works out which messages
//! arrived since the last look, and for each one:
//!
//! 1. parses the MIME message and takes its first HTML part
//! 2. extracts the download link (by href pattern, then by anchor text)
//! 3. resolves the link, either directly or by rendering the landing page in
//!    a browser and collecting its download buttons
//! 4. fetches each download, keeping only archive responses
//!
//! Messages already in the mailbox when watching starts are never processed.
//!
//! ## Quick Start
//!
//! ```no_run
//! use inbox_dl::{Config, Poller, run_with_shutdown};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let poller = Poller::from_config(&config)?;
//!
//!     // Poll until SIGINT or SIGTERM
//!     run_with_shutdown(poller).await;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Mailbox cursor tracking
pub mod cursor;
/// Error types
pub mod error;
/// HTML link extraction
pub mod extract;
/// Archive downloads
pub mod fetcher;
/// Mailbox access
pub mod mailbox;
/// MIME message parsing
pub mod message;
/// The poll loop
pub mod poller;
/// Link resolution
pub mod resolver;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{Config, FileCollisionAction, ResolverMode};
pub use cursor::{CursorDelta, MailboxCursor};
pub use error::{Error, ErrorCategory, Result};
pub use extract::LinkExtractor;
pub use fetcher::FileFetcher;
pub use message::{MessageContent, parse_message};
pub use poller::Poller;
pub use types::{
    CycleReport, DownloadResult, ExtractedLink, LinkProvenance, MessageId, PollState,
    ResolvedDownload,
};

/// Run the poller until a shutdown signal arrives
///
/// Waits for SIGTERM or SIGINT (Ctrl+C on other platforms) and then drops the
/// poll loop. A cycle in progress is abandoned; partially written downloads
/// keep their `.part` suffix and are never mistaken for finished files.
///
/// # Example
///
/// ```no_run
/// use inbox_dl::{Config, Poller, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let poller = Poller::from_config(&Config::default())?;
///     run_with_shutdown(poller).await;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(poller: Poller) {
    tokio::select! {
        _ = poller.run() => {}
        _ = wait_for_signal() => {
            tracing::info!("Shutting down");
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Received Ctrl+C signal");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
