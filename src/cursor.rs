//! Mailbox cursor: tracks the last-seen message across poll cycles
//!
//! The first listing only establishes a baseline, so messages that were
//! already in the mailbox when watching started are never processed.
//!
//! New messages are found by using the previous marker's numeric value as a
//! positional offset into the full listing. That is only correct while
//! identifiers are dense and start at 1 (plain IMAP sequence numbers with no
//! expunges in between). An expunge shifts the listing under the offset, and
//! a shrinking mailbox can move the marker backwards. The behavior is kept
//! as-is; [`MailboxCursor::diff`] logs a warning when it notices the
//! assumption does not hold.

use crate::types::MessageId;
use tracing::{debug, info, warn};

/// What a single [`MailboxCursor::diff`] call observed
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CursorDelta {
    /// New message identifiers, most recent first
    pub new_ids: Vec<MessageId>,
    /// True when this call only established the baseline marker
    pub baseline: bool,
    /// Marker to store once the new messages have been handled
    pub latest: Option<MessageId>,
}

impl CursorDelta {
    /// Whether there is anything to process
    pub fn is_empty(&self) -> bool {
        self.new_ids.is_empty()
    }
}

/// In-memory checkpoint of polling progress
#[derive(Clone, Debug, Default)]
pub struct MailboxCursor {
    marker: Option<MessageId>,
}

impl MailboxCursor {
    /// A cursor that has not seen any listing yet
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently observed message identifier
    pub fn marker(&self) -> Option<MessageId> {
        self.marker
    }

    /// Compare a full, ordered listing against the stored marker.
    ///
    /// Returns the identifiers after the marker in reverse order (newest
    /// first). The first listing stores the baseline marker right away; after
    /// that the marker only moves when the delta is passed to
    /// [`MailboxCursor::commit`], so a cycle that fails part way sees the same
    /// messages again. An empty listing leaves the marker untouched.
    pub fn diff(&self, all_ids: &[MessageId]) -> CursorDelta {
        let Some(&latest) = all_ids.last() else {
            info!("No messages found in the mailbox");
            return CursorDelta::default();
        };

        let Some(previous) = self.marker else {
            info!(marker = latest, "Initialized, waiting for new emails");
            return CursorDelta {
                new_ids: Vec::new(),
                baseline: true,
                latest: Some(latest),
            };
        };

        if latest == previous {
            debug!(marker = previous, "No new emails");
            return CursorDelta::default();
        }

        if latest < previous || all_ids.len() != latest as usize {
            warn!(
                marker = previous,
                latest,
                listed = all_ids.len(),
                "Message identifiers are not dense from 1; new-message offset may be wrong"
            );
        }

        let offset = (previous as usize).min(all_ids.len());
        let new_ids: Vec<MessageId> = all_ids[offset..].iter().rev().copied().collect();

        info!(
            count = new_ids.len(),
            marker = previous,
            latest,
            "New email(s) found"
        );

        CursorDelta {
            new_ids,
            baseline: false,
            latest: Some(latest),
        }
    }

    /// Store the marker proposed by `delta`
    pub fn commit(&mut self, delta: &CursorDelta) {
        if let Some(latest) = delta.latest {
            self.marker = Some(latest);
        }
    }
}
