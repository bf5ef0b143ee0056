//! Change detection against the sync ledger.
//!
//! Decides which candidates have to be delivered to a destination.

use crate::domain::{Document, LedgerEntry, SyncLedger};

/// Why a candidate needs to be transferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    /// Never delivered to this destination.
    New,
    /// Fingerprint differs from the delivered one.
    ContentChanged,
    /// No usable fingerprint, but the modification marker moved.
    Modified,
}

impl std::fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::ContentChanged => write!(f, "content changed"),
            Self::Modified => write!(f, "modified"),
        }
    }
}

/// Classify one candidate against its ledger entry.
///
/// A non-empty fingerprint on both sides is authoritative: when they match the
/// timestamp is not consulted.
#[must_use]
pub fn classify(doc: &Document, entry: Option<&LedgerEntry>) -> Option<ChangeReason> {
    let Some(entry) = entry else {
        return Some(ChangeReason::New);
    };

    if !doc.fingerprint.is_empty() {
        if doc.fingerprint != entry.fingerprint {
            return Some(ChangeReason::ContentChanged);
        }
        if !entry.fingerprint.is_empty() {
            return None;
        }
    }

    (doc.modified_at != entry.modified_at).then_some(ChangeReason::Modified)
}

/// Candidates that need a transfer to `destination_id`, in candidate order.
#[must_use]
pub fn needs_sync(
    destination_id: &str,
    candidates: &[Document],
    ledger: &SyncLedger,
) -> Vec<Document> {
    candidates
        .iter()
        .filter(|doc| {
            let reason = classify(doc, ledger.get(destination_id, &doc.id));
            if let Some(reason) = reason {
                tracing::debug!(id = %doc.id, %reason, "Needs sync");
            }
            reason.is_some()
        })
        .cloned()
        .collect()
}
