//! Per-destination record of what has already been delivered.
//!
//! The ledger is loaded and saved as one snapshot; it is never streamed.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::Document;

/// Last delivered state of one document at one destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    /// Fingerprint at the time of delivery.
    #[serde(default)]
    pub fingerprint: String,
    /// Modification marker at the time of delivery.
    #[serde(default)]
    pub modified_at: String,
    /// Wall clock of the successful delivery.
    pub synced_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Snapshot a document as delivered at `synced_at`.
    #[must_use]
    pub fn from_document(doc: &Document, synced_at: DateTime<Utc>) -> Self {
        Self {
            fingerprint: doc.fingerprint.clone(),
            modified_at: doc.modified_at.clone(),
            synced_at,
        }
    }
}

/// Mapping `destination -> document -> entry`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncLedger {
    destinations: BTreeMap<String, BTreeMap<String, LedgerEntry>>,
}

impl SyncLedger {
    /// Look up the entry for a document at a destination.
    #[must_use]
    pub fn get(&self, destination_id: &str, document_id: &str) -> Option<&LedgerEntry> {
        self.destinations
            .get(destination_id)
            .and_then(|docs| docs.get(document_id))
    }

    /// Record a delivered batch. Entries are created or overwritten, never removed.
    pub fn commit_batch<'a>(
        &mut self,
        destination_id: &str,
        delivered: impl IntoIterator<Item = &'a Document>,
        synced_at: DateTime<Utc>,
    ) {
        let docs = self
            .destinations
            .entry(destination_id.to_string())
            .or_default();

        for doc in delivered {
            docs.insert(doc.id.clone(), LedgerEntry::from_document(doc, synced_at));
        }
    }

    /// Entries for one destination, ordered by document id.
    pub fn entries_for<'a>(
        &'a self,
        destination_id: &str,
    ) -> impl Iterator<Item = (&'a str, &'a LedgerEntry)> + 'a {
        self.destinations
            .get(destination_id)
            .into_iter()
            .flat_map(|docs| docs.iter().map(|(id, entry)| (id.as_str(), entry)))
    }

    /// All destination ids present in the ledger.
    pub fn destinations(&self) -> impl Iterator<Item = &str> {
        self.destinations.keys().map(String::as_str)
    }

    /// Drop everything recorded for a destination. Returns the number of entries removed.
    pub fn forget_destination(&mut self, destination_id: &str) -> usize {
        self.destinations
            .remove(destination_id)
            .map_or(0, |docs| docs.len())
    }

    /// Destination with the most entries synced at or after `since`, with that count.
    #[must_use]
    pub fn committed_since(&self, since: DateTime<Utc>) -> Option<(&str, usize)> {
        self.destinations
            .iter()
            .map(|(dest, docs)| {
                let count = docs.values().filter(|e| e.synced_at >= since).count();
                (dest.as_str(), count)
            })
            .filter(|(_, count)| *count > 0)
            .max_by_key(|(_, count)| *count)
    }

    /// Total number of entries across destinations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.destinations.values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
