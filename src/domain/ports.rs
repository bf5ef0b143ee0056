//! Capabilities the sync run depends on.
//!
//! Concrete adapters live in the infrastructure layer; tests substitute
//! in-memory versions.

use async_trait::async_trait;

use super::error::Result;
use super::ledger::SyncLedger;
use super::models::{DeliveryFile, Document, FetchedFile, SourceQuery, TargetSurface};

/// The reference manager holding candidate documents.
#[async_trait]
pub trait SourceRepository: Send + Sync {
    /// List candidates matching the query, in source order.
    async fn query(&self, query: &SourceQuery) -> Result<Vec<Document>>;

    /// Fetch raw content for one document id.
    async fn fetch(&self, id: &str) -> Result<FetchedFile>;
}

/// Finds the live upload surface.
#[async_trait]
pub trait TargetLocator: Send + Sync {
    /// Resolve the surface, failing with `NotFound` when it is absent or not ready.
    async fn locate(&self) -> Result<TargetSurface>;
}

/// Injects a batch of files into the upload surface.
///
/// Callers never issue overlapping `deliver` calls.
#[async_trait]
pub trait DeliveryAdapter: Send + Sync {
    async fn deliver(&self, target: &TargetSurface, batch: &[DeliveryFile]) -> Result<()>;
}

/// Sink for human-readable progress messages. Never fails.
pub trait StatusReporter: Send + Sync {
    fn report(&self, message: &str);
}

/// Durable home of the ledger snapshot.
pub trait LedgerStore {
    /// Load the whole ledger; an absent record is an empty ledger.
    ///
    /// # Errors
    /// Returns error if the record cannot be read or parsed.
    fn load_ledger(&self) -> Result<SyncLedger>;

    /// Replace the stored ledger.
    ///
    /// # Errors
    /// Returns error if the record cannot be written.
    fn save_ledger(&self, ledger: &SyncLedger) -> Result<()>;
}
