//! Domain layer - core types, rules and capability traits.
//!
//! This layer contains pure domain models and error types
//! without any external dependencies (DB, IO, etc.).

pub mod error;
pub mod ledger;
pub mod models;
pub mod ports;
pub mod sync;

pub use error::{AppError, HandshakeFailure, Result};
pub use ledger::{LedgerEntry, SyncLedger};
pub use models::{
    DeliveryFile, Document, FetchedFile, MimeType, Project, SourceQuery, TargetSurface,
};
pub use ports::{DeliveryAdapter, LedgerStore, SourceRepository, StatusReporter, TargetLocator};
pub use sync::{AppConfig, DeliveryConfig, RunRecord, RunStatus, SourceConfig, SyncConfig};
