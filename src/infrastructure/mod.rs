//! Infrastructure layer - external adapters (database, HTTP, filesystem).
//!
//! This layer handles all I/O operations and external dependencies.

pub mod bridge_client;
pub mod config;
pub mod console_status;
pub mod local_storage;
pub mod run_lock;
pub mod zotero_client;

pub use bridge_client::BridgeClient;
pub use config::{config_file_path, ensure_config_exists, load_config, save_config};
pub use console_status::ConsoleStatus;
pub use local_storage::LocalStorage;
pub use run_lock::RunLock;
pub use zotero_client::ZoteroClient;
