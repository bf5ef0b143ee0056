//! Sync-related domain models and configuration.
//!
//! Contains the application configuration, run pacing settings and the
//! record kept for each finished sync run.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{AppError, Result};
use super::models::Project;

/// Batching and pacing for a sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Maximum number of documents per delivery.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between batches in milliseconds.
    #[serde(default = "default_inter_batch_delay")]
    pub inter_batch_delay_ms: u64,

    /// Pause between single-item deliveries (batch size 1) in milliseconds.
    #[serde(default = "default_inter_item_delay")]
    pub inter_item_delay_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            inter_batch_delay_ms: default_inter_batch_delay(),
            inter_item_delay_ms: default_inter_item_delay(),
        }
    }
}

const fn default_batch_size() -> usize {
    10
}

const fn default_inter_batch_delay() -> u64 {
    2_000
}

const fn default_inter_item_delay() -> u64 {
    3_000
}

impl SyncConfig {
    /// Delay to wait after a delivered batch when more batches remain.
    #[must_use]
    pub const fn pacing(&self) -> Duration {
        if self.batch_size == 1 {
            Duration::from_millis(self.inter_item_delay_ms)
        } else {
            Duration::from_millis(self.inter_batch_delay_ms)
        }
    }

    /// Reject settings the orchestrator cannot run with.
    ///
    /// # Errors
    /// Returns error if the batch size is zero.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(AppError::Config {
                message: "batch_size must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Connection settings for the reference-manager server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the local connector server.
    #[serde(default = "default_source_url")]
    pub base_url: String,

    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Per-request timeout in seconds.
    #[serde(default = "default_source_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_source_url(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_source_timeout(),
        }
    }
}

fn default_source_url() -> String {
    "http://localhost:23119".into()
}

const fn default_connect_timeout() -> u64 {
    5
}

const fn default_source_timeout() -> u64 {
    60
}

/// Settings for the automation bridge that drives the upload surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Base URL of the automation bridge.
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,

    /// Host the active surface must be on.
    #[serde(default = "default_target_host")]
    pub target_host: String,

    /// Handshake attempts before a delivery is given up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed wait between handshake attempts in milliseconds.
    #[serde(default = "default_backoff")]
    pub backoff_ms: u64,

    /// Per-request timeout in seconds.
    #[serde(default = "default_delivery_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            bridge_url: default_bridge_url(),
            target_host: default_target_host(),
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff(),
            request_timeout_secs: default_delivery_timeout(),
        }
    }
}

fn default_bridge_url() -> String {
    "http://localhost:9333".into()
}

fn default_target_host() -> String {
    "notebooklm.google.com".into()
}

const fn default_max_attempts() -> u32 {
    5
}

const fn default_backoff() -> u64 {
    1_000
}

const fn default_delivery_timeout() -> u64 {
    120
}

/// Path configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathConfig {
    /// Base data directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Batching and pacing.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Reference-manager connection.
    #[serde(default)]
    pub source: SourceConfig,

    /// Automation bridge connection.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Path configuration.
    #[serde(default)]
    pub paths: PathConfig,

    /// Configured sync projects.
    #[serde(default)]
    pub projects: Vec<Project>,
}

impl AppConfig {
    /// Get the data directory, using default if not configured.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.paths
            .data_dir
            .clone()
            .unwrap_or_else(Self::default_data_dir)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".notebook-sync")
    }

    /// Get the storage database path.
    #[must_use]
    pub fn storage_db_path(&self) -> PathBuf {
        self.data_dir().join("storage.db")
    }

    /// Get the lock file path.
    #[must_use]
    pub fn lock_file_path(&self) -> PathBuf {
        self.data_dir().join("sync.lock")
    }

    /// Find a project by name, ignoring case.
    #[must_use]
    pub fn find_project(&self, name: &str) -> Option<&Project> {
        self.projects
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
    }

    /// Add a project, or replace the one with the same name.
    ///
    /// Returns `true` when an existing project was replaced.
    pub fn upsert_project(&mut self, project: Project) -> bool {
        match self
            .projects
            .iter_mut()
            .find(|p| p.name.eq_ignore_ascii_case(&project.name))
        {
            Some(existing) => {
                *existing = project;
                true
            }
            None => {
                self.projects.push(project);
                false
            }
        }
    }

    /// Remove a project by name. Returns the removed project.
    pub fn remove_project(&mut self, name: &str) -> Option<Project> {
        let index = self
            .projects
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(name.trim()))?;
        Some(self.projects.remove(index))
    }
}

/// How a sync run ended, as stored in run history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// All needed documents were delivered (possibly none).
    Succeeded,
    /// The run stopped before finishing.
    Failed,
}

impl RunStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Unknown run status: {s}")),
        }
    }
}

/// Record of one finished sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Project the run was started for.
    pub project: String,

    /// Destination the run resolved, if it got that far.
    pub destination_id: Option<String>,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run reached its terminal state.
    pub finished_at: DateTime<Utc>,

    /// Terminal status.
    pub status: RunStatus,

    /// Number of documents delivered and committed.
    pub delivered: usize,

    /// The terminal status message.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.sync.batch_size, 10);
        assert_eq!(config.sync.pacing(), Duration::from_secs(2));
        assert_eq!(config.source.base_url, "http://localhost:23119");
        assert_eq!(config.delivery.max_attempts, 5);
        assert!(config.projects.is_empty());
    }

    #[test]
    fn test_single_item_mode_uses_item_delay() {
        let sync = SyncConfig {
            batch_size: 1,
            ..Default::default()
        };
        assert_eq!(sync.pacing(), Duration::from_secs(3));
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let sync = SyncConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(sync.validate().is_err());
        assert!(SyncConfig::default().validate().is_ok());
    }

    #[test]
    fn test_project_upsert_and_remove() {
        let mut config = AppConfig::default();
        let replaced = config.upsert_project(Project {
            name: "Thesis".into(),
            tag: "a".into(),
            ..Default::default()
        });
        assert!(!replaced);

        let replaced = config.upsert_project(Project {
            name: "thesis".into(),
            tag: "b".into(),
            ..Default::default()
        });
        assert!(replaced);
        assert_eq!(config.projects.len(), 1);
        assert_eq!(config.find_project("THESIS").unwrap().tag, "b");

        assert!(config.remove_project("Thesis").is_some());
        assert!(config.remove_project("Thesis").is_none());
    }

    #[test]
    fn test_run_status_roundtrip() {
        assert_eq!("failed".parse::<RunStatus>(), Ok(RunStatus::Failed));
        assert_eq!(RunStatus::Succeeded.as_str(), "succeeded");
        assert!("other".parse::<RunStatus>().is_err());
    }
}
