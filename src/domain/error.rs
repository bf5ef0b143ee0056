//! Domain-level error types for notebook-sync.
//!
//! All errors are typed with `thiserror`. Every variant renders as a
//! user-facing string, since terminal failures end up in the status channel.

use thiserror::Error;

/// Why a delivery handshake with the target surface did not go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeFailure {
    /// The in-page listener is missing and has to be injected first.
    ListenerAbsent,
    /// The surface is reachable but not ready to accept files yet.
    NotReady,
}

impl std::fmt::Display for HandshakeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ListenerAbsent => write!(f, "listener absent"),
            Self::NotReady => write!(f, "not ready"),
        }
    }
}

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    /// Target surface, document or file is missing.
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// Retry budget for a transient condition was exhausted.
    #[error("Gave up after {attempts} attempts: {message}")]
    Transient { attempts: u32, message: String },

    /// Handshake with the target surface failed in a recognized way.
    #[error("Handshake failed ({kind}): {message}")]
    Handshake {
        kind: HandshakeFailure,
        message: String,
    },

    /// The delivery capability rejected a batch.
    #[error("Delivery failed: {message}")]
    Delivery { message: String },

    /// HTTP transport failure.
    #[error("HTTP error: {message}")]
    Http {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// Failed to open or query the database.
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Invalid or corrupted data.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {message}")]
    JsonParse {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// The run was stopped by a signal.
    #[error("Interrupted: {message}")]
    Interrupted { message: String },

    /// Configuration or environment error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// IO operation failed.
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl AppError {
    /// Create a database error from rusqlite error.
    pub fn database(err: rusqlite::Error) -> Self {
        Self::Database {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Create a JSON parse error.
    pub fn json_parse(err: serde_json::Error) -> Self {
        Self::JsonParse {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create an IO error with context.
    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(err),
        }
    }

    /// Create an HTTP error with context.
    pub fn http(message: impl Into<String>, err: reqwest::Error) -> Self {
        Self::Http {
            message: format!("{}: {err}", message.into()),
            source: Some(err),
        }
    }

    /// Create a not-found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Create a handshake error of the given kind.
    pub fn handshake(kind: HandshakeFailure, message: impl Into<String>) -> Self {
        Self::Handshake {
            kind,
            message: message.into(),
        }
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
