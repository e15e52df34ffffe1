//! Error types for Postpilot

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PostpilotError>;

#[derive(Error, Debug)]
pub enum PostpilotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Post store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("Another sweep is in progress (lease held by {holder})")]
    SweepInProgress { holder: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl PostpilotError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PostpilotError::SweepInProgress { .. } => 0,
            PostpilotError::Config(_) => 2,
            PostpilotError::InvalidInput(_) => 2,
            PostpilotError::Store(_) => 1,
        }
    }

    /// True when the error came from the post store or the lease store
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, PostpilotError::Store(_))
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Failures talking to the post store or the lease table.
///
/// Any of these is fatal to the sweep that hit it.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0}")]
    Unavailable(String),

    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Corrupt post row {post_id}: {reason}")]
    Decode { post_id: String, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A single publish attempt failed.
///
/// Recorded against one (post, platform) pair and never escalated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Publish rejected: {0}")]
    Rejected(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("No publishing client registered for {0}")]
    NotConfigured(String),
}

impl PlatformError {
    pub fn kind(&self) -> PublishErrorKind {
        match self {
            PlatformError::Authentication(_) => PublishErrorKind::Authentication,
            PlatformError::Validation(_) => PublishErrorKind::Validation,
            PlatformError::Rejected(_) => PublishErrorKind::Rejected,
            PlatformError::Network(_) => PublishErrorKind::Network,
            PlatformError::RateLimit(_) => PublishErrorKind::RateLimit,
            PlatformError::Timeout(_) => PublishErrorKind::Timeout,
            PlatformError::NotConfigured(_) => PublishErrorKind::NotConfigured,
        }
    }
}

/// Serializable classification of a failed publish attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishErrorKind {
    Authentication,
    Validation,
    Rejected,
    Network,
    RateLimit,
    Timeout,
    NotConfigured,
}
