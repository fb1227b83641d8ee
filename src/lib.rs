//! Tender-Harvest: an incremental procurement-listing harvester
//!
//! This crate walks the paged procedure listings of a procurement site,
//! collects the procedures that are not yet in the local table, downloads
//! their attached documents into per-procedure folders and appends one row
//! per procedure to a CSV table.

pub mod config;
pub mod crawler;
pub mod procedure;
pub mod reconcile;
pub mod schedule;
pub mod shutdown;
pub mod storage;

use thiserror::Error;

/// Main error type for Tender-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Unexpected HTTP status {status} for {url}")]
    UnexpectedStatus { url: String, status: u16 },

    #[error("Malformed page at {url}: {message}")]
    MalformedPage { url: String, message: String },

    #[error("Procedure page {url} has no registry number")]
    MissingRegistryNumber { url: String },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Interrupted by shutdown signal")]
    Interrupted,
}

impl HarvestError {
    /// Returns true if a failed attempt with this error may be repeated
    ///
    /// Remote failures (transport, unexpected status, pages whose structure
    /// did not match) are retried. Local failures and interrupts are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http { .. }
                | Self::UnexpectedStatus { .. }
                | Self::MalformedPage { .. }
                | Self::MissingRegistryNumber { .. }
        )
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Tender-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{harvest, Coordinator, SectionReport};
pub use procedure::{DocumentRef, ProcedureRecord};
pub use shutdown::Shutdown;
