//! forum-archiver: an incremental crawl-and-archive engine for discussion sites
//!
//! This crate walks forum and Q&A listings, reassembles paginated threads,
//! normalizes embedded math markup and stores each item as an idempotent,
//! ID-addressed JSON record on disk.

pub mod archive;
pub mod config;
pub mod crawler;
pub mod extract;
pub mod feed;
pub mod sites;
pub mod state;
pub mod text;
pub mod transport;

use thiserror::Error;

/// Main error type for crawl and archive operations
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The embedded bootstrap script is missing or could not be parsed
    #[error("Bootstrap data unavailable in {context}")]
    ExtractionSyntax { context: String },

    /// An expected field is absent from the extracted data
    #[error("Field '{field}' missing in {context}")]
    FieldMissing { field: String, context: String },

    /// A field is present but has no literal value (call, function, ...)
    #[error("Field '{field}' is not a literal in {context}")]
    FieldNotLiteral { field: String, context: String },

    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    /// No session could be bootstrapped, so continuation calls cannot be authorized
    #[error("Session unavailable: {0}")]
    SessionUnavailable(String),

    #[error("Aborted by user")]
    UserAbort,

    #[error("Unexpected response from {context}: {message}")]
    Protocol { context: String, message: String },

    /// A listing page or window failed; wraps the underlying error
    #[error("Listing {scope} failed: {source}")]
    Listing {
        scope: String,
        #[source]
        source: Box<ArchiveError>,
    },

    #[error("Hook script failed: {0}")]
    Hook(String),

    #[error("Feed error: {0}")]
    Feed(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    /// Returns true for errors that end the current pass instead of one item
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Listing { source, .. } => source.is_fatal(),
            _ => matches!(
                self,
                Self::SessionUnavailable(_) | Self::UserAbort | Self::Config(_) | Self::Io(_)
            ),
        }
    }

    /// Returns true if the user interrupted the crawl
    pub fn is_abort(&self) -> bool {
        match self {
            Self::Listing { source, .. } => source.is_abort(),
            _ => matches!(self, Self::UserAbort),
        }
    }

    pub(crate) fn listing(scope: impl Into<String>, source: ArchiveError) -> Self {
        match source {
            Self::UserAbort => Self::UserAbort,
            source => Self::Listing {
                scope: scope.into(),
                source: Box::new(source),
            },
        }
    }

    pub(crate) fn field_missing(field: &str, context: &str) -> Self {
        Self::FieldMissing {
            field: field.to_string(),
            context: context.to_string(),
        }
    }

    pub(crate) fn protocol(context: &str, message: impl Into<String>) -> Self {
        Self::Protocol {
            context: context.to_string(),
            message: message.into(),
        }
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

/// Result type alias for crawl and archive operations
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use archive::{ArchiveRecord, ArchiveWriter, RecordKey, WriteOutcome};
pub use config::Config;
pub use crawler::{CrawlJob, Orchestrator};
pub use extract::{extract_bootstrap, BootstrapValue};
