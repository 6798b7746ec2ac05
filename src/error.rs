//! Error types for the chunked context cache

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading, mutating or committing a cache
#[derive(Error, Debug)]
pub enum Error {
    /// Key is not present in the cache (recoverable)
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// A single entry can never fit into one storage row
    #[error("Entry for key '{key}' serializes to {size} characters, row budget is {limit}")]
    EntryTooLarge {
        key: String,
        size: usize,
        limit: usize,
    },

    /// The metadata index for the committed chunk list would not fit in one row
    #[error(
        "Metadata index for {chunks} chunks serializes to {size} characters, row budget is {limit}"
    )]
    MetadataTooLarge {
        chunks: usize,
        size: usize,
        limit: usize,
    },

    /// Chunk metadata index is present but unusable
    #[error("Corrupt chunk metadata: {0}")]
    CorruptMetadata(String),

    /// Malformed JSON in a storage row, or a value that cannot be encoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Context storage backend failure
    #[error("Context storage error: {0}")]
    Storage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML configuration could not be parsed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True for errors the caller is expected to handle during normal use.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::KeyNotFound(_) | Error::EntryTooLarge { .. })
    }
}
