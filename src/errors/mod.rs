/// Error handling for the pool data cache
///
/// Source-level failures (`SourceTimeout`, `SourceError`) and store-level
/// failures (`SchemaMismatch`, `CorruptStore`, `StoreWriteFailure`) are
/// recovered inside the cache. Only `NoDataAvailable` (and `InvalidKey` at
/// the API boundary) is ever returned from `get_data`.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Source {source_name} timed out after {timeout_ms}ms")]
    SourceTimeout {
        source_name: &'static str,
        timeout_ms: u64,
    },

    #[error("Source {source_name} failed: {message}")]
    SourceError {
        source_name: &'static str,
        message: String,
    },

    #[error("Schema mismatch: stored {found:?}, expected {expected}")]
    SchemaMismatch {
        found: Option<String>,
        expected: String,
    },

    #[error("Corrupt store blob: {0}")]
    CorruptStore(String),

    #[error("No data available for {key_prefix}")]
    NoDataAvailable { key_prefix: String },

    #[error("Store write failed: {0}")]
    StoreWriteFailure(String),

    #[error("Invalid cache key: {0:?}")]
    InvalidKey(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    pub fn source_error(source_name: &'static str, message: impl Into<String>) -> Self {
        CacheError::SourceError {
            source_name,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for CacheError {
    fn from(e: reqwest::Error) -> Self {
        CacheError::Http(e.to_string())
    }
}

pub type CacheResult<T> = Result<T, CacheError>;
