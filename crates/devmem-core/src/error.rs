//! Error taxonomy for devmem-core.
//!
//! Each component gets its own `thiserror` enum so call sites can match on
//! specific failure modes; [`Error`] unifies them for callers (the daemon's
//! HTTP layer in particular) that just need one type to propagate with `?`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration {version} failed: {reason}")]
    Migration { version: i64, reason: String },

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum VectorSearchError {
    #[error("usearch error: {0}")]
    Index(String),

    #[error("collection not found: {0}")]
    UnknownCollection(String),

    #[error("dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding backend failed: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Vector(#[from] VectorSearchError),

    #[error(transparent)]
    Embed(#[from] EmbedError),

    #[error("unreadable file {path}: {source}")]
    UnreadableFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("file exceeds maximum ingestible size: {path} ({size} bytes)")]
    FileTooLarge { path: String, size: u64 },
}

#[derive(Debug, Error)]
pub enum RouterError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Vector(#[from] VectorSearchError),

    #[error(transparent)]
    Embed(#[from] EmbedError),

    #[error("empty query")]
    EmptyQuery,
}

#[derive(Debug, Error)]
pub enum ConsolidationError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Vector(#[from] VectorSearchError),

    #[error(transparent)]
    Embed(#[from] EmbedError),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Vector(#[from] VectorSearchError),

    #[error(transparent)]
    Embed(#[from] EmbedError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Router(#[from] RouterError),

    #[error(transparent)]
    Consolidation(#[from] ConsolidationError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
