//! devmem-core: the dual-store indexer, hybrid query router, and
//! consolidation engine behind a local-first developer memory daemon.
//!
//! Five pieces, leaves first: [`storage::Store`] and [`search::vector::VectorIndex`]
//! hold the data; [`ingest::Ingestor`] feeds both from source files;
//! [`search::QueryRouter`] and [`consolidation::Consolidator`] read them back.

pub mod config;
pub mod consolidation;
pub mod embeddings;
pub mod error;
pub mod ingest;
pub mod model;
pub mod reasoner;
pub mod search;
pub mod storage;

pub use config::Config;
pub use consolidation::Consolidator;
pub use embeddings::{DeterministicHashEmbedder, Embedder};
pub use error::{Error, Result};
pub use ingest::Ingestor;
pub use reasoner::Reasoner;
pub use search::QueryRouter;
pub use search::vector::VectorIndex;
pub use storage::Store;
