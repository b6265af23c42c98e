//! Semantic search infrastructure for the location catalog.
//!
//! This module provides local semantic search using fastembed-rs for
//! embedding generation and an in-memory vector index persisted to disk.
//!
//! # Architecture
//!
//! - `embeddings`: `Embedder` trait and the fastembed-backed model
//! - `index`: In-memory vector index with cosine distance search
//! - `storage`: Binary file I/O for one collection
//! - `collection`: Named collections in a directory
//! - `preprocess`: Document text, metadata flattening and snippets

pub mod collection;
pub mod embeddings;
pub mod index;
pub mod preprocess;
pub mod storage;

pub use collection::{Collection, CollectionStore, StoreError};
pub use embeddings::{Embedder, EmbeddingError, EmbeddingModel};
pub use index::{IndexError, Metadata, Neighbor, VectorEntry};

/// Default embedding model name (384-dimensional MiniLM)
pub const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";
