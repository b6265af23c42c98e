use crate::catalog::CatalogError;
use crate::semantic::{EmbeddingError, IndexError, StoreError};

/// Failures of the read path (recommend, tag search, list, health).
#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("location index is not available: {0}")]
    ServiceUnavailable(String),

    #[error("embedding the query failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector index query failed: {0}")]
    Index(#[from] IndexError),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("unexpected error: {0:?}")]
    Other(#[from] anyhow::Error),
}

impl QueryError {
    pub fn invalid(message: impl Into<String>) -> Self {
        QueryError::InvalidArgument(message.into())
    }

    /// Errors raised by the embedding model or the vector index.
    pub fn is_upstream(&self) -> bool {
        matches!(self, QueryError::Embedding(_) | QueryError::Index(_))
    }
}

/// Failures of the index build. Every variant aborts the build.
#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    #[error("catalog validation failed: {0}")]
    Catalog(#[from] CatalogError),

    #[error("embedding {stage} failed: {source}")]
    Embedding {
        stage: &'static str,
        #[source]
        source: EmbeddingError,
    },

    #[error("embedding model produced {got} vectors for {expected} documents")]
    EmbeddingCount { expected: usize, got: usize },

    #[error("vector store error: {0}")]
    Store(#[from] StoreError),

    #[error("smoke query failed: {0}")]
    SmokeQuery(#[from] IndexError),
}
