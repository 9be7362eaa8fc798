//! Error types for retrieval

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// Catalog file could not be read
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Catalog file is not in the expected JSON shape
    #[error("invalid catalog {path}: {source}")]
    Catalog {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The embedder returned a different number of vectors than inputs
    #[error("embedder returned {got} vectors for {expected} inputs")]
    EmbeddingCount { expected: usize, got: usize },

    /// Embedding backend failure
    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("meta catalog is empty")]
    EmptyCatalog,
}

impl RetrievalError {
    #[inline]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    #[inline]
    pub fn catalog(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Catalog {
            path: path.into(),
            source,
        }
    }

    /// Whether a later call might succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Embedding(_))
    }
}
