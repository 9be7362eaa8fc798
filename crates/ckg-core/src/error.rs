//! Error types for checker synthesis
//!
//! Only failures that end a rule's run surface as [`SynthesisError`].
//! Everything the synthesis loop absorbs (a rejected response, a failed
//! compile, a failing test run) is recorded on the attempt instead.

use std::path::PathBuf;

use ckg_case::{CaseError, CaseId};
use ckg_retrieval::RetrievalError;

use crate::state::AttemptState;

/// Main synthesis error type
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    /// Case set unreadable or malformed
    #[error("case store error: {0}")]
    Case(#[from] CaseError),

    /// Catalog or embedding failure
    #[error("retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    /// Oracle failure that polling cannot absorb
    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),

    /// External tool could not be run
    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    /// Polling bound reached without a usable response
    #[error("oracle produced no usable response after {attempts} attempts")]
    OracleExhausted { attempts: u32 },

    #[error("illegal attempt transition: {from:?} -> {to:?}")]
    IllegalTransition { from: AttemptState, to: AttemptState },

    /// Accepted artifact would break the lineage
    #[error("history error: {0}")]
    History(#[from] HistoryError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl SynthesisError {
    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::OracleExhausted { .. } => true,
            Self::Oracle(e) => e.is_retryable(),
            Self::Retrieval(e) => e.is_retryable(),
            Self::Tool(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Bad input data, as opposed to infrastructure trouble
    #[inline]
    #[must_use]
    pub fn is_malformed_input(&self) -> bool {
        matches!(self, Self::Case(e) if e.is_malformed())
    }
}

/// Code-generation oracle errors
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("oracle returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response arrived but had no completion text
    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("oracle call timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("missing credentials: {0}")]
    MissingCredentials(String),
}

impl OracleError {
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Malformed(_) | Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::MissingCredentials(_) => false,
        }
    }
}

/// AST tool and build harness errors
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Process could not be started
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Active-subset publication failed
    #[error("publishing cases failed: {0}")]
    Publish(#[from] CaseError),

    #[error("{tool} timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },
}

impl ToolError {
    #[inline]
    pub fn spawn(tool: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            tool: tool.into(),
            source,
        }
    }

    #[inline]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Lineage violations when appending to a rule's history
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HistoryError {
    /// Cases the previous artifact passed are missing from the new one
    #[error("artifact drops previously passed cases: {missing:?}")]
    NotSuperset { missing: Vec<CaseId> },

    /// Each accepted artifact absorbs exactly one case
    #[error("artifact adds {added} cases, expected exactly one")]
    UnexpectedGrowth { added: usize },
}
