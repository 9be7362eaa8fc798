//! Error types for the case store

use std::path::PathBuf;

/// Errors raised while reading, filtering, or publishing case sets
#[derive(Debug, thiserror::Error)]
pub enum CaseError {
    /// A record is missing a required field or is otherwise unusable
    #[error("malformed case set: {reason}")]
    MalformedCaseSet { reason: String },

    /// Two records share the same description
    #[error("duplicate case description: '{0}'")]
    DuplicateDescription(String),

    /// Underlying XML could not be tokenized or written
    #[error("xml error: {0}")]
    Xml(String),

    /// IO error on a case-set file
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CaseError {
    /// Create a malformed-record error
    #[inline]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedCaseSet {
            reason: reason.into(),
        }
    }

    /// Create IO error for path
    #[inline]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Malformed input is fatal for a rule's run and never retried
    #[inline]
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::MalformedCaseSet { .. } | Self::DuplicateDescription(_)
        )
    }
}

impl From<quick_xml::Error> for CaseError {
    fn from(err: quick_xml::Error) -> Self {
        Self::Xml(err.to_string())
    }
}
