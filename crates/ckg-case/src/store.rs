//! Active-subset publication
//!
//! The harness only ever runs the cases found in the active-subset document,
//! so writing that document is how the driver tells it what to test.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::case::{CaseId, CaseMembership, CaseSet};
use crate::error::CaseError;
use crate::xml::filter_case_document;
use crate::CaseIdSet;

/// Cases that are candidates and not skipped, in storage order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSubset {
    ids: Vec<CaseId>,
}

impl ActiveSubset {
    /// Resolve the subset against the storage order of `cases`
    #[must_use]
    pub fn resolve(cases: &CaseSet, candidates: &CaseIdSet, skipped: &CaseIdSet) -> Self {
        let ids = cases
            .iter()
            .map(|c| c.id())
            .filter(|id| candidates.contains(*id) && !skipped.contains(*id))
            .cloned()
            .collect();
        Self { ids }
    }

    #[inline]
    #[must_use]
    pub fn ids(&self) -> &[CaseId] {
        &self.ids
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn is_active(&self, id: &str) -> bool {
        self.ids.iter().any(|i| i.as_str() == id)
    }

    /// Filter `source` down to this subset and write the result to `dest`
    pub fn publish(&self, source: &Path, dest: &Path) -> Result<usize, CaseError> {
        publish_filtered(source, dest, |d| self.is_active(d))
    }
}

impl CaseMembership for ActiveSubset {
    fn contains_case(&self, id: &CaseId) -> bool {
        self.ids.contains(id)
    }
}

/// Write the cases of `source` that are in `candidates` and not in `skipped`
/// to `dest`, preserving source order. Returns the number of cases written.
pub fn publish_active_subset<C, S>(
    candidates: &C,
    skipped: &S,
    source: &Path,
    dest: &Path,
) -> Result<usize, CaseError>
where
    C: CaseMembership + ?Sized,
    S: CaseMembership + ?Sized,
{
    publish_filtered(source, dest, |d| {
        let id = CaseId::new(d);
        candidates.contains_case(&id) && !skipped.contains_case(&id)
    })
}

/// Missing parent directories of `dest` are created
fn publish_filtered<F>(source: &Path, dest: &Path, keep: F) -> Result<usize, CaseError>
where
    F: Fn(&str) -> bool,
{
    let text = std::fs::read_to_string(source).map_err(|e| CaseError::io(source, e))?;
    let (filtered, kept) = filter_case_document(&text, keep)?;
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| CaseError::io(parent, e))?;
    }
    std::fs::write(dest, filtered).map_err(|e| CaseError::io(dest, e))?;
    tracing::debug!("Published {} active cases to {}", kept, dest.display());
    Ok(kept)
}
