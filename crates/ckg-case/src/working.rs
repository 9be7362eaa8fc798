//! Candidate, skipped and passed working sets
//!
//! Owned by the augmentation driver for one rule. Candidates are what the
//! next artifact must pass; passed is what the lineage already satisfies;
//! skipped cases are never required again.

use serde::{Deserialize, Serialize};

use crate::case::{CaseId, CaseSet};
use crate::store::ActiveSubset;
use crate::CaseIdSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingSets {
    candidates: CaseIdSet,
    skipped: CaseIdSet,
    passed: CaseIdSet,
}

impl WorkingSets {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn candidates(&self) -> &CaseIdSet {
        &self.candidates
    }

    #[inline]
    #[must_use]
    pub fn skipped(&self) -> &CaseIdSet {
        &self.skipped
    }

    #[inline]
    #[must_use]
    pub fn passed(&self) -> &CaseIdSet {
        &self.passed
    }

    /// Start an attempt on `anchor`: candidates become passed plus the
    /// anchor, in the storage order of `cases`
    pub fn begin_attempt(&mut self, anchor: &CaseId, cases: &CaseSet) {
        self.candidates = cases
            .iter()
            .map(|c| c.id())
            .filter(|id| *id == anchor || self.passed.contains(*id))
            .filter(|id| !self.skipped.contains(*id))
            .cloned()
            .collect();
    }

    /// Every candidate passed simultaneously; fold them into passed
    pub fn mark_passed(&mut self) {
        let mut merged = self.candidates.clone();
        merged.extend(self.passed.drain(..));
        self.passed = merged;
    }

    /// Give up on `id`. It leaves the candidates and the candidates fall
    /// back to what is already passed.
    pub fn skip(&mut self, id: &CaseId) {
        self.candidates.shift_remove(id);
        self.passed.shift_remove(id);
        self.skipped.insert(id.clone());
        self.candidates = self.passed.clone();
    }

    /// Neither passed nor skipped
    #[must_use]
    pub fn is_pending(&self, id: &CaseId) -> bool {
        !self.passed.contains(id) && !self.skipped.contains(id)
    }

    /// Subset for the current candidates
    #[must_use]
    pub fn active_candidates(&self, cases: &CaseSet) -> ActiveSubset {
        ActiveSubset::resolve(cases, &self.candidates, &self.skipped)
    }

    /// Subset of every case not skipped
    #[must_use]
    pub fn active_all(&self, cases: &CaseSet) -> ActiveSubset {
        let all: CaseIdSet = cases.iter().map(|c| c.id().clone()).collect();
        ActiveSubset::resolve(cases, &all, &self.skipped)
    }
}
