//! Rules and the checker artifacts accepted for them

use std::path::PathBuf;

use ckg_case::{CaseIdSet, SourceDigest};
use serde::{Deserialize, Serialize};

use crate::error::HistoryError;

/// A checker version together with the cases it passed when accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckerArtifact {
    pub source: String,
    pub digest: SourceDigest,
    pub passed_cases: CaseIdSet,
}

impl CheckerArtifact {
    #[must_use]
    pub fn new(source: impl Into<String>, passed_cases: CaseIdSet) -> Self {
        let source = source.into();
        Self {
            digest: SourceDigest::of(&source),
            source,
            passed_cases,
        }
    }
}

/// One rule to synthesize a checker for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub description: String,
    /// Java package the checker is declared in
    pub package: String,
    /// Where the checker source is staged in the build project
    pub checker_path: PathBuf,
    /// Full case set
    pub case_set_path: PathBuf,
    /// Where the harness reads the cases to run
    pub active_subset_path: PathBuf,
    #[serde(default)]
    history: Vec<CheckerArtifact>,
}

impl Rule {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        package: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            package: package.into(),
            checker_path: PathBuf::new(),
            case_set_path: PathBuf::new(),
            active_subset_path: PathBuf::new(),
            history: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_checker_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.checker_path = path.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_case_set_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.case_set_path = path.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_active_subset_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.active_subset_path = path.into();
        self
    }

    /// Test class the harness runs for this rule
    #[must_use]
    pub fn test_group(&self) -> String {
        format!("{}Test", self.name)
    }

    #[inline]
    #[must_use]
    pub fn history(&self) -> &[CheckerArtifact] {
        &self.history
    }

    /// The deliverable: last accepted artifact
    #[inline]
    #[must_use]
    pub fn latest(&self) -> Option<&CheckerArtifact> {
        self.history.last()
    }

    /// Append an artifact that keeps every previously passed case and
    /// absorbs exactly one more
    pub fn accept(&mut self, artifact: CheckerArtifact) -> Result<(), HistoryError> {
        let previous = self.history.last().map(|a| &a.passed_cases);
        let missing: Vec<_> = previous
            .into_iter()
            .flatten()
            .filter(|id| !artifact.passed_cases.contains(*id))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(HistoryError::NotSuperset { missing });
        }
        let added = artifact.passed_cases.len() - previous.map_or(0, |p| p.len());
        if added != 1 {
            return Err(HistoryError::UnexpectedGrowth { added });
        }
        tracing::info!(
            "Rule {} accepted checker {} passing {} cases",
            self.name,
            artifact.digest.short(),
            artifact.passed_cases.len()
        );
        self.history.push(artifact);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ckg_case::CaseId;

    fn ids(names: &[&str]) -> CaseIdSet {
        names.iter().map(|n| CaseId::from(*n)).collect()
    }

    #[test]
    fn test_group_appends_suffix() {
        assert_eq!(Rule::new("AvoidUsingOctalValues", "", "").test_group(), "AvoidUsingOctalValuesTest");
    }

    #[test]
    fn accept_grows_by_one() {
        let mut rule = Rule::new("R", "d", "p");
        rule.accept(CheckerArtifact::new("a", ids(&["n1"]))).unwrap();
        rule.accept(CheckerArtifact::new("b", ids(&["n1", "p1"]))).unwrap();
        assert_eq!(rule.history().len(), 2);
        assert_eq!(rule.latest().unwrap().source, "b");
    }

    #[test]
    fn accept_rejects_regression() {
        let mut rule = Rule::new("R", "d", "p");
        rule.accept(CheckerArtifact::new("a", ids(&["n1"]))).unwrap();
        let err = rule.accept(CheckerArtifact::new("b", ids(&["p1"]))).unwrap_err();
        assert_eq!(err, HistoryError::NotSuperset { missing: vec![CaseId::from("n1")] });
    }

    #[test]
    fn accept_rejects_bulk_growth() {
        let mut rule = Rule::new("R", "d", "p");
        let err = rule.accept(CheckerArtifact::new("a", ids(&["n1", "n2"]))).unwrap_err();
        assert_eq!(err, HistoryError::UnexpectedGrowth { added: 2 });
    }
}
