//! Maven build harness
//!
//! Stages the checker into the target PMD project, publishes the active
//! case subset next to the rule's test class, and runs `mvn`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ckg_case::ActiveSubset;
use ckg_core::{BuildHarness, BuildOutcome, Rule, ToolError};

use crate::process::run_tool;

#[derive(Debug, Clone)]
pub struct MavenHarness {
    mvn: String,
    project_dir: PathBuf,
    checker_path: PathBuf,
    case_set_path: PathBuf,
    active_subset_path: PathBuf,
    timeout: Duration,
}

impl MavenHarness {
    /// Harness for `rule`'s paths inside `project_dir`
    #[must_use]
    pub fn for_rule(project_dir: impl Into<PathBuf>, rule: &Rule) -> Self {
        Self {
            mvn: "mvn".to_string(),
            project_dir: project_dir.into(),
            checker_path: rule.checker_path.clone(),
            case_set_path: rule.case_set_path.clone(),
            active_subset_path: rule.active_subset_path.clone(),
            timeout: Duration::from_secs(1800),
        }
    }

    #[must_use]
    pub fn with_mvn(mut self, mvn: impl Into<String>) -> Self {
        self.mvn = mvn.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[inline]
    #[must_use]
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    async fn mvn(&self, args: &[&str]) -> Result<BuildOutcome, ToolError> {
        let run = run_tool(&self.mvn, args, &self.project_dir, self.timeout).await?;
        Ok(BuildOutcome {
            success: run.success,
            output: run.output,
        })
    }
}

#[async_trait::async_trait]
impl BuildHarness for MavenHarness {
    async fn stage_checker(&self, source: &str) -> Result<(), ToolError> {
        if let Some(parent) = self.checker_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::io(parent, e))?;
        }
        tokio::fs::write(&self.checker_path, source)
            .await
            .map_err(|e| ToolError::io(&self.checker_path, e))
    }

    async fn publish_cases(&self, subset: &ActiveSubset) -> Result<(), ToolError> {
        let written = subset.publish(&self.case_set_path, &self.active_subset_path)?;
        tracing::debug!(
            "Published {} cases to {}",
            written,
            self.active_subset_path.display()
        );
        Ok(())
    }

    async fn compile(&self) -> Result<BuildOutcome, ToolError> {
        let clean = self.mvn(&["clean"]).await?;
        if !clean.success {
            tracing::warn!("mvn clean failed, compiling anyway");
        }
        self.mvn(&["compile"]).await
    }

    async fn run_tests(&self, group: &str) -> Result<BuildOutcome, ToolError> {
        let filter = format!("-Dtest={group}");
        self.mvn(&["test", filter.as_str()]).await
    }
}
