//! Regression-safe augmentation driver
//!
//! Bootstraps a first checker from one negative case, then repeatedly runs
//! the whole non-skipped case set, picks the lowest-numbered pending
//! failure and asks the controller for a checker that passes it together
//! with everything already passed.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use ckg_case::{count_negative, select_next_negative, CaseId, CaseIdSet, CaseSet, WorkingSets};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::controller::{SynthesisController, SynthesisRequest, SynthesisResult};
use crate::diagnostics::failing_case_ids;
use crate::error::SynthesisError;
use crate::poll::SynthesisStats;
use crate::rule::{CheckerArtifact, Rule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every non-skipped case passes
    Complete,
    /// No negative case could be turned into a first checker
    BootstrapFailed,
    /// Tests fail but no pending case can be identified from the output
    Stalled,
}

/// User-visible result of one rule's run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Ulid,
    pub rule: String,
    pub outcome: RunOutcome,
    pub history: Vec<CheckerArtifact>,
    pub skipped: CaseIdSet,
    pub stats: SynthesisStats,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl RunReport {
    /// The deliverable checker
    #[must_use]
    pub fn final_artifact(&self) -> Option<&CheckerArtifact> {
        self.history.last()
    }
}

/// Pending failing case with the lowest embedded number.
///
/// Ids without digits sort after numbered ones; ties go to storage order.
#[must_use]
pub fn select_failing_case<'a>(
    failing: &'a [CaseId],
    cases: &CaseSet,
    sets: &WorkingSets,
) -> Option<&'a CaseId> {
    failing
        .iter()
        .filter(|id| cases.get(id.as_str()).is_some() && sets.is_pending(id))
        .min_by_key(|id| {
            (
                id.numeric_order().unwrap_or(u64::MAX),
                cases.position(id.as_str()).unwrap_or(usize::MAX),
            )
        })
}

#[derive(Debug)]
pub struct AugmentationDriver {
    controller: SynthesisController,
}

impl AugmentationDriver {
    #[must_use]
    pub fn new(controller: SynthesisController) -> Self {
        Self { controller }
    }

    #[inline]
    #[must_use]
    pub fn controller(&self) -> &SynthesisController {
        &self.controller
    }

    /// Run bootstrap and augmentation for `rule`, appending accepted
    /// artifacts to its history
    pub async fn run(&mut self, rule: &mut Rule, cases: &CaseSet) -> Result<RunReport, SynthesisError> {
        let run_id = Ulid::new();
        let started_at = Utc::now();
        let clock = Instant::now();
        tracing::info!(
            "Run {} for {}: {} cases, {} negative",
            run_id,
            rule.name,
            cases.len(),
            count_negative(cases.cases())
        );

        let mut sets = WorkingSets::new();
        let outcome = if self.bootstrap(rule, cases, &mut sets).await? {
            self.augment(rule, cases, &mut sets).await?
        } else {
            tracing::warn!("No negative case of {} produced a checker", rule.name);
            RunOutcome::BootstrapFailed
        };

        tracing::info!(
            "Run {} finished {:?}: {} artifacts, {} skipped",
            run_id,
            outcome,
            rule.history().len(),
            sets.skipped().len()
        );
        Ok(RunReport {
            run_id,
            rule: rule.name.clone(),
            outcome,
            history: rule.history().to_vec(),
            skipped: sets.skipped().clone(),
            stats: self.controller.stats(),
            started_at,
            elapsed: clock.elapsed(),
        })
    }

    async fn bootstrap(
        &mut self,
        rule: &mut Rule,
        cases: &CaseSet,
        sets: &mut WorkingSets,
    ) -> Result<bool, SynthesisError> {
        for _ in 0..count_negative(cases.cases()) {
            let Some(anchor) = select_next_negative(cases.cases(), sets.skipped()) else {
                break;
            };
            sets.begin_attempt(anchor.id(), cases);
            let outcome = self
                .controller
                .synthesize(SynthesisRequest {
                    rule,
                    cases,
                    anchor,
                    sets,
                    seed: None,
                })
                .await?;
            match outcome.result {
                SynthesisResult::Accepted(artifact) => {
                    rule.accept(artifact)?;
                    sets.mark_passed();
                    return Ok(true);
                }
                SynthesisResult::Abandoned => sets.skip(anchor.id()),
            }
        }
        Ok(false)
    }

    async fn augment(
        &mut self,
        rule: &mut Rule,
        cases: &CaseSet,
        sets: &mut WorkingSets,
    ) -> Result<RunOutcome, SynthesisError> {
        let harness = std::sync::Arc::clone(&self.controller.capabilities().harness);
        let diagnostics = std::sync::Arc::clone(&self.controller.capabilities().diagnostics);

        for iteration in 1..=cases.len() {
            harness.publish_cases(&sets.active_all(cases)).await?;
            let run = harness.run_tests(&rule.test_group()).await?;
            if run.success {
                return Ok(RunOutcome::Complete);
            }

            let failing = failing_case_ids(&diagnostics.parse(&run.output));
            let Some(selected) = select_failing_case(&failing, cases, sets) else {
                tracing::warn!(
                    "Test run failed but none of {} reported cases is pending",
                    failing.len()
                );
                return Ok(RunOutcome::Stalled);
            };
            let Some(anchor) = cases.get(selected.as_str()) else {
                return Ok(RunOutcome::Stalled);
            };
            tracing::info!(
                "Augmentation {}: absorbing '{}' ({} passed)",
                iteration,
                anchor.id(),
                sets.passed().len()
            );

            sets.begin_attempt(anchor.id(), cases);
            let seed = rule.latest().cloned();
            let outcome = self
                .controller
                .synthesize(SynthesisRequest {
                    rule,
                    cases,
                    anchor,
                    sets,
                    seed: seed.as_ref(),
                })
                .await?;
            match outcome.result {
                SynthesisResult::Accepted(artifact) => {
                    rule.accept(artifact)?;
                    sets.mark_passed();
                }
                SynthesisResult::Abandoned => {
                    sets.skip(anchor.id());
                    self.restore_latest(rule).await?;
                }
            }
        }

        // Budget spent; report whether the last absorption finished the job.
        harness.publish_cases(&sets.active_all(cases)).await?;
        let run = harness.run_tests(&rule.test_group()).await?;
        Ok(if run.success {
            RunOutcome::Complete
        } else {
            RunOutcome::Stalled
        })
    }

    /// Put the last accepted checker back in place after an abandoned anchor
    async fn restore_latest(&self, rule: &Rule) -> Result<(), SynthesisError> {
        let Some(latest) = rule.latest() else {
            return Ok(());
        };
        let harness = &self.controller.capabilities().harness;
        harness.stage_checker(&latest.source).await?;
        let build = harness.compile().await?;
        if !build.success {
            tracing::warn!(
                "Restored checker {} no longer compiles",
                latest.digest.short()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ckg_case::TestCase;

    fn cases() -> CaseSet {
        CaseSet::new(vec![
            TestCase::new("c7 bad", "a", 1),
            TestCase::new("c1 ok", "b", 0),
            TestCase::new("c3 bad", "c", 1),
            TestCase::new("plain", "d", 0),
        ])
        .unwrap()
    }

    fn ids(names: &[&str]) -> Vec<CaseId> {
        names.iter().map(|n| CaseId::from(*n)).collect()
    }

    #[test]
    fn lowest_number_wins() {
        let failing = ids(&["c3 bad", "c1 ok", "c7 bad"]);
        let picked = select_failing_case(&failing, &cases(), &WorkingSets::new());
        assert_eq!(picked, Some(&CaseId::from("c1 ok")));
    }

    #[test]
    fn unnumbered_ids_come_last() {
        let failing = ids(&["plain", "c7 bad"]);
        let picked = select_failing_case(&failing, &cases(), &WorkingSets::new());
        assert_eq!(picked, Some(&CaseId::from("c7 bad")));
    }

    #[test]
    fn passed_and_unknown_ids_are_ignored() {
        let set = cases();
        let mut sets = WorkingSets::new();
        sets.begin_attempt(&CaseId::from("c1 ok"), &set);
        sets.mark_passed();
        let failing = ids(&["c1 ok", "c99 ghost"]);
        assert_eq!(select_failing_case(&failing, &set, &sets), None);
    }
}
