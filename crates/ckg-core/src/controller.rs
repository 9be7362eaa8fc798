//! Checker synthesis controller
//!
//! Drives one anchor case through bounded rounds of
//! generate, syntax check, canonicalize, compile (with inner repair) and
//! test. Every round either produces an accepted checker or a recorded
//! [`RoundFailure`]; only infrastructure and input errors escape as
//! [`SynthesisError`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ckg_case::{
    passed_cases_summary, single_case_document, ActiveSubset, CaseIdSet, CaseSet, TestCase,
    WorkingSets,
};
use ckg_retrieval::{Evidence, RetrievalIndex};
use serde::{Deserialize, Serialize};

use crate::canonicalize::Canonicalizer;
use crate::capability::{AstExtractor, AstReport, BuildHarness, CodeOracle, DiagnosticParser};
use crate::capability::{ExtractMode, Extraction};
use crate::code_block::extract_code_block;
use crate::config::SynthesisConfig;
use crate::decomposer::{parse_steps, LogicDecomposer};
use crate::diagnostics::{repair_hint, unresolved_apis};
use crate::error::SynthesisError;
use crate::poll::{poll_oracle, SynthesisStats};
use crate::prompt::{
    ChatPrompt, CompileRepairPrompt, RepairKind, RuleGenerationPrompt, TestRepairPrompt,
};
use crate::rule::{CheckerArtifact, Rule};
use crate::state::{AttemptMachine, AttemptState};

/// Injected external services
#[derive(Clone)]
pub struct Capabilities {
    pub oracle: Arc<dyn CodeOracle>,
    pub extractor: Arc<dyn AstExtractor>,
    pub harness: Arc<dyn BuildHarness>,
    pub diagnostics: Arc<dyn DiagnosticParser>,
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}

/// Why a round did not end in acceptance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RoundFailure {
    /// Oracle polling bound reached
    OracleExhausted { attempts: u32 },
    /// Generated source failed the syntax check
    SyntaxRejected,
    /// Compile output had nothing a repair prompt could target
    Undiagnosable,
    /// Inner repairs spent and the source still does not compile
    RepairBudgetExhausted,
    /// A compile fix failed the syntax check
    RepairSyntaxRejected,
    /// Compiled, but the candidate set did not pass
    TestsFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub round: u32,
    pub failure: Option<RoundFailure>,
    pub inner_repairs: u32,
    pub started_at: DateTime<Utc>,
}

impl AttemptRecord {
    fn start(round: u32) -> Self {
        Self {
            round,
            failure: None,
            inner_repairs: 0,
            started_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisResult {
    Accepted(CheckerArtifact),
    Abandoned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisOutcome {
    pub result: SynthesisResult,
    pub attempts: Vec<AttemptRecord>,
}

impl SynthesisOutcome {
    #[inline]
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self.result, SynthesisResult::Accepted(_))
    }
}

/// Everything one synthesis run needs to know about the rule's state
#[derive(Debug, Clone, Copy)]
pub struct SynthesisRequest<'a> {
    pub rule: &'a Rule,
    pub cases: &'a CaseSet,
    pub anchor: &'a TestCase,
    /// Candidate set already includes the anchor
    pub sets: &'a WorkingSets,
    /// Previous checker to repair; `None` when bootstrapping
    pub seed: Option<&'a CheckerArtifact>,
}

/// Per-anchor inputs computed once and shared by all rounds
struct AnchorContext {
    ast: AstReport,
    subset: ActiveSubset,
    passed_summary: String,
    canonicalizer: Canonicalizer,
}

enum RoundResult {
    Passed(String),
    Failed(RoundFailure),
}

/// Map polling exhaustion to a round failure, let everything else through
macro_rules! or_round_failure {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(SynthesisError::OracleExhausted { attempts }) => {
                return Ok(RoundResult::Failed(RoundFailure::OracleExhausted { attempts }))
            }
            Err(e) => return Err(e),
        }
    };
}

pub struct SynthesisController {
    config: SynthesisConfig,
    caps: Capabilities,
    retrieval: RetrievalIndex,
    decomposer: LogicDecomposer,
    blocked_apis: Vec<String>,
    stats: SynthesisStats,
}

impl std::fmt::Debug for SynthesisController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisController")
            .field("config", &self.config)
            .field("blocked_apis", &self.blocked_apis)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl SynthesisController {
    #[must_use]
    pub fn new(config: SynthesisConfig, caps: Capabilities, retrieval: RetrievalIndex) -> Self {
        let decomposer = LogicDecomposer::from_meta(retrieval.meta());
        let blocked_apis = config.blocked_apis.clone();
        Self {
            config,
            caps,
            retrieval,
            decomposer,
            blocked_apis,
            stats: SynthesisStats::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    #[inline]
    #[must_use]
    pub fn retrieval(&self) -> &RetrievalIndex {
        &self.retrieval
    }

    #[inline]
    #[must_use]
    pub fn stats(&self) -> SynthesisStats {
        self.stats
    }

    /// APIs the oracle is told not to use
    #[inline]
    #[must_use]
    pub fn blocked_apis(&self) -> &[String] {
        &self.blocked_apis
    }

    /// Parse the anchor in test-case mode and make its node kinds searchable.
    ///
    /// An anchor the tool cannot parse yields an empty report.
    pub async fn analyze_case(&mut self, case: &TestCase) -> Result<AstReport, SynthesisError> {
        let document = single_case_document(case);
        let report = match self.caps.extractor.extract(ExtractMode::TestCase, &document).await? {
            Extraction::Parsed(report) => report,
            Extraction::Rejected { output } => {
                tracing::warn!(
                    "AST tool rejected case '{}': {}",
                    case.id(),
                    output.lines().next().unwrap_or_default()
                );
                AstReport::default()
            }
        };
        let added = self.retrieval.register_kinds(&report.node_kinds)?;
        if added > 0 {
            tracing::debug!("Registered {} new API classes for '{}'", added, case.id());
        }
        Ok(report)
    }

    /// Checking steps for one case
    pub async fn decompose(
        &mut self,
        rule_description: &str,
        case: &TestCase,
    ) -> Result<Vec<String>, SynthesisError> {
        let prompt = self.decomposer.prompt(rule_description, case.display_code());
        let steps = poll_oracle(
            self.caps.oracle.as_ref(),
            &prompt,
            &self.config.oracle,
            &mut self.stats,
            |response| {
                let steps = parse_steps(response);
                (!steps.is_empty()).then_some(steps)
            },
        )
        .await?;
        tracing::debug!("Decomposed '{}' into {} steps", case.id(), steps.len());
        Ok(steps)
    }

    async fn request_code(&mut self, prompt: &ChatPrompt) -> Result<String, SynthesisError> {
        tracing::debug!("Requesting {:?} ({} chars)", prompt.kind, prompt.char_count());
        poll_oracle(
            self.caps.oracle.as_ref(),
            prompt,
            &self.config.oracle,
            &mut self.stats,
            extract_code_block,
        )
        .await
    }

    async fn syntax_ok(&mut self, source: &str) -> Result<bool, SynthesisError> {
        let parsed = self
            .caps
            .extractor
            .extract(ExtractMode::Checker, source)
            .await?
            .is_parsed();
        if !parsed {
            self.stats.syntax_failures += 1;
        }
        Ok(parsed)
    }

    fn learn_blocked(&mut self, apis: Vec<String>) {
        for api in apis {
            if !self.blocked_apis.contains(&api) {
                tracing::info!("Blocking unresolved API {}", api);
                self.blocked_apis.push(api);
            }
        }
    }

    fn generation_prompt(
        &self,
        req: &SynthesisRequest<'_>,
        ctx: &AnchorContext,
        evidence: &str,
    ) -> ChatPrompt {
        let case_text = req.anchor.prompt_text();
        match req.seed {
            None => RuleGenerationPrompt {
                rule_name: &req.rule.name,
                rule_description: &req.rule.description,
                package: &req.rule.package,
                test_case: &case_text,
                ast: &ctx.ast.tree,
                evidence,
                blocked_apis: &self.blocked_apis,
            }
            .render(),
            Some(seed) => TestRepairPrompt {
                kind: RepairKind::for_case(req.anchor.is_negative()),
                rule_description: &req.rule.description,
                source: &seed.source,
                passed_summary: &ctx.passed_summary,
                failing_case: &case_text,
                ast: &ctx.ast.tree,
                evidence,
                blocked_apis: &self.blocked_apis,
            }
            .render(),
        }
    }

    /// Run up to `max_outer_rounds` rounds for one anchor
    pub async fn synthesize(
        &mut self,
        req: SynthesisRequest<'_>,
    ) -> Result<SynthesisOutcome, SynthesisError> {
        tracing::info!(
            "Synthesizing {} for anchor '{}' ({} candidates)",
            req.rule.name,
            req.anchor.id(),
            req.sets.candidates().len()
        );
        let ctx = AnchorContext {
            ast: self.analyze_case(req.anchor).await?,
            subset: req.sets.active_candidates(req.cases),
            passed_summary: passed_cases_summary(req.cases.cases(), req.sets.passed()),
            canonicalizer: Canonicalizer::for_rule(&req.rule.name, &self.config.required_imports),
        };

        let mut machine = AttemptMachine::new();
        let mut attempts = Vec::new();
        for round in 1..=self.config.max_outer_rounds {
            if machine.state() == AttemptState::Retry {
                machine.advance(AttemptState::Generating)?;
            }
            let mut record = AttemptRecord::start(round);
            match self.run_round(&req, &ctx, &mut machine, &mut record).await? {
                RoundResult::Passed(source) => {
                    machine.advance(AttemptState::Accepted)?;
                    attempts.push(record);
                    let passed: CaseIdSet = ctx.subset.ids().iter().cloned().collect();
                    let artifact = CheckerArtifact::new(source, passed);
                    tracing::info!(
                        "Anchor '{}' accepted in round {} as {}",
                        req.anchor.id(),
                        round,
                        artifact.digest.short()
                    );
                    return Ok(SynthesisOutcome {
                        result: SynthesisResult::Accepted(artifact),
                        attempts,
                    });
                }
                RoundResult::Failed(failure) => {
                    tracing::warn!(
                        "Round {}/{} for '{}' failed: {:?}",
                        round,
                        self.config.max_outer_rounds,
                        req.anchor.id(),
                        failure
                    );
                    machine.advance(AttemptState::Retry)?;
                    record.failure = Some(failure);
                    attempts.push(record);
                }
            }
        }

        if machine.state() == AttemptState::Retry {
            machine.advance(AttemptState::Abandoned)?;
        }
        tracing::warn!(
            "Abandoning anchor '{}' after {} rounds",
            req.anchor.id(),
            attempts.len()
        );
        Ok(SynthesisOutcome {
            result: SynthesisResult::Abandoned,
            attempts,
        })
    }

    async fn run_round(
        &mut self,
        req: &SynthesisRequest<'_>,
        ctx: &AnchorContext,
        machine: &mut AttemptMachine,
        record: &mut AttemptRecord,
    ) -> Result<RoundResult, SynthesisError> {
        let steps = or_round_failure!(self.decompose(&req.rule.description, req.anchor).await);
        let evidence = Evidence::gather(&self.retrieval, &steps, &ctx.ast.node_kinds)?;
        let prompt = self.generation_prompt(req, ctx, &evidence.render());
        let raw = or_round_failure!(self.request_code(&prompt).await);

        machine.advance(AttemptState::SyntaxCheck)?;
        if !self.syntax_ok(&raw).await? {
            return Ok(RoundResult::Failed(RoundFailure::SyntaxRejected));
        }
        let mut source = ctx.canonicalizer.apply(&raw);

        machine.advance(AttemptState::Compiling)?;
        let harness = Arc::clone(&self.caps.harness);
        harness.stage_checker(&source).await?;
        harness.publish_cases(&ctx.subset).await?;
        let mut build = harness.compile().await?;

        while !build.success {
            self.stats.compile_failures += 1;
            let entries = self.caps.diagnostics.parse(&build.output);
            self.learn_blocked(unresolved_apis(&entries));
            if record.inner_repairs >= self.config.max_inner_repairs {
                return Ok(RoundResult::Failed(RoundFailure::RepairBudgetExhausted));
            }
            let Some(hint) = repair_hint(&entries) else {
                return Ok(RoundResult::Failed(RoundFailure::Undiagnosable));
            };

            machine.advance(AttemptState::Repairing)?;
            record.inner_repairs += 1;
            self.stats.repairs += 1;
            tracing::debug!("Compile repair {}: {}", record.inner_repairs, hint);
            let prompt = CompileRepairPrompt {
                rule_description: &req.rule.description,
                source: &source,
                failure: &hint,
            }
            .render();
            let fixed = or_round_failure!(self.request_code(&prompt).await);
            if !self.syntax_ok(&fixed).await? {
                harness.stage_checker(&source).await?;
                return Ok(RoundResult::Failed(RoundFailure::RepairSyntaxRejected));
            }
            source = ctx.canonicalizer.apply(&fixed);

            machine.advance(AttemptState::Compiling)?;
            harness.stage_checker(&source).await?;
            build = harness.compile().await?;
        }

        machine.advance(AttemptState::Testing)?;
        let tests = harness.run_tests(&req.rule.test_group()).await?;
        if !tests.success {
            self.stats.test_failures += 1;
            return Ok(RoundResult::Failed(RoundFailure::TestsFailed));
        }
        Ok(RoundResult::Passed(source))
    }
}
