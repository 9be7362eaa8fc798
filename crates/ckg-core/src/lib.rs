//! Checker synthesis controller
//!
//! Turns a rule description and its labeled cases into a checker that
//! passes all of them, one case at a time:
//! - Logic decomposition of a case into atomic checking steps
//! - Retrieval-grounded prompt building
//! - A bounded generate / syntax-check / compile / repair / test state machine
//! - Regression-safe augmentation: every accepted checker keeps every
//!   previously passed case
//!
//! External services (code oracle, AST tool, build harness) are injected
//! through the traits in [`capability`].
//!
//! # Example
//!
//! ```rust,ignore
//! use ckg_core::prelude::*;
//!
//! let controller = SynthesisController::new(SynthesisConfig::default(), caps, retrieval);
//! let mut driver = AugmentationDriver::new(controller);
//! let report = driver.run(&mut rule, &cases).await?;
//! if let Some(checker) = report.final_artifact() {
//!     println!("{}", checker.source);
//! }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod canonicalize;
pub mod capability;
pub mod code_block;
pub mod config;
pub mod controller;
pub mod decomposer;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod poll;
pub mod prompt;
pub mod rule;
pub mod state;

pub use canonicalize::{
    CanonicalRule, Canonicalizer, EnforceClassName, EnsureImports, ReduceSuperRegistration,
};
pub use capability::{
    AstExtractor, AstReport, BuildHarness, BuildOutcome, CodeOracle, DiagnosticParser,
    ExtractMode, Extraction, OracleReply, TokenUsage,
};
pub use code_block::extract_code_block;
pub use config::{OraclePolicy, SynthesisConfig, DEFAULT_REQUIRED_IMPORTS};
pub use controller::{
    AttemptRecord, Capabilities, RoundFailure, SynthesisController, SynthesisOutcome,
    SynthesisRequest, SynthesisResult,
};
pub use decomposer::{parse_steps, LogicDecomposer};
pub use diagnostics::{
    failing_case_ids, repair_hint, unresolved_apis, DiagnosticEntry, MavenDiagnosticParser,
};
pub use driver::{select_failing_case, AugmentationDriver, RunOutcome, RunReport};
pub use error::{HistoryError, OracleError, SynthesisError, ToolError};
pub use poll::{poll_oracle, SynthesisStats};
pub use prompt::{
    ChatMessage, ChatPrompt, CompileRepairPrompt, LogicPrompt, PromptKind, RepairKind, Role,
    RuleGenerationPrompt, TestRepairPrompt,
};
pub use rule::{CheckerArtifact, Rule};
pub use state::{allowed_transitions, validate_transition, AttemptMachine, AttemptState};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving a synthesis run
    pub use crate::{
        AugmentationDriver, Capabilities, CheckerArtifact, CodeOracle, AstExtractor,
        BuildHarness, DiagnosticParser, MavenDiagnosticParser, Rule, RunOutcome, RunReport,
        SynthesisConfig, SynthesisController, SynthesisError,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
