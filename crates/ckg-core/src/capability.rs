//! External capabilities the controller depends on
//!
//! The code-generation oracle, the AST extractor and the build harness are
//! injected behind these traits so the synthesis loop never touches a
//! network client or a subprocess directly.

use ckg_case::ActiveSubset;
use serde::{Deserialize, Serialize};

use crate::diagnostics::DiagnosticEntry;
use crate::error::{OracleError, ToolError};
use crate::prompt::ChatPrompt;

/// Tokens billed for one completion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    #[inline]
    #[must_use]
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    #[inline]
    #[must_use]
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// One completion: its text and, when the service reports it, its usage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OracleReply {
    pub text: String,
    pub usage: TokenUsage,
}

impl OracleReply {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: TokenUsage::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }
}

/// Stateless text-completion service
#[async_trait::async_trait]
pub trait CodeOracle: Send + Sync {
    /// Complete one prompt. Every call carries its full context.
    async fn invoke(&self, prompt: &ChatPrompt) -> Result<OracleReply, OracleError>;
}

/// What the AST tool is asked to parse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractMode {
    /// A single-case document
    TestCase,
    /// Candidate checker source
    Checker,
}

impl ExtractMode {
    #[inline]
    #[must_use]
    pub fn as_arg(self) -> &'static str {
        match self {
            Self::TestCase => "testcase",
            Self::Checker => "checker",
        }
    }
}

/// Textual tree plus the node kinds it contains
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AstReport {
    pub tree: String,
    /// Sorted, without duplicates
    pub node_kinds: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Parsed(AstReport),
    /// The tool ran but could not parse the input
    Rejected { output: String },
}

impl Extraction {
    #[inline]
    #[must_use]
    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed(_))
    }
}

#[async_trait::async_trait]
pub trait AstExtractor: Send + Sync {
    async fn extract(&self, mode: ExtractMode, input: &str) -> Result<Extraction, ToolError>;
}

/// Result of a compile or test run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutcome {
    pub success: bool,
    /// Combined tool output, fed to the diagnostic parser
    pub output: String,
}

impl BuildOutcome {
    #[must_use]
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    #[must_use]
    pub fn failure(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
        }
    }
}

/// Build project the checker is compiled and tested in
#[async_trait::async_trait]
pub trait BuildHarness: Send + Sync {
    /// Write checker source to its location in the project
    async fn stage_checker(&self, source: &str) -> Result<(), ToolError>;

    /// Make `subset` the cases the next test run executes
    async fn publish_cases(&self, subset: &ActiveSubset) -> Result<(), ToolError>;

    async fn compile(&self) -> Result<BuildOutcome, ToolError>;

    async fn run_tests(&self, group: &str) -> Result<BuildOutcome, ToolError>;
}

/// Turns raw build output into structured entries
pub trait DiagnosticParser: Send + Sync {
    fn parse(&self, output: &str) -> Vec<DiagnosticEntry>;
}
