//! Testing utilities for CKG workspace
//!
//! Deterministic stand-ins for the oracle, AST tool and build harness, plus
//! shared fixtures.

#![allow(missing_docs)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ckg_case::{ActiveSubset, CaseId, CaseSet};
use ckg_core::{
    AstExtractor, AstReport, BuildHarness, BuildOutcome, Capabilities, ChatPrompt, CodeOracle,
    ExtractMode, Extraction, MavenDiagnosticParser, OracleError, OracleReply, PromptKind, Rule,
    SynthesisConfig, SynthesisController, TokenUsage, ToolError,
};
use ckg_retrieval::{
    parse_api_catalog, parse_meta_catalog, ApiIndex, Embedder, HashingEmbedder, MetaIndex,
    RetrievalConfig, RetrievalIndex,
};
use parking_lot::Mutex;

/// Marker the fake harness looks for to decide a case passes
pub const HANDLES_MARKER: &str = "handles:";
/// Checker text containing this never compiles
pub const COMPILE_ERROR_MARKER: &str = "COMPILE_ERROR";
/// Checker text containing this fails the syntax check
pub const SYNTAX_ERROR_MARKER: &str = "SYNTAX_ERROR";
/// Checker text containing this fails compilation with no symbol to repair
pub const OPAQUE_ERROR_MARKER: &str = "OPAQUE_ERROR";

pub const RULE_NAME: &str = "AvoidUsingOctalValues";
pub const RULE_PACKAGE: &str = "net.sourceforge.pmd.lang.java.rule.errorprone";

pub const LOGIC_RESPONSE: &str = "1. Get the image of numeric literal.\n\
2. Check whether the literal is an octal literal.\n\
If the literal is octal, this test case violates the rule.";

pub const OCTAL_CASES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<test-data>
    <test-code>
        <description>neg1</description>
        <expected-problems>1</expected-problems>
        <code><![CDATA[
public class Foo {
    int a = 012;
}
]]></code>
    </test-code>
    <test-code>
        <description>pos1</description>
        <expected-problems>0</expected-problems>
        <code><![CDATA[
public class Foo {
    int b = 10;
}
]]></code>
    </test-code>
</test-data>
"#;

/// neg1, pos2 and a case (neg3) no checker will ever compile for
pub const OCTAL_CASES_WITH_BLOCKER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<test-data>
    <test-code>
        <description>neg1</description>
        <expected-problems>1</expected-problems>
        <code><![CDATA[
public class Foo {
    int a = 012;
}
]]></code>
    </test-code>
    <test-code>
        <description>pos2</description>
        <expected-problems>0</expected-problems>
        <code><![CDATA[
public class Foo {
    int b = 10;
}
]]></code>
    </test-code>
    <test-code>
        <description>neg3</description>
        <expected-problems>1</expected-problems>
        <code><![CDATA[
public class Foo {
    long c = 0777L;
}
]]></code>
    </test-code>
</test-data>
"#;

const META_CATALOG: &str = r#"[
    {"meta_op": "Check whether the literal is an octal literal",
     "meta_impl": "private boolean isOctal(ASTNumericLiteral node) {\n    String image = node.getImage();\n    return image.length() > 1 && image.startsWith(\"0\");\n}"},
    {"meta_op": "Get the name of method",
     "meta_impl": "node.getName()"}
]"#;

const API_CATALOG: &str = r#"{"classes_contained_in_project_detail": [
    {"class_name": "ASTNumericLiteral", "methods": [
        {"signature": "int getBase()", "description": "get the base of numeric literal"},
        {"signature": "String getImage()", "description": "get the image of numeric literal"}
    ]},
    {"class_name": "JavaNode", "methods": [
        {"signature": "JavaNode getParent()", "description": "get parent node"}
    ]}
]}"#;

#[must_use]
pub fn octal_cases() -> CaseSet {
    CaseSet::from_xml_str(OCTAL_CASES).unwrap()
}

#[must_use]
pub fn octal_rule() -> Rule {
    Rule::new(RULE_NAME, "Integer literals should not start with zero", RULE_PACKAGE)
}

/// Retrieval index over small inline catalogs
#[must_use]
pub fn fixture_retrieval() -> RetrievalIndex {
    let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::default());
    let meta = MetaIndex::build(parse_meta_catalog(META_CATALOG).unwrap(), embedder.as_ref()).unwrap();
    let api = ApiIndex::build(parse_api_catalog(API_CATALOG).unwrap(), embedder.as_ref()).unwrap();
    RetrievalIndex::new(Arc::new(meta), api, embedder, RetrievalConfig::default())
}

/// Checker source the fake harness treats as passing exactly `handled`
#[must_use]
pub fn checker_source(handled: &[&str]) -> String {
    let mut marks = String::new();
    for id in handled {
        marks.push_str(&format!("    // {HANDLES_MARKER}{id}\n"));
    }
    format!(
        "package {RULE_PACKAGE};\n\n\
         public class GeneratedRule extends AbstractJavaRulechainRule {{\n\
         {marks}    public GeneratedRule() {{\n        super.addRuleChainVisit(ASTNumericLiteral.class);\n    }}\n}}"
    )
}

/// Oracle response wrapping `source` in a java fence
#[must_use]
pub fn fenced(source: &str) -> String {
    format!("Here is the checker:\n```java\n{source}\n```\n")
}

#[must_use]
pub fn checker_response(handled: &[&str]) -> String {
    fenced(&checker_source(handled))
}

type Responder = Box<dyn Fn(&ChatPrompt) -> Option<String> + Send + Sync>;

/// Oracle answering from per-kind scripts.
///
/// Each kind's queue is consumed front to back and its last response
/// repeats. A responder, when set, is asked first. Unscripted kinds get an
/// empty response. Every reply reports the same usage.
#[derive(Default)]
pub struct ScriptedOracle {
    scripts: Mutex<HashMap<PromptKind, VecDeque<String>>>,
    responder: Option<Responder>,
    usage: TokenUsage,
    prompts: Mutex<Vec<ChatPrompt>>,
}

impl std::fmt::Debug for ScriptedOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedOracle")
            .field("prompts", &self.prompts.lock().len())
            .finish_non_exhaustive()
    }
}

impl ScriptedOracle {
    #[must_use]
    pub fn new() -> Self {
        Self::default().with_response(PromptKind::Logic, LOGIC_RESPONSE)
    }

    #[must_use]
    pub fn with_response(self, kind: PromptKind, response: impl Into<String>) -> Self {
        self.scripts
            .lock()
            .entry(kind)
            .or_default()
            .push_back(response.into());
        self
    }

    #[must_use]
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&ChatPrompt) -> Option<String> + Send + Sync + 'static,
    {
        self.responder = Some(Box::new(responder));
        self
    }

    #[must_use]
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }

    #[must_use]
    pub fn prompts(&self) -> Vec<ChatPrompt> {
        self.prompts.lock().clone()
    }

    #[must_use]
    pub fn count(&self, kind: PromptKind) -> usize {
        self.prompts.lock().iter().filter(|p| p.kind == kind).count()
    }
}

#[async_trait::async_trait]
impl CodeOracle for ScriptedOracle {
    async fn invoke(&self, prompt: &ChatPrompt) -> Result<OracleReply, OracleError> {
        self.prompts.lock().push(prompt.clone());
        let answer = match self.responder.as_ref().and_then(|r| r(prompt)) {
            Some(answer) => answer,
            None => {
                let mut scripts = self.scripts.lock();
                scripts
                    .get_mut(&prompt.kind)
                    .and_then(|queue| {
                        if queue.len() > 1 {
                            queue.pop_front()
                        } else {
                            queue.front().cloned()
                        }
                    })
                    .unwrap_or_default()
            }
        };
        Ok(OracleReply::new(answer).with_usage(self.usage))
    }
}

/// AST tool reporting fixed node kinds
#[derive(Debug)]
pub struct FakeAstExtractor {
    kinds: Vec<String>,
    calls: Mutex<Vec<ExtractMode>>,
}

impl FakeAstExtractor {
    #[must_use]
    pub fn new(kinds: &[&str]) -> Self {
        Self {
            kinds: kinds.iter().map(|k| (*k).to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn calls(&self, mode: ExtractMode) -> usize {
        self.calls.lock().iter().filter(|m| **m == mode).count()
    }
}

impl Default for FakeAstExtractor {
    fn default() -> Self {
        Self::new(&["CompilationUnit", "NumericLiteral"])
    }
}

#[async_trait::async_trait]
impl AstExtractor for FakeAstExtractor {
    async fn extract(&self, mode: ExtractMode, input: &str) -> Result<Extraction, ToolError> {
        self.calls.lock().push(mode);
        if mode == ExtractMode::Checker && input.contains(SYNTAX_ERROR_MARKER) {
            return Ok(Extraction::Rejected {
                output: "ParseException: unexpected token".to_string(),
            });
        }
        let tree = self
            .kinds
            .iter()
            .enumerate()
            .map(|(depth, kind)| format!("{}AST{kind}\n", "  ".repeat(depth)))
            .collect();
        Ok(Extraction::Parsed(AstReport {
            tree,
            node_kinds: self.kinds.clone(),
        }))
    }
}

/// In-memory build project.
///
/// Compilation fails when the staged source contains
/// [`COMPILE_ERROR_MARKER`] or [`OPAQUE_ERROR_MARKER`]; a case passes when
/// the source carries `handles:<id>`.
#[derive(Debug, Default)]
pub struct FakeHarness {
    staged: Mutex<Vec<String>>,
    published: Mutex<Vec<Vec<CaseId>>>,
    compiles: AtomicUsize,
    test_runs: AtomicUsize,
    unnamed_failures: bool,
}

impl FakeHarness {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Failing test runs no longer say which cases failed
    #[must_use]
    pub fn with_unnamed_failures(mut self) -> Self {
        self.unnamed_failures = true;
        self
    }

    #[must_use]
    pub fn staged(&self) -> Vec<String> {
        self.staged.lock().clone()
    }

    #[must_use]
    pub fn current_source(&self) -> Option<String> {
        self.staged.lock().last().cloned()
    }

    /// Every published subset, oldest first
    #[must_use]
    pub fn published(&self) -> Vec<Vec<CaseId>> {
        self.published.lock().clone()
    }

    #[must_use]
    pub fn compiles(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn test_runs(&self) -> usize {
        self.test_runs.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl BuildHarness for FakeHarness {
    async fn stage_checker(&self, source: &str) -> Result<(), ToolError> {
        self.staged.lock().push(source.to_string());
        Ok(())
    }

    async fn publish_cases(&self, subset: &ActiveSubset) -> Result<(), ToolError> {
        self.published.lock().push(subset.ids().to_vec());
        Ok(())
    }

    async fn compile(&self) -> Result<BuildOutcome, ToolError> {
        self.compiles.fetch_add(1, Ordering::SeqCst);
        let source = self.current_source().unwrap_or_default();
        if source.contains(COMPILE_ERROR_MARKER) {
            return Ok(BuildOutcome::failure(
                "[ERROR] GeneratedRule.java:[7,13] cannot find symbol\n\
                 [ERROR]   symbol:   method badApi()\n\
                 [ERROR]   location: class AvoidUsingOctalValues\n\
                 [INFO] BUILD FAILURE",
            ));
        }
        if source.contains(OPAQUE_ERROR_MARKER) {
            return Ok(BuildOutcome::failure(
                "[ERROR] COMPILATION ERROR\n\
                 [ERROR] GeneratedRule.java:[3,1] illegal start of type\n\
                 [INFO] BUILD FAILURE",
            ));
        }
        Ok(BuildOutcome::success("[INFO] BUILD SUCCESS"))
    }

    async fn run_tests(&self, group: &str) -> Result<BuildOutcome, ToolError> {
        self.test_runs.fetch_add(1, Ordering::SeqCst);
        let source = self.current_source().unwrap_or_default();
        let active = self.published.lock().last().cloned().unwrap_or_default();
        let failing: Vec<&CaseId> = active
            .iter()
            .filter(|id| !source.contains(&format!("{HANDLES_MARKER}{id}")))
            .collect();
        if failing.is_empty() {
            return Ok(BuildOutcome::success(format!(
                "[INFO] Tests run: {}, Failures: 0\n[INFO] BUILD SUCCESS",
                active.len()
            )));
        }
        let mut output = String::from("[ERROR] Failures:\n");
        for id in failing.iter().filter(|_| !self.unnamed_failures) {
            output.push_str(&format!("[ERROR]   {group} test case \"{id}\" failed\n"));
        }
        output.push_str(&format!(
            "[ERROR] Tests run: {}, Failures: {}\n[INFO] BUILD FAILURE",
            active.len(),
            failing.len()
        ));
        Ok(BuildOutcome::failure(output))
    }
}

/// Controller wired to the fakes and the fixture retrieval index
#[must_use]
pub fn fixture_controller(
    config: SynthesisConfig,
    oracle: Arc<ScriptedOracle>,
    harness: Arc<FakeHarness>,
) -> SynthesisController {
    let caps = Capabilities {
        oracle,
        extractor: Arc::new(FakeAstExtractor::default()),
        harness,
        diagnostics: Arc::new(MavenDiagnosticParser),
    };
    SynthesisController::new(config, caps, fixture_retrieval())
}
