//! Typed prompts
//!
//! Each prompt kind is a struct holding exactly the fields its template
//! needs; `render` turns it into the [`ChatPrompt`] handed to the oracle.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// What a prompt asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    Logic,
    RuleGeneration,
    CompileRepair,
    TestRepair,
}

/// Ordered chat messages; the oracle keeps no session state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPrompt {
    pub kind: PromptKind,
    pub messages: Vec<ChatMessage>,
}

impl ChatPrompt {
    #[must_use]
    pub fn new(kind: PromptKind) -> Self {
        Self {
            kind,
            messages: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Text of the last user message
    #[must_use]
    pub fn last_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }

    /// Total characters across messages, for logging prompt size
    #[must_use]
    pub fn char_count(&self) -> usize {
        self.messages.iter().map(|m| m.content.chars().count()).sum()
    }
}

/// Decomposition request for one rule and one example case
#[derive(Debug, Clone)]
pub struct LogicPrompt<'a> {
    pub rule_description: &'a str,
    pub test_case: &'a str,
}

impl LogicPrompt<'_> {
    #[must_use]
    pub fn user_text(&self) -> String {
        format!(
            "rule description: {}\ntest case:\n```java\n{}\n```\n",
            self.rule_description.trim(),
            self.test_case.trim()
        )
    }
}

/// Methods every checker may use to walk the syntax tree
const TRAVERSAL_APIS: &[&str] = &[
    "NodeStream<JavaNode> children()",
    "NodeStream<JavaNode> children(Class)",
    "N getChild(int i)",
    "N getFirstChild()",
    "N getLastChild()",
    "N firstChild(Class)",
    "int getNumChildren()",
    "int getIndexInParent()",
    "DescendantNodeStream<JavaNode> descendants()",
    "DescendantNodeStream<JavaNode> descendants(Class)",
    "DescendantNodeStream<JavaNode> descendantsOrSelf()",
    "N getParent()",
    "N getNthParent(int i)",
    "NodeStream<JavaNode> ancestors()",
    "NodeStream<JavaNode> ancestors(Class)",
    "NodeStream<JavaNode> ancestorsOrSelf()",
    "N getPreviousSibling()",
    "N getNextSibling()",
];

fn numbered(items: &[&str]) -> String {
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, item);
    }
    out
}

fn blocklist_section(blocked: &[String]) -> String {
    if blocked.is_empty() {
        return String::new();
    }
    let mut out = String::from("\nDo not use the following APIs, they do not exist:\n");
    for api in blocked {
        let _ = writeln!(out, "- {api}");
    }
    out
}

/// First-checker generation from one negative case
#[derive(Debug, Clone)]
pub struct RuleGenerationPrompt<'a> {
    pub rule_name: &'a str,
    pub rule_description: &'a str,
    pub package: &'a str,
    pub test_case: &'a str,
    pub ast: &'a str,
    pub evidence: &'a str,
    pub blocked_apis: &'a [String],
}

impl RuleGenerationPrompt<'_> {
    #[must_use]
    pub fn render(&self) -> ChatPrompt {
        let text = format!(
            "You write custom Java rule checkers for PMD 7.0.0.\n\
             Generate a checker that reports the violation in the test case below.\n\n\
             Rule description: {description}\n\
             Test case:\n```\n{case}\n```\n\
             AST of the test case (visit nodes that appear in it):\n{ast}\n\
             With chained calls, the last call sits higher in the tree.\n\n\
             The checker must follow this shape:\n\
             ```java\n\
             package {package};\n\
             import net.sourceforge.pmd.lang.java.rule.AbstractJavaRulechainRule;\n\
             import net.sourceforge.pmd.lang.java.ast.*;\n\n\
             public class {name} extends AbstractJavaRulechainRule {{\n    \
             public {name}() {{\n        super(ASTNodeToVisit.class);\n    }}\n    \
             @Override\n    \
             public Object visit(ASTNodeToVisit node, Object data) {{\n        \
             return super.visit(node, data);\n    }}\n\
             }}\n```\n\
             Return the complete checker with imports, no pseudocode and no comments.\n\n\
             APIs and snippets you may reuse unchanged:\n{evidence}\n\
             Tree traversal APIs:\n{traversal}{blocked}",
            description = self.rule_description.trim(),
            case = self.test_case.trim(),
            ast = self.ast.trim_end(),
            package = self.package,
            name = self.rule_name,
            evidence = self.evidence,
            traversal = numbered(TRAVERSAL_APIS),
            blocked = blocklist_section(self.blocked_apis),
        );
        ChatPrompt::new(PromptKind::RuleGeneration).with_message(ChatMessage::user(text))
    }
}

/// Fix for one compile diagnostic
#[derive(Debug, Clone)]
pub struct CompileRepairPrompt<'a> {
    pub rule_description: &'a str,
    pub source: &'a str,
    pub failure: &'a str,
}

impl CompileRepairPrompt<'_> {
    #[must_use]
    pub fn render(&self) -> ChatPrompt {
        let text = format!(
            "You write custom Java rule checkers for PMD 7.0.0.\n\
             Rule description: {}\n\
             Checker source:\n```\n{}\n```\n\
             Compilation failed with:\n{}\n\n\
             Repair the checker and return the complete source. \
             Leave code unrelated to the failure unchanged.\n",
            self.rule_description.trim(),
            self.source.trim(),
            self.failure.trim()
        );
        ChatPrompt::new(PromptKind::CompileRepair).with_message(ChatMessage::user(text))
    }
}

/// Direction of a test failure on the anchor case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairKind {
    /// A negative case went unreported
    FalseNegative,
    /// A positive case was reported
    FalsePositive,
}

impl RepairKind {
    #[inline]
    #[must_use]
    pub fn for_case(is_negative: bool) -> Self {
        if is_negative {
            Self::FalseNegative
        } else {
            Self::FalsePositive
        }
    }

    fn describe(self) -> (&'static str, &'static str, &'static str) {
        match self {
            Self::FalseNegative => (
                "false negative",
                "negative",
                "so that it also reports this negative test case",
            ),
            Self::FalsePositive => (
                "false positive",
                "positive",
                "so that it no longer reports this positive test case",
            ),
        }
    }
}

/// Extend an accepted checker to one more case without losing the others
#[derive(Debug, Clone)]
pub struct TestRepairPrompt<'a> {
    pub kind: RepairKind,
    pub rule_description: &'a str,
    pub source: &'a str,
    pub passed_summary: &'a str,
    pub failing_case: &'a str,
    pub ast: &'a str,
    pub evidence: &'a str,
    pub blocked_apis: &'a [String],
}

impl TestRepairPrompt<'_> {
    #[must_use]
    pub fn render(&self) -> ChatPrompt {
        let (label, polarity, goal) = self.kind.describe();
        let text = format!(
            "You write custom Java rule checkers for PMD 7.0.0.\n\
             Rule description: {description}\n\
             Current checker:\n```\n{source}\n```\n\n\
             {passed}\n\
             The checker fails ({label}) on this {polarity} test case:\n```\n{case}\n```\n\
             AST of the test case:\n{ast}\n\n\
             Modify the checker {goal}. Keep the behaviour that makes the passed \
             test cases pass. Return the complete checker with imports, no pseudocode \
             and no comments.\n\n\
             APIs and snippets you may reuse unchanged:\n{evidence}{blocked}",
            description = self.rule_description.trim(),
            source = self.source.trim(),
            passed = self.passed_summary,
            case = self.failing_case.trim(),
            ast = self.ast.trim_end(),
            evidence = self.evidence,
            blocked = blocklist_section(self.blocked_apis),
        );
        ChatPrompt::new(PromptKind::TestRepair).with_message(ChatMessage::user(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_prompt_embeds_inputs() {
        let blocked = vec!["ASTLiteral.getBase()".to_string()];
        let prompt = RuleGenerationPrompt {
            rule_name: "AvoidUsingOctalValues",
            rule_description: "No octal literals",
            package: "net.sourceforge.pmd.lang.java.rule.errorprone",
            test_case: "int i = 012;",
            ast: "AST CompilationUnit\n",
            evidence: "1. int getBase()\n",
            blocked_apis: &blocked,
        }
        .render();

        assert_eq!(prompt.kind, PromptKind::RuleGeneration);
        let text = prompt.last_user_text().unwrap();
        assert!(text.contains("public class AvoidUsingOctalValues extends"));
        assert!(text.contains("int i = 012;"));
        assert!(text.contains("1. int getBase()"));
        assert!(text.contains("- ASTLiteral.getBase()"));
    }

    #[test]
    fn empty_blocklist_adds_nothing() {
        assert!(blocklist_section(&[]).is_empty());
    }

    #[test]
    fn repair_kind_follows_polarity() {
        assert_eq!(RepairKind::for_case(true), RepairKind::FalseNegative);
        let prompt = TestRepairPrompt {
            kind: RepairKind::for_case(false),
            rule_description: "d",
            source: "class A {}",
            passed_summary: "This checker has passed this negative testcase:\nx\n",
            failing_case: "int i = 10;",
            ast: "",
            evidence: "",
            blocked_apis: &[],
        }
        .render();
        let text = prompt.last_user_text().unwrap();
        assert!(text.contains("(false positive) on this positive test case"));
        assert!(text.contains("This checker has passed this negative testcase"));
    }
}
