//! Deterministic rewrites applied to every checker before it is staged
//!
//! Each rule is idempotent; the [`Canonicalizer`] runs them in order.

use once_cell::sync::Lazy;
use regex::Regex;

pub trait CanonicalRule: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;
    fn apply(&self, source: &str) -> String;
}

static PACKAGE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*package\s+[\w.]+\s*;").expect("valid regex"));
static IMPORT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*import\s+([\w.]+(?:\s*\.\s*\*)?)\s*;").expect("valid regex"));
static SUPER_REGISTRATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"super\s*\.\s*addRuleChainVisit\s*\(").expect("valid regex"));
// A declaration starts its line: only modifiers may precede `class`, and the
// name is followed by a type list, a supertype clause or the body.
static CLASS_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?:(?:public|protected|private|abstract|final|static|sealed)\s+)*class\s+([A-Za-z_$][\w$]*)\s*(?:<|extends\b|implements\b|\{|$)",
    )
    .expect("valid regex")
});

/// Guarantee the required imports, each exactly once, right after the
/// package declaration
#[derive(Debug, Clone)]
pub struct EnsureImports {
    imports: Vec<String>,
}

impl EnsureImports {
    #[must_use]
    pub fn new(imports: Vec<String>) -> Self {
        Self { imports }
    }
}

fn normalize_import(path: &str) -> String {
    path.chars().filter(|c| !c.is_whitespace()).collect()
}

impl CanonicalRule for EnsureImports {
    fn name(&self) -> &'static str {
        "ensure-imports"
    }

    fn apply(&self, source: &str) -> String {
        if self.imports.is_empty() {
            return source.to_string();
        }
        let required: Vec<String> = self.imports.iter().map(|i| normalize_import(i)).collect();
        let block: String = required.iter().map(|i| format!("import {i};\n")).collect();

        let mut out = String::with_capacity(source.len() + block.len());
        let mut inserted = false;
        for line in source.lines() {
            if let Some(caps) = IMPORT_LINE.captures(line) {
                if required.contains(&normalize_import(&caps[1])) {
                    continue;
                }
            }
            if !inserted && PACKAGE_LINE.is_match(line) {
                out.push_str(line);
                out.push('\n');
                out.push_str(&block);
                inserted = true;
                continue;
            }
            out.push_str(line);
            out.push('\n');
        }
        if !inserted {
            out.insert_str(0, &block);
        }
        out.trim_end().to_string()
    }
}

/// `super.addRuleChainVisit(X.class)` in a constructor becomes `super(X.class)`
#[derive(Debug, Clone, Copy, Default)]
pub struct ReduceSuperRegistration;

impl CanonicalRule for ReduceSuperRegistration {
    fn name(&self) -> &'static str {
        "reduce-super-registration"
    }

    fn apply(&self, source: &str) -> String {
        SUPER_REGISTRATION.replace_all(source, "super(").into_owned()
    }
}

/// Rename the first declared class, and its constructors, to the rule name.
///
/// Mentions of `class` inside comments or prose are not declarations.
#[derive(Debug, Clone)]
pub struct EnforceClassName {
    name: String,
}

impl EnforceClassName {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl CanonicalRule for EnforceClassName {
    fn name(&self) -> &'static str {
        "enforce-class-name"
    }

    fn apply(&self, source: &str) -> String {
        let Some(declared) = CLASS_DECL.captures(source).and_then(|c| c.get(1)) else {
            return source.to_string();
        };
        let current = declared.as_str();
        if current == self.name {
            return source.to_string();
        }
        let Ok(ctor) = Regex::new(&format!(r"\b{}(\s*\()", regex::escape(current))) else {
            tracing::warn!("Cannot rename class {}, leaving source unchanged", current);
            return source.to_string();
        };

        let mut renamed = String::with_capacity(source.len());
        renamed.push_str(&source[..declared.start()]);
        renamed.push_str(&self.name);
        renamed.push_str(&source[declared.end()..]);
        let renamed = ctor
            .replace_all(&renamed, |caps: &regex::Captures<'_>| {
                format!("{}{}", self.name, &caps[1])
            })
            .into_owned();
        tracing::debug!("Renamed class {} to {}", current, self.name);
        renamed
    }
}

/// Ordered set of canonical rules
#[derive(Debug)]
pub struct Canonicalizer {
    rules: Vec<Box<dyn CanonicalRule>>,
}

impl Canonicalizer {
    #[must_use]
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    #[must_use]
    pub fn with_rule(mut self, rule: impl CanonicalRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Imports, then super registration, then the class name
    #[must_use]
    pub fn for_rule(rule_name: &str, imports: &[String]) -> Self {
        Self::new()
            .with_rule(EnsureImports::new(imports.to_vec()))
            .with_rule(ReduceSuperRegistration)
            .with_rule(EnforceClassName::new(rule_name))
    }

    #[must_use]
    pub fn apply(&self, source: &str) -> String {
        self.rules
            .iter()
            .fold(source.to_string(), |acc, rule| rule.apply(&acc))
    }

    #[must_use]
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_REQUIRED_IMPORTS;
    use pretty_assertions::assert_eq;

    fn imports() -> Vec<String> {
        DEFAULT_REQUIRED_IMPORTS.iter().map(|s| (*s).to_string()).collect()
    }

    const RAW: &str = "package net.sourceforge.pmd.lang.java.rule.errorprone;\n\
import net.sourceforge.pmd.lang.java.ast. *;\n\
import java.util.List;\n\
public class OctalRule extends AbstractJavaRulechainRule {\n\
    public OctalRule() {\n\
        super.addRuleChainVisit(ASTNumericLiteral.class);\n\
    }\n\
}";

    #[test]
    fn imports_follow_package_once() {
        let out = EnsureImports::new(imports()).apply(RAW);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "package net.sourceforge.pmd.lang.java.rule.errorprone;");
        assert_eq!(lines[1], "import net.sourceforge.pmd.lang.java.rule.AbstractJavaRulechainRule;");
        assert_eq!(out.matches("import net.sourceforge.pmd.lang.java.ast.*;").count(), 1);
        assert!(out.contains("import java.util.List;"));
    }

    #[test]
    fn super_registration_is_reduced() {
        let out = ReduceSuperRegistration.apply(RAW);
        assert!(out.contains("super(ASTNumericLiteral.class);"));
        assert!(!out.contains("addRuleChainVisit"));
    }

    #[test]
    fn class_and_constructor_are_renamed() {
        let out = EnforceClassName::new("AvoidUsingOctalValuesRule").apply(RAW);
        assert!(out.contains("public class AvoidUsingOctalValuesRule extends"));
        assert!(out.contains("public AvoidUsingOctalValuesRule() {"));
        assert!(!out.contains("OctalRule("));
    }

    #[test]
    fn javadoc_mentions_are_not_declarations() {
        let source = "/**\n * This class reports octal literals.\n */\n\
                      // class Draft extends Nothing\n\
                      public class OctalRule extends AbstractJavaRulechainRule {\n\
                      \x20   public OctalRule() {\n        super(ASTNumericLiteral.class);\n    }\n}";
        let out = EnforceClassName::new("AvoidUsingOctalValuesRule").apply(source);
        assert!(out.contains(" * This class reports octal literals."));
        assert!(out.contains("// class Draft extends Nothing"));
        assert!(out.contains("public class AvoidUsingOctalValuesRule extends AbstractJavaRulechainRule {"));
        assert!(out.contains("    public AvoidUsingOctalValuesRule() {"));
        assert!(!out.contains("OctalRule"));
    }

    #[test]
    fn nested_helper_class_keeps_its_name() {
        let source = "public final class OctalRule {\n    private static class Helper {}\n}";
        let out = EnforceClassName::new("R").apply(source);
        assert_eq!(out, "public final class R {\n    private static class Helper {}\n}");
    }

    #[test]
    fn pipeline_is_idempotent() {
        let canon = Canonicalizer::for_rule("AvoidUsingOctalValuesRule", &imports());
        let once = canon.apply(RAW);
        assert_eq!(canon.apply(&once), once);
        assert_eq!(
            canon.rule_names(),
            vec!["ensure-imports", "reduce-super-registration", "enforce-class-name"]
        );
    }

    #[test]
    fn missing_package_puts_imports_first() {
        let out = EnsureImports::new(vec!["a.B".into()]).apply("class X {}");
        assert_eq!(out, "import a.B;\nclass X {}");
    }
}
