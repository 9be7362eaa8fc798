//! Build output diagnostics
//!
//! Maven output is line oriented: `symbol:` lines name what javac could not
//! resolve, the following `location:` line says where, and test failures
//! quote the description of the failing case.

use ckg_case::CaseId;
use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::capability::DiagnosticParser;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticEntry {
    /// A class that is not imported or does not exist
    UnresolvedClass { name: String },
    /// A method that does not exist, with where it was called
    UnresolvedApi { api: String, location: String },
    /// A case the test run reported as failing
    FailingCase { id: CaseId },
    /// Any other error line
    Other { line: String },
}

static CLASS_SYMBOL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"symbol:\s+class\s+(\S+)").expect("valid regex"));
static METHOD_SYMBOL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"symbol:\s+method\s+(.+?)\s*$").expect("valid regex"));
static LOCATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"location:\s+(.+?)\s*$").expect("valid regex"));
static FAILING_CASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"case\s+"([^"]+)""#).expect("valid regex"));

/// Parser for `mvn compile` and `mvn test` output
#[derive(Debug, Clone, Copy, Default)]
pub struct MavenDiagnosticParser;

impl DiagnosticParser for MavenDiagnosticParser {
    fn parse(&self, output: &str) -> Vec<DiagnosticEntry> {
        let mut entries = Vec::new();
        let mut failing: IndexSet<String> = IndexSet::new();
        let mut lines = output.lines().peekable();

        while let Some(line) = lines.next() {
            if let Some(caps) = CLASS_SYMBOL.captures(line) {
                entries.push(DiagnosticEntry::UnresolvedClass {
                    name: caps[1].to_string(),
                });
            } else if let Some(caps) = METHOD_SYMBOL.captures(line) {
                let api = caps[1].to_string();
                let location = lines
                    .peek()
                    .and_then(|next| LOCATION.captures(next))
                    .map(|c| c[1].to_string());
                if location.is_some() {
                    lines.next();
                }
                entries.push(DiagnosticEntry::UnresolvedApi {
                    api,
                    location: location.unwrap_or_default(),
                });
            } else if let Some(caps) = FAILING_CASE.captures(line) {
                if failing.insert(caps[1].to_string()) {
                    entries.push(DiagnosticEntry::FailingCase {
                        id: CaseId::new(&caps[1]),
                    });
                }
            } else if line.starts_with("[ERROR]") {
                entries.push(DiagnosticEntry::Other {
                    line: line.trim().to_string(),
                });
            }
        }
        entries
    }
}

/// One-line description of the first fixable compile error, class
/// problems first
#[must_use]
pub fn repair_hint(entries: &[DiagnosticEntry]) -> Option<String> {
    let class = entries.iter().find_map(|e| match e {
        DiagnosticEntry::UnresolvedClass { name } => Some(name),
        _ => None,
    });
    if let Some(name) = class {
        return Some(format!("{name} class is not correctly imported"));
    }
    entries.iter().find_map(|e| match e {
        DiagnosticEntry::UnresolvedApi { api, location } if !location.is_empty() => {
            Some(format!("{location} calls API {api} which does not exist"))
        }
        _ => None,
    })
}

/// APIs the compiler could not resolve
#[must_use]
pub fn unresolved_apis(entries: &[DiagnosticEntry]) -> Vec<String> {
    entries
        .iter()
        .filter_map(|e| match e {
            DiagnosticEntry::UnresolvedApi { api, .. } => Some(api.clone()),
            _ => None,
        })
        .collect()
}

/// Failing case ids in report order
#[must_use]
pub fn failing_case_ids(entries: &[DiagnosticEntry]) -> Vec<CaseId> {
    entries
        .iter()
        .filter_map(|e| match e {
            DiagnosticEntry::FailingCase { id } => Some(id.clone()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const COMPILE_OUTPUT: &str = "\
[INFO] Compiling 1 source file
[ERROR] /src/AvoidUsingOctalValuesRule.java:[12,20] cannot find symbol
[ERROR]   symbol:   method getBase()
[ERROR]   location: variable node of type ASTNumericLiteral
[ERROR] /src/AvoidUsingOctalValuesRule.java:[3,1] cannot find symbol
[ERROR]   symbol:   class ASTLiteralNode
[INFO] BUILD FAILURE";

    #[test]
    fn parses_compile_errors() {
        let entries = MavenDiagnosticParser.parse(COMPILE_OUTPUT);
        assert!(entries.contains(&DiagnosticEntry::UnresolvedApi {
            api: "getBase()".into(),
            location: "variable node of type ASTNumericLiteral".into(),
        }));
        assert!(entries.contains(&DiagnosticEntry::UnresolvedClass {
            name: "ASTLiteralNode".into()
        }));
        assert_eq!(unresolved_apis(&entries), vec!["getBase()".to_string()]);
    }

    #[test]
    fn class_errors_win_the_hint() {
        let entries = MavenDiagnosticParser.parse(COMPILE_OUTPUT);
        assert_eq!(
            repair_hint(&entries).as_deref(),
            Some("ASTLiteralNode class is not correctly imported")
        );
    }

    #[test]
    fn api_hint_needs_location() {
        let entries = vec![DiagnosticEntry::UnresolvedApi {
            api: "foo()".into(),
            location: "class X".into(),
        }];
        assert_eq!(
            repair_hint(&entries).as_deref(),
            Some("class X calls API foo() which does not exist")
        );
        let bare = vec![DiagnosticEntry::UnresolvedApi {
            api: "foo()".into(),
            location: String::new(),
        }];
        assert_eq!(repair_hint(&bare), None);
    }

    #[test]
    fn failing_cases_are_deduplicated() {
        let output = "\
[ERROR] Failures:
[ERROR]   AvoidUsingOctalValuesTest test case \"bad, 3\" expected 1 problem
[ERROR]   AvoidUsingOctalValuesTest test case \"ok, 1\" expected 0 problems
[ERROR]   AvoidUsingOctalValuesTest test case \"bad, 3\" rerun";
        let entries = MavenDiagnosticParser.parse(output);
        assert_eq!(
            failing_case_ids(&entries),
            vec![CaseId::from("bad, 3"), CaseId::from("ok, 1")]
        );
    }

    #[test]
    fn unknown_output_has_no_hint() {
        let entries = MavenDiagnosticParser.parse("[ERROR] something odd\n");
        assert_eq!(entries.len(), 1);
        assert_eq!(repair_hint(&entries), None);
    }
}
