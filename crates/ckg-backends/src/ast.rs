//! AST extraction through the PMD-style parser jar
//!
//! The jar is invoked as `java -jar <jar> <mode> <input> <output>` inside a
//! work directory. Its output file holds the textual tree (lines starting
//! with `AST`, `—` or a space) followed by an XML rendering whose closing
//! tags name the node kinds.

use std::path::PathBuf;
use std::time::Duration;

use ckg_core::{AstExtractor, AstReport, ExtractMode, Extraction, ToolError};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::process::run_tool;

static CLOSING_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</([^<>]+)>").expect("valid regex"));

#[derive(Debug, Clone)]
pub struct JarAstExtractor {
    java: String,
    jar: PathBuf,
    work_dir: PathBuf,
    timeout: Duration,
}

impl JarAstExtractor {
    #[must_use]
    pub fn new(jar: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            java: "java".to_string(),
            jar: jar.into(),
            work_dir: work_dir.into(),
            timeout: Duration::from_secs(120),
        }
    }

    #[must_use]
    pub fn with_java(mut self, java: impl Into<String>) -> Self {
        self.java = java.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn file_names(mode: ExtractMode) -> (&'static str, &'static str) {
        match mode {
            ExtractMode::TestCase => ("selected_case.xml", "selected_case_ast.txt"),
            ExtractMode::Checker => ("checker.txt", "checker_ast.txt"),
        }
    }
}

#[async_trait::async_trait]
impl AstExtractor for JarAstExtractor {
    async fn extract(&self, mode: ExtractMode, input: &str) -> Result<Extraction, ToolError> {
        let (input_name, output_name) = Self::file_names(mode);
        let input_path = self.work_dir.join(input_name);
        let output_path = self.work_dir.join(output_name);
        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .map_err(|e| ToolError::io(&self.work_dir, e))?;
        tokio::fs::write(&input_path, input)
            .await
            .map_err(|e| ToolError::io(&input_path, e))?;
        let _ = tokio::fs::remove_file(&output_path).await;

        let jar = self.jar.to_string_lossy();
        let run = run_tool(
            &self.java,
            &["-jar", &*jar, mode.as_arg(), input_name, output_name],
            &self.work_dir,
            self.timeout,
        )
        .await?;
        if !run.success {
            return Ok(Extraction::Rejected { output: run.output });
        }
        if mode == ExtractMode::Checker {
            return Ok(Extraction::Parsed(AstReport::default()));
        }

        let text = tokio::fs::read_to_string(&output_path)
            .await
            .map_err(|e| ToolError::io(&output_path, e))?;
        Ok(Extraction::Parsed(parse_ast_output(&text)))
    }
}

/// Split the jar's output into the tree text and the sorted node kinds
#[must_use]
pub fn parse_ast_output(text: &str) -> AstReport {
    let mut tree = String::new();
    let mut kinds: Vec<String> = Vec::new();
    let mut in_xml = false;
    for line in text.lines() {
        if !in_xml && (line.starts_with("AST") || line.starts_with('—') || line.starts_with(' ')) {
            tree.push_str(line);
            tree.push('\n');
        } else if line.starts_with('<') || in_xml {
            in_xml = true;
            kinds.extend(CLOSING_TAG.captures_iter(line).map(|c| c[1].to_string()));
        }
    }
    kinds.sort();
    kinds.dedup();
    AstReport {
        tree,
        node_kinds: kinds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn splits_tree_and_kinds() {
        let text = "AST CompilationUnit\n\
                    —ClassDeclaration\n  \
                     FieldDeclaration\n\
                    <CompilationUnit><ClassDeclaration><NumericLiteral></NumericLiteral>\
                    <NumericLiteral></NumericLiteral></ClassDeclaration></CompilationUnit>\n";
        let report = parse_ast_output(text);
        assert_eq!(report.tree.lines().count(), 3);
        assert_eq!(
            report.node_kinds,
            vec!["ClassDeclaration", "CompilationUnit", "NumericLiteral"]
        );
    }

    #[test]
    fn empty_output() {
        assert_eq!(parse_ast_output(""), AstReport::default());
    }
}
