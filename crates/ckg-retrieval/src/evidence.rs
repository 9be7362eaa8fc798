//! Evidence gathered for a list of checking steps

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;
use crate::index::RetrievalIndex;
use crate::meta::RetrievalHit;

/// API calls and code snippets retrieved for all steps of one decomposition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Single-line fragments
    pub apis: Vec<RetrievalHit>,
    /// Multi-line fragments
    pub snippets: Vec<RetrievalHit>,
    /// Steps nothing matched
    pub gaps: Vec<String>,
}

impl Evidence {
    /// Resolve every step, keeping the first hit for each distinct fragment
    pub fn gather<S: AsRef<str>>(
        index: &RetrievalIndex,
        steps: &[String],
        kinds: &[S],
    ) -> Result<Self, RetrievalError> {
        let mut evidence = Self::default();
        let mut seen: IndexSet<String> = IndexSet::new();

        for step in steps {
            let resolution = index.resolve(step, kinds)?;
            if resolution.is_empty() {
                tracing::warn!("No meta operation or API matched step '{}'", step.trim());
                evidence.gaps.push(step.clone());
                continue;
            }
            for hit in resolution.hits {
                if !seen.insert(hit.entry.implementation_fragment.clone()) {
                    continue;
                }
                if hit.entry.is_snippet() {
                    evidence.snippets.push(hit);
                } else {
                    evidence.apis.push(hit);
                }
            }
        }
        Ok(evidence)
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.apis.is_empty() && self.snippets.is_empty()
    }

    /// `1. <api>` lines, trailing `, // comment` removed
    #[must_use]
    pub fn render_apis(&self) -> String {
        self.apis
            .iter()
            .enumerate()
            .map(|(i, hit)| format!("{}. {}\n", i + 1, strip_api_comment(&hit.entry.implementation_fragment)))
            .collect()
    }

    /// `1.  //<operation>` followed by the snippet body
    #[must_use]
    pub fn render_snippets(&self) -> String {
        self.snippets
            .iter()
            .enumerate()
            .map(|(i, hit)| {
                format!(
                    "{}.  //{}\n{}\n",
                    i + 1,
                    hit.entry.operation_name,
                    hit.entry.implementation_fragment
                )
            })
            .collect()
    }

    /// Both lists, APIs first, as embedded in generation prompts
    #[must_use]
    pub fn render(&self) -> String {
        format!("{}\n{}", self.render_apis(), self.render_snippets())
    }
}

/// Fragment text up to its `, //` annotation
#[must_use]
pub fn strip_api_comment(fragment: &str) -> &str {
    match fragment.find(", //") {
        Some(idx) => &fragment[..idx],
        None => fragment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogEntry;
    use pretty_assertions::assert_eq;

    fn hit(entry: CatalogEntry) -> RetrievalHit {
        RetrievalHit {
            entry,
            similarity: 0.9,
        }
    }

    #[test]
    fn strips_trailing_annotation() {
        assert_eq!(strip_api_comment("int getBase(), // base of literal"), "int getBase()");
        assert_eq!(strip_api_comment("int getBase()"), "int getBase()");
    }

    #[test]
    fn renders_numbered_lists() {
        let evidence = Evidence {
            apis: vec![
                hit(CatalogEntry::api("ASTNumericLiteral", "int getBase()", "int getBase(), // base")),
                hit(CatalogEntry::api("ASTNumericLiteral", "String getImage()", "String getImage()")),
            ],
            snippets: vec![hit(CatalogEntry::meta(
                "Check octal",
                "String img = node.getImage();\nreturn img.startsWith(\"0\");",
            ))],
            gaps: vec![],
        };
        assert_eq!(evidence.render_apis(), "1. int getBase()\n2. String getImage()\n");
        assert_eq!(
            evidence.render_snippets(),
            "1.  //Check octal\nString img = node.getImage();\nreturn img.startsWith(\"0\");\n"
        );
    }
}
