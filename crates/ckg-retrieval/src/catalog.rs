//! Catalog entries and their on-disk JSON formats

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

/// Which tier an entry belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "tier", rename_all = "snake_case")]
pub enum EntryKind {
    /// Curated meta-operation, keyed by its description only
    Meta,
    /// Method of an API class; scoped by that class
    Api { class_name: String },
}

/// One retrievable implementation fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub operation_name: String,
    pub implementation_fragment: String,
    pub kind: EntryKind,
}

impl CatalogEntry {
    #[must_use]
    pub fn meta(operation_name: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            implementation_fragment: fragment.into(),
            kind: EntryKind::Meta,
        }
    }

    #[must_use]
    pub fn api(
        class_name: impl Into<String>,
        operation_name: impl Into<String>,
        fragment: impl Into<String>,
    ) -> Self {
        Self {
            operation_name: operation_name.into(),
            implementation_fragment: fragment.into(),
            kind: EntryKind::Api {
                class_name: class_name.into(),
            },
        }
    }

    /// Multi-line fragments are code snippets, single lines are API calls
    #[inline]
    #[must_use]
    pub fn is_snippet(&self) -> bool {
        self.implementation_fragment.contains('\n')
    }
}

#[derive(Debug, Deserialize)]
struct MetaRecord {
    meta_op: String,
    meta_impl: String,
}

/// Parse a meta-operation catalog: `[{"meta_op": .., "meta_impl": ..}]`
pub fn parse_meta_catalog(json: &str) -> Result<Vec<CatalogEntry>, serde_json::Error> {
    let records: Vec<MetaRecord> = serde_json::from_str(json)?;
    Ok(records
        .into_iter()
        .map(|r| CatalogEntry::meta(r.meta_op, r.meta_impl))
        .collect())
}

pub fn load_meta_catalog(path: &Path) -> Result<Vec<CatalogEntry>, RetrievalError> {
    let text = std::fs::read_to_string(path).map_err(|e| RetrievalError::io(path, e))?;
    parse_meta_catalog(&text).map_err(|e| RetrievalError::catalog(path, e))
}

/// One class of the API catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiClass {
    pub class_name: String,
    #[serde(default)]
    pub methods: Vec<ApiMethod>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMethod {
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ApiClass {
    /// Classes that are not syntax-tree nodes are usable from any checker
    #[inline]
    #[must_use]
    pub fn is_utility(&self) -> bool {
        !self.class_name.starts_with("AST") && self.class_name != "JavaNode"
    }

    /// Whether this class models the structural node `kind`
    #[must_use]
    pub fn models_kind(&self, kind: &str) -> bool {
        self.class_name == kind || self.class_name.strip_prefix("AST") == Some(kind)
    }

    /// Entries for every method. The fragment carries the description as a
    /// trailing `, // ...` comment; the embedded text is the description
    /// when there is one.
    #[must_use]
    pub fn entries(&self) -> Vec<(CatalogEntry, String)> {
        self.methods
            .iter()
            .map(|m| {
                let fragment = match &m.description {
                    Some(d) if !d.trim().is_empty() => format!("{}, // {}", m.signature, d.trim()),
                    _ => m.signature.clone(),
                };
                let text = match &m.description {
                    Some(d) if !d.trim().is_empty() => {
                        format!("{} {} {}", self.class_name, m.signature, d.trim())
                    }
                    _ => format!("{} {}", self.class_name, m.signature),
                };
                let entry = CatalogEntry::api(&self.class_name, m.signature.clone(), fragment);
                (entry, text)
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct ApiCatalogFile {
    classes_contained_in_project_detail: Vec<ApiClass>,
}

/// Parse an API catalog:
/// `{"classes_contained_in_project_detail": [{"class_name", "methods": [..]}]}`
pub fn parse_api_catalog(json: &str) -> Result<Vec<ApiClass>, serde_json::Error> {
    let file: ApiCatalogFile = serde_json::from_str(json)?;
    Ok(file.classes_contained_in_project_detail)
}

pub fn load_api_catalog(path: &Path) -> Result<Vec<ApiClass>, RetrievalError> {
    let text = std::fs::read_to_string(path).map_err(|e| RetrievalError::io(path, e))?;
    parse_api_catalog(&text).map_err(|e| RetrievalError::catalog(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_meta_catalog() {
        let json = r#"[{"meta_op": "Get the image of literal", "meta_impl": "node.getImage()"}]"#;
        let entries = parse_meta_catalog(json).unwrap();
        assert_eq!(entries, vec![CatalogEntry::meta("Get the image of literal", "node.getImage()")]);
    }

    #[test]
    fn parses_api_catalog_with_optional_description() {
        let json = r#"{"classes_contained_in_project_detail": [
            {"class_name": "ASTNumericLiteral", "methods": [
                {"signature": "boolean isIntLiteral()", "description": "whether literal is int"},
                {"signature": "String getImage()"}
            ]},
            {"class_name": "JavaRuleUtil", "methods": []}
        ]}"#;
        let classes = parse_api_catalog(json).unwrap();
        assert_eq!(classes.len(), 2);
        assert!(!classes[0].is_utility());
        assert!(classes[1].is_utility());
        assert!(classes[0].models_kind("NumericLiteral"));
        assert!(classes[0].models_kind("ASTNumericLiteral"));

        let entries = classes[0].entries();
        assert_eq!(
            entries[0].0.implementation_fragment,
            "boolean isIntLiteral(), // whether literal is int"
        );
        assert_eq!(entries[1].0.implementation_fragment, "String getImage()");
    }

    #[test]
    fn java_node_is_not_utility() {
        let class = ApiClass {
            class_name: "JavaNode".into(),
            methods: vec![],
        };
        assert!(!class.is_utility());
    }
}
