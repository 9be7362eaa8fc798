//! API tier
//!
//! Utility classes are embedded up front. Node classes are embedded the
//! first time a test case containing that node kind is seen, so the index
//! only pays for the part of the catalog the current rule touches.

use indexmap::{IndexMap, IndexSet};

use crate::catalog::{ApiClass, CatalogEntry};
use crate::embed::{cosine_similarity, Embedder, Embedding};
use crate::error::RetrievalError;
use crate::meta::RetrievalHit;

#[derive(Debug, Clone)]
struct EmbeddedEntry {
    entry: CatalogEntry,
    embedding: Embedding,
}

#[derive(Debug, Clone, Default)]
pub struct ApiIndex {
    classes: Vec<ApiClass>,
    /// class name -> embedded methods
    embedded: IndexMap<String, Vec<EmbeddedEntry>>,
    /// node kinds already passed to `ensure_kinds`
    observed: IndexSet<String>,
}

impl ApiIndex {
    /// Index the catalog, embedding utility classes immediately
    pub fn build(classes: Vec<ApiClass>, embedder: &dyn Embedder) -> Result<Self, RetrievalError> {
        let mut index = Self {
            classes,
            ..Self::default()
        };
        let utility: Vec<usize> = index
            .classes
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_utility())
            .map(|(i, _)| i)
            .collect();
        for idx in utility {
            index.embed_class(idx, embedder)?;
        }
        tracing::info!(
            "Built API index: {} classes, {} utility classes embedded",
            index.classes.len(),
            index.embedded.len()
        );
        Ok(index)
    }

    fn embed_class(&mut self, idx: usize, embedder: &dyn Embedder) -> Result<(), RetrievalError> {
        let class = &self.classes[idx];
        if self.embedded.contains_key(&class.class_name) {
            return Ok(());
        }
        let pairs = class.entries();
        let texts: Vec<&str> = pairs.iter().map(|(_, t)| t.as_str()).collect();
        let embeddings = embedder.embed(&texts)?;
        if embeddings.len() != pairs.len() {
            return Err(RetrievalError::EmbeddingCount {
                expected: pairs.len(),
                got: embeddings.len(),
            });
        }
        let entries = pairs
            .into_iter()
            .zip(embeddings)
            .map(|((entry, _), embedding)| EmbeddedEntry { entry, embedding })
            .collect();
        self.embedded.insert(class.class_name.clone(), entries);
        Ok(())
    }

    /// Embed the node classes for `kinds` not seen before. Returns the
    /// number of classes newly embedded.
    pub fn ensure_kinds<S: AsRef<str>>(
        &mut self,
        kinds: &[S],
        embedder: &dyn Embedder,
    ) -> Result<usize, RetrievalError> {
        let mut added = 0;
        for kind in kinds.iter().map(AsRef::as_ref) {
            if !self.observed.insert(kind.to_string()) {
                continue;
            }
            let matching: Vec<usize> = self
                .classes
                .iter()
                .enumerate()
                .filter(|(_, c)| c.models_kind(kind) && !self.embedded.contains_key(&c.class_name))
                .map(|(i, _)| i)
                .collect();
            for idx in matching {
                self.embed_class(idx, embedder)?;
                added += 1;
            }
        }
        if added > 0 {
            tracing::debug!("Embedded {} node classes for newly observed kinds", added);
        }
        Ok(added)
    }

    #[inline]
    #[must_use]
    pub fn embedded_class_count(&self) -> usize {
        self.embedded.len()
    }

    #[must_use]
    pub fn is_embedded(&self, class_name: &str) -> bool {
        self.embedded.contains_key(class_name)
    }

    fn in_scope<S: AsRef<str>>(&self, class_name: &str, kinds: &[S]) -> bool {
        self.classes
            .iter()
            .find(|c| c.class_name == class_name)
            .is_some_and(|c| c.is_utility() || kinds.iter().any(|k| c.models_kind(k.as_ref())))
    }

    /// Ranked hits among utility classes and classes for `kinds`, at least
    /// `min_similarity`, deduplicated by fragment, at most `top_k`
    #[must_use]
    pub fn search<S: AsRef<str>>(
        &self,
        query: &[f32],
        kinds: &[S],
        top_k: usize,
        min_similarity: f32,
    ) -> Vec<RetrievalHit> {
        let mut scored: Vec<(f32, &CatalogEntry)> = self
            .embedded
            .iter()
            .filter(|(name, _)| self.in_scope(name, kinds))
            .flat_map(|(_, entries)| entries.iter())
            .filter_map(|e| cosine_similarity(query, &e.embedding).map(|s| (s, &e.entry)))
            .filter(|(s, _)| *s >= min_similarity)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut seen = IndexSet::new();
        scored
            .into_iter()
            .filter(|(_, e)| seen.insert(e.implementation_fragment.clone()))
            .take(top_k)
            .map(|(similarity, entry)| RetrievalHit {
                entry: entry.clone(),
                similarity,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ApiMethod;
    use crate::embed::HashingEmbedder;

    fn method(sig: &str, desc: &str) -> ApiMethod {
        ApiMethod {
            signature: sig.into(),
            description: Some(desc.into()),
        }
    }

    fn catalog() -> Vec<ApiClass> {
        vec![
            ApiClass {
                class_name: "ASTNumericLiteral".into(),
                methods: vec![method("boolean isIntLiteral()", "check whether literal is int")],
            },
            ApiClass {
                class_name: "ASTMethodDeclaration".into(),
                methods: vec![method("String getName()", "get method name")],
            },
            ApiClass {
                class_name: "JavaRuleUtil".into(),
                methods: vec![method("boolean isGetterCall(ASTMethodCall call)", "check getter call")],
            },
        ]
    }

    #[test]
    fn utility_classes_are_embedded_at_build() {
        let index = ApiIndex::build(catalog(), &HashingEmbedder::default()).unwrap();
        assert!(index.is_embedded("JavaRuleUtil"));
        assert!(!index.is_embedded("ASTNumericLiteral"));
    }

    #[test]
    fn ensure_kinds_embeds_once() {
        let embedder = HashingEmbedder::default();
        let mut index = ApiIndex::build(catalog(), &embedder).unwrap();
        assert_eq!(index.ensure_kinds(&["NumericLiteral"], &embedder).unwrap(), 1);
        assert_eq!(index.ensure_kinds(&["NumericLiteral"], &embedder).unwrap(), 0);
        assert!(index.is_embedded("ASTNumericLiteral"));
        assert_eq!(index.embedded_class_count(), 2);
    }

    #[test]
    fn search_is_scoped_to_kinds() {
        let embedder = HashingEmbedder::default();
        let mut index = ApiIndex::build(catalog(), &embedder).unwrap();
        index
            .ensure_kinds(&["NumericLiteral", "MethodDeclaration"], &embedder)
            .unwrap();

        let q = embedder.embed_one("get method name").unwrap();
        let scoped = index.search(&q, &["NumericLiteral"], 5, 0.0);
        assert!(scoped
            .iter()
            .all(|h| h.entry.operation_name != "String getName()"));

        let wide = index.search(&q, &["MethodDeclaration"], 5, 0.0);
        assert_eq!(wide[0].entry.operation_name, "String getName()");
    }

    #[test]
    fn search_respects_top_k_and_floor() {
        let embedder = HashingEmbedder::default();
        let index = ApiIndex::build(catalog(), &embedder).unwrap();
        let q = embedder.embed_one("check getter call").unwrap();
        assert_eq!(index.search(&q, &[] as &[&str], 0, 0.0).len(), 0);
        assert_eq!(index.search(&q, &[] as &[&str], 3, 1.1).len(), 0);
        assert_eq!(index.search(&q, &[] as &[&str], 3, 0.3).len(), 1);
    }
}
