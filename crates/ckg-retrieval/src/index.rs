//! Two-tier resolution of checking steps

use std::sync::Arc;

use moka::sync::Cache;
use serde::{Deserialize, Serialize};

use crate::api::ApiIndex;
use crate::embed::{Embedder, Embedding};
use crate::error::RetrievalError;
use crate::meta::{MetaIndex, RetrievalHit, DEFAULT_META_THRESHOLD};

/// Retrieval tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Meta-tier similarity must be strictly above this
    pub meta_threshold: f32,
    /// Maximum API hits per step
    pub api_top_k: usize,
    /// API hits below this similarity are dropped
    pub api_min_similarity: f32,
    /// Cached query embeddings
    pub query_cache_capacity: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            meta_threshold: DEFAULT_META_THRESHOLD,
            api_top_k: 3,
            api_min_similarity: 0.5,
            query_cache_capacity: 1024,
        }
    }
}

/// Which tier produced a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Meta,
    Api,
    None,
}

/// Result of resolving one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub tier: Tier,
    pub hits: Vec<RetrievalHit>,
}

impl Resolution {
    #[must_use]
    pub fn none() -> Self {
        Self {
            tier: Tier::None,
            hits: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Meta tier first, API tier as fallback
pub struct RetrievalIndex {
    meta: Arc<MetaIndex>,
    api: ApiIndex,
    embedder: Arc<dyn Embedder>,
    queries: Cache<String, Arc<Embedding>>,
    config: RetrievalConfig,
}

impl std::fmt::Debug for RetrievalIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalIndex")
            .field("meta_entries", &self.meta.len())
            .field("api_classes", &self.api.embedded_class_count())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RetrievalIndex {
    #[must_use]
    pub fn new(
        meta: Arc<MetaIndex>,
        api: ApiIndex,
        embedder: Arc<dyn Embedder>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            meta,
            api,
            embedder,
            queries: Cache::new(config.query_cache_capacity),
            config,
        }
    }

    #[inline]
    #[must_use]
    pub fn meta(&self) -> &Arc<MetaIndex> {
        &self.meta
    }

    #[inline]
    #[must_use]
    pub fn api(&self) -> &ApiIndex {
        &self.api
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Make the API classes for newly observed node kinds searchable
    pub fn register_kinds<S: AsRef<str>>(&mut self, kinds: &[S]) -> Result<usize, RetrievalError> {
        self.api.ensure_kinds(kinds, self.embedder.as_ref())
    }

    fn query_embedding(&self, text: &str) -> Result<Arc<Embedding>, RetrievalError> {
        if let Some(hit) = self.queries.get(text) {
            return Ok(hit);
        }
        let embedding = Arc::new(self.embedder.embed_one(text)?);
        self.queries.insert(text.to_string(), Arc::clone(&embedding));
        Ok(embedding)
    }

    /// Resolve a natural-language step.
    ///
    /// Kinds that were never registered contribute no API classes.
    pub fn resolve<S: AsRef<str>>(
        &self,
        step: &str,
        kinds: &[S],
    ) -> Result<Resolution, RetrievalError> {
        let query = self.query_embedding(step.trim())?;

        if let Some(hit) = self.meta.best_match(&query, self.config.meta_threshold) {
            tracing::debug!(
                "Step '{}' matched meta operation '{}' ({:.3})",
                step,
                hit.entry.operation_name,
                hit.similarity
            );
            return Ok(Resolution {
                tier: Tier::Meta,
                hits: vec![hit],
            });
        }

        let hits = self.api.search(
            &query,
            kinds,
            self.config.api_top_k,
            self.config.api_min_similarity,
        );
        if hits.is_empty() {
            return Ok(Resolution::none());
        }
        tracing::debug!("Step '{}' resolved to {} API hits", step, hits.len());
        Ok(Resolution {
            tier: Tier::Api,
            hits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ApiClass, ApiMethod, CatalogEntry};
    use crate::embed::HashingEmbedder;

    fn index() -> RetrievalIndex {
        index_with(RetrievalConfig::default())
    }

    fn index_with(config: RetrievalConfig) -> RetrievalIndex {
        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::default());
        let meta = MetaIndex::build(
            vec![CatalogEntry::meta(
                "Check whether the literal is an octal literal",
                "node.getImage().startsWith(\"0\")",
            )],
            embedder.as_ref(),
        )
        .unwrap();
        let api = ApiIndex::build(
            vec![ApiClass {
                class_name: "ASTNumericLiteral".into(),
                methods: vec![ApiMethod {
                    signature: "int getBase()".into(),
                    description: Some("get the base of the numeric literal".into()),
                }],
            }],
            embedder.as_ref(),
        )
        .unwrap();
        RetrievalIndex::new(Arc::new(meta), api, embedder, config)
    }

    #[test]
    fn meta_tier_wins_when_confident() {
        let index = index();
        let res = index
            .resolve("Check whether the literal is an octal literal", &[] as &[&str])
            .unwrap();
        assert_eq!(res.tier, Tier::Meta);
        assert_eq!(res.hits.len(), 1);
    }

    #[test]
    fn meta_tier_follows_configured_threshold() {
        let index = index_with(RetrievalConfig {
            meta_threshold: 1.5,
            ..RetrievalConfig::default()
        });
        let res = index
            .resolve("Check whether the literal is an octal literal", &[] as &[&str])
            .unwrap();
        assert_eq!(res.tier, Tier::None);
    }

    #[test]
    fn api_tier_needs_registered_kind() {
        let mut index = index();
        let step = "get the base of the numeric literal";
        assert_eq!(index.resolve(step, &["NumericLiteral"]).unwrap().tier, Tier::None);

        index.register_kinds(&["NumericLiteral"]).unwrap();
        let res = index.resolve(step, &["NumericLiteral"]).unwrap();
        assert_eq!(res.tier, Tier::Api);
        assert_eq!(res.hits[0].entry.operation_name, "int getBase()");
    }

    #[test]
    fn repeated_queries_reuse_cached_embedding() {
        let index = index();
        let a = index.query_embedding("same step").unwrap();
        let b = index.query_embedding("same step").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
