//! Meta-operation tier
//!
//! Built once from the curated catalog and never mutated afterwards; share
//! it behind an `Arc`.

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogEntry;
use crate::embed::{cosine_similarity, Embedder, Embedding};
use crate::error::RetrievalError;

/// Similarity a meta-operation must strictly exceed to be used
pub const DEFAULT_META_THRESHOLD: f32 = 0.85;

/// A catalog entry matched against a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub entry: CatalogEntry,
    pub similarity: f32,
}

#[derive(Debug, Clone)]
pub struct MetaIndex {
    entries: Vec<CatalogEntry>,
    embeddings: Vec<Embedding>,
}

impl MetaIndex {
    /// Embed every entry by its operation name
    pub fn build(entries: Vec<CatalogEntry>, embedder: &dyn Embedder) -> Result<Self, RetrievalError> {
        let texts: Vec<&str> = entries.iter().map(|e| e.operation_name.as_str()).collect();
        let embeddings = embedder.embed(&texts)?;
        if embeddings.len() != entries.len() {
            return Err(RetrievalError::EmbeddingCount {
                expected: entries.len(),
                got: embeddings.len(),
            });
        }
        tracing::info!("Built meta index with {} operations", entries.len());
        Ok(Self { entries, embeddings })
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Operation names in catalog order; the decomposer's vocabulary
    pub fn operation_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|e| e.operation_name.as_str())
    }

    /// Highest-similarity entry overall, regardless of threshold
    #[must_use]
    pub fn nearest(&self, query: &[f32]) -> Option<RetrievalHit> {
        let mut best: Option<(usize, f32)> = None;
        for (idx, emb) in self.embeddings.iter().enumerate() {
            let Some(sim) = cosine_similarity(query, emb) else {
                continue;
            };
            if best.map_or(true, |(_, b)| sim > b) {
                best = Some((idx, sim));
            }
        }
        best.map(|(idx, similarity)| RetrievalHit {
            entry: self.entries[idx].clone(),
            similarity,
        })
    }

    /// Nearest entry, only if its similarity is strictly above `threshold`
    #[must_use]
    pub fn best_match(&self, query: &[f32], threshold: f32) -> Option<RetrievalHit> {
        self.nearest(query).filter(|hit| hit.similarity > threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Embeds the first entry as a fixed axis and everything else as a
    /// caller-chosen vector
    #[derive(Debug)]
    struct AxisEmbedder {
        query: Vec<f32>,
    }

    impl Embedder for AxisEmbedder {
        fn embed(&self, texts: &[&str]) -> Result<Vec<Embedding>, RetrievalError> {
            Ok(texts
                .iter()
                .map(|t| {
                    if t.starts_with("entry") {
                        vec![1.0, 0.0, 0.0, 0.0, 0.0]
                    } else {
                        self.query.clone()
                    }
                })
                .collect())
        }

        fn dimension(&self) -> usize {
            5
        }
    }

    fn index(query: Vec<f32>) -> (MetaIndex, Embedding) {
        let embedder = AxisEmbedder { query };
        let index = MetaIndex::build(vec![CatalogEntry::meta("entry op", "impl()")], &embedder).unwrap();
        let q = embedder.embed_one("query").unwrap();
        (index, q)
    }

    #[test]
    fn similarity_exactly_at_threshold_is_rejected() {
        // 17 / sqrt(17^2 + 10^2 + 3^2 + 1 + 1) = 17 / 20
        let (index, q) = index(vec![17.0, 10.0, 3.0, 1.0, 1.0]);
        let nearest = index.nearest(&q).unwrap();
        assert_eq!(nearest.similarity, 0.85_f32);
        assert!(index.best_match(&q, DEFAULT_META_THRESHOLD).is_none());
        assert!(index.best_match(&q, 0.84).is_some());
    }

    #[test]
    fn similarity_above_threshold_matches() {
        let (index, q) = index(vec![9.0, 1.0, 0.0, 0.0, 0.0]);
        let hit = index.best_match(&q, DEFAULT_META_THRESHOLD).unwrap();
        assert_eq!(hit.entry.implementation_fragment, "impl()");
    }

    #[test]
    fn zero_query_never_matches() {
        let (index, q) = index(vec![0.0; 5]);
        assert!(index.nearest(&q).is_none());
    }
}
