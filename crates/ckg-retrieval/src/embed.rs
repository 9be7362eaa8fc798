//! Text embedding
//!
//! The index only needs vectors it can compare with cosine similarity, so
//! the model sits behind [`Embedder`]. [`HashingEmbedder`] is the built-in
//! deterministic implementation: a signed feature-hashing bag of words.

use crate::error::RetrievalError;

/// Dense vector for one text
pub type Embedding = Vec<f32>;

/// Turns texts into embeddings, one vector per input, in input order
pub trait Embedder: Send + Sync + std::fmt::Debug {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Embedding>, RetrievalError>;

    fn dimension(&self) -> usize;

    /// Embed a single text
    fn embed_one(&self, text: &str) -> Result<Embedding, RetrievalError> {
        let mut out = self.embed(&[text])?;
        match out.pop() {
            Some(v) if out.is_empty() => Ok(v),
            _ => Err(RetrievalError::EmbeddingCount {
                expected: 1,
                got: out.len() + 1,
            }),
        }
    }
}

/// Cosine similarity of two vectors.
///
/// `None` for empty or mismatched inputs and for zero vectors.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0_f32, 0.0_f32, 0.0_f32);
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Feature-hashing embedder over lowercase word tokens
#[derive(Debug, Clone, Copy)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub const DEFAULT_DIM: usize = 256;

    #[inline]
    #[must_use]
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
        split_words(text).map(|t| t.to_lowercase())
    }

    fn embed_text(&self, text: &str) -> Embedding {
        let mut out = vec![0.0f32; self.dim];
        for token in Self::tokens(text) {
            let hash = blake3::hash(token.as_bytes());
            let bytes = hash.as_bytes();
            let mut word = [0u8; 8];
            word.copy_from_slice(&bytes[..8]);
            let bucket = usize::try_from(u64::from_le_bytes(word) % self.dim as u64).unwrap_or(0);
            let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
            out[bucket] += sign;
        }
        normalize(&mut out);
        out
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIM)
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Embedding>, RetrievalError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

/// Split on non-alphanumerics and on lower-to-upper camel-case boundaries,
/// so `getImage` and "get image" share tokens
fn split_words(text: &str) -> impl Iterator<Item = &str> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .flat_map(|word| {
            let mut parts = Vec::new();
            let mut start = 0;
            let mut prev_lower = false;
            for (i, c) in word.char_indices() {
                if c.is_uppercase() && prev_lower {
                    parts.push(&word[start..i]);
                    start = i;
                }
                prev_lower = c.is_lowercase() || c.is_ascii_digit();
            }
            parts.push(&word[start..]);
            parts
        })
}

fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm <= f32::EPSILON {
        return;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_handles_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), None);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), None);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), None);
    }

    #[test]
    fn cosine_of_parallel_vectors_is_one() {
        let sim = cosine_similarity(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn hashing_embedder_is_deterministic_and_normalised() {
        let embedder = HashingEmbedder::new(64);
        let a = embedder.embed_one("Get the image of a literal").unwrap();
        let b = embedder.embed_one("Get the image of a literal").unwrap();
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn camel_case_shares_tokens_with_words() {
        let embedder = HashingEmbedder::default();
        let camel = embedder.embed_one("getImage").unwrap();
        let words = embedder.embed_one("get image").unwrap();
        let sim = cosine_similarity(&camel, &words).unwrap();
        assert!((sim - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_text_has_no_similarity() {
        let embedder = HashingEmbedder::default();
        let empty = embedder.embed_one("  ").unwrap();
        let other = embedder.embed_one("literal").unwrap();
        assert_eq!(cosine_similarity(&empty, &other), None);
    }

    #[test]
    fn split_words_handles_acronyms() {
        let parts: Vec<&str> = split_words("ASTLiteral isIntLiteral").collect();
        assert_eq!(parts, vec!["ASTLiteral", "is", "Int", "Literal"]);
    }
}
