//! OpenAI-compatible embeddings client
//!
//! Retrieval is synchronous, so requests go through reqwest's blocking
//! client. That client panics when driven from an async runtime thread;
//! every batch therefore runs on a short-lived scoped thread.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use ckg_retrieval::{Embedder, Embedding, RetrievalError};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::oracle::truncate;

pub const DEFAULT_EMBEDDINGS_ENDPOINT: &str = "https://api.openai.com/v1/embeddings";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding model. Unset keeps the offline hashing embedder.
    pub model: Option<String>,
    /// Base URL or full `/embeddings` URL
    pub endpoint: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Requested vector size; also the hashing embedder's size
    pub dimensions: Option<usize>,
    /// Texts per request
    pub batch_size: usize,
    pub request_timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: None,
            endpoint: None,
            api_key_env: crate::oracle::DEFAULT_API_KEY_ENV.to_string(),
            dimensions: None,
            batch_size: 128,
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

impl EmbeddingResponse {
    /// Vectors in input order
    fn into_vectors(mut self, expected: usize) -> Result<Vec<Embedding>, RetrievalError> {
        if self.data.len() != expected {
            return Err(RetrievalError::EmbeddingCount {
                expected,
                got: self.data.len(),
            });
        }
        self.data.sort_by_key(|d| d.index);
        let width = self.data.first().map_or(0, |d| d.embedding.len());
        if self.data.iter().any(|d| d.embedding.len() != width) {
            return Err(RetrievalError::Embedding(
                "response mixes vector dimensions".into(),
            ));
        }
        Ok(self.data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Embedder backed by a remote embeddings model
#[derive(Debug)]
pub struct OpenAiEmbedder {
    url: String,
    model: String,
    api_key: String,
    settings: EmbeddingSettings,
    dimension: AtomicUsize,
}

impl OpenAiEmbedder {
    /// Build a client, reading the API key from `settings.api_key_env`
    pub fn from_env(settings: EmbeddingSettings) -> Result<Self, RetrievalError> {
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                RetrievalError::Embedding(format!("{} is not set", settings.api_key_env))
            })?;
        Self::with_api_key(settings, api_key)
    }

    pub fn with_api_key(
        settings: EmbeddingSettings,
        api_key: impl Into<String>,
    ) -> Result<Self, RetrievalError> {
        let model = settings
            .model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| RetrievalError::Embedding("no embedding model configured".into()))?;
        Ok(Self {
            url: resolve_embeddings_endpoint(settings.endpoint.as_deref()),
            model,
            api_key: api_key.into(),
            dimension: AtomicUsize::new(settings.dimensions.unwrap_or(0)),
            settings,
        })
    }

    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    fn payload(&self, texts: &[&str]) -> Value {
        let mut payload = json!({
            "model": self.model,
            "input": texts,
        });
        if let Some(dimensions) = self.settings.dimensions {
            payload["dimensions"] = json!(dimensions);
        }
        payload
    }

    fn request(&self, texts: &[&str]) -> Result<Vec<Embedding>, RetrievalError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(self.settings.request_timeout_secs))
            .build()
            .map_err(|e| RetrievalError::Embedding(format!("failed to build HTTP client: {e}")))?;
        tracing::debug!("POST {} ({} texts)", self.url, texts.len());
        let response = client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&self.payload(texts))
            .send()
            .map_err(|e| RetrievalError::Embedding(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            return Err(RetrievalError::Embedding(format!(
                "HTTP {}: {}",
                status,
                truncate(&body, 320)
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .map_err(|e| RetrievalError::Embedding(format!("invalid response: {e}")))?;
        body.into_vectors(texts.len())
    }
}

impl Embedder for OpenAiEmbedder {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Embedding>, RetrievalError> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.settings.batch_size.max(1)) {
            let vectors = std::thread::scope(|s| s.spawn(|| self.request(batch)).join())
                .map_err(|_| RetrievalError::Embedding("embedding request panicked".into()))??;
            out.extend(vectors);
        }
        if let Some(first) = out.first() {
            self.dimension.store(first.len(), Ordering::Relaxed);
        }
        Ok(out)
    }

    /// Configured size until the first response, then the observed size
    fn dimension(&self) -> usize {
        self.dimension.load(Ordering::Relaxed)
    }
}

fn resolve_embeddings_endpoint(endpoint: Option<&str>) -> String {
    let endpoint = endpoint.unwrap_or(DEFAULT_EMBEDDINGS_ENDPOINT);
    if endpoint.contains("/embeddings") {
        endpoint.to_string()
    } else {
        format!("{}/embeddings", endpoint.trim_end_matches('/'))
    }
}
