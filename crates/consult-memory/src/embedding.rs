use async_trait::async_trait;
use consult_core::{ConsultError, ConsultResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Trait for computing text embeddings (vector representations).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Compute the embedding vector for a single text.
    async fn embed(&self, text: &str) -> ConsultResult<Vec<f32>>;

    /// Dimension of the vectors produced by this provider, when known up front.
    fn dimension(&self) -> Option<usize>;
}

/// Which embedding implementation to build from config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    #[default]
    OpenAi,
    Local,
}

/// `[embedding]` section of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingBackend,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    pub api_base_url: Option<String>,
    /// Requested output dimension; only sent for models that accept it.
    pub dimension: Option<usize>,
}

fn default_embedding_model() -> String {
    "text-embedding-3-large".to_string()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingBackend::default(),
            model: default_embedding_model(),
            api_key: String::new(),
            api_base_url: None,
            dimension: None,
        }
    }
}

impl EmbeddingConfig {
    /// Build the configured provider.
    pub fn build(&self) -> Arc<dyn EmbeddingProvider> {
        match self.provider {
            EmbeddingBackend::OpenAi => Arc::new(OpenAiEmbedding::new(self.clone())),
            EmbeddingBackend::Local => {
                Arc::new(LocalEmbedding::new(self.dimension.unwrap_or(256)))
            }
        }
    }
}

/// Embedding client for `POST {base}/v1/embeddings`.
///
/// Works with OpenAI and any server exposing the same request/response shape.
pub struct OpenAiEmbedding {
    config: EmbeddingConfig,
    http: reqwest::Client,
}

impl OpenAiEmbedding {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn base_url(&self) -> &str {
        self.config
            .api_base_url
            .as_deref()
            .unwrap_or("https://api.openai.com")
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> ConsultResult<Vec<f32>> {
        if self.config.api_key.is_empty() {
            return Err(ConsultError::Embedding(
                "embedding API key is not configured".to_string(),
            ));
        }

        let url = format!("{}/v1/embeddings", self.base_url());
        let mut body = serde_json::json!({
            "model": self.config.model,
            "input": text,
        });
        if let Some(dimension) = self.config.dimension {
            body["dimensions"] = serde_json::json!(dimension);
        }

        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| ConsultError::Http(e.to_string()))?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ConsultError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(ConsultError::Embedding(format!(
                "embeddings API error {status}: {resp_body}"
            )));
        }

        let values = resp_body["data"][0]["embedding"]
            .as_array()
            .ok_or_else(|| {
                ConsultError::Embedding("response carried no embedding".to_string())
            })?;

        values
            .iter()
            .map(|v| {
                v.as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| ConsultError::Embedding("non-numeric component".to_string()))
            })
            .collect()
    }

    fn dimension(&self) -> Option<usize> {
        self.config.dimension
    }
}

/// Offline bag-of-words embedding hashed into a fixed number of buckets.
///
/// Lets the whole pipeline run against the in-memory index without network access.
pub struct LocalEmbedding {
    dimension: usize,
}

impl LocalEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }
}

impl Default for LocalEmbedding {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedding {
    async fn embed(&self, text: &str) -> ConsultResult<Vec<f32>> {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 1)
            .collect();

        if words.is_empty() {
            return Err(ConsultError::Embedding(
                "text has no embeddable words".to_string(),
            ));
        }

        let mut freq: HashMap<&str, f32> = HashMap::new();
        for word in &words {
            *freq.entry(word).or_insert(0.0) += 1.0;
        }

        let total = words.len() as f32;
        let mut vector = vec![0.0f32; self.dimension];
        for (word, count) in &freq {
            let bucket = fnv1a(word.as_bytes()) as usize % self.dimension;
            vector[bucket] += count / total;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Ok(vector)
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dimension)
    }
}

fn fnv1a(data: &[u8]) -> u32 {
    let mut hash: u32 = 2_166_136_261;
    for &byte in data {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(16_777_619);
    }
    hash
}
