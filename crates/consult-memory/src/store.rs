use async_trait::async_trait;
use consult_core::{ConsultError, ConsultResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Index-wide statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub total_vector_count: u64,
}

/// Parameters of a similarity query.
#[derive(Debug, Clone)]
pub struct QueryRequest<'a> {
    pub vector: &'a [f32],
    pub namespace: &'a str,
    pub top_k: usize,
    pub include_metadata: bool,
}

/// A scored hit returned by the index, in the order the index ranked it.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl VectorMatch {
    /// The `text` metadata field, if present and a string.
    pub fn text(&self) -> Option<&str> {
        self.metadata.get("text").and_then(serde_json::Value::as_str)
    }
}

/// A vector stored in an index namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Trait for remote or local similarity indexes.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Index-wide statistics.
    async fn stats(&self) -> ConsultResult<IndexStats>;

    /// Top-k nearest matches within a namespace, most similar first.
    async fn query(&self, request: QueryRequest<'_>) -> ConsultResult<Vec<VectorMatch>>;
}

/// Which vector store implementation to build from config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreBackend {
    #[default]
    Pinecone,
    Memory,
}

/// `[vector_store]` section of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub provider: VectorStoreBackend,
    /// Index host, e.g. `https://corpus-xxxx.svc.us-east-1.pinecone.io`.
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// JSONL file of [`VectorRecord`]s loaded into the in-memory index.
    pub seed_file: Option<std::path::PathBuf>,
}

fn default_namespace() -> String {
    "pinecone".to_string()
}

fn default_top_k() -> usize {
    12
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            provider: VectorStoreBackend::default(),
            host: String::new(),
            api_key: String::new(),
            namespace: default_namespace(),
            top_k: default_top_k(),
            seed_file: None,
        }
    }
}

impl VectorStoreConfig {
    /// Build the configured store. The in-memory store is seeded from `seed_file`.
    pub async fn build(&self) -> ConsultResult<Arc<dyn VectorStore>> {
        match self.provider {
            VectorStoreBackend::Pinecone => {
                if self.host.is_empty() {
                    return Err(ConsultError::Config(
                        "vector_store.host is required for pinecone".to_string(),
                    ));
                }
                Ok(Arc::new(PineconeStore::new(&self.host, &self.api_key)))
            }
            VectorStoreBackend::Memory => {
                let store = InMemoryVectorStore::new();
                if let Some(path) = &self.seed_file {
                    let loaded = store.load_jsonl(path, &self.namespace).await?;
                    tracing::info!(path = %path.display(), loaded, "Seeded in-memory index");
                }
                Ok(Arc::new(store))
            }
        }
    }
}

/// REST client for a single Pinecone index.
pub struct PineconeStore {
    host: String,
    api_key: String,
    http: reqwest::Client,
}

impl PineconeStore {
    pub fn new(host: &str, api_key: &str) -> Self {
        Self {
            host: host.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http: reqwest::Client::new(),
        }
    }

    async fn post(&self, endpoint: &str, body: serde_json::Value) -> ConsultResult<serde_json::Value> {
        let url = format!("{}/{endpoint}", self.host);
        let resp = self
            .http
            .post(&url)
            .header("Api-Key", &self.api_key)
            .header("Content-Type", "application/json")
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
            return Err(ConsultError::VectorStore(format!(
                "{endpoint} failed with {status}: {resp_body}"
            )));
        }

        Ok(resp_body)
    }
}

#[async_trait]
impl VectorStore for PineconeStore {
    async fn stats(&self) -> ConsultResult<IndexStats> {
        let body = self
            .post("describe_index_stats", serde_json::json!({}))
            .await?;
        let total_vector_count = body["totalVectorCount"]
            .as_u64()
            .ok_or_else(|| ConsultError::VectorStore("stats missing totalVectorCount".into()))?;
        Ok(IndexStats { total_vector_count })
    }

    async fn query(&self, request: QueryRequest<'_>) -> ConsultResult<Vec<VectorMatch>> {
        let body = self
            .post(
                "query",
                serde_json::json!({
                    "namespace": request.namespace,
                    "vector": request.vector,
                    "topK": request.top_k,
                    "includeValues": false,
                    "includeMetadata": request.include_metadata,
                }),
            )
            .await?;

        let matches = body["matches"].as_array().cloned().unwrap_or_default();
        Ok(matches
            .into_iter()
            .map(|m| VectorMatch {
                id: m["id"].as_str().unwrap_or_default().to_string(),
                score: m["score"].as_f64().unwrap_or_default() as f32,
                metadata: m["metadata"]
                    .as_object()
                    .map(|obj| obj.clone().into_iter().collect())
                    .unwrap_or_default(),
            })
            .collect())
    }
}

/// In-memory namespaced index using brute-force cosine similarity.
pub struct InMemoryVectorStore {
    namespaces: RwLock<HashMap<String, Vec<VectorRecord>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            namespaces: RwLock::new(HashMap::new()),
        }
    }

    /// Insert a record into a namespace.
    pub async fn insert(&self, namespace: &str, record: VectorRecord) {
        self.namespaces
            .write()
            .await
            .entry(namespace.to_string())
            .or_default()
            .push(record);
    }

    /// Load one [`VectorRecord`] per line into `namespace`. Returns how many were loaded.
    pub async fn load_jsonl(&self, path: &std::path::Path, namespace: &str) -> ConsultResult<usize> {
        let data = tokio::fs::read_to_string(path).await?;
        let mut loaded = 0;
        for line in data.lines().filter(|l| !l.trim().is_empty()) {
            let record: VectorRecord = serde_json::from_str(line)?;
            self.insert(namespace, record).await;
            loaded += 1;
        }
        Ok(loaded)
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn stats(&self) -> ConsultResult<IndexStats> {
        let namespaces = self.namespaces.read().await;
        let total = namespaces.values().map(Vec::len).sum::<usize>();
        Ok(IndexStats {
            total_vector_count: total as u64,
        })
    }

    async fn query(&self, request: QueryRequest<'_>) -> ConsultResult<Vec<VectorMatch>> {
        if request.vector.is_empty() {
            return Err(ConsultError::VectorStore("empty query vector".to_string()));
        }

        let namespaces = self.namespaces.read().await;
        let Some(records) = namespaces.get(request.namespace) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<VectorMatch> = records
            .iter()
            .map(|r| VectorMatch {
                id: r.id.clone(),
                score: cosine_similarity(request.vector, &r.values),
                metadata: if request.include_metadata {
                    r.metadata.clone()
                } else {
                    HashMap::new()
                },
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(request.top_k);

        Ok(scored)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}
