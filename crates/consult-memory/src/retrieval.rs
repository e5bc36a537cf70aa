use crate::embedding::EmbeddingProvider;
use crate::store::{QueryRequest, VectorStore};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Substituted when the combined query could not be embedded.
pub const EMBEDDING_FAILED: &str = "Error generating embedding for query";
/// Substituted when the index holds no vectors at all.
pub const INDEX_EMPTY: &str = "Pinecone index is empty";
/// Substituted when the query returned zero matches.
pub const NO_MATCHES: &str = "No relevant information found in vector database";
/// Prefix of the text substituted when the store query failed.
pub const STORE_FAILED_PREFIX: &str = "Error retrieving relevant information";
/// Used for matches whose metadata has no `text` field.
pub const MISSING_TEXT: &str = "No text available";

/// One retrieved passage.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextEntry {
    pub score: f32,
    pub text: String,
}

/// Outcome of a retrieval. Every variant renders to text that is handed to the
/// chat model as context; none of them is fatal.
#[derive(Debug, Clone, PartialEq)]
pub enum Retrieval {
    /// Matches in the order the index returned them.
    Matches(Vec<ContextEntry>),
    EmbeddingFailed,
    IndexEmpty,
    NoMatches,
    StoreFailed(String),
}

impl Retrieval {
    /// Render as the context block substituted into the next prompt.
    pub fn to_context_text(&self) -> String {
        match self {
            Retrieval::Matches(entries) => entries
                .iter()
                .map(|e| format!("Score: {}, Text: {}\n\n", e.score, e.text))
                .collect(),
            Retrieval::EmbeddingFailed => EMBEDDING_FAILED.to_string(),
            Retrieval::IndexEmpty => INDEX_EMPTY.to_string(),
            Retrieval::NoMatches => NO_MATCHES.to_string(),
            Retrieval::StoreFailed(reason) => format!("{STORE_FAILED_PREFIX}: {reason}"),
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, Retrieval::Matches(_))
    }
}

/// The retrieval adapter: prompt + running summary in, context text out.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    namespace: String,
    top_k: usize,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        namespace: impl Into<String>,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            namespace: namespace.into(),
            top_k,
        }
    }

    /// Combined query string: prompt and summary joined, outer whitespace trimmed.
    pub fn combined_query(query_text: &str, summary: &str) -> String {
        format!("{query_text}\n\nContext: {summary}").trim().to_string()
    }

    /// Retrieve context for `query_text` and `summary` as prompt-ready text.
    pub async fn retrieve(&self, query_text: &str, summary: &str) -> String {
        self.lookup(query_text, summary).await.to_context_text()
    }

    /// Typed form of [`Retriever::retrieve`].
    pub async fn lookup(&self, query_text: &str, summary: &str) -> Retrieval {
        let combined = Self::combined_query(query_text, summary);
        debug!(
            preview = %combined.chars().take(100).collect::<String>(),
            "Generating embedding for combined query"
        );

        let vector = match self.embedder.embed(&combined).await {
            Ok(v) => v,
            Err(e) => {
                error!(error = %e, "Error generating embedding");
                return Retrieval::EmbeddingFailed;
            }
        };

        match self.store.stats().await {
            Ok(stats) if stats.total_vector_count == 0 => {
                warn!("Vector index is empty");
                return Retrieval::IndexEmpty;
            }
            Ok(_) => {}
            // Unknown emptiness is not treated as empty; the query decides.
            Err(e) => error!(error = %e, "Error checking index stats"),
        }

        let request = QueryRequest {
            vector: &vector,
            namespace: &self.namespace,
            top_k: self.top_k,
            include_metadata: true,
        };

        match self.store.query(request).await {
            Ok(matches) if matches.is_empty() => {
                warn!(namespace = %self.namespace, "No matches found in vector query");
                Retrieval::NoMatches
            }
            Ok(matches) => {
                info!(count = matches.len(), "Vector query completed");
                Retrieval::Matches(
                    matches
                        .iter()
                        .map(|m| ContextEntry {
                            score: m.score,
                            text: m.text().unwrap_or(MISSING_TEXT).to_string(),
                        })
                        .collect(),
                )
            }
            Err(e) => {
                error!(error = %e, "Error querying vector index");
                Retrieval::StoreFailed(e.to_string())
            }
        }
    }
}
