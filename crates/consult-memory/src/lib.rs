//! Retrieval over a remote similarity index.
//!
//! Provides the embedding client, the vector store client and the retrieval adapter
//! that turns a prompt plus the running conversation summary into a block of context
//! text for the next chat turn.
//!
//! # Main types
//!
//! - [`EmbeddingProvider`] — Trait for turning text into a fixed-length vector.
//! - [`OpenAiEmbedding`] — Embedding client for the OpenAI-compatible embeddings API.
//! - [`LocalEmbedding`] — Offline hashing embedding, used with the in-memory index.
//! - [`VectorStore`] — Trait for index stats and namespaced top-k queries.
//! - [`PineconeStore`] — REST client for a Pinecone index.
//! - [`InMemoryVectorStore`] — Brute-force cosine index for offline runs and tests.
//! - [`Retriever`] — The retrieval adapter; never fails, degrades to sentinel text.

/// Embedding provider trait and implementations.
pub mod embedding;
/// Retrieval adapter and sentinel texts.
pub mod retrieval;
/// Vector store trait and implementations.
pub mod store;

pub use embedding::{EmbeddingProvider, LocalEmbedding, OpenAiEmbedding};
pub use retrieval::{ContextEntry, Retrieval, Retriever};
pub use store::{
    IndexStats, InMemoryVectorStore, PineconeStore, QueryRequest, VectorMatch, VectorRecord,
    VectorStore,
};
