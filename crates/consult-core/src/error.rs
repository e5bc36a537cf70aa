use thiserror::Error;

/// A convenience `Result` alias using [`ConsultError`].
pub type ConsultResult<T> = Result<T, ConsultError>;

/// Top-level error type.
///
/// Each variant corresponds to a subsystem that can produce errors. Retrieval and
/// oracle adapters absorb their errors into sentinel text; only the variants raised
/// by file persistence are expected to reach the caller of a session.
#[derive(Error, Debug)]
pub enum ConsultError {
    /// An outbound HTTP request failed or returned a non-success status.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The embedding service returned no usable vector.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// The vector index rejected a stats or query call.
    #[error("Vector store error: {0}")]
    VectorStore(String),

    /// A chat or summarization model call failed.
    #[error("Model error: {0}")]
    Model(String),

    /// Session bookkeeping (transcript, activity log) failed.
    #[error("Session error: {0}")]
    Session(String),

    /// Writing or rendering a report artifact failed.
    #[error("Report error: {0}")]
    Report(String),

    /// Configuration parsing or validation failed.
    #[error("Config error: {0}")]
    Config(String),

    /// The HTTP/WebSocket transport failed.
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
