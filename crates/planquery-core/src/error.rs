//! Error taxonomy for the retrieval pipeline.
//!
//! Classification never raises — ambiguous input resolves to the
//! `Unknown`/`Other` variants instead. Everything else that can fail at
//! query time is typed here so callers can tell an empty index (fixable
//! by a rebuild) apart from a provider outage.

use thiserror::Error;

/// Failures of the vector index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The index holds zero chunks. Fatal for the current query;
    /// recoverable by running a build.
    #[error("vector index is empty — run a build first")]
    Empty,

    /// Stored vectors disagree with the pinned embedding model or the
    /// chunk/embedding counts do not line up. Requires a rebuild.
    #[error("vector index is corrupt: {0}")]
    Corrupt(String),

    /// Backend storage failure (I/O, SQL).
    #[error("index backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Failures of an embedding provider.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding provider error: {0}")]
    Provider(String),

    #[error("embedding provider returned no vectors")]
    EmptyResponse,

    #[error("embedding dims mismatch: expected {expected}, got {got}")]
    DimsMismatch { expected: usize, got: usize },
}

/// Failures of the retrieval path. Index errors propagate unchanged.
#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Embed(#[from] EmbedError),
}

/// Failures of the generation provider. The core performs no retries;
/// backoff policy belongs to the caller that owns network concerns.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation request timed out after {0}s")]
    Timeout(u64),

    #[error("generation provider rate limited the request")]
    RateLimited,

    #[error("generation provider auth/config error: {0}")]
    Auth(String),

    #[error("generation provider error: {0}")]
    Provider(String),

    #[error("malformed generation response: {0}")]
    MalformedResponse(String),
}
