//! Embedding provider trait and vector utilities.
//!
//! Defines the [`Embedder`] trait implemented by all embedding backends,
//! plus pure helpers for vector serialization and similarity. The same
//! pinned model must be used at index time and query time — the index
//! records its model name and dims so a mismatch is caught on open.
//!
//! Concrete providers (OpenAI, Ollama, the deterministic hash embedder)
//! live in the `planquery` app crate.

use async_trait::async_trait;

use crate::error::EmbedError;

/// An embedding backend pinned to one model version.
///
/// `embed` must be deterministic for a given model version: the same
/// text always yields the same vector, so rebuilds are reproducible and
/// query vectors are comparable with indexed ones.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;
}

/// Embed a single query text.
///
/// Convenience wrapper for the query path; also checks that the
/// returned vector has the provider's declared dimensionality.
pub async fn embed_query(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>, EmbedError> {
    let vectors = embedder.embed(&[text.to_string()]).await?;
    let vector = vectors.into_iter().next().ok_or(EmbedError::EmptyResponse)?;
    if vector.len() != embedder.dims() {
        return Err(EmbedError::DimsMismatch {
            expected: embedder.dims(),
            got: vector.len(),
        });
    }
    Ok(vector)
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// Each `f32` is stored as 4 bytes in little-endian order, producing a
/// BLOB of `vec.len() × 4` bytes.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector. Reverses [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`; `0.0` for empty vectors or vectors
/// of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Map raw cosine similarity onto `[0.0, 1.0]`.
///
/// All retrieval scores use this scale so they are comparable across
/// calls within one build generation: `1.0` = identical direction,
/// `0.5` = orthogonal, `0.0` = opposite.
pub fn unit_similarity(a: &[f32], b: &[f32]) -> f64 {
    (1.0 + f64::from(cosine_similarity(a, b))) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        let restored = blob_to_vec(&blob);
        assert_eq!(vec, restored);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        let sim = cosine_similarity(&a, &b);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_empty_and_mismatched() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_unit_similarity_bounds() {
        let a = vec![1.0, 0.0];
        assert!((unit_similarity(&a, &a) - 1.0).abs() < 1e-6);
        assert!((unit_similarity(&a, &[-1.0, 0.0]) - 0.0).abs() < 1e-6);
        assert!((unit_similarity(&a, &[0.0, 1.0]) - 0.5).abs() < 1e-6);
    }
}
