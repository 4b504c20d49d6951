//! Embedder interface
//!
//! The engine depends only on this trait; the backing model (a native
//! GGUF-backed library in production) is loaded elsewhere and attached via
//! [`crate::Engine::set_embedder`]. Absence of an embedder is a first-class
//! state: the engine falls back to purely lexical scoring.

use crate::vector;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Embedding error types
#[non_exhaustive]
#[derive(Debug, Clone, thiserror::Error)]
pub enum EmbeddingError {
    /// Failed to initialize the embedding model
    #[error("model initialization failed: {0}")]
    ModelInit(String),
    /// Failed to generate an embedding
    #[error("embedding generation failed: {0}")]
    EmbeddingFailed(String),
    /// Invalid input (empty, too long, etc.)
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

// ============================================================================
// EMBEDDER INTERFACE
// ============================================================================

/// Maps text to a fixed-dimension dense vector
///
/// The output dimension is fixed for the process lifetime. Implementations
/// are shared process-wide across all matrices and must be internally
/// thread-safe.
pub trait Embedder: Send + Sync {
    /// Embed the given text
    fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Output dimension of every vector this embedder produces
    fn dimensions(&self) -> usize;
}

// ============================================================================
// HASHING EMBEDDER
// ============================================================================

/// Deterministic token-hashing embedder
///
/// Projects each whitespace token into a fixed-dimension bucket space by
/// content hash and L2-normalizes the result. Far weaker than a learned
/// model, but dependency-free, deterministic, and cheap. Used as the test
/// double and as a stand-in when no native embedder is available.
#[derive(Debug, Clone, Copy)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    /// Create a hashing embedder with the given output dimension
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

impl Embedder for HashEmbedder {
    fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("text is empty".to_string()));
        }

        let mut embedding = vec![0.0f32; self.dimensions];
        for token in text.split_whitespace() {
            let digest = blake3::hash(token.to_lowercase().as_bytes());
            let bytes = digest.as_bytes();
            let bucket = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize
                % self.dimensions;
            // Second hash byte decides the sign so unrelated tokens cancel
            // rather than accumulate.
            let sign = if bytes[4] & 1 == 0 { 1.0 } else { -1.0 };
            embedding[bucket] += sign;
        }

        vector::normalize(&mut embedding);
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::cosine_similarity;

    #[test]
    fn test_hash_embedder_is_deterministic() {
        let embedder = HashEmbedder::new(32);
        let a = embedder.embed_text("typescript programming").unwrap();
        let b = embedder.embed_text("typescript programming").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_hash_embedder_output_is_unit_norm() {
        let embedder = HashEmbedder::default();
        let v = embedder.embed_text("some sample content").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hash_embedder_shared_tokens_correlate() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed_text("rust memory engine").unwrap();
        let b = embedder.embed_text("rust memory model").unwrap();
        let c = embedder.embed_text("completely unrelated words").unwrap();
        assert!(cosine_similarity(&a, &b) > cosine_similarity(&a, &c));
    }

    #[test]
    fn test_hash_embedder_rejects_empty() {
        let embedder = HashEmbedder::default();
        assert!(matches!(
            embedder.embed_text("   "),
            Err(EmbeddingError::InvalidInput(_))
        ));
    }
}
