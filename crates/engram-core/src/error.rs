//! Error types surfaced by the memory engine

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Errors returned by engine operations
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Content is empty or whitespace-only after cleaning
    #[error("invalid content: {0}")]
    InvalidContent(String),
    /// Content exceeds the per-neuron byte cap
    #[error("content too large: {size} bytes exceeds cap of {max}")]
    ContentTooLarge {
        /// Size of the rejected content in bytes
        size: usize,
        /// Configured byte cap
        max: usize,
    },
    /// The matrix reached its neuron capacity
    #[error("matrix full: neuron capacity {capacity} reached")]
    MatrixFull {
        /// Configured neuron capacity
        capacity: usize,
    },
    /// No neuron with the given id
    #[error("neuron not found: {0}")]
    NeuronNotFound(String),
    /// Two vectors of unequal length where equal lengths are required
    #[error("dimension mismatch: {left} vs {right}")]
    DimensionMismatch {
        /// Length of the left operand
        left: usize,
        /// Length of the right operand
        right: usize,
    },
}

/// Engine result type
pub type Result<T> = std::result::Result<T, EngineError>;

// ============================================================================
// TESTS
// ============================================================================
