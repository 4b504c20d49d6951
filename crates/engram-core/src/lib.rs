//! # Engram Core
//!
//! In-process associative memory engine. Content lives in a graph of
//! neurons joined by weighted synapses, and retrieval blends several
//! signals instead of trusting any single one:
//!
//! - **Hybrid scoring**: lexical evidence (substring, token overlap,
//!   bounded edit distance) fused with embedding cosine similarity
//! - **Spread activation**: results recruit their graph neighbors with
//!   weight-scaled, hop-decayed scores
//! - **Brain modifiers**: per-neuron energy, recency, access frequency,
//!   and depth shape the ranking
//! - **Sentiment alignment**: queries and neurons carry seven-label
//!   sentiment; matching affect boosts, opposing affect dampens
//! - **Adaptive dimensionality**: neuron positions grow and shrink with
//!   graph density inside configured bounds
//!
//! The embedder and sentiment scorer are optional collaborators behind
//! traits; the engine degrades to purely lexical search without them.
//!
//! ## Quick Start
//!
//! ```rust
//! use engram_core::{Engine, Matrix};
//!
//! let engine = Engine::new(Matrix::new("notes"));
//!
//! let neuron = engine
//!     .add_neuron("The quick brown fox", None, None)
//!     .expect("write succeeds");
//!
//! let results = engine.search("quick brown", 0, 10, None, false);
//! assert_eq!(results[0].id, neuron.id);
//! ```
//!
//! ## Concurrency
//!
//! A matrix-wide reader/writer lock guards the graph tables; per-neuron
//! fire state lives in atomics so reads never block writers. Searches
//! score and rank under the read-lock, release it, and only then fire the
//! surviving neurons. Holding a neuron gate while readers queue in front
//! of a writer is the one ordering this crate must never produce.

#![cfg_attr(docsrs, feature(doc_cfg))]
// Only warn about missing docs for public items exported from the crate root
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod embedding;
pub mod engine;
pub mod error;
pub mod matrix;
pub mod search;
pub mod sentiment;
pub mod text;
pub mod time;
pub mod vector;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Engine facade
pub use engine::Engine;

// Matrix data model
pub use matrix::{
    content_hash, synapse_id, Matrix, MatrixBounds, MatrixStats, Neuron, Synapse,
    DEFAULT_LINK_THRESHOLD, MAX_NEURON_CONTENT_BYTES,
};

// Errors
pub use error::{EngineError, Result};

// Search
pub use search::{bounded_levenshtein, edit_similarity, Searcher};

// Collaborator interfaces
pub use embedding::{Embedder, EmbeddingError, HashEmbedder};
pub use sentiment::{LexiconClassifier, SentimentClassifier, SentimentLabel, SentimentResult};

// Clock injection
pub use time::{Clock, ManualClock, SystemClock};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        Clock, Embedder, Engine, EngineError, Matrix, MatrixBounds, MatrixStats, Neuron,
        Result, SentimentClassifier, SentimentLabel, Synapse,
    };
}
