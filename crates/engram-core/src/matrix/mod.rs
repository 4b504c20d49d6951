//! Matrix - the container graph for one index
//!
//! Owns every neuron and synapse plus the adjacency mirror. The engine and
//! searcher are borrowers: all access goes through the matrix-wide
//! reader/writer lock, with per-neuron fire state handled separately (see
//! [`neuron`]).

mod neuron;
mod synapse;

pub use neuron::{content_hash, Neuron};
pub use synapse::{synapse_id, Synapse};

pub(crate) use neuron::NeuronRecord;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Byte cap on a single neuron's content
pub const MAX_NEURON_CONTENT_BYTES: usize = 16 * 1024;

/// Synapses below this weight are invisible to the engine's own spread
pub const DEFAULT_LINK_THRESHOLD: f32 = 0.2;

/// Neuron-per-dimension density above which the matrix grows a dimension
pub(crate) const EXPANSION_DENSITY: f32 = 100.0;

/// Neuron-per-dimension density below which the matrix drops a dimension
pub(crate) const CONTRACTION_DENSITY: f32 = 10.0;

// ============================================================================
// BOUNDS
// ============================================================================

/// Capacity and dimension bounds for a matrix
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixBounds {
    /// Smallest allowed position dimension
    pub min_dim: usize,
    /// Largest allowed position dimension
    pub max_dim: usize,
    /// Lower neuron-count watermark (informational)
    pub min_neurons: usize,
    /// Neuron capacity; writes beyond it fail with `MatrixFull`
    pub max_neurons: usize,
}

impl Default for MatrixBounds {
    fn default() -> Self {
        Self {
            min_dim: 3,
            max_dim: 64,
            min_neurons: 0,
            max_neurons: 10_000,
        }
    }
}

// ============================================================================
// INNER STATE
// ============================================================================

/// Everything guarded by the matrix-wide reader/writer lock
#[derive(Debug)]
pub(crate) struct MatrixInner {
    pub current_dim: usize,
    pub neurons: HashMap<String, NeuronRecord>,
    pub synapses: HashMap<String, Synapse>,
    pub adjacency: HashMap<String, HashSet<String>>,
    pub link_threshold: f32,
    pub total_activations: u64,
    pub version: u64,
    pub last_activity: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl MatrixInner {
    /// Record a mutation: bump the version and refresh both instants
    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.modified_at = now;
        self.last_activity = now;
    }

    /// Look up the synapse joining two neurons, if any
    pub(crate) fn synapse_between(&self, a: &str, b: &str) -> Option<&Synapse> {
        self.synapses.get(&synapse_id(a, b))
    }
}

// ============================================================================
// MATRIX
// ============================================================================

/// The container graph for one logical index
#[derive(Debug)]
pub struct Matrix {
    index_id: String,
    bounds: MatrixBounds,
    pub(crate) inner: RwLock<MatrixInner>,
}

impl Matrix {
    /// Create a matrix with default bounds and link threshold
    pub fn new(index_id: impl Into<String>) -> Self {
        Self::with_bounds(index_id, MatrixBounds::default(), DEFAULT_LINK_THRESHOLD)
    }

    /// Create a matrix with explicit bounds and link threshold
    ///
    /// The initial dimension is `bounds.min_dim`; the link threshold is
    /// clamped into (0, 1].
    pub fn with_bounds(
        index_id: impl Into<String>,
        bounds: MatrixBounds,
        link_threshold: f32,
    ) -> Self {
        let now = Utc::now();
        Self {
            index_id: index_id.into(),
            bounds,
            inner: RwLock::new(MatrixInner {
                current_dim: bounds.min_dim.max(1),
                neurons: HashMap::new(),
                synapses: HashMap::new(),
                adjacency: HashMap::new(),
                link_threshold: link_threshold.clamp(f32::EPSILON, 1.0),
                total_activations: 0,
                version: 0,
                last_activity: now,
                modified_at: now,
            }),
        }
    }

    /// The index this matrix backs
    pub fn index_id(&self) -> &str {
        &self.index_id
    }

    /// Configured bounds
    pub fn bounds(&self) -> MatrixBounds {
        self.bounds
    }

    /// Current neuron count
    pub fn neuron_count(&self) -> usize {
        self.inner.read().neurons.len()
    }

    /// Current synapse count
    pub fn synapse_count(&self) -> usize {
        self.inner.read().synapses.len()
    }

    /// Current position dimension
    pub fn current_dim(&self) -> usize {
        self.inner.read().current_dim
    }
}

// ============================================================================
// STATS
// ============================================================================

/// Point-in-time statistics snapshot for one matrix
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixStats {
    /// The index this matrix backs
    pub index_id: String,
    /// Total neurons
    pub neuron_count: usize,
    /// Total synapses
    pub synapse_count: usize,
    /// Current position dimension
    pub current_dimension: usize,
    /// Neuron count per graph depth
    pub depth_distribution: BTreeMap<u32, usize>,
    /// Mean neuron energy
    pub average_energy: f32,
    /// Total read activations since creation
    pub total_activations: u64,
    /// Instant of the last read or write
    pub last_activity: DateTime<Utc>,
    /// Mutation counter
    pub version: u64,
    /// Every synapse weight, unordered
    pub synapse_weights: Vec<f32>,
    /// Mean synapse weight, 0 when there are no synapses
    pub average_synapse_weight: f32,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_matrix_starts_at_min_dim() {
        let matrix = Matrix::new("idx");
        assert_eq!(matrix.index_id(), "idx");
        assert_eq!(matrix.current_dim(), MatrixBounds::default().min_dim);
        assert_eq!(matrix.neuron_count(), 0);
        assert_eq!(matrix.synapse_count(), 0);
    }

    #[test]
    fn test_link_threshold_is_clamped() {
        let matrix = Matrix::with_bounds("idx", MatrixBounds::default(), 3.0);
        assert_eq!(matrix.inner.read().link_threshold, 1.0);

        let matrix = Matrix::with_bounds("idx", MatrixBounds::default(), 0.0);
        assert!(matrix.inner.read().link_threshold > 0.0);
    }

    #[test]
    fn test_touch_bumps_version_and_instants() {
        let matrix = Matrix::new("idx");
        let before = matrix.inner.read().version;

        let now = Utc::now() + chrono::Duration::seconds(5);
        matrix.inner.write().touch(now);

        let inner = matrix.inner.read();
        assert_eq!(inner.version, before + 1);
        assert_eq!(inner.modified_at, now);
        assert_eq!(inner.last_activity, now);
    }

    #[test]
    fn test_synapse_between_is_order_insensitive() {
        let matrix = Matrix::new("idx");
        {
            let mut inner = matrix.inner.write();
            let synapse = Synapse::new("a", "b", 0.6, Utc::now());
            inner.synapses.insert(synapse.id.clone(), synapse);
        }
        let inner = matrix.inner.read();
        assert!(inner.synapse_between("a", "b").is_some());
        assert!(inner.synapse_between("b", "a").is_some());
        assert!(inner.synapse_between("a", "c").is_none());
    }
}
