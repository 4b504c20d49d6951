//! Synapse - a weighted undirected edge between two neurons

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// SYNAPSE ID
// ============================================================================

/// Derive the canonical synapse id for an unordered pair of neuron ids
///
/// The pair is sorted before joining, so `synapse_id(a, b)` and
/// `synapse_id(b, a)` are equal.
pub fn synapse_id(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}::{b}")
    } else {
        format!("{b}::{a}")
    }
}

// ============================================================================
// SYNAPSE
// ============================================================================

/// A weighted undirected edge between two neurons
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Synapse {
    /// Canonical id derived from the endpoint pair
    pub id: String,
    /// First endpoint as supplied at creation
    pub from_id: String,
    /// Second endpoint as supplied at creation
    pub to_id: String,
    /// Connection weight in [0, 1]; external decay daemons may reduce it
    pub weight: f32,
    /// When the synapse was created
    pub created_at: DateTime<Utc>,
}

impl Synapse {
    /// Create a synapse between two neurons, clamping the weight to [0, 1]
    pub fn new(from_id: &str, to_id: &str, weight: f32, now: DateTime<Utc>) -> Self {
        Self {
            id: synapse_id(from_id, to_id),
            from_id: from_id.to_string(),
            to_id: to_id.to_string(),
            weight: weight.clamp(0.0, 1.0),
            created_at: now,
        }
    }

    /// The endpoint opposite to `id`, or `None` when `id` is not an endpoint
    pub fn other_end(&self, id: &str) -> Option<&str> {
        if self.from_id == id {
            Some(&self.to_id)
        } else if self.to_id == id {
            Some(&self.from_id)
        } else {
            None
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
