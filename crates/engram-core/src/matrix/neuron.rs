//! Neuron - the content node of the matrix
//!
//! Two representations: [`Neuron`] is the plain snapshot handed to callers,
//! and [`NeuronRecord`] is the stored form whose hot fire state lives in
//! lock-free atomics behind an `Arc` so searchers can fire neurons after
//! releasing the matrix read-lock.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use crate::sentiment::SentimentLabel;

/// Energy added by a single fire; external decay daemons pull it back down
pub(crate) const FIRE_ENERGY_STEP: f32 = 0.1;

// ============================================================================
// SNAPSHOT
// ============================================================================

/// A neuron snapshot
///
/// Plain values only; holds no locks and no references into the matrix.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Neuron {
    /// Unique identifier (UUID v4)
    pub id: String,
    /// Cleaned content text
    pub content: String,
    /// Stable digest of `content`; drives duplicate detection and token
    /// cache invalidation
    pub content_hash: String,
    /// Organic position in [-1, 1] per coordinate; length equals the
    /// matrix dimension
    pub position: Vec<f32>,
    /// Unit-norm dense vector, or empty when no embedder produced one
    pub embedding: Vec<f32>,
    /// Sentiment label, or `None` when no classifier ran
    pub sentiment_label: Option<SentimentLabel>,
    /// Compound sentiment polarity in [-1, 1]
    pub sentiment_score: f32,
    /// Activation energy in [0, 1]
    pub energy: f32,
    /// Graph depth; surface neurons are 0
    pub depth: u32,
    /// Number of times this neuron fired
    pub access_count: u64,
    /// When the neuron was created
    pub created_at: DateTime<Utc>,
    /// When the neuron last fired
    pub last_fired_at: DateTime<Utc>,
    /// Free-form string metadata
    pub metadata: HashMap<String, String>,
}

// ============================================================================
// FIRE STATE
// ============================================================================

/// Per-neuron mutable hot state
///
/// `energy`, `access_count`, and `last_fired_at` are atomics so scoring can
/// read them under the matrix read-lock without touching the per-neuron
/// mutex; the mutex only serializes composite updates. A thread holding the
/// matrix read-lock must never block on this mutex, or queued matrix
/// writers can deadlock the read side.
#[derive(Debug)]
pub(crate) struct FireState {
    gate: Mutex<()>,
    energy_bits: AtomicU32,
    access_count: AtomicU64,
    last_fired_ms: AtomicI64,
}

impl FireState {
    pub(crate) fn new(now: DateTime<Utc>) -> Self {
        Self {
            gate: Mutex::new(()),
            energy_bits: AtomicU32::new(0.5f32.to_bits()),
            access_count: AtomicU64::new(0),
            last_fired_ms: AtomicI64::new(now.timestamp_millis()),
        }
    }

    /// Record an access: bump `access_count`, refresh `last_fired_at`, and
    /// raise energy monotonically, saturating at 1.0
    pub(crate) fn fire(&self, now: DateTime<Utc>) {
        let _gate = self.gate.lock();
        let energy = f32::from_bits(self.energy_bits.load(Ordering::Acquire));
        let raised = (energy + FIRE_ENERGY_STEP).min(1.0);
        self.energy_bits.store(raised.to_bits(), Ordering::Release);
        self.access_count.fetch_add(1, Ordering::AcqRel);
        self.last_fired_ms
            .store(now.timestamp_millis(), Ordering::Release);
    }

    /// Hold the per-neuron gate across a content swap
    pub(crate) fn lock_gate(&self) -> MutexGuard<'_, ()> {
        self.gate.lock()
    }

    pub(crate) fn energy(&self) -> f32 {
        f32::from_bits(self.energy_bits.load(Ordering::Acquire))
    }

    pub(crate) fn access_count(&self) -> u64 {
        self.access_count.load(Ordering::Acquire)
    }

    pub(crate) fn last_fired_at(&self) -> DateTime<Utc> {
        let ms = self.last_fired_ms.load(Ordering::Acquire);
        DateTime::from_timestamp_millis(ms).unwrap_or_else(Utc::now)
    }
}

// ============================================================================
// STORED RECORD
// ============================================================================

/// The stored form of a neuron inside the matrix tables
#[derive(Debug)]
pub(crate) struct NeuronRecord {
    pub id: String,
    pub content: String,
    pub content_hash: String,
    pub position: Vec<f32>,
    pub embedding: Vec<f32>,
    pub sentiment_label: Option<SentimentLabel>,
    pub sentiment_score: f32,
    pub depth: u32,
    pub created_at: DateTime<Utc>,
    pub metadata: HashMap<String, String>,
    pub fire: Arc<FireState>,
}

impl NeuronRecord {
    pub(crate) fn new(content: String, position: Vec<f32>, depth: u32, now: DateTime<Utc>) -> Self {
        let content_hash = content_hash(&content);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content,
            content_hash,
            position,
            embedding: Vec::new(),
            sentiment_label: None,
            sentiment_score: 0.0,
            depth,
            created_at: now,
            metadata: HashMap::new(),
            fire: Arc::new(FireState::new(now)),
        }
    }

    /// Copy out a plain snapshot, reading the fire atomics
    pub(crate) fn snapshot(&self) -> Neuron {
        Neuron {
            id: self.id.clone(),
            content: self.content.clone(),
            content_hash: self.content_hash.clone(),
            position: self.position.clone(),
            embedding: self.embedding.clone(),
            sentiment_label: self.sentiment_label,
            sentiment_score: self.sentiment_score,
            energy: self.fire.energy(),
            depth: self.depth,
            access_count: self.fire.access_count(),
            created_at: self.created_at,
            last_fired_at: self.fire.last_fired_at(),
            metadata: self.metadata.clone(),
        }
    }
}

/// Stable digest of neuron content
pub fn content_hash(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fire_bumps_state() {
        let start = Utc::now();
        let state = FireState::new(start);
        let initial_energy = state.energy();

        let later = start + chrono::Duration::minutes(5);
        state.fire(later);

        assert_eq!(state.access_count(), 1);
        assert!((state.energy() - (initial_energy + FIRE_ENERGY_STEP)).abs() < 1e-6);
        assert_eq!(state.last_fired_at().timestamp_millis(), later.timestamp_millis());
    }

    #[test]
    fn test_fire_energy_saturates_at_one() {
        let state = FireState::new(Utc::now());
        for _ in 0..50 {
            state.fire(Utc::now());
        }
        assert!(state.energy() <= 1.0);
        assert!((state.energy() - 1.0).abs() < 1e-6);
        assert_eq!(state.access_count(), 50);
    }

    #[test]
    fn test_fire_is_serializable_across_threads() {
        let state = Arc::new(FireState::new(Utc::now()));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let state = Arc::clone(&state);
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    state.fire(Utc::now());
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(state.access_count(), 800);
        assert!(state.energy() <= 1.0);
    }

    #[test]
    fn test_snapshot_copies_fire_state() {
        let now = Utc::now();
        let record = NeuronRecord::new("hello world".to_string(), vec![0.0, 0.0, 0.0], 0, now);
        record.fire.fire(nowish(now));

        let snapshot = record.snapshot();
        assert_eq!(snapshot.access_count, 1);
        assert_eq!(snapshot.content, "hello world");
        assert_eq!(snapshot.content_hash, content_hash("hello world"));
        assert_eq!(snapshot.depth, 0);
        assert!(snapshot.embedding.is_empty());
    }

    fn nowish(base: DateTime<Utc>) -> DateTime<Utc> {
        base + chrono::Duration::seconds(1)
    }

    #[test]
    fn test_content_hash_is_stable() {
        assert_eq!(content_hash("abc"), content_hash("abc"));
        assert_ne!(content_hash("abc"), content_hash("abd"));
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let record = NeuronRecord::new("serialized".to_string(), vec![0.1], 0, Utc::now());
        let value = serde_json::to_value(record.snapshot()).unwrap();
        let object = value.as_object().unwrap();
        assert!(object.contains_key("contentHash"));
        assert!(object.contains_key("lastFiredAt"));
        assert!(object.contains_key("accessCount"));
    }
}
