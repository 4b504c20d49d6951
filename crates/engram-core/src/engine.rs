//! Matrix engine - the mutation facade over one matrix
//!
//! Owns the matrix plus the optional embedder and sentiment classifier and
//! performs every graph mutation under the matrix write-lock: writes with
//! duplicate coalescing and organic positioning, updates, deletes with full
//! synapse scrubbing, and the density-driven dimension adaptation. Reads go
//! through the read-lock and fire neurons only after releasing it.

use rand::Rng;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::embedding::Embedder;
use crate::error::{EngineError, Result};
use crate::matrix::{
    content_hash, synapse_id, Matrix, MatrixInner, MatrixStats, Neuron, NeuronRecord, Synapse,
    CONTRACTION_DENSITY, EXPANSION_DENSITY, MAX_NEURON_CONTENT_BYTES,
};
use crate::search::Searcher;
use crate::sentiment::SentimentClassifier;
use crate::text;
use crate::time::{Clock, SystemClock};
use crate::vector;

// ============================================================================
// POSITIONING CONSTANTS
// ============================================================================

/// Perturbation magnitude when a parent anchors the new neuron
const PARENT_PERTURBATION: f32 = 0.1;

/// Perturbation magnitude when the lexically-nearest neuron anchors it
const NEIGHBOR_PERTURBATION: f32 = 0.2;

/// Jitter range for the coordinate appended on dimension expansion
const NEW_DIMENSION_JITTER: f32 = 0.05;

// ============================================================================
// ENGINE
// ============================================================================

/// The mutation and query facade over one [`Matrix`]
pub struct Engine {
    matrix: Matrix,
    embedder: Option<Arc<dyn Embedder>>,
    sentiment: Option<Arc<dyn SentimentClassifier>>,
    clock: Arc<dyn Clock>,
    searcher: Searcher,
}

impl Engine {
    /// Create an engine over the given matrix with the system clock
    pub fn new(matrix: Matrix) -> Self {
        Self::with_clock(matrix, Arc::new(SystemClock))
    }

    /// Create an engine with an injected clock
    pub fn with_clock(matrix: Matrix, clock: Arc<dyn Clock>) -> Self {
        Self {
            matrix,
            embedder: None,
            sentiment: None,
            clock,
            searcher: Searcher::new(),
        }
    }

    /// Attach an embedder; newly written neurons get embedded automatically
    pub fn set_embedder(&mut self, embedder: Arc<dyn Embedder>) {
        self.embedder = Some(embedder);
    }

    /// Attach a sentiment classifier; newly written neurons get labeled
    pub fn set_sentiment_classifier(&mut self, classifier: Arc<dyn SentimentClassifier>) {
        self.sentiment = Some(classifier);
    }

    /// Set the hybrid weight between vector and lexical scores, clamped to
    /// [0, 1]
    pub fn set_alpha(&mut self, alpha: f32) {
        self.searcher.set_alpha(alpha);
    }

    /// Set how many times the expanded query text is repeated before
    /// embedding (minimum 1)
    pub fn set_query_repeat(&mut self, repeat: usize) {
        self.searcher.set_query_repeat(repeat);
    }

    /// The matrix this engine mutates
    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }

    // ========================================================================
    // WRITE PATH
    // ========================================================================

    /// Write content into the matrix
    ///
    /// Content is cleaned with the shared text pipeline before storage.
    /// Writing content that hashes identically to an existing neuron
    /// coalesces: the existing neuron fires and is returned, and any
    /// caller-supplied metadata is ignored. Otherwise the neuron is placed
    /// organically (near its parent, else near the lexically-nearest
    /// neuron, else at a uniform-random position), embedded and labeled
    /// when those collaborators are attached, and inserted.
    pub fn add_neuron(
        &self,
        content: &str,
        parent_id: Option<&str>,
        metadata: Option<HashMap<String, String>>,
    ) -> Result<Neuron> {
        if content.len() > MAX_NEURON_CONTENT_BYTES {
            return Err(EngineError::ContentTooLarge {
                size: content.len(),
                max: MAX_NEURON_CONTENT_BYTES,
            });
        }
        let cleaned = text::clean_text(content);
        if cleaned.is_empty() {
            return Err(EngineError::InvalidContent(
                "content is empty after cleaning".to_string(),
            ));
        }

        let now = self.clock.now();
        let hash = content_hash(&cleaned);
        let mut inner = self.matrix.inner.write();

        // Duplicate coalescing: identical content fires the existing neuron
        // instead of creating a twin.
        if let Some(existing) = inner.neurons.values().find(|n| n.content_hash == hash) {
            existing.fire.fire(now);
            return Ok(existing.snapshot());
        }

        let capacity = self.matrix.bounds().max_neurons;
        if inner.neurons.len() >= capacity {
            return Err(EngineError::MatrixFull { capacity });
        }

        let mut rng = rand::thread_rng();
        let (position, depth) = match parent_id.and_then(|pid| inner.neurons.get(pid)) {
            Some(parent) => (
                perturb(&parent.position, PARENT_PERTURBATION, &mut rng),
                parent.depth + 1,
            ),
            None => match nearest_by_content(&inner, &cleaned) {
                Some(neighbor) => (
                    perturb(&neighbor.position, NEIGHBOR_PERTURBATION, &mut rng),
                    0,
                ),
                None => (random_position(inner.current_dim, &mut rng), 0),
            },
        };

        let mut record = NeuronRecord::new(cleaned.clone(), position, depth, now);

        if let Some(embedder) = &self.embedder {
            match embedder.embed_text(&cleaned) {
                Ok(mut embedding) => {
                    vector::normalize(&mut embedding);
                    record.embedding = embedding;
                }
                Err(err) => {
                    warn!(error = %err, "embedding failed, storing neuron without vector");
                }
            }
        }

        if let Some(classifier) = &self.sentiment {
            let result = classifier.analyze(&cleaned);
            record.sentiment_label = Some(result.label());
            record.sentiment_score = result.compound;
        }

        if let Some(extra) = metadata {
            record.metadata.extend(extra);
        }

        let id = record.id.clone();
        inner.adjacency.insert(id.clone(), HashSet::new());
        inner.neurons.insert(id.clone(), record);
        inner.total_activations += 1;
        inner.touch(now);

        self.check_dimension_expansion(&mut inner);

        inner
            .neurons
            .get(&id)
            .map(NeuronRecord::snapshot)
            .ok_or(EngineError::NeuronNotFound(id))
    }

    // ========================================================================
    // READ PATH
    // ========================================================================

    /// Fetch a neuron by id, firing it
    ///
    /// The fire happens after the matrix read-lock is released; the
    /// activation counters are then bumped under a short write-lock.
    pub fn get_neuron(&self, id: &str) -> Result<Neuron> {
        let fire = {
            let inner = self.matrix.inner.read();
            let record = inner
                .neurons
                .get(id)
                .ok_or_else(|| EngineError::NeuronNotFound(id.to_string()))?;
            Arc::clone(&record.fire)
        };

        let now = self.clock.now();
        fire.fire(now);

        let mut inner = self.matrix.inner.write();
        inner.total_activations += 1;
        inner.last_activity = now;
        inner
            .neurons
            .get(id)
            .map(NeuronRecord::snapshot)
            .ok_or_else(|| EngineError::NeuronNotFound(id.to_string()))
    }

    /// List neurons ordered by energy descending (ties by id), optionally
    /// filtered to one depth, with offset/limit paging; `limit` 0 means no
    /// cap. Returns detached snapshots.
    pub fn list_neurons(
        &self,
        offset: usize,
        limit: usize,
        depth_filter: Option<u32>,
    ) -> Vec<Neuron> {
        let inner = self.matrix.inner.read();
        let mut snapshots: Vec<Neuron> = inner
            .neurons
            .values()
            .filter(|record| depth_filter.is_none_or(|depth| record.depth == depth))
            .map(NeuronRecord::snapshot)
            .collect();

        snapshots.sort_by(|a, b| {
            b.energy
                .partial_cmp(&a.energy)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        let paged = snapshots.into_iter().skip(offset);
        if limit > 0 {
            paged.take(limit).collect()
        } else {
            paged.collect()
        }
    }

    // ========================================================================
    // UPDATE / DELETE
    // ========================================================================

    /// Replace a neuron's content
    ///
    /// Recomputes the content hash (which invalidates token caches keyed on
    /// it), refreshes the sentiment label and embedding when those
    /// collaborators are attached, and fires the neuron.
    pub fn update_neuron(&self, id: &str, new_content: &str) -> Result<()> {
        if new_content.len() > MAX_NEURON_CONTENT_BYTES {
            return Err(EngineError::ContentTooLarge {
                size: new_content.len(),
                max: MAX_NEURON_CONTENT_BYTES,
            });
        }
        let cleaned = text::clean_text(new_content);
        if cleaned.is_empty() {
            return Err(EngineError::InvalidContent(
                "content is empty after cleaning".to_string(),
            ));
        }

        let now = self.clock.now();
        let mut inner = self.matrix.inner.write();
        let Some(record) = inner.neurons.get_mut(id) else {
            return Err(EngineError::NeuronNotFound(id.to_string()));
        };

        {
            // Content swaps hold the neuron gate so a concurrent post-search
            // fire never interleaves with a half-applied swap.
            let _gate = record.fire.lock_gate();
            record.content = cleaned.clone();
            record.content_hash = content_hash(&cleaned);
        }

        if let Some(classifier) = &self.sentiment {
            let result = classifier.analyze(&cleaned);
            record.sentiment_label = Some(result.label());
            record.sentiment_score = result.compound;
        }

        if let Some(embedder) = &self.embedder {
            match embedder.embed_text(&cleaned) {
                Ok(mut embedding) => {
                    vector::normalize(&mut embedding);
                    record.embedding = embedding;
                }
                Err(err) => {
                    warn!(error = %err, "re-embedding failed, keeping previous vector");
                }
            }
        }

        record.fire.fire(now);
        inner.touch(now);
        Ok(())
    }

    /// Remove a neuron and everything that references it
    ///
    /// Every synapse touching the neuron is removed and every adjacency set
    /// is scrubbed, so no dangling reference survives.
    pub fn delete_neuron(&self, id: &str) -> Result<()> {
        let now = self.clock.now();
        let mut inner = self.matrix.inner.write();
        if inner.neurons.remove(id).is_none() {
            return Err(EngineError::NeuronNotFound(id.to_string()));
        }

        inner
            .synapses
            .retain(|_, synapse| synapse.from_id != id && synapse.to_id != id);
        inner.adjacency.remove(id);
        for neighbors in inner.adjacency.values_mut() {
            neighbors.remove(id);
        }

        inner.touch(now);
        self.check_dimension_contraction(&mut inner);
        Ok(())
    }

    // ========================================================================
    // SYNAPSES
    // ========================================================================

    /// Join two neurons with a weighted synapse
    ///
    /// Re-connecting an existing pair overwrites the weight. The weight is
    /// clamped to [0, 1] and both adjacency sets are mirrored.
    pub fn connect(&self, from_id: &str, to_id: &str, weight: f32) -> Result<Synapse> {
        let now = self.clock.now();
        let mut inner = self.matrix.inner.write();
        for id in [from_id, to_id] {
            if !inner.neurons.contains_key(id) {
                return Err(EngineError::NeuronNotFound(id.to_string()));
            }
        }

        let synapse = Synapse::new(from_id, to_id, weight, now);
        inner
            .adjacency
            .entry(from_id.to_string())
            .or_default()
            .insert(to_id.to_string());
        inner
            .adjacency
            .entry(to_id.to_string())
            .or_default()
            .insert(from_id.to_string());
        inner.synapses.insert(synapse.id.clone(), synapse.clone());
        inner.touch(now);
        Ok(synapse)
    }

    /// Remove the synapse joining two neurons; returns whether one existed
    pub fn disconnect(&self, from_id: &str, to_id: &str) -> bool {
        let now = self.clock.now();
        let mut inner = self.matrix.inner.write();
        let removed = inner.synapses.remove(&synapse_id(from_id, to_id)).is_some();
        if removed {
            if let Some(neighbors) = inner.adjacency.get_mut(from_id) {
                neighbors.remove(to_id);
            }
            if let Some(neighbors) = inner.adjacency.get_mut(to_id) {
                neighbors.remove(from_id);
            }
            inner.touch(now);
        }
        removed
    }

    /// Neurons reachable from `id` within `depth` hops over synapses at or
    /// above the matrix link threshold, ranked by accumulated activation
    ///
    /// Unlike [`Engine::search`] spread, this traversal requires a real
    /// synapse per hop and honors `link_threshold`.
    pub fn related(&self, id: &str, depth: usize) -> Result<Vec<Neuron>> {
        let inner = self.matrix.inner.read();
        if !inner.neurons.contains_key(id) {
            return Err(EngineError::NeuronNotFound(id.to_string()));
        }
        let threshold = inner.link_threshold;

        let mut seen: HashSet<&str> = HashSet::from([id]);
        let mut current: Vec<(&str, f32)> = vec![(id, 1.0)];
        let mut found: Vec<(String, f32)> = Vec::new();

        for _ in 0..depth {
            let mut next: Vec<(&str, f32)> = Vec::new();
            for &(node, activation) in &current {
                let Some(neighbors) = inner.adjacency.get(node) else {
                    continue;
                };
                for neighbor in neighbors {
                    if seen.contains(neighbor.as_str()) {
                        continue;
                    }
                    let Some(synapse) = inner.synapse_between(node, neighbor) else {
                        continue;
                    };
                    if synapse.weight < threshold {
                        continue;
                    }
                    let spread = activation * synapse.weight;
                    seen.insert(neighbor.as_str());
                    found.push((neighbor.clone(), spread));
                    next.push((neighbor.as_str(), spread));
                }
            }
            if next.is_empty() {
                break;
            }
            current = next;
        }

        found.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        Ok(found
            .iter()
            .filter_map(|(neuron_id, _)| inner.neurons.get(neuron_id))
            .map(NeuronRecord::snapshot)
            .collect())
    }

    // ========================================================================
    // SEARCH / STATS
    // ========================================================================

    /// Hybrid associative search; see [`Searcher`] for the full pipeline
    pub fn search(
        &self,
        query: &str,
        depth: usize,
        limit: usize,
        metadata: Option<&HashMap<String, String>>,
        strict: bool,
    ) -> Vec<Neuron> {
        self.searcher.search(
            &self.matrix,
            self.embedder.as_deref(),
            self.sentiment.as_deref(),
            self.clock.as_ref(),
            query,
            depth,
            limit,
            metadata,
            strict,
        )
    }

    /// Point-in-time statistics snapshot
    pub fn stats(&self) -> MatrixStats {
        let inner = self.matrix.inner.read();
        let neuron_count = inner.neurons.len();

        let mut depth_distribution: BTreeMap<u32, usize> = BTreeMap::new();
        let mut energy_sum = 0.0f32;
        for record in inner.neurons.values() {
            *depth_distribution.entry(record.depth).or_insert(0) += 1;
            energy_sum += record.fire.energy();
        }

        let synapse_weights: Vec<f32> = inner.synapses.values().map(|s| s.weight).collect();
        let average_synapse_weight = if synapse_weights.is_empty() {
            0.0
        } else {
            synapse_weights.iter().sum::<f32>() / synapse_weights.len() as f32
        };

        MatrixStats {
            index_id: self.matrix.index_id().to_string(),
            neuron_count,
            synapse_count: synapse_weights.len(),
            current_dimension: inner.current_dim,
            depth_distribution,
            average_energy: if neuron_count == 0 {
                0.0
            } else {
                energy_sum / neuron_count as f32
            },
            total_activations: inner.total_activations,
            last_activity: inner.last_activity,
            version: inner.version,
            synapse_weights,
            average_synapse_weight,
        }
    }

    // ========================================================================
    // DIMENSION ADAPTATION
    // ========================================================================

    /// Grow one dimension when density exceeds the expansion watermark,
    /// appending a jittered coordinate to every position
    fn check_dimension_expansion(&self, inner: &mut MatrixInner) {
        let density = inner.neurons.len() as f32 / inner.current_dim as f32;
        if density > EXPANSION_DENSITY && inner.current_dim < self.matrix.bounds().max_dim {
            inner.current_dim += 1;
            let mut rng = rand::thread_rng();
            for record in inner.neurons.values_mut() {
                record
                    .position
                    .push(rng.gen_range(-NEW_DIMENSION_JITTER..=NEW_DIMENSION_JITTER));
            }
            debug!(
                dimension = inner.current_dim,
                neurons = inner.neurons.len(),
                "matrix dimension expanded"
            );
        }
    }

    /// Drop one dimension when density falls below the contraction
    /// watermark, truncating every position
    fn check_dimension_contraction(&self, inner: &mut MatrixInner) {
        let density = inner.neurons.len() as f32 / inner.current_dim as f32;
        if density < CONTRACTION_DENSITY && inner.current_dim > self.matrix.bounds().min_dim {
            inner.current_dim -= 1;
            let target = inner.current_dim;
            for record in inner.neurons.values_mut() {
                record.position.truncate(target);
            }
            debug!(
                dimension = inner.current_dim,
                neurons = inner.neurons.len(),
                "matrix dimension contracted"
            );
        }
    }
}

// ============================================================================
// POSITIONING HELPERS
// ============================================================================

fn perturb(base: &[f32], magnitude: f32, rng: &mut impl Rng) -> Vec<f32> {
    base.iter()
        .map(|&x| (x + rng.gen_range(-magnitude..=magnitude)).clamp(-1.0, 1.0))
        .collect()
}

fn random_position(dim: usize, rng: &mut impl Rng) -> Vec<f32> {
    (0..dim).map(|_| rng.gen_range(-1.0f32..=1.0)).collect()
}

/// Lexically-nearest neuron by word overlap:
/// `|intersection| / max(|words(a)|, |words(b)|, 1)`
fn nearest_by_content<'a>(inner: &'a MatrixInner, content: &str) -> Option<&'a NeuronRecord> {
    let words: HashSet<String> = text::tokenize(content).into_iter().collect();

    let mut best: Option<(&NeuronRecord, f32)> = None;
    for record in inner.neurons.values() {
        let candidate: HashSet<String> = text::tokenize(&record.content).into_iter().collect();
        let overlap = words.intersection(&candidate).count() as f32;
        let score = overlap / words.len().max(candidate.len()).max(1) as f32;
        if best.as_ref().is_none_or(|&(_, top)| score > top) {
            best = Some((record, score));
        }
    }
    best.map(|(record, _)| record)
}

// ============================================================================
// TESTS
// ============================================================================
