//! Searcher - the query side of the matrix
//!
//! One call runs the full pipeline: clean and tokenize the query, embed it
//! (with short-query expansion and optional repetition), score every neuron
//! in parallel under the matrix read-lock, spread activation over the
//! synapse graph, apply the strict metadata post-filter, truncate, release
//! the lock, and only then fire the surviving neurons.
//!
//! Lock discipline: the per-neuron fire gates are never taken while the
//! matrix read-lock is held. The read/write lock is task-fair, so a reader
//! blocking on a gate while a writer queues behind it would deadlock the
//! whole matrix.

use lru::LruCache;
use parking_lot::Mutex;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::debug;

use crate::embedding::Embedder;
use crate::matrix::{Matrix, MatrixInner, Neuron, NeuronRecord};
use crate::search::scoring::{score_neuron, QueryContext};
use crate::sentiment::SentimentClassifier;
use crate::text;
use crate::time::Clock;
use crate::vector;

// ============================================================================
// SEARCH CONSTANTS
// ============================================================================

/// Prefix prepended to short queries before embedding
const QUERY_EXPANSION_PREFIX: &str = "search for information about ";

/// Queries at or below this token count get the expansion prefix
const QUERY_EXPANSION_MAX_TOKENS: usize = 3;

/// Spread contributions at or below this score are dropped
const SPREAD_SCORE_THRESHOLD: f32 = 0.1;

/// Weight assumed for an adjacency edge with no stored synapse
const ABSENT_SYNAPSE_WEIGHT: f32 = 0.3;

/// Default hybrid weight between vector and lexical evidence
const DEFAULT_ALPHA: f32 = 0.7;

/// Query-embedding LRU capacity
const QUERY_VECTOR_CACHE_CAPACITY: usize = 128;

// ============================================================================
// TOKEN CACHE
// ============================================================================

/// Cached token set for one neuron, keyed by content hash
struct CachedTokens {
    hash: String,
    tokens: Arc<Vec<String>>,
}

// ============================================================================
// SEARCHER
// ============================================================================

/// Hybrid associative searcher over one matrix
///
/// Owned by its engine; the token cache and the query-embedding cache are
/// single-owner state behind their own mutexes.
pub struct Searcher {
    alpha: f32,
    query_repeat: usize,
    token_cache: Mutex<HashMap<String, CachedTokens>>,
    query_vectors: Mutex<LruCache<String, Option<Vec<f32>>>>,
}

impl Searcher {
    pub(crate) fn new() -> Self {
        let capacity = NonZeroUsize::new(QUERY_VECTOR_CACHE_CAPACITY)
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            alpha: DEFAULT_ALPHA,
            query_repeat: 1,
            token_cache: Mutex::new(HashMap::new()),
            query_vectors: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub(crate) fn set_alpha(&mut self, alpha: f32) {
        self.alpha = alpha.clamp(0.0, 1.0);
    }

    pub(crate) fn set_query_repeat(&mut self, repeat: usize) {
        self.query_repeat = repeat.max(1);
    }

    /// Run the full search pipeline; see the module docs for the phases
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn search(
        &self,
        matrix: &Matrix,
        embedder: Option<&dyn Embedder>,
        sentiment: Option<&dyn SentimentClassifier>,
        clock: &dyn Clock,
        query: &str,
        depth: usize,
        limit: usize,
        metadata: Option<&HashMap<String, String>>,
        strict: bool,
    ) -> Vec<Neuron> {
        // Phase 1: query preparation, no locks held.
        let cleaned = text::clean_text(query);
        if cleaned.is_empty() {
            return Vec::new();
        }
        let tokens = text::tokenize(&cleaned);
        if tokens.is_empty() {
            return Vec::new();
        }

        let query_vec = embedder.and_then(|e| self.embed_query(e, &cleaned, tokens.len()));
        let query_label = sentiment.map(|s| s.analyze(&cleaned).label());
        let query_lower = cleaned.to_lowercase();
        let now = clock.now();

        let ctx = QueryContext {
            query: &cleaned,
            query_lower: &query_lower,
            tokens: &tokens,
            vector: query_vec.as_deref(),
            label: query_label,
            alpha: self.alpha,
            now,
            metadata,
            strict,
        };

        // Phases 2-5 run under the matrix read-lock; neuron gates are not
        // touched until it is released.
        let (snapshots, fire_handles) = {
            let inner = matrix.inner.read();
            let neuron_count = inner.neurons.len();

            let mut scored: Vec<(String, f32)> = inner
                .neurons
                .par_iter()
                .filter_map(|(id, record)| {
                    let content_tokens = self.content_tokens(id, record, neuron_count);
                    let score = score_neuron(record, &content_tokens, &ctx);
                    (score > 0.0).then(|| (id.clone(), score))
                })
                .collect();

            sort_by_score(&mut scored);

            if depth > 0 && !scored.is_empty() {
                spread_activation(&inner, &mut scored, depth);
                sort_by_score(&mut scored);
            }

            if strict {
                if let Some(filter) = metadata {
                    if !filter.is_empty() {
                        scored.retain(|(id, _)| {
                            inner.neurons.get(id).is_some_and(|record| {
                                filter
                                    .iter()
                                    .all(|(k, v)| record.metadata.get(k) == Some(v))
                            })
                        });
                    }
                }
            }

            if limit > 0 {
                scored.truncate(limit);
            }

            let mut snapshots = Vec::with_capacity(scored.len());
            let mut handles = Vec::with_capacity(scored.len());
            for (id, _) in &scored {
                if let Some(record) = inner.neurons.get(id) {
                    snapshots.push(record.snapshot());
                    handles.push(Arc::clone(&record.fire));
                }
            }
            (snapshots, handles)
        };

        // Phase 7: fire the survivors now that the read-lock is gone.
        for fire in &fire_handles {
            fire.fire(now);
        }

        snapshots
    }

    // ========================================================================
    // QUERY EMBEDDING
    // ========================================================================

    /// Expand, repeat, and embed the query, memoizing per prepared text
    fn embed_query(
        &self,
        embedder: &dyn Embedder,
        cleaned: &str,
        token_count: usize,
    ) -> Option<Vec<f32>> {
        let expanded = if token_count <= QUERY_EXPANSION_MAX_TOKENS {
            format!("{QUERY_EXPANSION_PREFIX}{cleaned}")
        } else {
            cleaned.to_string()
        };
        let embed_text = if self.query_repeat > 1 {
            vec![expanded.as_str(); self.query_repeat].join(" ")
        } else {
            expanded
        };

        if let Some(cached) = self.query_vectors.lock().get(&embed_text) {
            return cached.clone();
        }

        let embedded = match embedder.embed_text(&embed_text) {
            Ok(mut v) => {
                vector::normalize(&mut v);
                Some(v)
            }
            Err(err) => {
                debug!(error = %err, "query embedding failed, scoring lexically");
                None
            }
        };
        self.query_vectors.lock().put(embed_text, embedded.clone());
        embedded
    }

    // ========================================================================
    // TOKEN CACHE
    // ========================================================================

    /// Tokens for a neuron's content, served from the cache while the
    /// content hash matches
    ///
    /// A stale entry is detected by hash mismatch and replaced on the next
    /// read. When the map outgrows twice the neuron count the whole cache
    /// is discarded.
    fn content_tokens(
        &self,
        id: &str,
        record: &NeuronRecord,
        neuron_count: usize,
    ) -> Arc<Vec<String>> {
        {
            let cache = self.token_cache.lock();
            if let Some(entry) = cache.get(id) {
                if entry.hash == record.content_hash {
                    return Arc::clone(&entry.tokens);
                }
            }
        }

        let tokens = Arc::new(text::tokenize(&record.content));
        let mut cache = self.token_cache.lock();
        if cache.len() >= neuron_count.saturating_mul(2) {
            debug!(entries = cache.len(), "token cache overgrew, discarding");
            cache.clear();
        }
        cache.insert(
            id.to_string(),
            CachedTokens {
                hash: record.content_hash.clone(),
                tokens: Arc::clone(&tokens),
            },
        );
        tokens
    }
}

// ============================================================================
// SPREAD ACTIVATION
// ============================================================================

/// Breadth-first spread over adjacency from the scored seeds
///
/// Each hop propagates `score * weight / (hop + 2)` to unseen neighbors and
/// keeps contributions above the spread threshold. Edges with no stored
/// synapse propagate at the default weight. The matrix link threshold is
/// not consulted here.
fn spread_activation(inner: &MatrixInner, results: &mut Vec<(String, f32)>, depth: usize) {
    let mut seen: HashSet<String> = results.iter().map(|(id, _)| id.clone()).collect();
    let mut current: Vec<(String, f32)> = results.clone();

    for hop in 0..depth {
        let mut next: Vec<(String, f32)> = Vec::new();
        for (id, score) in &current {
            let Some(neighbors) = inner.adjacency.get(id) else {
                continue;
            };
            for neighbor in neighbors {
                if seen.contains(neighbor) {
                    continue;
                }
                let weight = inner
                    .synapse_between(id, neighbor)
                    .map(|synapse| synapse.weight)
                    .unwrap_or(ABSENT_SYNAPSE_WEIGHT);
                let spread_score = score * weight / (hop as f32 + 2.0);
                if spread_score > SPREAD_SCORE_THRESHOLD {
                    seen.insert(neighbor.clone());
                    results.push((neighbor.clone(), spread_score));
                    next.push((neighbor.clone(), spread_score));
                }
            }
        }
        if next.is_empty() {
            break;
        }
        current = next;
    }
}

/// Descending by score, ties broken by id for a deterministic order
fn sort_by_score(results: &mut [(String, f32)]) {
    results.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
}

// ============================================================================
// TESTS
// ============================================================================
