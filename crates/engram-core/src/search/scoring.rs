//! Hybrid neuron scoring
//!
//! One neuron, one query, one non-negative score. Lexical evidence
//! (substring, token overlap, bounded edit distance) and vector cosine are
//! combined into a base score, then shaped by the neuron's activation
//! state, its sentiment alignment with the query, and the metadata filter.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::matrix::NeuronRecord;
use crate::search::fuzzy;
use crate::sentiment::SentimentLabel;
use crate::vector;

// ============================================================================
// SCORING CONSTANTS
// ============================================================================

/// Flat bonus when the content contains the whole query as a substring
const SUBSTRING_BONUS: f32 = 10.0;

/// Weight of the matched-token ratio
const TOKEN_OVERLAP_WEIGHT: f32 = 5.0;

/// Extra credit for a shared-prefix (non-exact) token match
const PREFIX_PARTIAL_CREDIT: f32 = 0.3;

/// Both tokens must be longer than this for prefix matching
const PREFIX_MIN_TOKEN_CHARS: usize = 3;

/// Edit-distance pass only runs for queries up to this many codepoints
const FUZZY_MAX_QUERY_CHARS: usize = 20;

/// Edit-distance pass only runs while the lexical score is below this
const FUZZY_SCORE_CEILING: f32 = 8.0;

/// Edit-distance pass examines at most this many content tokens
const FUZZY_MAX_CONTENT_TOKENS: usize = 8;

/// Minimum normalized similarity for fuzzy credit
const FUZZY_MIN_SIMILARITY: f32 = 0.7;

/// Weight of a qualifying fuzzy similarity
const FUZZY_WEIGHT: f32 = 2.0;

/// Multiplier when query and neuron share a non-neutral label
const SAME_LABEL_BOOST: f32 = 1.2;

/// Multiplier when query and neuron sit on opposite valences
const OPPOSITE_VALENCE_PENALTY: f32 = 0.8;

/// Multiplier step per matching metadata pair
const METADATA_BOOST_PER_MATCH: f32 = 0.3;

// ============================================================================
// QUERY CONTEXT
// ============================================================================

/// Prepared query state shared across every neuron scored in one search
pub(crate) struct QueryContext<'a> {
    /// Cleaned query text
    pub query: &'a str,
    /// Lowercased cleaned query
    pub query_lower: &'a str,
    /// Query tokens
    pub tokens: &'a [String],
    /// Unit-norm query embedding, when an embedder produced one
    pub vector: Option<&'a [f32]>,
    /// Query sentiment label, when a classifier ran
    pub label: Option<SentimentLabel>,
    /// Hybrid weight between vector and lexical evidence
    pub alpha: f32,
    /// Scoring instant for the recency boost
    pub now: DateTime<Utc>,
    /// Metadata filter
    pub metadata: Option<&'a HashMap<String, String>>,
    /// Whether non-matching metadata disqualifies outright
    pub strict: bool,
}

// ============================================================================
// PIPELINE
// ============================================================================

/// Score one neuron against the prepared query; 0.0 means "not a result"
pub(crate) fn score_neuron(
    record: &NeuronRecord,
    content_tokens: &[String],
    ctx: &QueryContext<'_>,
) -> f32 {
    let lexical = string_score(&record.content, content_tokens, ctx);

    let base = match vector_score(record, ctx) {
        Some(semantic) => ctx.alpha * semantic + (1.0 - ctx.alpha) * (lexical / 10.0).tanh(),
        None => lexical,
    };
    if base <= 0.0 {
        return 0.0;
    }

    let mut score = base;

    // Brain modifiers: energetic, recently fired, frequently accessed,
    // shallow neurons rank higher.
    score *= 0.5 + 0.5 * record.fire.energy();

    let hours = hours_since(ctx.now, record.fire.last_fired_at());
    let recency = 1.0 / (1.0 + hours / 24.0);
    score *= 0.8 + 0.2 * recency;

    let access = record.fire.access_count() as f32;
    score *= 1.0 + 0.1 * (access + 1.0).log10();

    score *= 1.0 / (1.0 + 0.2 * record.depth as f32);

    if let (Some(query_label), Some(neuron_label)) = (ctx.label, record.sentiment_label) {
        if query_label != SentimentLabel::Neutral && neuron_label != SentimentLabel::Neutral {
            if query_label == neuron_label {
                score *= SAME_LABEL_BOOST;
            } else if opposite_valence(query_label, neuron_label) {
                score *= OPPOSITE_VALENCE_PENALTY;
            }
        }
    }

    if let Some(filter) = ctx.metadata {
        if !filter.is_empty() {
            let matches = filter
                .iter()
                .filter(|(k, v)| record.metadata.get(*k) == Some(*v))
                .count();
            if ctx.strict && matches < filter.len() {
                return 0.0;
            }
            if matches > 0 {
                score *= 1.0 + METADATA_BOOST_PER_MATCH * matches as f32;
            }
        }
    }

    score
}

// ============================================================================
// STAGES
// ============================================================================

fn string_score(content: &str, content_tokens: &[String], ctx: &QueryContext<'_>) -> f32 {
    let mut score = 0.0f32;

    let content_lower = content.to_lowercase();
    if content_lower.contains(ctx.query_lower) {
        score += SUBSTRING_BONUS;
    }

    if !ctx.tokens.is_empty() {
        let mut matched = 0usize;
        for query_token in ctx.tokens {
            let mut hit = false;
            for content_token in content_tokens {
                if content_token == query_token {
                    hit = true;
                    break;
                }
                if query_token.chars().count() > PREFIX_MIN_TOKEN_CHARS
                    && content_token.chars().count() > PREFIX_MIN_TOKEN_CHARS
                    && shares_prefix(query_token, content_token)
                {
                    hit = true;
                    score += PREFIX_PARTIAL_CREDIT;
                    break;
                }
            }
            if hit {
                matched += 1;
            }
        }
        score += TOKEN_OVERLAP_WEIGHT * matched as f32 / ctx.tokens.len() as f32;
    }

    let query_chars = ctx.query_lower.chars().count();
    if query_chars <= FUZZY_MAX_QUERY_CHARS && score < FUZZY_SCORE_CEILING {
        for content_token in content_tokens.iter().take(FUZZY_MAX_CONTENT_TOKENS) {
            let longest = query_chars.max(content_token.chars().count());
            let max_distance = (longest as f32 * (1.0 - FUZZY_MIN_SIMILARITY)) as usize;
            if let Some(similarity) =
                fuzzy::edit_similarity(ctx.query_lower, content_token, max_distance)
            {
                if similarity > FUZZY_MIN_SIMILARITY {
                    score += FUZZY_WEIGHT * similarity;
                }
            }
        }
    }

    score
}

/// Cosine similarity clamped to [0, 1], or `None` when either side lacks a
/// comparable vector
fn vector_score(record: &NeuronRecord, ctx: &QueryContext<'_>) -> Option<f32> {
    let query_vec = ctx.vector?;
    if record.embedding.is_empty() || record.embedding.len() != query_vec.len() {
        return None;
    }
    Some(vector::cosine_similarity(query_vec, &record.embedding).clamp(0.0, 1.0))
}

fn shares_prefix(a: &str, b: &str) -> bool {
    a.chars().take(3).eq(b.chars().take(3))
}

fn opposite_valence(a: SentimentLabel, b: SentimentLabel) -> bool {
    (a.is_positive() && b.is_negative()) || (a.is_negative() && b.is_positive())
}

fn hours_since(now: DateTime<Utc>, then: DateTime<Utc>) -> f32 {
    let seconds = (now - then).num_seconds();
    seconds.max(0) as f32 / 3600.0
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::tokenize;

    fn record(content: &str) -> NeuronRecord {
        NeuronRecord::new(content.to_string(), vec![0.0, 0.0, 0.0], 0, Utc::now())
    }

    fn context<'a>(
        query: &'a str,
        query_lower: &'a str,
        tokens: &'a [String],
    ) -> QueryContext<'a> {
        QueryContext {
            query,
            query_lower,
            tokens,
            vector: None,
            label: None,
            alpha: 0.7,
            now: Utc::now(),
            metadata: None,
            strict: false,
        }
    }

    fn score(content: &str, query: &str) -> f32 {
        let record = record(content);
        let tokens = tokenize(query);
        let lower = query.to_lowercase();
        let ctx = context(query, &lower, &tokens);
        score_neuron(&record, &tokenize(content), &ctx)
    }

    #[test]
    fn test_substring_match_outranks_token_overlap() {
        let exact = score("The quick brown fox", "quick brown");
        let partial = score("quick fox", "quick brown");
        assert!(exact > partial);
    }

    #[test]
    fn test_no_overlap_scores_zero() {
        assert_eq!(score("Docker containers", "programming"), 0.0);
    }

    #[test]
    fn test_token_overlap_scores_positive() {
        assert!(score("Go programming language", "programming") > 0.0);
    }

    #[test]
    fn test_fuzzy_catches_typos() {
        assert!(score("TypeScript tutorials", "typescrpt") > 0.0);
    }

    #[test]
    fn test_prefix_partial_credit() {
        let with_prefix = score("programming languages", "programs");
        assert!(with_prefix > 0.0);
    }

    #[test]
    fn test_depth_penalty_lowers_score() {
        let surface = record("common topic words");
        let mut deep = record("common topic words");
        deep.depth = 5;

        let tokens = tokenize("common topic");
        let lower = "common topic".to_string();
        let ctx = context("common topic", &lower, &tokens);
        let content_tokens = tokenize("common topic words");

        let surface_score = score_neuron(&surface, &content_tokens, &ctx);
        let deep_score = score_neuron(&deep, &content_tokens, &ctx);
        assert!(surface_score > deep_score);
    }

    #[test]
    fn test_energy_raises_score() {
        let quiet = record("shared subject matter");
        let busy = record("shared subject matter");
        for _ in 0..5 {
            busy.fire.fire(Utc::now());
        }

        let tokens = tokenize("shared subject");
        let lower = "shared subject".to_string();
        let ctx = context("shared subject", &lower, &tokens);
        let content_tokens = tokenize("shared subject matter");

        assert!(score_neuron(&busy, &content_tokens, &ctx) > score_neuron(&quiet, &content_tokens, &ctx));
    }

    #[test]
    fn test_hybrid_blends_vector_and_lexical() {
        let mut with_vector = record("vectorized entry");
        with_vector.embedding = vec![1.0, 0.0];

        let tokens = tokenize("vectorized entry");
        let lower = "vectorized entry".to_string();
        let mut ctx = context("vectorized entry", &lower, &tokens);
        let query_vec = vec![1.0, 0.0];
        ctx.vector = Some(&query_vec);
        ctx.alpha = 1.0;

        let content_tokens = tokenize("vectorized entry");
        // alpha 1.0 with an identical vector: base is pure cosine = 1.0,
        // then only multiplicative modifiers apply.
        let pure_vector = score_neuron(&with_vector, &content_tokens, &ctx);
        assert!(pure_vector > 0.0);

        ctx.alpha = 0.0;
        let pure_lexical = score_neuron(&with_vector, &content_tokens, &ctx);
        assert!(pure_lexical > 0.0);
    }

    #[test]
    fn test_negative_cosine_floors_to_zero_base() {
        let mut anti = record("anti correlated");
        anti.embedding = vec![-1.0, 0.0];

        let tokens = tokenize("zzz yyy");
        let lower = "zzz yyy".to_string();
        let mut ctx = context("zzz yyy", &lower, &tokens);
        let query_vec = vec![1.0, 0.0];
        ctx.vector = Some(&query_vec);
        ctx.alpha = 1.0;

        // No lexical overlap and a clamped-to-zero cosine: base <= 0.
        assert_eq!(score_neuron(&anti, &tokenize("anti correlated"), &ctx), 0.0);
    }

    #[test]
    fn test_sentiment_same_label_boosts() {
        let mut happy = record("celebrating the launch");
        happy.sentiment_label = Some(SentimentLabel::Happiness);
        let mut sad = record("celebrating the launch");
        sad.sentiment_label = Some(SentimentLabel::Sadness);
        let neutral = {
            let mut n = record("celebrating the launch");
            n.sentiment_label = Some(SentimentLabel::Neutral);
            n
        };

        let tokens = tokenize("celebrating launch");
        let lower = "celebrating launch".to_string();
        let mut ctx = context("celebrating launch", &lower, &tokens);
        ctx.label = Some(SentimentLabel::Happiness);

        let content_tokens = tokenize("celebrating the launch");
        let happy_score = score_neuron(&happy, &content_tokens, &ctx);
        let sad_score = score_neuron(&sad, &content_tokens, &ctx);
        let neutral_score = score_neuron(&neutral, &content_tokens, &ctx);

        assert!(happy_score > neutral_score);
        assert!(sad_score < neutral_score);
    }

    #[test]
    fn test_strict_metadata_mismatch_zeroes() {
        let mut tagged = record("tagged entry");
        tagged
            .metadata
            .insert("thread_id".to_string(), "x".to_string());
        let untagged = record("tagged entry");

        let filter = HashMap::from([("thread_id".to_string(), "x".to_string())]);
        let tokens = tokenize("tagged entry");
        let lower = "tagged entry".to_string();
        let mut ctx = context("tagged entry", &lower, &tokens);
        ctx.metadata = Some(&filter);
        ctx.strict = true;

        let content_tokens = tokenize("tagged entry");
        assert!(score_neuron(&tagged, &content_tokens, &ctx) > 0.0);
        assert_eq!(score_neuron(&untagged, &content_tokens, &ctx), 0.0);
    }

    #[test]
    fn test_metadata_boost_when_not_strict() {
        let mut tagged = record("boosted entry");
        tagged.metadata.insert("k".to_string(), "v".to_string());
        let untagged = record("boosted entry");

        let filter = HashMap::from([("k".to_string(), "v".to_string())]);
        let tokens = tokenize("boosted entry");
        let lower = "boosted entry".to_string();
        let mut ctx = context("boosted entry", &lower, &tokens);
        ctx.metadata = Some(&filter);

        let content_tokens = tokenize("boosted entry");
        assert!(
            score_neuron(&tagged, &content_tokens, &ctx)
                > score_neuron(&untagged, &content_tokens, &ctx)
        );
    }
}
