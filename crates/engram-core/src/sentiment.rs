//! Sentiment classification
//!
//! The engine consumes sentiment through the [`SentimentClassifier`] trait;
//! the scorer behind it is swappable. [`SentimentResult`] carries the raw
//! polarity scores and the seven-label resolution lives in
//! [`SentimentResult::label`], so every classifier maps to the same label
//! space. A small built-in lexicon classifier keeps the engine usable when
//! no external scorer is attached.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

// ============================================================================
// THRESHOLDS
// ============================================================================

/// Compound polarity at or above which content reads as happiness
const HAPPINESS_THRESHOLD: f32 = 0.60;
/// Compound polarity at or above which content reads as surprise
const SURPRISE_THRESHOLD: f32 = 0.20;
/// Compound polarity at or below which the strong-negative resolution runs
const STRONG_NEGATIVE_THRESHOLD: f32 = -0.60;
/// Compound polarity at or below which content reads as sadness
const SADNESS_THRESHOLD: f32 = -0.20;
/// Negative/neutral ratio above which strong negativity reads as anger
const ANGER_RATIO: f32 = 1.5;

// ============================================================================
// LABELS
// ============================================================================

/// Sentiment labels assigned to neurons and queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    /// Strong positive affect
    Happiness,
    /// Mild negative affect
    Sadness,
    /// Strong negative affect with a dominant neutral share
    Fear,
    /// Strong negative affect with a dominant negative share
    Anger,
    /// Strong negative affect, neither fear nor anger
    Disgust,
    /// Mild positive affect
    Surprise,
    /// No clear affect
    Neutral,
}

impl SentimentLabel {
    /// String form used in serialized snapshots
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Happiness => "happiness",
            SentimentLabel::Sadness => "sadness",
            SentimentLabel::Fear => "fear",
            SentimentLabel::Anger => "anger",
            SentimentLabel::Disgust => "disgust",
            SentimentLabel::Surprise => "surprise",
            SentimentLabel::Neutral => "neutral",
        }
    }

    /// Positive-valence labels: happiness and surprise
    pub fn is_positive(&self) -> bool {
        matches!(self, SentimentLabel::Happiness | SentimentLabel::Surprise)
    }

    /// Negative-valence labels: sadness, fear, anger, disgust
    pub fn is_negative(&self) -> bool {
        matches!(
            self,
            SentimentLabel::Sadness
                | SentimentLabel::Fear
                | SentimentLabel::Anger
                | SentimentLabel::Disgust
        )
    }
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// CLASSIFIER INTERFACE
// ============================================================================

/// Raw polarity scores produced by a sentiment scorer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentResult {
    /// Compound polarity in [-1, 1]
    pub compound: f32,
    /// Positive share in [0, 1]
    pub positive: f32,
    /// Negative share in [0, 1]
    pub negative: f32,
    /// Neutral share in [0, 1]
    pub neutral: f32,
}

impl SentimentResult {
    /// Resolve the seven-label classification from the polarity scores
    pub fn label(&self) -> SentimentLabel {
        if self.compound >= HAPPINESS_THRESHOLD {
            return SentimentLabel::Happiness;
        }
        if self.compound >= SURPRISE_THRESHOLD {
            return SentimentLabel::Surprise;
        }
        if self.compound <= STRONG_NEGATIVE_THRESHOLD {
            let ratio = if self.neutral > 0.0 {
                self.negative / self.neutral
            } else if self.negative > 0.0 {
                f32::INFINITY
            } else {
                0.0
            };
            if ratio > ANGER_RATIO {
                return SentimentLabel::Anger;
            }
            if self.neutral > self.negative {
                return SentimentLabel::Fear;
            }
            return SentimentLabel::Disgust;
        }
        if self.compound <= SADNESS_THRESHOLD {
            return SentimentLabel::Sadness;
        }
        SentimentLabel::Neutral
    }
}

/// Maps text to polarity scores
///
/// Shared process-wide by every matrix, so implementations must be safe to
/// call from many threads; serialize internally if the underlying scorer is
/// not thread-safe.
pub trait SentimentClassifier: Send + Sync {
    /// Score the given text
    fn analyze(&self, text: &str) -> SentimentResult;
}

// ============================================================================
// BUILT-IN LEXICON CLASSIFIER
// ============================================================================

/// Word-list sentiment scorer
///
/// A compact valence lexicon with a 3-word negation window. Pure and
/// stateless, so it is trivially thread-safe.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexiconClassifier;

fn lexicon() -> &'static HashMap<&'static str, f32> {
    static LEXICON: OnceLock<HashMap<&'static str, f32>> = OnceLock::new();
    LEXICON.get_or_init(|| {
        let mut map = HashMap::new();
        for word in [
            "good", "great", "excellent", "amazing", "wonderful", "fantastic", "love",
            "loved", "happy", "joy", "delighted", "success", "successful", "win", "won",
            "beautiful", "brilliant", "perfect", "awesome", "best", "works", "fixed",
            "solved", "improved", "fast", "clean", "elegant", "stable",
        ] {
            map.insert(word, 1.0);
        }
        for word in [
            "bad", "terrible", "awful", "horrible", "hate", "hated", "sad", "unhappy",
            "angry", "furious", "fear", "afraid", "scared", "disgusting", "broken",
            "failure", "failed", "fail", "lost", "worst", "bug", "crash", "crashed",
            "error", "wrong", "slow", "ugly", "corrupt", "dead", "panic",
        ] {
            map.insert(word, -1.0);
        }
        map
    })
}

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "don't", "doesn't", "didn't", "won't", "can't", "couldn't",
    "shouldn't", "without", "hardly",
];

impl SentimentClassifier for LexiconClassifier {
    fn analyze(&self, text: &str) -> SentimentResult {
        let words: Vec<String> = text
            .to_lowercase()
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
            .filter(|w| !w.is_empty())
            .collect();

        if words.is_empty() {
            return SentimentResult {
                compound: 0.0,
                positive: 0.0,
                negative: 0.0,
                neutral: 1.0,
            };
        }

        let mut score = 0.0f32;
        let mut positive_hits = 0usize;
        let mut negative_hits = 0usize;

        for (i, word) in words.iter().enumerate() {
            let Some(&valence) = lexicon().get(word.as_str()) else {
                continue;
            };
            // 3-word negation window flips and dampens the valence.
            let negated =
                (i.saturating_sub(3)..i).any(|j| NEGATIONS.contains(&words[j].as_str()));
            let effective = if negated { -valence * 0.7 } else { valence };

            score += effective;
            if effective > 0.0 {
                positive_hits += 1;
            } else if effective < 0.0 {
                negative_hits += 1;
            }
        }

        let total = words.len() as f32;
        let positive = positive_hits as f32 / total;
        let negative = negative_hits as f32 / total;
        let neutral = (1.0 - positive - negative).max(0.0);

        // VADER-style normalization keeps the compound in [-1, 1] while
        // saturating for strongly loaded text.
        let compound = score / (score * score + 15.0).sqrt();

        SentimentResult {
            compound,
            positive,
            negative,
            neutral,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn result(compound: f32, positive: f32, negative: f32, neutral: f32) -> SentimentResult {
        SentimentResult {
            compound,
            positive,
            negative,
            neutral,
        }
    }

    #[test]
    fn test_label_positive_bands() {
        assert_eq!(result(0.8, 0.5, 0.0, 0.5).label(), SentimentLabel::Happiness);
        assert_eq!(result(0.60, 0.4, 0.0, 0.6).label(), SentimentLabel::Happiness);
        assert_eq!(result(0.3, 0.2, 0.0, 0.8).label(), SentimentLabel::Surprise);
        assert_eq!(result(0.20, 0.2, 0.0, 0.8).label(), SentimentLabel::Surprise);
    }

    #[test]
    fn test_label_neutral_band() {
        assert_eq!(result(0.1, 0.1, 0.1, 0.8).label(), SentimentLabel::Neutral);
        assert_eq!(result(-0.1, 0.0, 0.1, 0.9).label(), SentimentLabel::Neutral);
    }

    #[test]
    fn test_label_sadness_band() {
        assert_eq!(result(-0.3, 0.0, 0.3, 0.7).label(), SentimentLabel::Sadness);
        assert_eq!(result(-0.59, 0.0, 0.4, 0.6).label(), SentimentLabel::Sadness);
    }

    #[test]
    fn test_label_strong_negative_resolution() {
        // negative dominates neutral by more than 1.5x -> anger
        assert_eq!(result(-0.8, 0.0, 0.6, 0.3).label(), SentimentLabel::Anger);
        // neutral share dominates -> fear
        assert_eq!(result(-0.7, 0.0, 0.3, 0.6).label(), SentimentLabel::Fear);
        // negative >= neutral but under the anger ratio -> disgust
        assert_eq!(result(-0.7, 0.0, 0.5, 0.5).label(), SentimentLabel::Disgust);
    }

    #[test]
    fn test_valence_partition() {
        assert!(SentimentLabel::Happiness.is_positive());
        assert!(SentimentLabel::Surprise.is_positive());
        for label in [
            SentimentLabel::Sadness,
            SentimentLabel::Fear,
            SentimentLabel::Anger,
            SentimentLabel::Disgust,
        ] {
            assert!(label.is_negative());
            assert!(!label.is_positive());
        }
        assert!(!SentimentLabel::Neutral.is_positive());
        assert!(!SentimentLabel::Neutral.is_negative());
    }

    #[test]
    fn test_lexicon_positive_text() {
        let result = LexiconClassifier.analyze("what a wonderful amazing great day");
        assert!(result.compound > 0.2);
        assert!(result.positive > 0.0);
    }

    #[test]
    fn test_lexicon_negative_text() {
        let result = LexiconClassifier.analyze("terrible awful crash, everything failed");
        assert!(result.compound < -0.2);
        assert!(result.negative > 0.0);
    }

    #[test]
    fn test_lexicon_negation_flips() {
        let plain = LexiconClassifier.analyze("this is good");
        let negated = LexiconClassifier.analyze("this is not good");
        assert!(plain.compound > 0.0);
        assert!(negated.compound < 0.0);
    }

    #[test]
    fn test_lexicon_empty_text_is_neutral() {
        let result = LexiconClassifier.analyze("");
        assert_eq!(result.compound, 0.0);
        assert_eq!(result.label(), SentimentLabel::Neutral);
    }
}
