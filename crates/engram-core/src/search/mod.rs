//! Search module - hybrid associative retrieval
//!
//! Combines lexical scoring, vector cosine, sentiment alignment, metadata
//! filtering, and spread activation over the synapse graph into one ranked
//! result list.

mod fuzzy;
mod scoring;
mod searcher;

pub use fuzzy::{bounded_levenshtein, edit_similarity};
pub use searcher::Searcher;
