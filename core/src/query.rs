use crate::index::{ChunkId, Index};
use crate::tokenizer::tokenize;
use crate::weights::term_frequencies;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub text: String,
    pub score: f64,
    pub source: String,
}

#[derive(Default)]
struct Candidate {
    dot: f64,
    sum_sq: f64,
}

/// Rank indexed chunks against a free-text query.
///
/// Similarity is cosine-like but restricted to the terms a chunk shares with
/// the query: the dot product sums the chunk's tf-idf over shared terms, and
/// the chunk magnitude is taken over those same terms only. Chunks whose
/// shared terms all weigh zero are skipped.
pub fn search(index: &Index, query: &str, top_k: usize) -> Vec<SearchHit> {
    let tokens = tokenize(query);
    if tokens.is_empty() {
        return Vec::new();
    }

    // terms unknown to the corpus are dropped
    let query_weights: BTreeMap<String, f64> = term_frequencies(&tokens)
        .into_iter()
        .filter_map(|(term, tf)| index.idf_entry(&term).map(|e| (term, tf * e.idf)))
        .collect();
    if query_weights.is_empty() {
        return Vec::new();
    }
    let query_magnitude = query_weights.values().map(|w| w * w).sum::<f64>().sqrt();
    if query_magnitude == 0.0 {
        return Vec::new();
    }

    let mut candidates: HashMap<ChunkId, Candidate> = HashMap::new();
    for term in query_weights.keys() {
        for chunk_id in index.chunks_containing(term) {
            if let Some(w) = index.weight(chunk_id, term) {
                let c = candidates.entry(chunk_id).or_default();
                c.dot += w.tfidf;
                c.sum_sq += w.tfidf * w.tfidf;
            }
        }
    }

    let mut scored: Vec<(ChunkId, f64)> = candidates
        .into_iter()
        .filter_map(|(id, c)| {
            let magnitude = c.sum_sq.sqrt();
            (magnitude > 0.0).then(|| (id, c.dot / (query_magnitude * magnitude)))
        })
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    tracing::debug!(query, candidates = scored.len(), "scored query");

    scored
        .into_iter()
        .take(top_k)
        .filter_map(|(id, score)| {
            index.chunk(id).map(|c| SearchHit { text: c.text.clone(), score, source: c.source.clone() })
        })
        .collect()
}
