//! Term-frequency and inverse-document-frequency math.
//!
//! The "document" in document frequency is a chunk, not a source file: a term
//! repeated across many chunks of one file is as common as one spread over
//! many files.

use crate::chunker::ChunkParams;
use crate::error::Result;
use crate::tokenizer::tokenize;
use std::collections::BTreeMap;

/// `occurrences / token_count` for every distinct token. Empty input yields an empty map.
pub fn term_frequencies(tokens: &[String]) -> BTreeMap<String, f64> {
    let mut counts: BTreeMap<String, u32> = BTreeMap::new();
    for t in tokens {
        *counts.entry(t.clone()).or_insert(0) += 1;
    }
    let total = tokens.len() as f64;
    counts.into_iter().map(|(term, c)| (term, c as f64 / total)).collect()
}

/// `ln(total_chunks / document_frequency)`.
pub fn idf(total_chunks: usize, document_frequency: usize) -> f64 {
    (total_chunks as f64 / document_frequency.max(1) as f64).ln()
}

/// A chunk that has been tokenized and weighted but not yet stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkDraft {
    pub text: String,
    pub token_count: u32,
    pub tf: BTreeMap<String, f64>,
}

impl ChunkDraft {
    pub fn from_text(text: String) -> Self {
        let tokens = tokenize(&text);
        let tf = term_frequencies(&tokens);
        Self { text, token_count: tokens.len() as u32, tf }
    }
}

/// Chunk, tokenize and weight a whole document.
pub fn prepare_document(text: &str, params: &ChunkParams) -> Result<Vec<ChunkDraft>> {
    Ok(params.chunk(text)?.into_iter().map(ChunkDraft::from_text).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(words: &[&str]) -> Vec<String> { words.iter().map(|w| w.to_string()).collect() }

    #[test]
    fn tf_is_a_frequency() {
        let tokens = toks(&["cache", "evict", "cache", "lookup"]);
        let tf = term_frequencies(&tokens);
        assert_eq!(tf["cache"], 0.5);
        assert_eq!(tf["evict"], 0.25);
        let sum: f64 = tf.values().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        let occurrences: f64 = tf.values().map(|v| v * tokens.len() as f64).sum();
        assert!((occurrences - tokens.len() as f64).abs() < 1e-9);
    }

    #[test]
    fn empty_tokens_have_no_weights() {
        assert!(term_frequencies(&[]).is_empty());
        let draft = ChunkDraft::from_text("a an the of".into());
        assert_eq!(draft.token_count, 0);
        assert!(draft.tf.is_empty());
    }

    #[test]
    fn idf_is_natural_log_ratio() {
        assert_eq!(idf(4, 4), 0.0);
        assert!((idf(4, 1) - 4f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn prepare_document_validates_params() {
        assert!(prepare_document("text", &ChunkParams::new(10, 10)).is_err());
        let drafts = prepare_document("Python provides dictionaries", &ChunkParams::default()).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].token_count, 3);
    }
}
