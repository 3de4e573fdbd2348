use crate::weights::{self, ChunkDraft};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use time::format_description::well_known::Rfc3339;

pub type ChunkId = u64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub source: String,
    pub text: String,
    /// Ordinal of this chunk within its source.
    pub position: u32,
    pub token_count: u32,
    pub created_at: String,
}

/// Weight of one term in one chunk, keyed by `(chunk_id, term)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermWeight {
    pub chunk_id: ChunkId,
    pub term: String,
    pub tf: f64,
    pub tfidf: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdfEntry {
    pub term: String,
    pub document_frequency: u32,
    pub idf: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub file_count: usize,
    pub chunk_count: usize,
    pub avg_tokens: f64,
    pub unique_terms: usize,
}

/// In-memory tables of the index: chunks, per-chunk term weights and the
/// corpus-wide IDF table. `by_source` and `postings` are derived lookups.
#[derive(Debug, Clone)]
pub struct Index {
    chunks: BTreeMap<ChunkId, Chunk>,
    weights: BTreeMap<ChunkId, Vec<TermWeight>>, // sorted by term
    by_source: BTreeMap<String, Vec<ChunkId>>,
    postings: HashMap<String, BTreeSet<ChunkId>>,
    idf: HashMap<String, IdfEntry>,
    next_id: ChunkId,
}

impl Default for Index {
    fn default() -> Self {
        Self {
            chunks: BTreeMap::new(),
            weights: BTreeMap::new(),
            by_source: BTreeMap::new(),
            postings: HashMap::new(),
            idf: HashMap::new(),
            next_id: 1,
        }
    }
}

impl Index {
    pub fn new() -> Self { Self::default() }

    /// Rebuild an index from stored rows. `next_id` is raised past any loaded id.
    pub fn from_parts(chunks: Vec<Chunk>, weights: Vec<TermWeight>, idf: Vec<IdfEntry>, next_id: ChunkId) -> Self {
        let mut index = Self::new();
        for chunk in chunks {
            index.next_id = index.next_id.max(chunk.id + 1);
            index.by_source.entry(chunk.source.clone()).or_default().push(chunk.id);
            index.chunks.insert(chunk.id, chunk);
        }
        for ids in index.by_source.values_mut() {
            ids.sort_unstable();
        }
        for w in weights {
            if !index.chunks.contains_key(&w.chunk_id) {
                tracing::warn!(chunk_id = w.chunk_id, term = %w.term, "dropping term weight for missing chunk");
                continue;
            }
            index.postings.entry(w.term.clone()).or_default().insert(w.chunk_id);
            index.weights.entry(w.chunk_id).or_default().push(w);
        }
        for entries in index.weights.values_mut() {
            entries.sort_by(|a, b| a.term.cmp(&b.term));
        }
        index.idf = idf.into_iter().map(|e| (e.term.clone(), e)).collect();
        index.next_id = index.next_id.max(next_id);
        index
    }

    /// Append the chunks of one source. Weights start with `tfidf = tf` until
    /// the next [`Index::refresh_idf`].
    pub fn insert_document(&mut self, source: &str, drafts: Vec<ChunkDraft>) -> Vec<ChunkId> {
        let created_at = time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();
        let mut ids = Vec::with_capacity(drafts.len());
        let position_base = self.by_source.get(source).map_or(0, |v| v.len() as u32);

        for (i, draft) in drafts.into_iter().enumerate() {
            let id = self.next_id;
            self.next_id += 1;

            let entries: Vec<TermWeight> = draft
                .tf
                .into_iter()
                .map(|(term, tf)| TermWeight { chunk_id: id, term, tf, tfidf: tf })
                .collect();
            for w in &entries {
                self.postings.entry(w.term.clone()).or_default().insert(id);
            }
            if !entries.is_empty() {
                self.weights.insert(id, entries);
            }

            self.chunks.insert(id, Chunk {
                id,
                source: source.to_string(),
                text: draft.text,
                position: position_base + i as u32,
                token_count: draft.token_count,
                created_at: created_at.clone(),
            });
            self.by_source.entry(source.to_string()).or_default().push(id);
            ids.push(id);
        }
        ids
    }

    pub fn has_source(&self, source: &str) -> bool { self.by_source.contains_key(source) }

    /// Delete every chunk of `source` together with its term weights.
    /// An unknown source is a no-op and returns no ids.
    pub fn remove_source(&mut self, source: &str) -> Vec<ChunkId> {
        let Some(ids) = self.by_source.remove(source) else { return Vec::new() };
        for id in &ids {
            self.chunks.remove(id);
            for w in self.weights.remove(id).unwrap_or_default() {
                if let Some(set) = self.postings.get_mut(&w.term) {
                    set.remove(id);
                    if set.is_empty() {
                        self.postings.remove(&w.term);
                    }
                }
            }
        }
        ids
    }

    /// Recompute document frequency and IDF for every term from the stored
    /// weights, then rewrite `tfidf` on every entry.
    pub fn refresh_idf(&mut self) {
        let total = self.chunks.len();
        let mut df: HashMap<&str, usize> = HashMap::new();
        for entries in self.weights.values() {
            for w in entries {
                *df.entry(w.term.as_str()).or_insert(0) += 1;
            }
        }
        let idf: HashMap<String, IdfEntry> = df
            .into_iter()
            .map(|(term, d)| {
                let entry = IdfEntry { term: term.to_string(), document_frequency: d as u32, idf: weights::idf(total, d) };
                (term.to_string(), entry)
            })
            .collect();

        for entries in self.weights.values_mut() {
            for w in entries.iter_mut() {
                if let Some(e) = idf.get(&w.term) {
                    w.tfidf = w.tf * e.idf;
                }
            }
        }
        tracing::debug!(chunks = total, terms = idf.len(), "refreshed idf");
        self.idf = idf;
    }

    pub fn stats(&self) -> IndexStats {
        let chunk_count = self.chunks.len();
        let avg_tokens = if chunk_count == 0 {
            0.0
        } else {
            self.chunks.values().map(|c| c.token_count as f64).sum::<f64>() / chunk_count as f64
        };
        IndexStats { file_count: self.by_source.len(), chunk_count, avg_tokens, unique_terms: self.idf.len() }
    }

    pub fn chunk(&self, id: ChunkId) -> Option<&Chunk> { self.chunks.get(&id) }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> { self.chunks.values() }

    /// Chunks of one source in position order.
    pub fn chunks_for_source(&self, source: &str) -> Vec<&Chunk> {
        self.by_source
            .get(source)
            .map(|ids| ids.iter().filter_map(|id| self.chunks.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn weight(&self, id: ChunkId, term: &str) -> Option<&TermWeight> {
        let entries = self.weights.get(&id)?;
        entries.binary_search_by(|w| w.term.as_str().cmp(term)).ok().map(|i| &entries[i])
    }

    pub fn weights_for(&self, id: ChunkId) -> &[TermWeight] {
        self.weights.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn term_weights(&self) -> impl Iterator<Item = &TermWeight> { self.weights.values().flatten() }

    pub fn idf_entry(&self, term: &str) -> Option<&IdfEntry> { self.idf.get(term) }

    pub fn idf_entries(&self) -> impl Iterator<Item = &IdfEntry> { self.idf.values() }

    pub fn chunks_containing(&self, term: &str) -> impl Iterator<Item = ChunkId> + '_ {
        self.postings.get(term).into_iter().flatten().copied()
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> { self.by_source.keys().map(String::as_str) }

    pub fn next_id(&self) -> ChunkId { self.next_id }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drafts(texts: &[&str]) -> Vec<ChunkDraft> {
        texts.iter().map(|t| ChunkDraft::from_text(t.to_string())).collect()
    }

    fn assert_consistent(index: &Index) {
        let weight_terms: BTreeSet<&str> = index.term_weights().map(|w| w.term.as_str()).collect();
        let idf_terms: BTreeSet<&str> = index.idf_entries().map(|e| e.term.as_str()).collect();
        assert_eq!(weight_terms, idf_terms);
        for w in index.term_weights() {
            assert!(index.chunk(w.chunk_id).is_some());
        }
    }

    #[test]
    fn insert_assigns_positions_and_weights() {
        let mut index = Index::new();
        let ids = index.insert_document("guide.md", drafts(&["rust borrow checker", "rust traits generics"]));
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(index.chunk(2).unwrap().position, 1);
        assert_eq!(index.chunk(1).unwrap().token_count, 3);
        let w = index.weight(1, "borrow").unwrap();
        assert!((w.tf - 1.0 / 3.0).abs() < 1e-12);
        assert!(index.has_source("guide.md"));
        assert!(!index.has_source("other.md"));
    }

    #[test]
    fn refresh_counts_chunks_not_files() {
        let mut index = Index::new();
        index.insert_document("guide.md", drafts(&["rust borrow checker", "rust traits generics"]));
        index.insert_document("notes.md", drafts(&["python generators"]));
        index.refresh_idf();

        let rust = index.idf_entry("rust").unwrap();
        assert_eq!(rust.document_frequency, 2);
        assert!((rust.idf - (3.0f64 / 2.0).ln()).abs() < 1e-12);
        let w = index.weight(3, "python").unwrap();
        assert!((w.tfidf - 0.5 * 3f64.ln()).abs() < 1e-12);
        assert_consistent(&index);
    }

    #[test]
    fn remove_cascades_and_ids_are_not_reused() {
        let mut index = Index::new();
        index.insert_document("guide.md", drafts(&["rust borrow checker"]));
        index.insert_document("notes.md", drafts(&["python generators"]));
        index.refresh_idf();

        assert_eq!(index.remove_source("guide.md"), vec![1]);
        index.refresh_idf();
        assert!(index.weights_for(1).is_empty());
        assert!(index.idf_entry("borrow").is_none());
        assert_eq!(index.chunks_containing("rust").count(), 0);
        assert_consistent(&index);

        let ids = index.insert_document("guide.md", drafts(&["rust borrow checker"]));
        assert_eq!(ids, vec![3]);
        assert!(index.remove_source("missing.md").is_empty());
    }

    #[test]
    fn stats_cover_sources_chunks_and_terms() {
        let mut index = Index::new();
        assert_eq!(index.stats(), IndexStats { file_count: 0, chunk_count: 0, avg_tokens: 0.0, unique_terms: 0 });

        index.insert_document("guide.md", drafts(&["rust borrow checker", "rust"]));
        index.insert_document("notes.md", drafts(&["python generators yield values"]));
        index.refresh_idf();
        let stats = index.stats();
        assert_eq!(stats.file_count, 2);
        assert_eq!(stats.chunk_count, 3);
        assert!((stats.avg_tokens - 8.0 / 3.0).abs() < 1e-12);
        assert_eq!(stats.unique_terms, 7);
    }

    #[test]
    fn empty_corpus_refresh_clears_idf() {
        let mut index = Index::new();
        index.insert_document("guide.md", drafts(&["rust borrow checker"]));
        index.refresh_idf();
        index.remove_source("guide.md");
        index.refresh_idf();
        assert_eq!(index.stats().unique_terms, 0);
    }

    #[test]
    fn rebuilds_from_parts() {
        let mut index = Index::new();
        index.insert_document("guide.md", drafts(&["rust borrow checker", "rust traits"]));
        index.refresh_idf();

        let rebuilt = Index::from_parts(
            index.chunks().cloned().collect(),
            index.term_weights().cloned().collect(),
            index.idf_entries().cloned().collect(),
            index.next_id(),
        );
        assert_eq!(rebuilt.stats(), index.stats());
        assert_eq!(rebuilt.chunks_containing("rust").collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(rebuilt.next_id(), 3);
        assert_eq!(rebuilt.weight(2, "traits"), index.weight(2, "traits"));
    }
}
