use crate::chunker::ChunkParams;
use crate::error::Result;
use crate::index::{Index, IndexStats};
use crate::persist::{Changeset, Store};
use crate::query::{self, SearchHit};
use crate::weights::prepare_document;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// How an add treats a source that is already indexed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    /// Drop the existing chunks and index the new text.
    #[default]
    Replace,
    /// Leave the existing chunks untouched.
    Skip,
}

impl FromStr for UpdateMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "replace" => Ok(UpdateMode::Replace),
            "skip" => Ok(UpdateMode::Skip),
            other => Err(format!("unknown update mode '{other}' (expected 'replace' or 'skip')")),
        }
    }
}

impl fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateMode::Replace => f.write_str("replace"),
            UpdateMode::Skip => f.write_str("skip"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AddOutcome {
    Added { chunks: usize },
    Skipped,
}

/// An opened knowledge base: the in-memory index plus the store it mirrors.
///
/// Writers (add/remove) hold the write lock across mutation, IDF refresh and
/// commit, so readers never see chunks without matching IDF values.
pub struct KnowledgeBase {
    index: RwLock<Index>,
    store: Store,
}

impl KnowledgeBase {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let store = Store::open(path)?;
        let index = store.load()?;
        tracing::info!(path = %path.display(), "opened knowledge base");
        Ok(Self { index: RwLock::new(index), store })
    }

    /// A knowledge base discarded when dropped.
    pub fn temporary() -> Result<Self> {
        let store = Store::temporary()?;
        let index = store.load()?;
        Ok(Self { index: RwLock::new(index), store })
    }

    /// Chunk, weight and index `text` under `source`.
    ///
    /// Parameter validation and chunking run before the write lock is taken.
    pub fn add_document(&self, source: &str, text: &str, params: &ChunkParams, mode: UpdateMode) -> Result<AddOutcome> {
        let drafts = prepare_document(text, params)?;

        let mut index = self.index.write();
        if mode == UpdateMode::Skip && index.has_source(source) {
            tracing::info!(source, "already indexed, skipping");
            return Ok(AddOutcome::Skipped);
        }

        let removed = index.remove_source(source);
        let chunks = drafts.len();
        let added = index.insert_document(source, drafts);
        index.refresh_idf();

        let changes = Changeset { added, removed };
        if let Err(err) = self.store.commit(&index, &changes) {
            self.rollback(&mut index);
            return Err(err);
        }
        tracing::info!(source, chunks, replaced = !changes.removed.is_empty(), "indexed document");
        Ok(AddOutcome::Added { chunks })
    }

    /// Remove all chunks of `source`; returns how many were removed (0 if unknown).
    pub fn remove_source(&self, source: &str) -> Result<usize> {
        let mut index = self.index.write();
        let removed = index.remove_source(source);
        if removed.is_empty() {
            tracing::debug!(source, "source not indexed");
            return Ok(0);
        }
        index.refresh_idf();

        let count = removed.len();
        if let Err(err) = self.store.commit(&index, &Changeset { added: Vec::new(), removed }) {
            self.rollback(&mut index);
            return Err(err);
        }
        tracing::info!(source, chunks = count, "removed source");
        Ok(count)
    }

    pub fn search(&self, query: &str, top_k: usize) -> Vec<SearchHit> {
        query::search(&self.index.read(), query, top_k)
    }

    pub fn stats(&self) -> IndexStats { self.index.read().stats() }

    pub fn has_source(&self, source: &str) -> bool { self.index.read().has_source(source) }

    pub fn sources(&self) -> Vec<String> { self.index.read().sources().map(str::to_string).collect() }

    /// Token counts of a source's chunks in position order.
    pub fn token_counts(&self, source: &str) -> Vec<u32> {
        self.index.read().chunks_for_source(source).iter().map(|c| c.token_count).collect()
    }

    /// Flush outstanding writes and release the store.
    pub fn close(self) -> Result<()> {
        self.store.flush()?;
        tracing::debug!("closed knowledge base");
        Ok(())
    }

    // The failed commit never applied, so the store still holds the previous state.
    fn rollback(&self, index: &mut Index) {
        match self.store.load() {
            Ok(previous) => *index = previous,
            Err(e) => tracing::error!(error = %e, "could not reload index after failed commit"),
        }
    }
}

impl fmt::Debug for KnowledgeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KnowledgeBase").field("stats", &self.stats()).finish()
    }
}
