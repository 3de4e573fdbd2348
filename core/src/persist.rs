use crate::error::Result;
use crate::index::{Chunk, ChunkId, IdfEntry, Index, TermWeight};
use serde::{Deserialize, Serialize};
use sled::transaction::TransactionResult;
use sled::Transactional;
use std::path::Path;
use time::format_description::well_known::Rfc3339;

pub const FORMAT_VERSION: u32 = 1;
const META_KEY: &[u8] = b"meta";

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub next_chunk_id: ChunkId,
    pub updated_at: String,
    pub version: u32,
}

/// Chunks touched by one add/remove operation. Term weights and the IDF
/// table are rewritten wholesale on every commit since a refresh changes them all.
#[derive(Debug, Default)]
pub struct Changeset {
    pub added: Vec<ChunkId>,
    pub removed: Vec<ChunkId>,
}

impl Changeset {
    pub fn is_empty(&self) -> bool { self.added.is_empty() && self.removed.is_empty() }
}

/// sled-backed tables: `chunks`, `term_weights`, `idf` and a JSON `meta` record.
pub struct Store {
    db: sled::Db,
    chunks: sled::Tree,
    weights: sled::Tree,
    idf: sled::Tree,
    meta: sled::Tree,
}

fn chunk_key(id: ChunkId) -> [u8; 8] { id.to_be_bytes() }

fn weight_key(id: ChunkId, term: &str) -> Vec<u8> {
    let mut key = chunk_key(id).to_vec();
    key.extend_from_slice(term.as_bytes());
    key
}

impl Store {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_db(sled::open(path)?)
    }

    /// A store that lives only as long as this value.
    pub fn temporary() -> Result<Self> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: sled::Db) -> Result<Self> {
        Ok(Self {
            chunks: db.open_tree("chunks")?,
            weights: db.open_tree("term_weights")?,
            idf: db.open_tree("idf")?,
            meta: db.open_tree("meta")?,
            db,
        })
    }

    pub fn load_meta(&self) -> Result<Option<MetaFile>> {
        match self.meta.get(META_KEY)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Read every table back into an in-memory [`Index`].
    pub fn load(&self) -> Result<Index> {
        let chunks = self
            .chunks
            .iter()
            .values()
            .map(|v| -> Result<Chunk> { Ok(bincode::deserialize(&v?)?) })
            .collect::<Result<Vec<_>>>()?;
        let weights = self
            .weights
            .iter()
            .values()
            .map(|v| -> Result<TermWeight> { Ok(bincode::deserialize(&v?)?) })
            .collect::<Result<Vec<_>>>()?;
        let idf = self
            .idf
            .iter()
            .values()
            .map(|v| -> Result<IdfEntry> { Ok(bincode::deserialize(&v?)?) })
            .collect::<Result<Vec<_>>>()?;
        let next_id = self.load_meta()?.map_or(1, |m| m.next_chunk_id);

        let index = Index::from_parts(chunks, weights, idf, next_id);
        let stats = index.stats();
        tracing::info!(chunks = stats.chunk_count, terms = stats.unique_terms, "loaded index");
        Ok(index)
    }

    /// Write the outcome of one mutation in a single transaction across all tables.
    pub fn commit(&self, index: &Index, changes: &Changeset) -> Result<()> {
        let chunk_dels: Vec<[u8; 8]> = changes.removed.iter().map(|id| chunk_key(*id)).collect();
        let mut chunk_puts = Vec::with_capacity(changes.added.len());
        for id in &changes.added {
            if let Some(chunk) = index.chunk(*id) {
                chunk_puts.push((chunk_key(*id), bincode::serialize(chunk)?));
            }
        }

        let mut weight_dels = Vec::new();
        for id in &changes.removed {
            for key in self.weights.scan_prefix(chunk_key(*id)).keys() {
                weight_dels.push(key?);
            }
        }
        let weight_puts = index
            .term_weights()
            .map(|w| -> Result<(Vec<u8>, Vec<u8>)> { Ok((weight_key(w.chunk_id, &w.term), bincode::serialize(w)?)) })
            .collect::<Result<Vec<_>>>()?;

        let mut idf_dels = Vec::new();
        for key in self.idf.iter().keys() {
            let key = key?;
            let live = std::str::from_utf8(&key).map_or(false, |term| index.idf_entry(term).is_some());
            if !live {
                idf_dels.push(key);
            }
        }
        let idf_puts = index
            .idf_entries()
            .map(|e| -> Result<(Vec<u8>, Vec<u8>)> { Ok((e.term.as_bytes().to_vec(), bincode::serialize(e)?)) })
            .collect::<Result<Vec<_>>>()?;

        let updated_at = time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();
        let meta = serde_json::to_vec(&MetaFile { next_chunk_id: index.next_id(), updated_at, version: FORMAT_VERSION })?;

        let result: TransactionResult<(), ()> = (&self.chunks, &self.weights, &self.idf, &self.meta).transaction(
            |(chunks, weights, idf, meta_tree)| {
                for key in &chunk_dels {
                    chunks.remove(&key[..])?;
                }
                for (key, value) in &chunk_puts {
                    chunks.insert(&key[..], value.as_slice())?;
                }
                for key in &weight_dels {
                    weights.remove(&key[..])?;
                }
                for (key, value) in &weight_puts {
                    weights.insert(key.as_slice(), value.as_slice())?;
                }
                for key in &idf_dels {
                    idf.remove(&key[..])?;
                }
                for (key, value) in &idf_puts {
                    idf.insert(key.as_slice(), value.as_slice())?;
                }
                meta_tree.insert(META_KEY, meta.as_slice())?;
                Ok(())
            },
        );
        result?;
        self.flush()?;
        tracing::debug!(added = changes.added.len(), removed = changes.removed.len(), "committed changes");
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}
