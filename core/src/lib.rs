//! Markdown search core: chunking, tokenization, TF-IDF weighting, a
//! sled-backed index store and restricted-cosine query ranking.

pub mod chunker;
pub mod error;
pub mod index;
pub mod knowledge_base;
pub mod persist;
pub mod query;
pub mod tokenizer;
pub mod weights;

pub use chunker::{chunk_markdown, ChunkParams};
pub use error::{Error, Result};
pub use index::{Chunk, ChunkId, IdfEntry, Index, IndexStats, TermWeight};
pub use knowledge_base::{AddOutcome, KnowledgeBase, UpdateMode};
pub use query::{SearchHit, DEFAULT_TOP_K};
