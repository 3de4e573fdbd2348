use crate::error::{Error, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Characters searched on each side of a tentative cut for a natural break.
pub const SNAP_WINDOW: usize = 50;

pub const DEFAULT_CHUNK_SIZE: i64 = 500;
pub const DEFAULT_OVERLAP: i64 = 100;

lazy_static! {
    static ref BLANK_RUNS: Regex = Regex::new(r"\n\s*\n\s*\n+").expect("valid regex");
    // paragraph > sentence > word
    static ref BREAKS: [Regex; 3] = [
        Regex::new(r"\n\n").expect("valid regex"),
        Regex::new(r"[.!?]\s").expect("valid regex"),
        Regex::new(r"\s").expect("valid regex"),
    ];
}

/// Chunking parameters, measured in characters.
///
/// Kept signed so that out-of-range values coming from callers are rejected
/// with [`Error::InvalidParameter`] instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkParams {
    pub chunk_size: i64,
    pub overlap: i64,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self { chunk_size: DEFAULT_CHUNK_SIZE, overlap: DEFAULT_OVERLAP }
    }
}

impl ChunkParams {
    pub fn new(chunk_size: i64, overlap: i64) -> Self { Self { chunk_size, overlap } }

    /// Returns `(chunk_size, overlap)` as unsigned sizes once they are known to be usable.
    pub fn validate(&self) -> Result<(usize, usize)> {
        if self.chunk_size <= 0 {
            return Err(Error::InvalidParameter(format!("chunk_size must be positive, got {}", self.chunk_size)));
        }
        if self.overlap < 0 {
            return Err(Error::InvalidParameter(format!("overlap must be non-negative, got {}", self.overlap)));
        }
        if self.overlap >= self.chunk_size {
            return Err(Error::InvalidParameter(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok((self.chunk_size as usize, self.overlap as usize))
    }

    pub fn chunk(&self, text: &str) -> Result<Vec<String>> {
        let (chunk_size, overlap) = self.validate()?;
        let normalized = BLANK_RUNS.replace_all(text, "\n\n");
        Ok(split(&CharText::new(&normalized), chunk_size, overlap))
    }
}

/// Split markdown text into overlapping, boundary-snapped, trimmed segments.
pub fn chunk_markdown(text: &str, chunk_size: i64, overlap: i64) -> Result<Vec<String>> {
    ChunkParams::new(chunk_size, overlap).chunk(text)
}

/// Text addressed by character index rather than byte offset.
struct CharText<'a> {
    text: &'a str,
    // byte offset of every char, plus text.len() as the final entry
    offsets: Vec<usize>,
}

impl<'a> CharText<'a> {
    fn new(text: &'a str) -> Self {
        let mut offsets: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
        offsets.push(text.len());
        Self { text, offsets }
    }

    fn len(&self) -> usize { self.offsets.len() - 1 }

    fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.text[self.offsets[start]..self.offsets[end]]
    }

    fn char_index(&self, byte: usize) -> usize {
        self.offsets.binary_search(&byte).unwrap_or_else(|i| i)
    }
}

fn split(doc: &CharText<'_>, chunk_size: usize, overlap: usize) -> Vec<String> {
    let len = doc.len();
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < len {
        let mut end = (start + chunk_size).min(len);
        if end < len {
            if let Some(snapped) = snap(doc, start, end) {
                end = snapped;
            }
        }

        let piece = doc.slice(start, end).trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }
        if end >= len {
            break;
        }

        // A snapped end can land close enough to `start` that stepping back by
        // `overlap` would not move forward; always advance at least one char.
        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { start + 1 };
    }
    chunks
}

/// Character offset of the preferred break near `end`, if the window has one.
fn snap(doc: &CharText<'_>, start: usize, end: usize) -> Option<usize> {
    let lo = end.saturating_sub(SNAP_WINDOW).max(start);
    let hi = (end + SNAP_WINDOW).min(doc.len());
    let window = doc.slice(lo, hi);
    let base = doc.offsets[lo];

    BREAKS.iter().find_map(|re| {
        re.find_iter(window)
            .map(|m| doc.char_index(base + m.end()))
            .fold(None, |best: Option<usize>, candidate| match best {
                Some(b) if b.abs_diff(end) <= candidate.abs_diff(end) => Some(b),
                _ => Some(candidate),
            })
    })
}
