use mdsearch_core::{IndexStats, SearchHit};
use std::io::{self, Write};
use std::time::Duration;

const PREVIEW_CHARS: usize = 150;

pub fn print_stats<W: Write>(out: &mut W, stats: &IndexStats) -> io::Result<()> {
    writeln!(out, "\nKnowledge Base Stats:")?;
    writeln!(out, "   Files: {}", stats.file_count)?;
    writeln!(out, "   Chunks: {}", stats.chunk_count)?;
    writeln!(out, "   Avg tokens/chunk: {:.2}", stats.avg_tokens)?;
    writeln!(out, "   Unique terms: {}", stats.unique_terms)
}

pub fn print_results<W: Write>(out: &mut W, query: &str, hits: &[SearchHit], took: Duration) -> io::Result<()> {
    writeln!(out, "\nQuery: '{}' ({:.2}ms)\n", query, took.as_secs_f64() * 1000.0)?;
    if hits.is_empty() {
        return writeln!(out, "  No results found.");
    }
    for (i, hit) in hits.iter().enumerate() {
        writeln!(out, "  {}. Score: {:.4} | {}", i + 1, hit.score, hit.source)?;
        writeln!(out, "     {}...", preview(&hit.text))?;
        writeln!(out)?;
    }
    Ok(())
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).map(|c| if c == '\n' { ' ' } else { c }).collect()
}
