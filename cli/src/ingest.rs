use anyhow::Result;
use mdsearch_core::{AddOutcome, ChunkParams, KnowledgeBase, UpdateMode};
use mdsearch_fetch::{is_url, FetchConfig, Fetcher};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown"];

pub struct IngestOptions {
    pub params: ChunkParams,
    pub mode: UpdateMode,
    pub save_dir: Option<PathBuf>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Url(String),
    File(PathBuf),
}

#[derive(Debug, Default)]
pub struct IngestReport {
    pub added: usize,
    pub skipped: usize,
    pub chunks: usize,
    /// `(input, reason)` for every input that could not be indexed.
    pub failed: Vec<(String, String)>,
}

impl IngestReport {
    pub fn succeeded(&self) -> usize { self.added + self.skipped }
}

/// Expand raw arguments into concrete inputs: URLs pass through, directories
/// are walked for markdown files, anything else must be an existing file.
pub fn resolve_inputs(raw: &[String]) -> (Vec<Input>, Vec<(String, String)>) {
    let mut inputs = Vec::new();
    let mut failed = Vec::new();
    for arg in raw {
        if is_url(arg) {
            inputs.push(Input::Url(arg.clone()));
            continue;
        }
        let path = Path::new(arg);
        if path.is_dir() {
            let before = inputs.len();
            for entry in WalkDir::new(path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
                if entry.file_type().is_file() && is_markdown(entry.path()) {
                    inputs.push(Input::File(entry.into_path()));
                }
            }
            if inputs.len() == before {
                tracing::warn!(dir = %path.display(), "no markdown files found");
            }
        } else if path.is_file() {
            inputs.push(Input::File(path.to_path_buf()));
        } else {
            failed.push((arg.clone(), "no such file, directory or URL".to_string()));
        }
    }
    (inputs, failed)
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map_or(false, |ext| MARKDOWN_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Index every input, isolating failures per document.
pub async fn process_inputs<W: Write>(
    kb: &KnowledgeBase,
    raw: &[String],
    opts: &IngestOptions,
    out: &mut W,
) -> Result<IngestReport> {
    let start = Instant::now();
    let (inputs, failed) = resolve_inputs(raw);
    let mut report = IngestReport { failed, ..IngestReport::default() };
    for (input, reason) in &report.failed {
        writeln!(out, "✗ {input}: {reason}")?;
    }

    let fetcher = if inputs.iter().any(|i| matches!(i, Input::Url(_))) {
        Some(Fetcher::new(FetchConfig::default())?)
    } else {
        None
    };

    for input in inputs {
        let (source, text) = match read_input(&input, fetcher.as_ref(), opts.save_dir.as_deref()).await {
            Ok(pair) => pair,
            Err(err) => {
                let label = label(&input);
                tracing::warn!(input = %label, error = %err, "could not read input");
                writeln!(out, "✗ {label}: {err:#}")?;
                report.failed.push((label, format!("{err:#}")));
                continue;
            }
        };

        match kb.add_document(&source, &text, &opts.params, opts.mode) {
            Ok(AddOutcome::Added { chunks }) => {
                writeln!(out, "✓ Added {chunks} chunks from {source}")?;
                report.added += 1;
                report.chunks += chunks;
            }
            Ok(AddOutcome::Skipped) => {
                writeln!(out, "- Skipped {source} (already indexed)")?;
                report.skipped += 1;
            }
            Err(err) => {
                tracing::error!(source = %source, error = %err, "could not index document");
                writeln!(out, "✗ {source}: {err}")?;
                report.failed.push((source, err.to_string()));
            }
        }
    }

    writeln!(
        out,
        "\nLoaded {} documents ({} skipped, {} failed) in {:.3}s",
        report.added,
        report.skipped,
        report.failed.len(),
        start.elapsed().as_secs_f64()
    )?;
    Ok(report)
}

fn label(input: &Input) -> String {
    match input {
        Input::Url(u) => u.clone(),
        Input::File(p) => p.display().to_string(),
    }
}

async fn read_input(input: &Input, fetcher: Option<&Fetcher>, save_dir: Option<&Path>) -> Result<(String, String)> {
    match input {
        Input::Url(url) => {
            let fetcher = fetcher.ok_or_else(|| anyhow::anyhow!("no fetcher available for {url}"))?;
            let doc = fetcher.fetch(url).await?;
            if let Some(dir) = save_dir {
                let target = dir.join(&doc.filename);
                match fs::create_dir_all(dir).and_then(|_| fs::write(&target, &doc.content)) {
                    Ok(()) => tracing::info!(path = %target.display(), "saved download"),
                    Err(e) => tracing::warn!(path = %target.display(), error = %e, "could not save download"),
                }
            }
            Ok((doc.url, doc.content))
        }
        Input::File(path) => {
            let text = fs::read_to_string(path)?;
            Ok((path.display().to_string(), text))
        }
    }
}
