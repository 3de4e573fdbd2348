use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mdsearch_core::chunker::{DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP};
use mdsearch_core::{ChunkParams, KnowledgeBase, UpdateMode, DEFAULT_TOP_K};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::{fmt, EnvFilter};

mod ingest;
mod interactive;
mod report;

use ingest::{process_inputs, IngestOptions};
use interactive::InteractiveSession;

const DEFAULT_DB: &str = "knowledge_base.db";
/// Database name that maps to a throwaway store.
const MEMORY_DB: &str = ":memory:";

#[derive(Parser)]
#[command(name = "mdsearch", version)]
#[command(about = "Search your markdown docs with TF-IDF ranking, no embeddings needed", long_about = None)]
#[command(after_help = "Examples:\n  mdsearch search \"how to use\" --top 5\n  mdsearch add ./docs/ --mode skip\n  mdsearch stats\n\nRun without a subcommand for an interactive session.")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the knowledge base using natural language
    Search {
        /// The natural language query to search for
        query: String,
        /// Database to search
        #[arg(long, default_value = DEFAULT_DB)]
        db: String,
        /// Number of top results to return
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top: usize,
        /// Print results as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Add markdown files, directories or URLs to the knowledge base
    Add {
        /// One or more URLs, local file paths, or directories to index
        #[arg(required = true)]
        paths: Vec<String>,
        /// Database to add documents to
        #[arg(long, default_value = DEFAULT_DB)]
        db: String,
        /// 'replace' re-indexes sources that exist, 'skip' leaves them alone
        #[arg(long, default_value_t = UpdateMode::Replace)]
        mode: UpdateMode,
        /// Target chunk size in characters
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE, allow_negative_numbers = true)]
        chunk_size: i64,
        /// Characters shared by consecutive chunks
        #[arg(long, default_value_t = DEFAULT_OVERLAP, allow_negative_numbers = true)]
        overlap: i64,
        /// Also save downloaded URLs into this directory
        #[arg(long)]
        save_dir: Option<PathBuf>,
    },
    /// Remove indexed sources from the knowledge base
    Remove {
        /// Source identifiers as shown by search results
        #[arg(required = true)]
        sources: Vec<String>,
        #[arg(long, default_value = DEFAULT_DB)]
        db: String,
    },
    /// Show statistics about the indexed documents
    Stats {
        #[arg(long, default_value = DEFAULT_DB)]
        db: String,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(io::stderr).init();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        let stdin = io::stdin();
        let dir = std::env::current_dir()?;
        return InteractiveSession::new(stdin.lock(), io::stdout(), dir).run().await;
    };

    match command {
        Commands::Search { query, db, top, json } => {
            let kb = open_kb(&db)?;
            let start = Instant::now();
            let hits = kb.search(&query, top);
            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else {
                report::print_results(&mut io::stdout(), &query, &hits, start.elapsed())?;
            }
            kb.close()?;
        }
        Commands::Add { paths, db, mode, chunk_size, overlap, save_dir } => {
            let params = ChunkParams::new(chunk_size, overlap);
            params.validate()?;
            let kb = open_kb(&db)?;
            let opts = IngestOptions { params, mode, save_dir };
            let report = process_inputs(&kb, &paths, &opts, &mut io::stdout()).await?;
            kb.close()?;
            if report.succeeded() == 0 && !report.failed.is_empty() {
                bail!("none of the {} inputs could be indexed", report.failed.len());
            }
        }
        Commands::Remove { sources, db } => {
            let kb = open_kb(&db)?;
            for source in &sources {
                match kb.remove_source(source)? {
                    0 => println!("- {source} is not indexed"),
                    n => println!("✓ Removed {n} chunks from {source}"),
                }
            }
            kb.close()?;
        }
        Commands::Stats { db, json } => {
            let kb = open_kb(&db)?;
            let stats = kb.stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                report::print_stats(&mut io::stdout(), &stats)?;
            }
            kb.close()?;
        }
    }
    Ok(())
}

fn open_kb(db: &str) -> Result<KnowledgeBase> {
    if db == MEMORY_DB {
        return Ok(KnowledgeBase::temporary()?);
    }
    KnowledgeBase::open(Path::new(db)).with_context(|| format!("failed to open database {db}"))
}
