use crate::ingest::{process_inputs, IngestOptions};
use crate::{open_kb, report, DEFAULT_DB, MEMORY_DB};
use anyhow::Result;
use mdsearch_core::{ChunkParams, UpdateMode, DEFAULT_TOP_K};
use std::fs;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;

const QUIT_WORDS: &[&str] = &["quit", "exit", "q"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Choice {
    Search,
    Process(UpdateMode),
}

/// Prompt-driven wizard used when the binary runs without a subcommand.
pub struct InteractiveSession<R, W> {
    input: R,
    out: W,
    /// Directory scanned for existing `*.db` databases.
    dir: PathBuf,
}

impl<R: BufRead, W: Write> InteractiveSession<R, W> {
    pub fn new(input: R, out: W, dir: PathBuf) -> Self {
        Self { input, out, dir }
    }

    /// Print `msg` and read one trimmed line; `None` once input is exhausted.
    fn prompt(&mut self, msg: &str) -> Result<Option<String>> {
        write!(self.out, "{msg}")?;
        self.out.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn existing_databases(&self) -> Vec<String> {
        let mut dbs: Vec<String> = fs::read_dir(&self.dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter_map(|e| e.file_name().into_string().ok())
                    .filter(|name| name.ends_with(".db"))
                    .collect()
            })
            .unwrap_or_default();
        dbs.sort();
        dbs
    }

    fn select_database(&mut self, existing: &[String]) -> Result<Option<String>> {
        writeln!(self.out, "\nAvailable Databases:")?;
        for (i, db) in existing.iter().enumerate() {
            writeln!(self.out, "   {}. {}", i + 1, db)?;
        }
        loop {
            let Some(choice) = self.prompt(&format!("\nSelect a database number (or press Enter for '{DEFAULT_DB}'): "))? else {
                return Ok(None);
            };
            if choice.is_empty() {
                return Ok(Some(DEFAULT_DB.to_string()));
            }
            match choice.parse::<usize>() {
                Ok(n) if (1..=existing.len()).contains(&n) => return Ok(Some(existing[n - 1].clone())),
                Ok(_) => writeln!(self.out, "Invalid selection. Please try again.")?,
                Err(_) if choice.ends_with(".db") => return Ok(Some(choice)),
                Err(_) => return Ok(Some(format!("{choice}.db"))),
            }
        }
    }

    fn choose_mode(&mut self) -> Result<Option<Choice>> {
        writeln!(self.out, "\nWhat would you like to do?")?;
        writeln!(self.out, "1. Search an existing database")?;
        writeln!(self.out, "2. Process new documents (replace existing)")?;
        writeln!(self.out, "3. Incremental add (skip already indexed)")?;
        loop {
            let Some(choice) = self.prompt("\nSelect option (1, 2, or 3): ")? else { return Ok(None) };
            match choice.as_str() {
                "1" => return Ok(Some(Choice::Search)),
                "2" => return Ok(Some(Choice::Process(UpdateMode::Replace))),
                "3" => return Ok(Some(Choice::Process(UpdateMode::Skip))),
                _ => writeln!(self.out, "Invalid option. Please enter 1, 2, or 3.")?,
            }
        }
    }

    pub async fn run(mut self) -> Result<()> {
        writeln!(self.out, "{}", "=".repeat(80))?;
        writeln!(self.out, "MARKDOWN SEARCH")?;
        writeln!(self.out, "{}", "=".repeat(80))?;

        let existing = self.existing_databases();
        let Some(mut choice) = self.choose_mode()? else { return Ok(()) };

        let db_name = match choice {
            Choice::Search if existing.is_empty() => {
                writeln!(self.out, "\nNo existing databases found. Switching to processing mode.")?;
                choice = Choice::Process(UpdateMode::Replace);
                DEFAULT_DB.to_string()
            }
            Choice::Search => match self.select_database(&existing)? {
                Some(name) => name,
                None => return Ok(()),
            },
            Choice::Process(mode) => {
                let verb = if mode == UpdateMode::Replace { "update" } else { "incrementally update" };
                let Some(name) = self.prompt(&format!("\nEnter database name to {verb} (default: '{DEFAULT_DB}'): "))? else {
                    return Ok(());
                };
                if name.is_empty() { DEFAULT_DB.to_string() } else { name }
            }
        };

        let db_path = if db_name == MEMORY_DB {
            db_name
        } else {
            self.dir.join(&db_name).to_string_lossy().into_owned()
        };
        let kb = open_kb(&db_path)?;

        if let Choice::Process(mode) = choice {
            let title = if mode == UpdateMode::Replace { "REPLACE" } else { "INCREMENTAL" };
            writeln!(self.out, "\n{title} MODE")?;
            writeln!(self.out, "Enter URLs, local file paths, or directories (one per line, empty line to finish):")?;
            let mut inputs = Vec::new();
            while let Some(path) = self.prompt("URL/Path/Dir: ")? {
                if path.is_empty() {
                    break;
                }
                inputs.push(path);
            }
            let opts = IngestOptions { params: ChunkParams::default(), mode, save_dir: None };
            process_inputs(&kb, &inputs, &opts, &mut self.out).await?;
        }

        let stats = kb.stats();
        report::print_stats(&mut self.out, &stats)?;
        if stats.file_count == 0 && choice == Choice::Search {
            writeln!(self.out, "Please run in processing mode (option 2) to add documents.")?;
            kb.close()?;
            return Ok(());
        }

        writeln!(self.out, "\n{}", "=".repeat(80))?;
        writeln!(self.out, "SEARCH - Enter your queries (type 'quit' to exit)")?;
        writeln!(self.out, "{}", "=".repeat(80))?;
        while let Some(query) = self.prompt("\nEnter your search query (or 'quit/exit/q' to exit): ")? {
            if QUIT_WORDS.contains(&query.to_lowercase().as_str()) {
                break;
            }
            if query.is_empty() {
                continue;
            }
            let start = Instant::now();
            let hits = kb.search(&query, DEFAULT_TOP_K);
            report::print_results(&mut self.out, &query, &hits, start.elapsed())?;
        }

        kb.close()?;
        writeln!(self.out, "\nDone!")?;
        Ok(())
    }
}
