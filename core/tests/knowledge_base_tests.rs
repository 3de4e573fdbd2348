use mdsearch_core::{AddOutcome, ChunkParams, KnowledgeBase, UpdateMode};
use tempfile::tempdir;

fn long_document() -> String {
    (0..30)
        .map(|i| match i {
            7 => "The zeppelin hangar section describes airship storage in detail. ".to_string(),
            _ => format!("Paragraph {i} covers caching strategies and eviction policies for services. "),
        })
        .collect()
}

#[test]
fn end_to_end_ranking() {
    let kb = KnowledgeBase::temporary().unwrap();
    let params = ChunkParams::default();
    kb.add_document("python_guide", "Python provides dictionaries for fast lookup", &params, UpdateMode::Replace)
        .unwrap();
    kb.add_document("database_guide", "DuckDB provides fast analytical queries", &params, UpdateMode::Replace)
        .unwrap();

    let hits = kb.search("fast lookup", 3);
    assert_eq!(hits[0].source, "python_guide");
    let db_rank = hits.iter().position(|h| h.source == "database_guide");
    assert!(db_rank.map_or(true, |r| r > 0));

    assert!(kb.search("xylophone", 3).is_empty());
}

#[test]
fn rare_term_has_unit_document_frequency_and_positive_score() {
    let kb = KnowledgeBase::temporary().unwrap();
    let outcome = kb
        .add_document("manual.md", &long_document(), &ChunkParams::new(200, 40), UpdateMode::Replace)
        .unwrap();
    let AddOutcome::Added { chunks } = outcome else { panic!("expected chunks to be added") };
    assert!(chunks > 1);

    let hits = kb.search("zeppelin", 5);
    assert_eq!(hits.len(), 1);
    assert!(hits[0].text.contains("zeppelin"));
    assert!(hits[0].score > 0.0);
}

#[test]
fn skip_mode_is_idempotent() {
    let kb = KnowledgeBase::temporary().unwrap();
    let params = ChunkParams::new(200, 40);
    kb.add_document("manual.md", &long_document(), &params, UpdateMode::Skip).unwrap();
    let before = kb.stats();

    let outcome = kb.add_document("manual.md", "completely different text", &params, UpdateMode::Skip).unwrap();
    assert_eq!(outcome, AddOutcome::Skipped);
    let after = kb.stats();
    assert_eq!(after.chunk_count, before.chunk_count);
    assert_eq!(after.unique_terms, before.unique_terms);
}

#[test]
fn replace_round_trip_reproduces_chunks() {
    let kb = KnowledgeBase::temporary().unwrap();
    let params = ChunkParams::new(200, 40);
    let text = long_document();
    kb.add_document("manual.md", &text, &params, UpdateMode::Replace).unwrap();
    let first_counts = kb.token_counts("manual.md");
    let first_stats = kb.stats();

    assert_eq!(kb.remove_source("manual.md").unwrap(), first_counts.len());
    assert_eq!(kb.stats().chunk_count, 0);
    kb.add_document("manual.md", &text, &params, UpdateMode::Replace).unwrap();

    assert_eq!(kb.token_counts("manual.md"), first_counts);
    assert_eq!(kb.stats().chunk_count, first_stats.chunk_count);

    // replacing in place gives the same result
    kb.add_document("manual.md", &text, &params, UpdateMode::Replace).unwrap();
    assert_eq!(kb.token_counts("manual.md"), first_counts);
    assert_eq!(kb.stats(), first_stats);
}

#[test]
fn removing_unknown_source_is_a_no_op() {
    let kb = KnowledgeBase::temporary().unwrap();
    assert_eq!(kb.remove_source("nowhere.md").unwrap(), 0);
}

#[test]
fn empty_document_adds_nothing() {
    let kb = KnowledgeBase::temporary().unwrap();
    let outcome = kb.add_document("empty.md", "\n\n  \n", &ChunkParams::default(), UpdateMode::Replace).unwrap();
    assert_eq!(outcome, AddOutcome::Added { chunks: 0 });
    assert_eq!(kb.stats().chunk_count, 0);
}

#[test]
fn state_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("knowledge_base.db");
    let params = ChunkParams::new(200, 40);

    let kb = KnowledgeBase::open(&path).unwrap();
    kb.add_document("manual.md", &long_document(), &params, UpdateMode::Replace).unwrap();
    kb.add_document("python_guide", "Python provides dictionaries for fast lookup", &params, UpdateMode::Replace)
        .unwrap();
    let stats = kb.stats();
    let hits = kb.search("zeppelin", 3);
    kb.close().unwrap();

    let kb = KnowledgeBase::open(&path).unwrap();
    assert_eq!(kb.stats(), stats);
    assert_eq!(kb.search("zeppelin", 3), hits);
    assert_eq!(kb.sources(), vec!["manual.md".to_string(), "python_guide".to_string()]);

    // ids keep counting after reopen; a replace must not collide with stored rows
    kb.add_document("python_guide", "Python provides sets too", &params, UpdateMode::Replace).unwrap();
    assert_eq!(kb.stats().file_count, 2);
}
