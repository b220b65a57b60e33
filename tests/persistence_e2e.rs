use paperknn::{Corpus, CorpusLoadError, Record, SearchEngine};
use std::time::Instant;
use tempfile::{NamedTempFile, TempDir};

fn random_vector(dim: usize, seed: u64) -> Vec<f32> {
    // Simple LCG pseudo-random generator
    let mut state = seed;
    (0..dim)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            // Map to [-1.0, 1.0]
            ((state >> 33) as f32) / (u32::MAX as f32) * 2.0 - 1.0
        })
        .collect()
}

#[test]
fn test_snapshot_10k_records_and_search() {
    let dim = 384;
    let num_records = 10_000;
    let num_searches = 20;

    // Phase 1: Build corpus
    let start = Instant::now();
    let records = (0..num_records)
        .map(|i| Record::new(format!("paper_{}", i), format!("Paper {}", i), random_vector(dim, i as u64)))
        .collect();
    let corpus = Corpus::from_records(records);
    assert_eq!(corpus.len(), num_records);
    println!("Build {} records: {:.3}s", num_records, start.elapsed().as_secs_f64());

    // Phase 2: Save snapshot
    let temp = NamedTempFile::new().unwrap();
    corpus.save_snapshot(temp.path()).unwrap();

    // Phase 3: Load it back
    let loaded = Corpus::load_snapshot(temp.path()).unwrap();
    assert_eq!(loaded, corpus);
    drop(corpus);

    // Phase 4: Search
    let engine = SearchEngine::new(loaded);
    let start = Instant::now();
    for i in 0..num_searches {
        let query = random_vector(dim, (num_records + i) as u64);
        let results = engine.search(&query, 10).unwrap();

        assert_eq!(results.len(), 10);
        // Verify results are sorted by score descending
        for w in results.windows(2) {
            assert!(w[0].score >= w[1].score, "Results not sorted by score");
        }
    }
    println!("{} searches: {:.3}s", num_searches, start.elapsed().as_secs_f64());
}

#[test]
fn test_snapshot_finds_exact_record() {
    let records = (0..100)
        .map(|i| Record::new(format!("paper_{}", i), "", random_vector(16, i)))
        .collect();
    let temp = NamedTempFile::new().unwrap();
    Corpus::from_records(records).save_snapshot(temp.path()).unwrap();

    let engine = SearchEngine::new(Corpus::load_snapshot(temp.path()).unwrap());
    let results = engine.search(&random_vector(16, 42), 1).unwrap();

    assert_eq!(results[0].record.id, "paper_42");
    assert!((results[0].score - 1.0).abs() < 1e-5);
}

#[test]
fn test_snapshot_preserves_optional_fields() {
    let mut record = Record::new("2101.00001", "Paper A", vec![0.5, 0.5]);
    record.category = Some("cs.LG".to_string());
    record.authors = Some("Alice, Bob".to_string());
    let corpus = Corpus::from_records(vec![record.clone()]);

    let temp = NamedTempFile::new().unwrap();
    corpus.save_snapshot(temp.path()).unwrap();
    let loaded = Corpus::load_snapshot(temp.path()).unwrap();

    assert_eq!(loaded.get(0), Some(&record));
}

#[test]
fn test_load_snapshot_missing_file() {
    let dir = TempDir::new().unwrap();
    let result = Corpus::load_snapshot(dir.path().join("missing.pknn"));

    assert!(matches!(result, Err(CorpusLoadError::SourceUnreadable { .. })));
}

#[test]
fn test_load_snapshot_rejects_foreign_file() {
    let temp = NamedTempFile::new().unwrap();
    std::fs::write(temp.path(), b"id,title\nA,Paper A\n").unwrap();

    let result = Corpus::load_snapshot(temp.path());
    assert!(matches!(result, Err(CorpusLoadError::InvalidSnapshot { .. })));
}

#[test]
fn test_save_snapshot_to_missing_directory() {
    let dir = TempDir::new().unwrap();
    let corpus = Corpus::from_records(vec![Record::new("A", "", vec![1.0])]);

    let result = corpus.save_snapshot(dir.path().join("no/such/dir/out.pknn"));
    assert!(matches!(result, Err(CorpusLoadError::SnapshotWrite { .. })));
}
