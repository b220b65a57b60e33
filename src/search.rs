//! The search module
//! Exact top-k cosine ranking over a loaded corpus

use crate::corpus::{Corpus, Record};
use crate::error::SearchError;
use crate::vector::cosine_similarity;
use serde::Serialize;
use tracing::debug;

/// One ranked hit. Borrows the record from the engine's corpus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchResult<'a> {
    pub score: f32,
    /// Position of the record in the corpus.
    pub index: usize,
    pub record: &'a Record,
}

/// Owns a corpus and answers similarity queries against it.
#[derive(Debug, Clone, Default)]
pub struct SearchEngine {
    corpus: Corpus,
}

impl SearchEngine {
    pub fn new(corpus: Corpus) -> SearchEngine {
        SearchEngine { corpus }
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn into_corpus(self) -> Corpus {
        self.corpus
    }

    /// Returns the `top_k` records most similar to `query`.
    ///
    /// Every record is scored with cosine similarity. Results come back in
    /// descending score order, records with equal scores keep their corpus
    /// order. `top_k == 0` yields an empty list without scoring anything, and a
    /// `top_k` larger than the corpus yields the whole corpus ranked.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<SearchResult>)` - At most `top_k` results
    /// * `Err(SearchError::DimensionMismatch)` - If the query length differs from
    ///   any record's embedding; the whole search is abandoned
    ///
    /// # Examples
    ///
    /// ```
    /// use paperknn::{Corpus, Record, SearchEngine};
    ///
    /// let engine = SearchEngine::new(Corpus::from_records(vec![
    ///     Record::new("A", "Paper A", vec![1.0, 0.0]),
    ///     Record::new("B", "Paper B", vec![0.0, 1.0]),
    ///     Record::new("C", "Paper C", vec![1.0, 1.0]),
    /// ]));
    ///
    /// let results = engine.search(&[1.0, 0.0], 2).unwrap();
    /// assert_eq!(results[0].record.id, "A");
    /// assert_eq!(results[1].record.id, "C");
    /// assert!((results[1].score - 0.707).abs() < 0.001);
    /// ```
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchResult<'_>>, SearchError> {
        if top_k == 0 || self.corpus.is_empty() {
            return Ok(Vec::new());
        }

        let results = if top_k >= self.corpus.len() {
            self.rank_all(query)?
        } else {
            self.rank_bounded(query, top_k)?
        };

        debug!(top_k, corpus = self.corpus.len(), results = results.len(), "search finished");
        Ok(results)
    }

    fn score(&self, query: &[f32], index: usize, record: &Record) -> Result<f32, SearchError> {
        cosine_similarity(&record.embedding, query)
            .map_err(|_| SearchError::DimensionMismatch {
                index,
                id: record.id.clone(),
                expected: record.embedding.len(),
                actual: query.len(),
            })
    }

    /// Scores everything, then a stable sort keeps ties in corpus order.
    fn rank_all(&self, query: &[f32]) -> Result<Vec<SearchResult<'_>>, SearchError> {
        let mut scored = self.corpus.iter()
            .enumerate()
            .map(|(index, record)| {
                self.score(query, index, record)
                    .map(|score| SearchResult { score, index, record })
            })
            .collect::<Result<Vec<_>, _>>()?;

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(scored)
    }

    /// Keeps a sorted buffer of the best `top_k` while scanning.
    /// A new entry goes after every buffered entry with a score >= its own,
    /// which gives the same order as a stable full sort.
    fn rank_bounded(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchResult<'_>>, SearchError> {
        let mut best: Vec<(usize, f32)> = Vec::with_capacity(top_k + 1);

        for (index, record) in self.corpus.iter().enumerate() {
            let sim = self.score(query, index, record)?;
            if best.len() == top_k && best[top_k - 1].1.total_cmp(&sim).is_ge() {
                continue;
            }
            let insert_index = best.partition_point(|x| x.1.total_cmp(&sim).is_ge());
            best.insert(insert_index, (index, sim));
            best.truncate(top_k);
        }

        let results = best.into_iter()
            .filter_map(|(index, score)| {
                self.corpus.get(index).map(|record| SearchResult { score, index, record })
            })
            .collect();

        Ok(results)
    }
}

#[cfg(test)]
mod search_test {
    use super::*;

    fn paper_engine() -> SearchEngine {
        SearchEngine::new(Corpus::from_records(vec![
            Record::new("A", "Paper A", vec![1.0, 0.0]),
            Record::new("B", "Paper B", vec![0.0, 1.0]),
            Record::new("C", "Paper C", vec![1.0, 1.0]),
        ]))
    }

    fn ids<'a>(results: &[SearchResult<'a>]) -> Vec<&'a str> {
        results.iter().map(|r| r.record.id.as_str()).collect()
    }

    #[test]
    fn test_search_basic() {
        let engine = paper_engine();
        let results = engine.search(&[1.0, 0.0], 2).unwrap();

        assert_eq!(ids(&results), vec!["A", "C"]);
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert!((results[1].score - 0.70710677).abs() < 1e-5);
        assert_eq!(results[1].index, 2);
    }

    #[test]
    fn test_search_zero_k() {
        let engine = paper_engine();
        assert!(engine.search(&[1.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_search_zero_k_skips_dimension_check() {
        let engine = paper_engine();
        assert!(engine.search(&[1.0, 0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_search_k_larger_than_corpus() {
        let engine = paper_engine();
        let results = engine.search(&[1.0, 0.0], 10).unwrap();

        assert_eq!(ids(&results), vec!["A", "C", "B"]);
    }

    #[test]
    fn test_search_k_equals_corpus() {
        let engine = paper_engine();
        let results = engine.search(&[0.0, 1.0], 3).unwrap();

        assert_eq!(ids(&results), vec!["B", "C", "A"]);
    }

    #[test]
    fn test_search_empty_corpus() {
        let engine = SearchEngine::default();
        assert!(engine.search(&[1.0, 2.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_search_dimension_mismatch() {
        let engine = paper_engine();
        let result = engine.search(&[1.0, 2.0, 3.0], 1);

        assert_eq!(result.unwrap_err(), SearchError::DimensionMismatch {
            index: 0,
            id: "A".to_string(),
            expected: 2,
            actual: 3,
        });
    }

    #[test]
    fn test_search_dimension_mismatch_in_later_record_aborts() {
        let engine = SearchEngine::new(Corpus::from_records(vec![
            Record::new("A", "", vec![1.0, 0.0]),
            Record::new("B", "", vec![1.0]),
        ]));

        for k in [1, 2, 5] {
            let err = engine.search(&[1.0, 0.0], k).unwrap_err();
            assert!(matches!(err, SearchError::DimensionMismatch { index: 1, .. }));
        }
    }

    #[test]
    fn test_search_ties_keep_corpus_order() {
        let engine = SearchEngine::new(Corpus::from_records(vec![
            Record::new("low", "", vec![0.0, 1.0]),
            Record::new("t1", "", vec![1.0, 0.0]),
            Record::new("t2", "", vec![2.0, 0.0]),
            Record::new("t3", "", vec![3.0, 0.0]),
        ]));

        assert_eq!(ids(&engine.search(&[1.0, 0.0], 2).unwrap()), vec!["t1", "t2"]);
        assert_eq!(ids(&engine.search(&[1.0, 0.0], 3).unwrap()), vec!["t1", "t2", "t3"]);
        assert_eq!(ids(&engine.search(&[1.0, 0.0], 4).unwrap()), vec!["t1", "t2", "t3", "low"]);
    }

    #[test]
    fn test_search_zero_norm_embedding_scores_zero() {
        let engine = SearchEngine::new(Corpus::from_records(vec![
            Record::new("neg", "", vec![-1.0, 0.0]),
            Record::new("zero", "", vec![0.0, 0.0]),
            Record::new("pos", "", vec![1.0, 0.0]),
        ]));
        let results = engine.search(&[1.0, 0.0], 3).unwrap();

        assert_eq!(ids(&results), vec!["pos", "zero", "neg"]);
        assert_eq!(results[1].score, 0.0);
    }

    #[test]
    fn test_search_zero_query_keeps_corpus_order() {
        let engine = paper_engine();
        let results = engine.search(&[0.0, 0.0], 2).unwrap();

        assert_eq!(ids(&results), vec!["A", "B"]);
        assert!(results.iter().all(|r| r.score == 0.0));
    }

    #[test]
    fn test_search_bounded_matches_full_ranking() {
        let records = (0..50)
            .map(|i| {
                let x = ((i * 37) % 11) as f32 - 5.0;
                let y = ((i * 13) % 7) as f32 - 3.0;
                Record::new(format!("p{}", i), "", vec![x, y])
            })
            .collect();
        let engine = SearchEngine::new(Corpus::from_records(records));
        let full = engine.search(&[0.3, -0.8], 50).unwrap();

        for k in [1, 5, 17, 49] {
            let top = engine.search(&[0.3, -0.8], k).unwrap();
            assert_eq!(top, full[..k].to_vec());
        }
    }

    #[test]
    fn test_search_is_idempotent() {
        let engine = paper_engine();
        let first = engine.search(&[0.6, 0.4], 2).unwrap();
        let second = engine.search(&[0.6, 0.4], 2).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_search_does_not_mutate_corpus() {
        let engine = paper_engine();
        let before = engine.corpus().clone();
        engine.search(&[1.0, 1.0], 2).unwrap();

        assert_eq!(engine.into_corpus(), before);
    }
}
