//! Error types for loading, searching and query parsing

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal failures while building a [`Corpus`](crate::Corpus).
///
/// None of these leave a partially loaded corpus behind.
#[derive(Error, Debug)]
pub enum CorpusLoadError {
    #[error("cannot read '{}': {source}", path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("record count mismatch: {metadata} metadata rows but {embeddings} embeddings")]
    RecordCountMismatch { metadata: usize, embeddings: usize },

    #[error("binary embeddings of {len} bytes are not a whole number of {dimension}-dimensional f32 rows")]
    MisalignedBinary { len: usize, dimension: usize },

    #[error("binary encoding requires a non-zero dimension")]
    ZeroDimension,

    #[error("invalid snapshot '{}': {reason}", path.display())]
    InvalidSnapshot { path: PathBuf, reason: String },

    #[error("cannot write snapshot '{}': {source}", path.display())]
    SnapshotWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CorpusLoadError {
    pub(crate) fn unreadable(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CorpusLoadError::SourceUnreadable { path: path.into(), source }
    }
}

/// Raised when a query cannot be scored against the corpus.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    /// The query length differs from the embedding of the record at `index`.
    #[error("dimension mismatch at record {index} ('{id}'): embedding has {expected} values, query has {actual}")]
    DimensionMismatch {
        index: usize,
        id: String,
        expected: usize,
        actual: usize,
    },
}

/// Length difference between two vectors handed to the math helpers.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("different dimensions: {left} vs {right}")]
pub struct DimensionMismatch {
    pub left: usize,
    pub right: usize,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryParseError {
    #[error("query vector is empty")]
    Empty,

    #[error("query component {column} is not a finite number: '{token}'")]
    MalformedToken { column: usize, token: String },
}

#[cfg(test)]
mod error_test {
    use super::*;

    #[test]
    fn test_unreadable_message_names_path() {
        let err = CorpusLoadError::unreadable(
            "data/index.csv",
            io::Error::new(io::ErrorKind::NotFound, "no such file"),
        );
        let msg = err.to_string();
        assert!(msg.contains("data/index.csv"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_count_mismatch_message() {
        let err = CorpusLoadError::RecordCountMismatch { metadata: 3, embeddings: 2 };
        assert_eq!(err.to_string(), "record count mismatch: 3 metadata rows but 2 embeddings");
    }

    #[test]
    fn test_search_dimension_mismatch_message() {
        let err = SearchError::DimensionMismatch {
            index: 4,
            id: "2101.00001".to_string(),
            expected: 384,
            actual: 3,
        };
        assert!(err.to_string().contains("record 4"));
        assert!(err.to_string().contains("384"));
    }
}
