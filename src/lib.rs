//! # paperknn - Exact Nearest-Neighbor Paper Search
//!
//! paperknn loads a table of paper metadata and a matching matrix of
//! embeddings into memory, then ranks every paper against a query vector by
//! cosine similarity and returns the top k.
//!
//! ## Example
//!
//! ```
//! use paperknn::{Corpus, Record, SearchEngine};
//!
//! let corpus = Corpus::from_records(vec![
//!     Record::new("A", "Paper A", vec![1.0, 0.0]),
//!     Record::new("B", "Paper B", vec![0.0, 1.0]),
//!     Record::new("C", "Paper C", vec![1.0, 1.0]),
//! ]);
//! let engine = SearchEngine::new(corpus);
//!
//! // Search for similar papers
//! let results = engine.search(&[1.0, 0.0], 2).unwrap();
//! assert_eq!(results[0].record.id, "A"); // Most similar paper
//! ```

pub mod vector;
pub mod corpus;
pub mod error;
mod search;

pub use corpus::{Corpus, Delimiter, Diagnostic, Encoding, LoadOptions, LoadReport, Record, RecordMeta};
pub use error::{CorpusLoadError, QueryParseError, SearchError};
pub use search::{SearchEngine, SearchResult};
