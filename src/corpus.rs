//! The corpus module
//! Load paper metadata and embeddings from disk and pair them by position

use crate::error::CorpusLoadError;
use crate::vector::parse_vector;
use serde::{Serialize, Deserialize};
use std::{
    fmt,
    fs::{self, File},
    io::{self, BufRead, BufReader},
    mem::size_of,
    path::Path,
};
use tracing::{debug, info};

const SNAPSHOT_MAGIC: [u8; 4] = *b"PKNN";
const SNAPSHOT_VERSION: u32 = 1;

/// One cataloged paper with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub title: String,
    pub category: Option<String>,
    pub update_date: Option<String>,
    pub authors: Option<String>,
    pub embedding: Vec<f32>,
}

impl Record {
    pub fn new(id: impl Into<String>, title: impl Into<String>, embedding: Vec<f32>) -> Record {
        Record {
            id: id.into(),
            title: title.into(),
            category: None,
            update_date: None,
            authors: None,
            embedding,
        }
    }
}

/// A metadata row before it is paired with an embedding.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordMeta {
    pub id: String,
    pub title: String,
    pub category: Option<String>,
    pub update_date: Option<String>,
    pub authors: Option<String>,
}

impl RecordMeta {
    fn with_embedding(self, embedding: Vec<f32>) -> Record {
        Record {
            id: self.id,
            title: self.title,
            category: self.category,
            update_date: self.update_date,
            authors: self.authors,
            embedding,
        }
    }
}

/// Field separator of the metadata file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Delimiter {
    #[default]
    Comma,
    /// ASCII unit separator (0x1F), for titles that contain commas.
    UnitSeparator,
}

impl Delimiter {
    pub fn as_char(self) -> char {
        match self {
            Delimiter::Comma => ',',
            Delimiter::UnitSeparator => '\u{1F}',
        }
    }
}

/// Physical layout of the embedding file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Encoding {
    /// One comma-separated row of floats per record.
    #[default]
    Text,
    /// Flat little-endian f32 array, `dimension` values per record.
    Binary { dimension: usize },
}

/// How a corpus is read from disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct LoadOptions {
    pub encoding: Encoding,
    pub delimiter: Delimiter,
}

/// A recoverable event recorded while loading.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// `token` on embedding line `line` (1-based), component `column`, was replaced by 0.0.
    MalformedNumericToken { line: usize, column: usize, token: String },
    /// A NaN or infinite value in binary record `record` (1-based), component `column`, was replaced by 0.0.
    NonFiniteValue { record: usize, column: usize, value: f32 },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MalformedNumericToken { line, column, token } => write!(
                f,
                "malformed numeric token '{}' at line {}, component {}; using 0.0",
                token, line, column
            ),
            Diagnostic::NonFiniteValue { record, column, value } => write!(
                f,
                "non-finite value {} at record {}, component {}; using 0.0",
                value, record, column
            ),
        }
    }
}

/// A loaded corpus together with everything that was patched up on the way.
#[derive(Debug)]
pub struct LoadReport {
    pub corpus: Corpus,
    pub diagnostics: Vec<Diagnostic>,
}

/// Ordered, read-only collection of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Corpus {
    records: Vec<Record>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotHeader {
    magic: [u8; 4],
    version: u32,
}

impl Corpus {
    /// Builds a corpus from records already in memory, keeping their order.
    ///
    /// # Examples
    ///
    /// ```
    /// use paperknn::{Corpus, Record};
    ///
    /// let corpus = Corpus::from_records(vec![
    ///     Record::new("A", "Paper A", vec![1.0, 0.0]),
    ///     Record::new("B", "Paper B", vec![0.0, 1.0]),
    /// ]);
    /// assert_eq!(corpus.len(), 2);
    /// assert_eq!(corpus.dimension(), Some(2));
    /// ```
    pub fn from_records(records: Vec<Record>) -> Corpus {
        Corpus { records }
    }

    /// Pairs metadata rows with embeddings strictly by position.
    ///
    /// # Returns
    ///
    /// * `Ok(Corpus)` - One record per metadata row
    /// * `Err(CorpusLoadError::RecordCountMismatch)` - If the two sides differ in length
    pub fn from_parts(metadata: Vec<RecordMeta>, embeddings: Vec<Vec<f32>>) -> Result<Corpus, CorpusLoadError> {
        if metadata.len() != embeddings.len() {
            return Err(CorpusLoadError::RecordCountMismatch {
                metadata: metadata.len(),
                embeddings: embeddings.len(),
            });
        }

        let records = metadata.into_iter()
            .zip(embeddings)
            .map(|(meta, embedding)| meta.with_embedding(embedding))
            .collect();

        Ok(Corpus { records })
    }

    /// Loads a corpus from a metadata file and an embedding file.
    ///
    /// The first metadata line is a header and is skipped. Embeddings are read
    /// according to `options.encoding`. Malformed or non-finite numbers in
    /// either encoding do not fail the load; they become 0.0 and come back as
    /// diagnostics.
    ///
    /// # Arguments
    ///
    /// * `metadata_path` - Delimited `id, title, [category, update_date, authors]` table
    /// * `embeddings_path` - Text or binary embedding matrix
    /// * `options` - Encoding and delimiter of the two files
    ///
    /// # Returns
    ///
    /// * `Ok(LoadReport)` - The corpus plus any diagnostics
    /// * `Err(CorpusLoadError)` - Unreadable source, count mismatch or bad binary layout
    pub fn load(
        metadata_path: impl AsRef<Path>,
        embeddings_path: impl AsRef<Path>,
        options: &LoadOptions,
    ) -> Result<LoadReport, CorpusLoadError> {
        let metadata_path = metadata_path.as_ref();
        let embeddings_path = embeddings_path.as_ref();

        debug!(path = %metadata_path.display(), delimiter = ?options.delimiter, "reading metadata");
        let file = File::open(metadata_path)
            .map_err(|e| CorpusLoadError::unreadable(metadata_path, e))?;
        let metadata = parse_metadata(BufReader::new(file), options.delimiter)
            .map_err(|e| CorpusLoadError::unreadable(metadata_path, e))?;

        debug!(path = %embeddings_path.display(), encoding = ?options.encoding, "reading embeddings");
        let (embeddings, diagnostics) = match options.encoding {
            Encoding::Text => {
                let file = File::open(embeddings_path)
                    .map_err(|e| CorpusLoadError::unreadable(embeddings_path, e))?;
                parse_text_embeddings(BufReader::new(file))
                    .map_err(|e| CorpusLoadError::unreadable(embeddings_path, e))?
            }
            Encoding::Binary { dimension } => {
                let bytes = fs::read(embeddings_path)
                    .map_err(|e| CorpusLoadError::unreadable(embeddings_path, e))?;
                parse_binary_embeddings(&bytes, dimension)?
            }
        };

        let corpus = Corpus::from_parts(metadata, embeddings)?;
        info!(
            records = corpus.len(),
            dimension = corpus.dimension().unwrap_or(0),
            diagnostics = diagnostics.len(),
            "corpus loaded"
        );

        Ok(LoadReport { corpus, diagnostics })
    }

    /// Writes the corpus to `path` as a bincode snapshot.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use paperknn::{Corpus, Record};
    ///
    /// let corpus = Corpus::from_records(vec![Record::new("A", "Paper A", vec![1.0, 0.0])]);
    /// corpus.save_snapshot("papers.pknn").unwrap();
    /// ```
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<(), CorpusLoadError> {
        let path = path.as_ref();
        let header = SnapshotHeader { magic: SNAPSHOT_MAGIC, version: SNAPSHOT_VERSION };

        let mut bytes = bincode::serialize(&header)
            .map_err(|e| CorpusLoadError::SnapshotWrite { path: path.to_path_buf(), source: io::Error::other(e.to_string()) })?;
        bincode::serialize_into(&mut bytes, self)
            .map_err(|e| CorpusLoadError::SnapshotWrite { path: path.to_path_buf(), source: io::Error::other(e.to_string()) })?;

        fs::write(path, bytes)
            .map_err(|e| CorpusLoadError::SnapshotWrite { path: path.to_path_buf(), source: e })?;

        info!(path = %path.display(), records = self.len(), "snapshot written");
        Ok(())
    }

    /// Reads a corpus written by [`save_snapshot`](Corpus::save_snapshot).
    pub fn load_snapshot(path: impl AsRef<Path>) -> Result<Corpus, CorpusLoadError> {
        let path = path.as_ref();
        let bytes = fs::read(path)
            .map_err(|e| CorpusLoadError::unreadable(path, e))?;
        let invalid = |reason: String| CorpusLoadError::InvalidSnapshot { path: path.to_path_buf(), reason };

        let mut reader = bytes.as_slice();
        let header: SnapshotHeader = bincode::deserialize_from(&mut reader)
            .map_err(|e| invalid(e.to_string()))?;
        if header.magic != SNAPSHOT_MAGIC {
            return Err(invalid("not a paperknn snapshot".to_string()));
        }
        if header.version != SNAPSHOT_VERSION {
            return Err(invalid(format!("unsupported snapshot version {}", header.version)));
        }

        let corpus: Corpus = bincode::deserialize_from(&mut reader)
            .map_err(|e| invalid(e.to_string()))?;

        info!(path = %path.display(), records = corpus.len(), "snapshot loaded");
        Ok(corpus)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Embedding length of the first record, `None` for an empty corpus.
    pub fn dimension(&self) -> Option<usize> {
        self.records.first().map(|r| r.embedding.len())
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }
}

/// Parses the metadata table.
///
/// The first line is always treated as a header. Each following non-empty
/// line is split into at most five fields, so the authors column may contain
/// the delimiter itself.
pub fn parse_metadata<R: BufRead>(reader: R, delimiter: Delimiter) -> io::Result<Vec<RecordMeta>> {
    let mut rows = Vec::new();
    // header
    for line in reader.lines().skip(1) {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        rows.push(parse_metadata_line(&line, delimiter));
    }
    Ok(rows)
}

fn parse_metadata_line(line: &str, delimiter: Delimiter) -> RecordMeta {
    let mut fields = line.splitn(5, delimiter.as_char()).map(str::trim);
    let mut optional = || fields.next()
        .filter(|f| !f.is_empty())
        .map(str::to_string);

    let id = optional().unwrap_or_default();
    let title = optional().unwrap_or_default();

    RecordMeta {
        id,
        title,
        category: optional(),
        update_date: optional(),
        authors: optional(),
    }
}

/// Parses a header-free text embedding file, one comma-separated row per record.
///
/// Empty lines are skipped. Malformed components are replaced by 0.0 and
/// reported as [`Diagnostic::MalformedNumericToken`].
pub fn parse_text_embeddings<R: BufRead>(reader: R) -> io::Result<(Vec<Vec<f32>>, Vec<Diagnostic>)> {
    let mut embeddings = Vec::new();
    let mut diagnostics = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let parsed = parse_vector(&line);
        diagnostics.extend(parsed.malformed.into_iter().map(|(column, token)| {
            Diagnostic::MalformedNumericToken { line: index + 1, column, token }
        }));
        embeddings.push(parsed.values);
    }

    Ok((embeddings, diagnostics))
}

/// Splits a flat little-endian f32 buffer into rows of `dimension` values.
///
/// NaN and infinite values are replaced by 0.0 and reported as
/// [`Diagnostic::NonFiniteValue`], matching the text policy.
///
/// # Returns
///
/// * `Ok((rows, diagnostics))` - One row per record
/// * `Err(CorpusLoadError::ZeroDimension)` - If `dimension` is 0
/// * `Err(CorpusLoadError::MisalignedBinary)` - If the buffer is not a whole number of rows
pub fn parse_binary_embeddings(bytes: &[u8], dimension: usize) -> Result<(Vec<Vec<f32>>, Vec<Diagnostic>), CorpusLoadError> {
    if dimension == 0 {
        return Err(CorpusLoadError::ZeroDimension);
    }

    let row_bytes = dimension * size_of::<f32>();
    if bytes.len() % row_bytes != 0 {
        return Err(CorpusLoadError::MisalignedBinary { len: bytes.len(), dimension });
    }

    let mut diagnostics = Vec::new();
    let embeddings = bytes.chunks_exact(row_bytes)
        .enumerate()
        .map(|(index, row)| {
            row.chunks_exact(size_of::<f32>())
                .enumerate()
                .map(|(column, b)| {
                    let value = f32::from_le_bytes([b[0], b[1], b[2], b[3]]);
                    if value.is_finite() {
                        value
                    } else {
                        diagnostics.push(Diagnostic::NonFiniteValue { record: index + 1, column, value });
                        0.0
                    }
                })
                .collect()
        })
        .collect();

    Ok((embeddings, diagnostics))
}
