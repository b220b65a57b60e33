use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use paperknn::{
    vector::parse_query, Corpus, Delimiter, Diagnostic, Encoding, LoadOptions, SearchEngine,
    SearchResult,
};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Number of load diagnostics logged one by one before summarizing.
const MAX_LOGGED_DIAGNOSTICS: usize = 20;

/// Exact cosine top-k search over paper embeddings.
#[derive(Parser, Debug)]
#[command(name = "paperknn", version, about = "Exact cosine top-k search over paper embeddings")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rank the corpus against the query vector stored in a file.
    Search {
        /// File whose first line is the comma-separated query vector.
        #[arg(short, long)]
        query: PathBuf,
        #[command(flatten)]
        source: SourceArgs,
        /// Number of results.
        #[arg(short = 'k', long = "top-k", default_value_t = 10)]
        k: usize,
        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Parse metadata and embeddings once and write a binary snapshot.
    Snapshot {
        #[command(flatten)]
        files: FileArgs,
        /// Snapshot file to write.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Load the corpus once and answer queries typed on stdin.
    Repl {
        #[command(flatten)]
        source: SourceArgs,
        /// Initial number of results; change with `:k N`.
        #[arg(short = 'k', long = "top-k", default_value_t = 10)]
        k: usize,
    },
}

/// Where the corpus comes from: source files or a snapshot.
#[derive(Args, Debug)]
pub struct SourceArgs {
    /// Metadata table; the first line is a header.
    #[arg(long, requires = "embeddings", required_unless_present = "snapshot", conflicts_with = "snapshot")]
    pub metadata: Option<PathBuf>,
    /// Embedding matrix matching the metadata rows.
    #[arg(long, requires = "metadata")]
    pub embeddings: Option<PathBuf>,
    /// Snapshot written by `paperknn snapshot`.
    #[arg(long)]
    pub snapshot: Option<PathBuf>,
    #[command(flatten)]
    pub format: FormatArgs,
}

#[derive(Args, Debug)]
pub struct FileArgs {
    /// Metadata table; the first line is a header.
    #[arg(long)]
    pub metadata: PathBuf,
    /// Embedding matrix matching the metadata rows.
    #[arg(long)]
    pub embeddings: PathBuf,
    #[command(flatten)]
    pub format: FormatArgs,
}

#[derive(Args, Debug, Default)]
pub struct FormatArgs {
    /// Embedding file encoding.
    #[arg(long, value_enum)]
    pub encoding: Option<EncodingArg>,
    /// Values per embedding; required for binary encoding.
    #[arg(long)]
    pub dimension: Option<usize>,
    /// Metadata field delimiter.
    #[arg(long, value_enum)]
    pub delimiter: Option<DelimiterArg>,
    /// JSON file with load options; flags given here override it.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum EncodingArg {
    Text,
    Binary,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum DelimiterArg {
    Comma,
    UnitSeparator,
}

impl From<DelimiterArg> for Delimiter {
    fn from(arg: DelimiterArg) -> Delimiter {
        match arg {
            DelimiterArg::Comma => Delimiter::Comma,
            DelimiterArg::UnitSeparator => Delimiter::UnitSeparator,
        }
    }
}

impl FormatArgs {
    /// Merges the optional config file with the command-line flags.
    pub fn load_options(&self) -> Result<LoadOptions> {
        let mut options = match &self.config {
            Some(path) => read_config(path)?,
            None => LoadOptions::default(),
        };

        if let Some(delimiter) = self.delimiter {
            options.delimiter = delimiter.into();
        }

        let configured_dimension = match options.encoding {
            Encoding::Binary { dimension } => Some(dimension),
            Encoding::Text => None,
        };

        match self.encoding {
            Some(EncodingArg::Text) => options.encoding = Encoding::Text,
            Some(EncodingArg::Binary) => {
                let dimension = self.dimension
                    .or(configured_dimension)
                    .ok_or_else(|| anyhow!("binary encoding requires --dimension"))?;
                options.encoding = Encoding::Binary { dimension };
            }
            None => {
                if let Some(dimension) = self.dimension {
                    match options.encoding {
                        Encoding::Binary { .. } => options.encoding = Encoding::Binary { dimension },
                        Encoding::Text => warn!(dimension, "--dimension is ignored for text encoding"),
                    }
                }
            }
        }

        Ok(options)
    }
}

fn read_config(path: &Path) -> Result<LoadOptions> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot read config '{}'", path.display()))?;
    let options = serde_json::from_str(&text)
        .with_context(|| format!("invalid config '{}'", path.display()))?;
    Ok(options)
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Search { query, source, k, json } => {
            let query = read_query(&query)?;
            let engine = SearchEngine::new(open_corpus(&source)?);
            let results = engine.search(&query, k)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print!("{}", render_results(&results));
            }
        }

        Command::Snapshot { files, output } => {
            let corpus = load_files(&files.metadata, &files.embeddings, &files.format)?;
            corpus.save_snapshot(&output)?;
            println!("Snapshot of {} records written to '{}'", corpus.len(), output.display());
        }

        Command::Repl { source, k } => {
            let engine = SearchEngine::new(open_corpus(&source)?);
            let stdin = io::stdin();
            run_repl(&engine, k, stdin.lock(), io::stdout())?;
        }
    }

    Ok(())
}

fn open_corpus(source: &SourceArgs) -> Result<Corpus> {
    if let Some(path) = &source.snapshot {
        return Ok(Corpus::load_snapshot(path)?);
    }

    match (&source.metadata, &source.embeddings) {
        (Some(metadata), Some(embeddings)) => load_files(metadata, embeddings, &source.format),
        _ => bail!("either --snapshot or both --metadata and --embeddings are required"),
    }
}

fn load_files(metadata: &Path, embeddings: &Path, format: &FormatArgs) -> Result<Corpus> {
    let options = format.load_options()?;
    let report = Corpus::load(metadata, embeddings, &options)?;
    log_diagnostics(&report.diagnostics);
    Ok(report.corpus)
}

fn log_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics.iter().take(MAX_LOGGED_DIAGNOSTICS) {
        warn!("{}", diagnostic);
    }
    if diagnostics.len() > MAX_LOGGED_DIAGNOSTICS {
        warn!(total = diagnostics.len(), "further load diagnostics not shown");
    }
}

fn read_query(path: &Path) -> Result<Vec<f32>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot read query '{}'", path.display()))?;
    let line = text.lines().next().unwrap_or_default();
    let query = parse_query(line)
        .with_context(|| format!("invalid query in '{}'", path.display()))?;
    info!(dimension = query.len(), "query loaded");
    Ok(query)
}

/// 1-indexed listing of `[id] title (score)`.
pub fn render_results(results: &[SearchResult<'_>]) -> String {
    if results.is_empty() {
        return "No results found\n".to_string();
    }

    let mut out = format!("Top {} results:\n", results.len());
    for (rank, result) in results.iter().enumerate() {
        out.push_str(&format!(
            "{}. [{}] {} (score: {:.4})\n",
            rank + 1, result.record.id, result.record.title, result.score
        ));
    }
    out
}

/// REPL mode - one query per line against an already loaded corpus
pub fn run_repl<R: BufRead, W: Write>(engine: &SearchEngine, k: usize, input: R, mut output: W) -> io::Result<()> {
    let mut k = k;
    writeln!(output, "paperknn - {} papers loaded", engine.corpus().len())?;
    writeln!(output, "Type 'help' for commands, 'exit' or 'quit' to quit\n")?;

    let mut lines = input.lines();
    loop {
        write!(output, "paperknn> ")?;
        output.flush()?;

        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line == "exit" || line == "quit" {
            writeln!(output, "Goodbye!")?;
            break;
        }

        if line == "help" {
            print_help(&mut output)?;
            continue;
        }

        if let Some(value) = line.strip_prefix(":k") {
            match value.trim().parse::<usize>() {
                Ok(new_k) => {
                    k = new_k;
                    writeln!(output, "k = {}", k)?;
                }
                Err(_) => writeln!(output, "Error: invalid k '{}'", value.trim())?,
            }
            continue;
        }

        let query = match parse_query(line) {
            Ok(query) => query,
            Err(error) => {
                writeln!(output, "Error: {}", error)?;
                continue;
            }
        };

        match engine.search(&query, k) {
            Ok(results) => write!(output, "{}", render_results(&results))?,
            Err(error) => writeln!(output, "Error: {}", error)?,
        }
    }

    Ok(())
}

fn print_help<W: Write>(output: &mut W) -> io::Result<()> {
    writeln!(output, "Available commands:")?;
    writeln!(output, "  <v1>,<v2>,...  - Rank papers against a comma-separated query vector")?;
    writeln!(output, "  :k <number>    - Change the number of results")?;
    writeln!(output, "  help           - Show this help")?;
    writeln!(output, "  exit, quit     - Exit the program")
}
