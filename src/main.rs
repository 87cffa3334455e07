//! This program indexes n-gram corpora laid out like Google's Web-1T dataset,
//! whose general documentation you can find at
//! <https://catalog.ldc.upenn.edu/LDC2006T13>, and answers occurence count
//! queries about them.

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use ngram_corpus::{
    config::{BuildConfig, DEFAULT_EXCLUDED_EXTENSION},
    ingest::{self, BuildOutcome},
    progress::ProgressReport,
    replay, Field, NgramCorpus, Query,
};
use std::{collections::BTreeMap, num::NonZeroU64, path::PathBuf, sync::Arc};

/// Build and query an n-gram frequency corpus
///
/// A corpus is first built from its frequency files into an index directory,
/// which can then be queried as many times as needed.
#[derive(Parser, Debug)]
#[command(version, author)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

/// Operations supported by this program
#[derive(Subcommand, Debug)]
enum Command {
    /// Index a corpus
    Build {
        /// Root directory of the corpus, containing the "1gms", "2gms"...
        /// ngram buckets
        corpus_root: PathBuf,

        /// Directory where the index should be saved
        index_dir: PathBuf,

        /// Extension of secondary index files, which should not be ingested
        #[arg(long, default_value = DEFAULT_EXCLUDED_EXTENSION)]
        exclude_ext: Box<str>,

        /// Fail if some corpus files cannot be read
        ///
        /// By default, unreadable corpus files are reported and skipped,
        /// which produces an index that is missing some ngrams.
        #[arg(long, default_value_t = false)]
        strict: bool,
    },

    /// Count the occurences of an ngram
    Query {
        /// Directory where the index was saved
        index_dir: PathBuf,

        /// Words of the ngram
        #[arg(required = true)]
        phrase: Vec<String>,

        /// Ignore case differences
        #[arg(short = 'i', long, default_value_t = false)]
        case_insensitive: bool,

        /// List every indexed ngram which contains the words in this order,
        /// whatever its length, along with its occurence count
        #[arg(long, default_value_t = false)]
        forms: bool,
    },

    /// Check an index against a frequency file and measure query throughput
    Replay {
        /// Frequency file with tab-separated ngrams and occurence counts
        ngram_file: PathBuf,

        /// Directory where the index was saved
        index_dir: PathBuf,

        /// Number of queries between throughput reports
        #[arg(long, default_value = "10000")]
        every: NonZeroU64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Set up logging
    if let Err(e) = setup_logging() {
        eprintln!("WARNING: Failed to set up logging ({e}), proceeding without logs");
    }

    // Decode CLI arguments and dispatch
    match Args::parse().command {
        Command::Build {
            corpus_root,
            index_dir,
            exclude_ext,
            strict,
        } => build_index(corpus_root, index_dir, BuildConfig::new(exclude_ext, strict)).await,
        Command::Query {
            index_dir,
            phrase,
            case_insensitive,
            forms,
        } => query_index(index_dir, phrase, case_insensitive, forms).await,
        Command::Replay {
            ngram_file,
            index_dir,
            every,
        } => replay_file(ngram_file, index_dir, every).await,
    }
}

/// Use anyhow for Result type erasure
pub use anyhow::Result;

/// Build an index from a corpus
async fn build_index(
    corpus_root: PathBuf,
    index_dir: PathBuf,
    config: Arc<BuildConfig>,
) -> Result<()> {
    let report = ProgressReport::new();
    let build_report = ingest::build(&corpus_root, &index_dir, config, &report)
        .await
        .with_context(|| format!("building index of {}", corpus_root.display()))?;

    // Summarize what was left out
    for skipped in &build_report.skipped_files {
        eprintln!("Skipped file {}: {}", skipped.path.display(), skipped.error);
    }
    println!(
        "Indexed {} records into {} ({} malformed records skipped)",
        build_report.num_records,
        index_dir.display(),
        build_report.skipped_records.len()
    );
    if build_report.outcome() == BuildOutcome::PartialSuccess {
        eprintln!(
            "WARNING: {} corpus files could not be fully read, the index is incomplete",
            build_report.skipped_files.len()
        );
    }
    Ok(())
}

/// Count the occurences of an ngram
async fn query_index(
    index_dir: PathBuf,
    phrase: Vec<String>,
    case_insensitive: bool,
    forms: bool,
) -> Result<()> {
    let corpus = open(index_dir).await?;
    let text = phrase.join(" ");
    if forms {
        print_forms(&corpus, &text, case_insensitive)?;
    } else {
        let occurrences = corpus
            .occurrences(&text, case_insensitive)
            .with_context(|| format!("querying {text:?}"))?;
        println!("Found {occurrences} for : {text}");
    }
    println!("Total tokens for whole corpus {}", corpus.total_tokens());
    Ok(())
}

/// Display every indexed ngram that contains some words, in order
fn print_forms(corpus: &NgramCorpus, text: &str, case_insensitive: bool) -> Result<()> {
    let tokens = text.split_whitespace().collect::<Vec<_>>();
    anyhow::ensure!(!tokens.is_empty(), "query does not contain any token");
    let field = Field::for_tokens(case_insensitive);
    let mut all_forms = BTreeMap::new();
    for length in corpus.store().lengths().filter(|&len| len >= tokens.len()) {
        all_forms.extend(corpus.forms(&Query::phrase(field, tokens.iter().copied(), length)));
    }
    for (form, frequency) in &all_forms {
        println!("{form}\t{frequency}");
    }
    println!(
        "Found {} for : {text} across {} ngrams",
        all_forms.values().fold(0, |acc, &freq| ngram_corpus::add_frequencies(acc, freq)),
        all_forms.len()
    );
    Ok(())
}

/// Replay a frequency file against an index
async fn replay_file(ngram_file: PathBuf, index_dir: PathBuf, every: NonZeroU64) -> Result<()> {
    let corpus = open(index_dir).await?;
    let summary = replay::replay(&corpus, &ngram_file, every, |summary| {
        println!(
            "Obtained data for {} in {} msec [{:.0} queries per sec]",
            summary.queries,
            summary.elapsed.as_millis(),
            summary.queries_per_second()
        )
    })
    .await
    .with_context(|| format!("replaying {}", ngram_file.display()))?;
    for mismatch in &summary.mismatches {
        println!(
            "{}\texpected: {}\tbut got: {}",
            mismatch.form, mismatch.expected, mismatch.obtained
        );
    }
    for error in &summary.malformed {
        println!("Incorrect input : {error}");
    }
    println!(
        "Obtained data for {} in {} msec [{:.0} queries per sec]",
        summary.queries,
        summary.elapsed.as_millis(),
        summary.queries_per_second()
    );
    Ok(())
}

/// Open a previously built index
async fn open(index_dir: PathBuf) -> Result<NgramCorpus> {
    let context = format!("opening index at {}", index_dir.display());
    tokio::task::spawn_blocking(move || NgramCorpus::open(&index_dir))
        .await
        .context(context.clone())?
        .context(context)
}

/// Set up logging
fn setup_logging() -> syslog::Result<()> {
    syslog::init(
        syslog::Facility::LOG_USER,
        if cfg!(feature = "log-trace") {
            LevelFilter::Trace
        } else if cfg!(debug_assertions) {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        },
        None,
    )
}
