//! Ingestion of a whole corpus into an [`IndexStore`]

use crate::{
    config::BuildConfig,
    error::{Error, Result},
    progress::{ProgressConfig, ProgressReport, ProgressTracker, Work},
    store::builder::{IndexBuilder, TOTALS_LENGTH},
    tsv::{
        self,
        layout::{self, Bucket},
        Entry,
    },
    Frequency, IndexStore,
};
use futures::StreamExt;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::task::JoinSet;

/// Build a corpus and save it to a directory
pub async fn build(
    root: &Path,
    destination: &Path,
    config: Arc<BuildConfig>,
    report: &ProgressReport,
) -> Result<BuildReport> {
    let (store, build_report) = build_corpus(root, config, report).await?;
    let destination = destination.to_owned();
    tokio::task::spawn_blocking(move || store.save(&destination))
        .await
        .map_err(|e| Error::io("store saving task failed", e.into()))??;
    Ok(build_report)
}

/// Ingest all frequency files of a corpus into a finalized store
///
/// Ngram buckets are ingested in parallel, then merged in order of increasing
/// length, so building the same corpus twice produces the same store.
pub async fn build_corpus(
    root: &Path,
    config: Arc<BuildConfig>,
    report: &ProgressReport,
) -> Result<(IndexStore, BuildReport)> {
    // Enumerate the corpus files
    let layout = layout::scan(root, &config).await?;

    // Without a total token count, the corpus cannot be queried
    let total_file = layout
        .bucket(TOTALS_LENGTH)
        .and_then(|bucket| bucket.total_file.clone())
        .ok_or_else(|| Error::CorpusMissingTotals {
            reason: format!(
                "no {TOTALS_LENGTH}-gram bucket in corpus {}",
                root.display()
            ),
        })?;
    let total_tokens = read_total(&total_file).await?;

    // Start ingesting all buckets
    let buckets = report.add(
        "Ingesting buckets",
        ProgressConfig::new(Work::Steps(layout.buckets.len())).dont_show_rate_eta(),
    );
    let files = report.add(
        "Ingesting files",
        ProgressConfig::new(Work::PercentSteps(layout.num_files())),
    );
    let mut tasks = JoinSet::new();
    for bucket in layout.buckets {
        let config = config.clone();
        let files = files.clone();
        tasks.spawn(async move {
            let length = bucket.length;
            (length, ingest_bucket(bucket, config, files).await)
        });
    }

    // Collect bucket contents as they come in
    let mut bucket_results = BTreeMap::new();
    while let Some(result) = tasks.join_next().await {
        let (length, result) =
            result.map_err(|e| Error::io("bucket ingestion task failed", e.into()))?;
        bucket_results.insert(length, result?);
        buckets.make_progress(1);
    }

    // Merge buckets in a reproducible order
    let mut builder = IndexBuilder::new();
    let mut build_report = BuildReport::default();
    for (_, (bucket_builder, bucket_report)) in bucket_results {
        builder.merge(bucket_builder)?;
        build_report.merge(bucket_report);
    }
    builder.set_total_tokens(total_tokens)?;
    let store = builder.finalize_reporting(report)?;
    log::info!(
        "Ingested {} records, skipping {} malformed records and {} unreadable files",
        build_report.num_records,
        build_report.skipped_records.len(),
        build_report.skipped_files.len()
    );
    Ok((store, build_report))
}

/// Read the total token count of a corpus
pub async fn read_total(path: &Path) -> Result<Frequency> {
    let missing = |reason: String| Error::CorpusMissingTotals { reason };
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| missing(format!("failed to read {}: {e}", path.display())))?;
    let first_line = contents.lines().next().unwrap_or_default().trim();
    first_line.parse().map_err(|_| {
        missing(format!(
            "{} does not start with a token count (found {first_line:?})",
            path.display()
        ))
    })
}

/// Outcome of a corpus build
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Number of records that made it into the store
    pub num_records: usize,

    /// Lines that could not be ingested
    pub skipped_records: Vec<SkippedRecord>,

    /// Files that could not be read, fully or partially
    pub skipped_files: Vec<SkippedFile>,
}
//
impl BuildReport {
    /// Summarize the outcome of the build
    pub fn outcome(&self) -> BuildOutcome {
        if self.skipped_files.is_empty() {
            BuildOutcome::Success
        } else {
            BuildOutcome::PartialSuccess
        }
    }

    /// Merge with the report from another set of files
    fn merge(&mut self, other: Self) {
        self.num_records += other.num_records;
        self.skipped_records.extend(other.skipped_records);
        self.skipped_files.extend(other.skipped_files);
    }
}

/// Summary of a corpus build
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum BuildOutcome {
    /// All corpus files were read, though some lines may have been skipped
    Success,

    /// Some corpus files could not be read
    PartialSuccess,
}

/// Line of a corpus file which could not be ingested
#[derive(Debug)]
pub struct SkippedRecord {
    /// File that the line comes from
    pub path: PathBuf,

    /// What went wrong, always an [`Error::MalformedRecord`]
    pub error: Error,
}

/// Corpus file which could not be read
#[derive(Debug)]
pub struct SkippedFile {
    /// File that could not be read
    pub path: PathBuf,

    /// What went wrong, always an [`Error::SourceFile`]
    pub error: Error,
}

/// Ingest the files of a bucket, in order
async fn ingest_bucket(
    bucket: Bucket,
    config: Arc<BuildConfig>,
    files: ProgressTracker,
) -> Result<(IndexBuilder, BuildReport)> {
    let mut builder = IndexBuilder::new();
    let mut report = BuildReport::default();
    for path in bucket.files {
        match ingest_file(&path, bucket.length, &mut builder, &mut report).await {
            Ok(()) => {}
            Err(error @ Error::SourceFile { .. }) if !config.fail_on_skipped_files => {
                log::warn!("Skipping the rest of {}: {error}", path.display());
                report.skipped_files.push(SkippedFile { path, error });
            }
            Err(error) => return Err(error),
        }
        files.make_progress(1);
    }
    Ok((builder, report))
}

/// Ingest the records of a single frequency file
///
/// Records that were read before an error are kept in the builder.
async fn ingest_file(
    path: &Path,
    length: usize,
    builder: &mut IndexBuilder,
    report: &mut BuildReport,
) -> Result<()> {
    log::debug!("Ingesting {length}-grams from {}", path.display());
    let initial_records = report.num_records;
    let mut entries = tsv::read_entries(path).await?;
    while let Some(entry) = entries.next().await {
        let error = match entry {
            Ok(Entry { line, record }) if record.length() != length => Error::malformed(
                line,
                format!(
                    "expected a {length}-gram, found {} tokens",
                    record.length()
                ),
            ),
            Ok(Entry { record, .. }) => {
                builder.insert(record)?;
                report.num_records += 1;
                continue;
            }
            Err(error @ Error::MalformedRecord { .. }) => error,
            Err(error) => return Err(error),
        };
        log::warn!("Skipping record from {}: {error}", path.display());
        report.skipped_records.push(SkippedRecord {
            path: path.to_owned(),
            error,
        });
    }
    log::info!(
        "Ingested {} records from {}",
        report.num_records - initial_records,
        path.display()
    );
    Ok(())
}
