//! Replay of a frequency file against a built corpus
//!
//! Every ngram of the file is looked up, and the occurence count obtained from
//! the corpus is checked against the one from the file. This is handy both for
//! validating a build and for measuring query throughput.

use crate::{
    error::{Error, Result},
    tsv::{self, Entry},
    Frequency, Ngram, NgramCorpus,
};
use futures::StreamExt;
use std::{
    num::NonZeroU64,
    path::Path,
    time::{Duration, Instant},
};

/// Outcome of a replay, so far
#[derive(Debug, Default)]
pub struct ReplaySummary {
    /// Number of queries performed
    pub queries: u64,

    /// Queries whose result did not match the expected count
    pub mismatches: Vec<Mismatch>,

    /// Lines of the frequency file which could not be decoded
    pub malformed: Vec<Error>,

    /// Time spent replaying
    pub elapsed: Duration,
}
//
impl ReplaySummary {
    /// Average query throughput
    pub fn queries_per_second(&self) -> f64 {
        let seconds = self.elapsed.as_secs_f64();
        if seconds > 0.0 {
            self.queries as f64 / seconds
        } else {
            0.0
        }
    }
}

/// Query whose result did not match the frequency file
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Mismatch {
    /// Ngram that was looked up
    pub form: Ngram,

    /// Occurence count from the frequency file
    pub expected: Frequency,

    /// Occurence count from the corpus
    pub obtained: Frequency,
}

/// Look up every ngram of a frequency file in a corpus
///
/// `on_progress` is called every `every` queries with the summary so far.
pub async fn replay(
    corpus: &NgramCorpus,
    path: &Path,
    every: NonZeroU64,
    mut on_progress: impl FnMut(&ReplaySummary),
) -> Result<ReplaySummary> {
    let start = Instant::now();
    let mut summary = ReplaySummary::default();
    let mut entries = tsv::read_entries(path).await?;
    while let Some(entry) = entries.next().await {
        let record = match entry {
            Ok(Entry { record, .. }) => record,
            Err(error @ Error::MalformedRecord { .. }) => {
                log::warn!("Skipping line from {}: {error}", path.display());
                summary.malformed.push(error);
                continue;
            }
            Err(error) => return Err(error),
        };

        // Compare the corpus with the file
        let obtained = corpus.occurrences_of_tokens(record.tokens(), false)?;
        let expected = record.frequency();
        if obtained != expected {
            let form = record.surface_form();
            log::debug!("Replayed {form:?}: expected {expected}, got {obtained}");
            summary.mismatches.push(Mismatch {
                form: form.into(),
                expected,
                obtained,
            });
        }

        // Report progress periodically
        summary.queries += 1;
        if summary.queries % every.get() == 0 {
            summary.elapsed = start.elapsed();
            on_progress(&summary);
        }
    }
    summary.elapsed = start.elapsed();
    log::info!(
        "Replayed {} queries from {} with {} mismatches",
        summary.queries,
        path.display(),
        summary.mismatches.len()
    );
    Ok(summary)
}
