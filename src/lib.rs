//! Frequency store for n-gram corpora laid out like Google's Web-1T dataset,
//! whose general documentation you can find at
//! <https://catalog.ldc.upenn.edu/LDC2006T13>.
//!
//! The corpus is ingested once into an immutable, length-partitioned inverted
//! index ([`IndexStore`]), which is then queried through [`NgramCorpus`] for
//! the exact number of occurences of a word sequence and for the total number
//! of tokens in the corpus.

pub mod config;
pub mod corpus;
pub mod error;
pub mod ingest;
pub mod progress;
pub mod query;
pub mod record;
pub mod replay;
pub mod store;
pub mod tsv;

pub use crate::{
    config::BuildConfig,
    corpus::NgramCorpus,
    error::{Error, Result},
    query::{Field, Query},
    record::NGramRecord,
    store::{builder::IndexBuilder, IndexStore},
};

/// Case-sensitive ngram or token text
pub type Ngram = Box<str>;

/// Number of occurences of an ngram across the corpus
///
/// Web-1T counts go well beyond the 32-bit range (the total token count of
/// the English corpus is above 10^12), hence the 64-bit integers.
pub type Frequency = u64;

/// Identifier of a record within an [`IndexStore`]
pub type RecordId = u32;

/// Position of a token within an ngram
pub type Position = u16;

/// Saturating addition of occurence counts
///
/// Realistic corpora do not come close to overflowing a u64, but if they ever
/// did, a saturated count is less misleading than a wrapped one.
pub fn add_frequencies(x: Frequency, y: Frequency) -> Frequency {
    x.saturating_add(y)
}
