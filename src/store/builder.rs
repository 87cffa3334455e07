//! Mechanism for building an [`IndexStore`] from corpus records

use super::{ControlRecord, IndexStore, Partition, Posting, RecordTable};
use crate::{
    error::{Error, Result},
    progress::{ProgressConfig, ProgressReport, Work},
    Frequency, NGramRecord, Ngram, Position, RecordId,
};
use rayon::prelude::*;
use std::collections::{hash_map, BTreeMap, HashMap};
use unicase::UniCase;

/// Ngram length of the bucket that the total token count comes with
pub const TOTALS_LENGTH: usize = 1;

/// Accumulator of corpus records
///
/// Record identifiers are assigned sequentially in insertion order, so feeding
/// the same records in the same order always produces the same store.
///
/// Once all records are in, call [`finalize()`](Self::finalize) to get the
/// queryable [`IndexStore`]. The builder cannot be used after that.
#[derive(Debug)]
pub struct IndexBuilder(Option<BuilderState>);
//
impl Default for IndexBuilder {
    fn default() -> Self {
        Self::new()
    }
}
//
impl IndexBuilder {
    /// Set up an empty builder
    pub fn new() -> Self {
        Self(Some(BuilderState::default()))
    }

    /// Add a record to the store, return its identifier
    pub fn insert(&mut self, record: NGramRecord) -> Result<RecordId> {
        let state = self.state()?;
        let length = record.length();
        let (tokens, frequency) = record.into_parts();
        let id = state.records.push(&tokens, frequency)?;
        state.partitions.entry(length).or_default().push(id, tokens);
        log::trace!("Inserted {length}-gram record #{id} with frequency {frequency}");
        Ok(id)
    }

    /// Record the total number of tokens in the corpus
    ///
    /// This can only be done once per store.
    pub fn set_total_tokens(&mut self, total: Frequency) -> Result<()> {
        let state = self.state()?;
        if state.control.is_some() {
            return Err(Error::StoreState("total token count was already recorded"));
        }
        let record = state.records.push(&[], total)?;
        state.control = Some(ControlRecord {
            record,
            length: TOTALS_LENGTH,
        });
        log::debug!("Recorded corpus total of {total} tokens as record #{record}");
        Ok(())
    }

    /// Number of records inserted so far, excluding the total token count
    pub fn num_records(&self) -> usize {
        self.0.as_ref().map_or(0, |state| {
            state.records.frequencies.len() - usize::from(state.control.is_some())
        })
    }

    /// Merge with records from another builder
    ///
    /// Records from `other` get new identifiers, which come after those of the
    /// records of `self`. This lets independent ngram length buckets be built
    /// in parallel, then merged in a deterministic order.
    pub fn merge(&mut self, other: Self) -> Result<()> {
        let other = other.0.ok_or(Error::StoreState("merged builder was finalized"))?;
        let state = self.state()?;
        if state.control.is_some() && other.control.is_some() {
            return Err(Error::StoreState("both builders have a total token count"));
        }
        let offset = state.records.append(other.records)?;
        let shift = |posting: Posting| Posting {
            record: posting.record + offset,
            ..posting
        };
        for (length, other_partition) in other.partitions {
            let partition = state.partitions.entry(length).or_default();
            for (token, postings) in other_partition.text {
                let target = partition.text.entry(token).or_default();
                target.extend(postings.into_iter().map(shift));
            }
            for (token, postings) in other_partition.lowercase {
                let target = partition.lowercase.entry(token).or_default();
                target.extend(postings.into_iter().map(shift));
            }
            (partition.records).extend(other_partition.records.into_iter().map(|id| id + offset));
        }
        if let Some(control) = other.control {
            state.control = Some(ControlRecord {
                record: control.record + offset,
                ..control
            });
        }
        Ok(())
    }

    /// Freeze the store into its final queryable form
    pub fn finalize(&mut self) -> Result<IndexStore> {
        self.finalize_reporting(&ProgressReport::hidden())
    }

    /// Like [`finalize()`](Self::finalize), with progress reporting
    pub fn finalize_reporting(&mut self, report: &ProgressReport) -> Result<IndexStore> {
        let state = (self.0.take()).ok_or(Error::StoreState("store was already finalized"))?;

        // Sort and deduplicate posting lists, one partition per task
        let compact = report.add(
            "Compacting postings",
            ProgressConfig::new(Work::PercentSteps(state.partitions.len())),
        );
        let partitions = (state.partitions.into_par_iter())
            .map(|(length, partition)| {
                let partition = partition.build();
                compact.make_progress(1);
                (length, partition)
            })
            .collect::<BTreeMap<_, _>>();
        let store = IndexStore {
            partitions,
            records: state.records.build(),
            control: state.control,
        };
        log::info!(
            "Finalized store with {} records over {} ngram lengths",
            store.num_records(),
            store.partitions.len()
        );
        Ok(store)
    }

    /// Access the builder state, if it has not been finalized yet
    fn state(&mut self) -> Result<&mut BuilderState> {
        (self.0.as_mut()).ok_or(Error::StoreState("cannot modify a finalized store"))
    }
}

impl IndexStore {
    /// Build a store from a sequence of records, with an optional total token
    /// count
    pub fn build(
        records: impl IntoIterator<Item = NGramRecord>,
        total_tokens: Option<Frequency>,
    ) -> Result<Self> {
        let mut builder = IndexBuilder::new();
        for record in records {
            builder.insert(record)?;
        }
        if let Some(total) = total_tokens {
            builder.set_total_tokens(total)?;
        }
        builder.finalize()
    }
}

/// Data accumulated by an [`IndexBuilder`] that hasn't been finalized yet
#[derive(Debug, Default)]
struct BuilderState {
    /// Postings of each ngram length
    partitions: BTreeMap<usize, PartitionBuilder>,

    /// Surface forms and frequencies of all records
    records: RecordTableBuilder,

    /// Location of the total token count, if known
    control: Option<ControlRecord>,
}

/// Accumulator of postings for a single ngram length
///
/// All fields have the same meaning as in [`Partition`].
#[derive(Debug, Default)]
struct PartitionBuilder {
    text: HashMap<Ngram, Vec<Posting>>,
    lowercase: HashMap<UniCase<Ngram>, Vec<Posting>>,
    records: Vec<RecordId>,
}
//
impl PartitionBuilder {
    /// Index the tokens of a new record
    fn push(&mut self, record: RecordId, tokens: Box<[Ngram]>) {
        for (position, token) in tokens.into_vec().into_iter().enumerate() {
            let posting = Posting {
                record,
                position: Position::try_from(position)
                    .expect("record length should have been checked on construction"),
            };
            if let Some(postings) = self.text.get_mut(&*token) {
                postings.push(posting);
            } else {
                self.text.insert(token.clone(), vec![posting]);
            }
            match self.lowercase.entry(UniCase::new(token)) {
                hash_map::Entry::Occupied(o) => o.into_mut().push(posting),
                hash_map::Entry::Vacant(v) => {
                    v.insert(vec![posting]);
                }
            }
        }
        self.records.push(record);
    }

    /// Build the final partition
    fn build(self) -> Partition {
        fn compact(mut postings: Vec<Posting>) -> Box<[Posting]> {
            postings.sort_unstable();
            postings.dedup();
            postings.into_boxed_slice()
        }
        let mut records = self.records;
        records.sort_unstable();
        records.dedup();
        Partition {
            text: (self.text.into_iter())
                .map(|(token, postings)| (token, compact(postings)))
                .collect(),
            lowercase: (self.lowercase.into_iter())
                .map(|(token, postings)| (token, compact(postings)))
                .collect(),
            records: records.into(),
        }
    }
}

/// Accumulator of surface forms and frequencies
///
/// All fields have the same meaning as in [`RecordTable`].
#[derive(Debug, Default)]
struct RecordTableBuilder {
    form_ends: Vec<usize>,
    forms: String,
    frequencies: Vec<Frequency>,
}
//
impl RecordTableBuilder {
    /// Append a record, return its identifier
    fn push(&mut self, tokens: &[Ngram], frequency: Frequency) -> Result<RecordId> {
        let id = RecordId::try_from(self.frequencies.len())
            .map_err(|_| Error::StoreState("too many records for a single store"))?;
        for (idx, token) in tokens.iter().enumerate() {
            if idx > 0 {
                self.forms.push(' ');
            }
            self.forms.push_str(token);
        }
        self.form_ends.push(self.forms.len());
        self.frequencies.push(frequency);
        Ok(id)
    }

    /// Append all records from another table, return the identifier offset
    /// that they were assigned
    fn append(&mut self, other: Self) -> Result<RecordId> {
        let offset = self.frequencies.len();
        if offset + other.frequencies.len() > RecordId::MAX as usize {
            return Err(Error::StoreState("too many records for a single store"));
        }
        let offset = offset as RecordId;
        let form_offset = self.forms.len();
        self.forms.push_str(&other.forms);
        (self.form_ends).extend(other.form_ends.into_iter().map(|end| end + form_offset));
        self.frequencies.extend(other.frequencies);
        Ok(offset)
    }

    /// Build the final record table
    fn build(self) -> RecordTable {
        RecordTable {
            form_ends: self.form_ends.into(),
            forms: self.forms.into(),
            frequencies: self.frequencies.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Field;

    fn record(form: &str, frequency: Frequency) -> NGramRecord {
        NGramRecord::from_form(form, frequency).unwrap()
    }

    #[test]
    fn sequential_ids() {
        let mut builder = IndexBuilder::new();
        assert_eq!(builder.insert(record("the", 10)).unwrap(), 0);
        assert_eq!(builder.insert(record("big cat", 3)).unwrap(), 1);
        builder.set_total_tokens(100).unwrap();
        assert_eq!(builder.insert(record("cat", 4)).unwrap(), 3);
        assert_eq!(builder.num_records(), 3);

        let store = builder.finalize().unwrap();
        assert_eq!(store.record(1).unwrap().surface_form(), "big cat");
        assert_eq!(store.record(3).unwrap().frequency(), 4);
        assert_eq!(store.control_value(), Some(100));
    }

    #[test]
    fn total_tokens_only_once() {
        let mut builder = IndexBuilder::new();
        builder.set_total_tokens(1).unwrap();
        assert!(matches!(
            builder.set_total_tokens(2),
            Err(Error::StoreState(_))
        ));
    }

    #[test]
    fn no_changes_after_finalize() {
        let mut builder = IndexBuilder::new();
        builder.insert(record("the", 10)).unwrap();
        builder.finalize().unwrap();
        assert!(matches!(
            builder.insert(record("cat", 1)),
            Err(Error::StoreState(_))
        ));
        assert!(matches!(builder.set_total_tokens(1), Err(Error::StoreState(_))));
        assert!(matches!(builder.finalize(), Err(Error::StoreState(_))));
        assert!(matches!(
            builder.merge(IndexBuilder::new()),
            Err(Error::StoreState(_))
        ));
        assert_eq!(builder.num_records(), 0);
    }

    #[test]
    fn merge_offsets_ids() {
        let mut unigrams = IndexBuilder::new();
        unigrams.set_total_tokens(1000).unwrap();
        unigrams.insert(record("cat", 5)).unwrap();
        let mut bigrams = IndexBuilder::new();
        bigrams.insert(record("big cat", 3)).unwrap();
        bigrams.insert(record("cat food", 2)).unwrap();

        unigrams.merge(bigrams).unwrap();
        let store = unigrams.finalize().unwrap();
        assert_eq!(store.num_records(), 3);
        assert_eq!(store.control_value(), Some(1000));
        assert_eq!(store.records_of_length(2), [2, 3]);
        assert_eq!(store.record(3).unwrap().surface_form(), "cat food");
        assert_eq!(
            store.postings(Field::Text, "cat", 2),
            [
                Posting {
                    record: 2,
                    position: 1
                },
                Posting {
                    record: 3,
                    position: 0
                }
            ]
        );
        store.validate().unwrap();
    }

    #[test]
    fn merge_rejects_two_totals() {
        let mut first = IndexBuilder::new();
        first.set_total_tokens(1).unwrap();
        let mut second = IndexBuilder::new();
        second.set_total_tokens(2).unwrap();
        assert!(matches!(first.merge(second), Err(Error::StoreState(_))));
    }

    #[test]
    fn duplicate_tokens_within_a_record() {
        let store = IndexStore::build([record("the the", 7)], None).unwrap();
        assert_eq!(
            store.postings(Field::Lowercase, "The", 2),
            [
                Posting {
                    record: 0,
                    position: 0
                },
                Posting {
                    record: 0,
                    position: 1
                }
            ]
        );
        assert_eq!(store.control_value(), None);
    }
}
