//! Immutable, length-partitioned inverted index of the corpus
//!
//! Records are grouped into partitions by number of tokens. Each partition
//! maps every token to the list of records where it appears, along with its
//! position inside of each record, once for the literal token and once for its
//! case-folded form. A parallel record table provides the frequency and
//! surface form of each record.
//!
//! The total token count of the corpus is kept as a distinguished record of
//! the record table that no token posting points to. It can only be reached
//! through [`IndexStore::control_value()`] or a query on the
//! [`TotalTokens`](Field::TotalTokens) control field.

pub mod builder;
mod persist;

use crate::{query::Field, Frequency, Ngram, Position, RecordId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use unicase::UniCase;

/// Finalized frequency store
///
/// Produced by an [`IndexBuilder`](builder::IndexBuilder), or loaded from disk
/// with [`IndexStore::open()`]. Nothing can modify it after that point, so it
/// can be freely shared across threads.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct IndexStore {
    /// Postings of each ngram length
    partitions: BTreeMap<usize, Partition>,

    /// Surface forms and frequencies of all records
    records: RecordTable,

    /// Location of the total token count, if it was recorded
    control: Option<ControlRecord>,
}
//
impl IndexStore {
    /// Total number of tokens in the corpus, if it was recorded
    pub fn control_value(&self) -> Option<Frequency> {
        self.control
            .and_then(|control| self.record(control.record))
            .map(|control| control.frequency())
    }

    /// Postings of a token within a certain field of an ngram length partition
    ///
    /// Only the [`Text`](Field::Text) and [`Lowercase`](Field::Lowercase)
    /// fields have token postings, other fields always yield an empty list.
    /// Postings are sorted by record, then by position.
    pub fn postings(&self, field: Field, token: &str, length: usize) -> &[Posting] {
        let Some(partition) = self.partitions.get(&length) else {
            return &[];
        };
        let postings = match field {
            Field::Text => partition.text.get(token),
            Field::Lowercase => partition.lowercase.get(&UniCase::new(Ngram::from(token))),
            Field::Length | Field::TotalTokens => None,
        };
        postings.map(|postings| &postings[..]).unwrap_or(&[])
    }

    /// Sorted list of records of a certain ngram length
    pub fn records_of_length(&self, length: usize) -> &[RecordId] {
        self.partitions
            .get(&length)
            .map(|partition| &partition.records[..])
            .unwrap_or(&[])
    }

    /// Ngram lengths for which some records are available, in increasing order
    pub fn lengths(&self) -> impl Iterator<Item = usize> + '_ {
        self.partitions.keys().copied()
    }

    /// Look up a record's frequency and surface form
    pub fn record(&self, id: RecordId) -> Option<RecordView<'_>> {
        self.records.get(id)
    }

    /// Number of ngram records, excluding the total token count
    pub fn num_records(&self) -> usize {
        self.records.len() - usize::from(self.control.is_some())
    }

    /// Number of ngram records of each length
    pub fn records_per_length(&self) -> BTreeMap<usize, usize> {
        (self.partitions.iter())
            .map(|(&length, partition)| (length, partition.records.len()))
            .collect()
    }

    /// Record holding the total token count, with the ngram length it was
    /// recorded for
    pub(crate) fn control_record(&self) -> Option<ControlRecord> {
        self.control
    }

    /// Check internal consistency, typically after loading from disk
    pub(crate) fn validate(&self) -> Result<(), String> {
        self.records.validate()?;
        let num_records = self.records.len();
        let check_id = |id: RecordId| {
            if (id as usize) < num_records {
                Ok(())
            } else {
                Err(format!("reference to unknown record {id}"))
            }
        };
        if let Some(control) = self.control {
            check_id(control.record)?;
        }
        for (&length, partition) in &self.partitions {
            for &id in partition.records.iter() {
                check_id(id)?;
            }
            let all_postings = (partition.text.values()).chain(partition.lowercase.values());
            for postings in all_postings {
                for posting in postings.iter() {
                    check_id(posting.record)?;
                    if usize::from(posting.position) >= length {
                        return Err(format!(
                            "posting {posting:?} lies beyond the end of a {length}-gram"
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Occurence of a token inside of a record
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct Posting {
    /// Record where the token appears
    pub record: RecordId,

    /// Position of the token within the record
    pub position: Position,
}

/// Frequency and surface form of a record
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct RecordView<'store> {
    frequency: Frequency,
    surface_form: &'store str,
}
//
impl<'store> RecordView<'store> {
    /// Number of occurences across the corpus
    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    /// Literal text of the ngram
    ///
    /// This is empty for the record holding the total token count.
    pub fn surface_form(&self) -> &'store str {
        self.surface_form
    }
}

/// Location of the total token count in the record table
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub(crate) struct ControlRecord {
    /// Record holding the count
    pub record: RecordId,

    /// Ngram length which the count was recorded for
    pub length: usize,
}

/// Postings of all records of a given length
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
struct Partition {
    /// Literal tokens
    text: HashMap<Ngram, Box<[Posting]>>,

    /// Case-folded tokens
    #[serde(with = "caseless")]
    lowercase: HashMap<UniCase<Ngram>, Box<[Posting]>>,

    /// All records of this length, sorted
    records: Box<[RecordId]>,
}

/// Concatenated surface forms and frequencies of all records
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
struct RecordTable {
    /// Offsets that mark the end of each record in the "forms" string
    form_ends: Box<[usize]>,

    /// Concatenated surface forms
    forms: Box<str>,

    /// Frequency of each record
    frequencies: Box<[Frequency]>,
}
//
impl RecordTable {
    /// Number of records
    fn len(&self) -> usize {
        self.frequencies.len()
    }

    /// Access a record
    fn get(&self, id: RecordId) -> Option<RecordView<'_>> {
        let idx = id as usize;
        let frequency = *self.frequencies.get(idx)?;
        let start = if idx == 0 { 0 } else { self.form_ends[idx - 1] };
        Some(RecordView {
            frequency,
            surface_form: &self.forms[start..self.form_ends[idx]],
        })
    }

    /// Check that all form offsets are usable
    fn validate(&self) -> Result<(), String> {
        if self.form_ends.len() != self.frequencies.len() {
            return Err(format!(
                "{} surface forms for {} frequencies",
                self.form_ends.len(),
                self.frequencies.len()
            ));
        }
        let mut last_end = 0;
        for &end in self.form_ends.iter() {
            if end < last_end || end > self.forms.len() || !self.forms.is_char_boundary(end) {
                return Err(format!("invalid surface form offset {end}"));
            }
            last_end = end;
        }
        Ok(())
    }
}

/// Serialization of case-folded postings
///
/// Case-folded keys are written as the casing that was first seen during the
/// build, and folded again on load.
mod caseless {
    use super::Posting;
    use crate::Ngram;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::HashMap;
    use unicase::UniCase;

    pub fn serialize<S: Serializer>(
        map: &HashMap<UniCase<Ngram>, Box<[Posting]>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_map(map.iter().map(|(key, postings)| {
            let key: &str = key.as_ref();
            (key, postings)
        }))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<HashMap<UniCase<Ngram>, Box<[Posting]>>, D::Error> {
        let map = HashMap::<Ngram, Box<[Posting]>>::deserialize(deserializer)?;
        Ok(map
            .into_iter()
            .map(|(key, postings)| (UniCase::new(key), postings))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NGramRecord;

    fn store() -> IndexStore {
        let records = [("the", 231221), ("The", 1000), ("big cat", 120), ("cat big", 7)]
            .into_iter()
            .map(|(form, freq)| NGramRecord::from_form(form, freq).unwrap());
        IndexStore::build(records, Some(500000)).unwrap()
    }

    #[test]
    fn lookups() {
        let store = store();
        assert_eq!(store.control_value(), Some(500000));
        assert_eq!(store.num_records(), 4);
        assert_eq!(store.lengths().collect::<Vec<_>>(), [1, 2]);
        assert_eq!(store.records_per_length(), BTreeMap::from([(1, 2), (2, 2)]));

        assert_eq!(
            store.postings(Field::Text, "the", 1),
            [Posting { record: 0, position: 0 }]
        );
        assert_eq!(
            store.postings(Field::Lowercase, "THE", 1),
            [
                Posting { record: 0, position: 0 },
                Posting { record: 1, position: 0 }
            ]
        );
        assert_eq!(
            store.postings(Field::Text, "cat", 2),
            [
                Posting { record: 2, position: 1 },
                Posting { record: 3, position: 0 }
            ]
        );
        assert!(store.postings(Field::Text, "cat", 1).is_empty());
        assert!(store.postings(Field::Text, "cat", 3).is_empty());
        assert!(store.postings(Field::Length, "cat", 2).is_empty());
        assert_eq!(store.records_of_length(2), [2, 3]);

        let record = store.record(2).unwrap();
        assert_eq!(record.frequency(), 120);
        assert_eq!(record.surface_form(), "big cat");
        assert!(store.record(42).is_none());
        store.validate().unwrap();
    }

    #[test]
    fn control_value_is_not_a_token() {
        let store = store();
        let control = store.control_record().unwrap();
        assert_eq!(control.length, 1);
        assert_eq!(store.record(control.record).unwrap().surface_form(), "");
        assert!(!store.records_of_length(1).contains(&control.record));
        assert!(store.postings(Field::Text, "", 1).is_empty());
    }

    #[test]
    fn validation_catches_dangling_postings() {
        let mut store = store();
        let partition = store.partitions.get_mut(&1).unwrap();
        partition.text.insert(
            "dangling".into(),
            vec![Posting {
                record: 99,
                position: 0,
            }]
            .into(),
        );
        assert!(store.validate().is_err());
    }
}
