//! Term, phrase and boolean queries over an [`IndexStore`]

pub mod collector;

use crate::{store::IndexStore, Ngram, Position, RecordId};
use std::cmp::Ordering;

/// Searchable field of the store
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Field {
    /// Literal tokens of the ngram
    Text,

    /// Case-folded tokens of the ngram
    Lowercase,

    /// Number of tokens in the ngram, as a decimal string
    Length,

    /// Control field holding the total token count of the corpus
    ///
    /// The value to be searched for is the ngram length that the total was
    /// recorded for, i.e. "1".
    TotalTokens,
}
//
impl Field {
    /// Field to be used when searching for tokens
    pub fn for_tokens(case_insensitive: bool) -> Self {
        if case_insensitive {
            Self::Lowercase
        } else {
            Self::Text
        }
    }
}

/// Query that selects records from the store
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Query {
    /// Records whose field contains a certain value
    ///
    /// For token fields, the token can appear at any position of an ngram of
    /// any length.
    Term {
        /// Field to be searched
        field: Field,

        /// Value to be searched for
        value: Ngram,
    },

    /// Ngrams of a certain length which contain a sequence of tokens
    ///
    /// Tokens must appear consecutively and in order. If there are as many
    /// tokens as the ngram length, only an exact match of the whole ngram is
    /// accepted.
    Phrase {
        /// Token field to be searched
        field: Field,

        /// Tokens to be searched for
        tokens: Box<[Ngram]>,

        /// Length of the ngrams to be searched
        length: usize,
    },

    /// Records that match all of the inner queries
    ///
    /// An empty conjunction does not match anything.
    And(Box<[Query]>),
}
//
impl Query {
    /// Build a term query
    pub fn term(field: Field, value: impl Into<Ngram>) -> Self {
        Self::Term {
            field,
            value: value.into(),
        }
    }

    /// Build a phrase query
    pub fn phrase(
        field: Field,
        tokens: impl IntoIterator<Item = impl Into<Ngram>>,
        length: usize,
    ) -> Self {
        Self::Phrase {
            field,
            tokens: tokens.into_iter().map(Into::into).collect(),
            length,
        }
    }

    /// Build a conjunction of queries
    pub fn and(queries: impl IntoIterator<Item = Query>) -> Self {
        Self::And(queries.into_iter().collect())
    }

    /// Query for the exact ngram formed by a sequence of tokens
    ///
    /// This is a phrase query spanning the whole ngram, combined with a filter
    /// on the ngram length.
    pub fn exact_ngram(tokens: &[impl AsRef<str>], case_insensitive: bool) -> Self {
        let length = tokens.len();
        Self::and([
            Self::phrase(
                Field::for_tokens(case_insensitive),
                tokens.iter().map(|token| token.as_ref()),
                length,
            ),
            Self::term(Field::Length, length.to_string()),
        ])
    }

    /// Determine the sorted set of records that match this query
    pub fn evaluate(&self, store: &IndexStore) -> Vec<RecordId> {
        match self {
            Self::Term { field, value } => term(store, *field, value),
            Self::Phrase {
                field,
                tokens,
                length,
            } => phrase(store, *field, tokens, *length),
            Self::And(queries) => {
                let mut queries = queries.iter();
                let Some(first) = queries.next() else {
                    return Vec::new();
                };
                let mut records = first.evaluate(store);
                for query in queries {
                    if records.is_empty() {
                        break;
                    }
                    records = intersect_sorted(records, query.evaluate(store));
                }
                records
            }
        }
    }
}

/// Evaluate a term query
fn term(store: &IndexStore, field: Field, value: &str) -> Vec<RecordId> {
    match field {
        Field::Text | Field::Lowercase => {
            let mut records = store
                .lengths()
                .flat_map(|length| store.postings(field, value, length))
                .map(|posting| posting.record)
                .collect::<Vec<_>>();
            records.sort_unstable();
            records.dedup();
            records
        }
        Field::Length => value
            .parse::<usize>()
            .map(|length| store.records_of_length(length).to_vec())
            .unwrap_or_default(),
        Field::TotalTokens => store
            .control_record()
            .filter(|control| value.parse::<usize>() == Ok(control.length))
            .map(|control| vec![control.record])
            .unwrap_or_default(),
    }
}

/// Evaluate a phrase query
///
/// Every token narrows down a sorted list of candidate (record, start
/// position) pairs, where the start position is that of the first token of
/// the phrase. Whatever survives all tokens is a match.
fn phrase(store: &IndexStore, field: Field, tokens: &[Ngram], length: usize) -> Vec<RecordId> {
    if tokens.is_empty() || tokens.len() > length {
        return Vec::new();
    }
    let mut candidates: Option<Vec<(RecordId, Position)>> = None;
    for (offset, token) in tokens.iter().enumerate() {
        // Postings are sorted by (record, position), and shifting every
        // position by the same offset preserves that order
        let starts = store
            .postings(field, token, length)
            .iter()
            .filter_map(|posting| {
                let start = usize::from(posting.position).checked_sub(offset)?;
                Some((posting.record, Position::try_from(start).ok()?))
            })
            .collect::<Vec<_>>();
        let narrowed = match candidates {
            None => starts,
            Some(candidates) => intersect_sorted(candidates, starts),
        };
        if narrowed.is_empty() {
            return Vec::new();
        }
        candidates = Some(narrowed);
    }
    let mut records = candidates
        .unwrap_or_default()
        .into_iter()
        .map(|(record, _start)| record)
        .collect::<Vec<_>>();
    records.dedup();
    records
}

/// Intersect two sorted and deduplicated lists
fn intersect_sorted<T: Ord>(lhs: Vec<T>, rhs: Vec<T>) -> Vec<T> {
    let mut result = Vec::with_capacity(lhs.len().min(rhs.len()));
    let mut lhs = lhs.into_iter().peekable();
    let mut rhs = rhs.into_iter().peekable();
    while let (Some(l), Some(r)) = (lhs.peek(), rhs.peek()) {
        match l.cmp(r) {
            Ordering::Less => {
                lhs.next();
            }
            Ordering::Greater => {
                rhs.next();
            }
            Ordering::Equal => {
                rhs.next();
                result.extend(lhs.next());
            }
        }
    }
    result
}
