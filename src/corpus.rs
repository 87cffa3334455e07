//! Occurence count queries over a built corpus

use crate::{
    error::{Error, Result},
    query::{collector::NgramCollector, Field, Query},
    store::{builder::TOTALS_LENGTH, IndexStore},
    Frequency, Ngram, RecordId,
};
use std::{collections::HashMap, path::Path, sync::Arc};

/// Queryable ngram corpus
///
/// This is a thin layer over a finalized [`IndexStore`], which caches the
/// total token count of the corpus. It can be cloned and shared across threads
/// at will, since queries never modify the underlying store.
#[derive(Clone, Debug)]
pub struct NgramCorpus {
    /// Underlying store
    store: Arc<IndexStore>,

    /// Total number of tokens in the corpus
    total_tokens: Frequency,
}
//
impl NgramCorpus {
    /// Prepare to query a store
    ///
    /// Fails if the store does not know the total token count of the corpus.
    pub fn new(store: Arc<IndexStore>) -> Result<Self> {
        let mut collector = NgramCollector::new(false);
        let total_query = Query::term(Field::TotalTokens, TOTALS_LENGTH.to_string());
        let matches = total_query.evaluate(&store);
        if matches.is_empty() {
            return Err(Error::CorpusMissingTotals {
                reason: "store does not contain a total token count".into(),
            });
        }
        collect(&store, matches, &mut collector);
        Ok(Self {
            total_tokens: collector.total_occurrences(),
            store,
        })
    }

    /// Open a store that was saved to disk
    pub fn open(dir: &Path) -> Result<Self> {
        Self::new(Arc::new(IndexStore::open(dir)?))
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<IndexStore> {
        &self.store
    }

    /// Total number of tokens in the corpus
    pub fn total_tokens(&self) -> Frequency {
        self.total_tokens
    }

    /// Number of occurences of a whitespace-separated word sequence
    ///
    /// The length of the ngram to be searched is the number of words.
    pub fn occurrences(&self, text: &str, case_insensitive: bool) -> Result<Frequency> {
        let tokens = text.split_whitespace().collect::<Vec<_>>();
        self.occurrences_of_tokens(&tokens, case_insensitive)
    }

    /// Number of occurences of a pre-tokenized word sequence
    ///
    /// Empty tokens are ignored.
    pub fn occurrences_of_tokens(
        &self,
        tokens: &[impl AsRef<str>],
        case_insensitive: bool,
    ) -> Result<Frequency> {
        let tokens = (tokens.iter())
            .map(|token| token.as_ref().trim())
            .filter(|token| !token.is_empty())
            .collect::<Vec<_>>();
        if tokens.is_empty() {
            return Err(Error::InvalidQuery);
        }
        Ok(self.query_occurrences(&Query::exact_ngram(&tokens, case_insensitive)))
    }

    /// Sum of the frequencies of all records matching a query
    pub fn query_occurrences(&self, query: &Query) -> Frequency {
        let mut collector = NgramCollector::new(false);
        collect(&self.store, query.evaluate(&self.store), &mut collector);
        collector.total_occurrences()
    }

    /// Surface form and frequency of all records matching a query
    pub fn forms(&self, query: &Query) -> HashMap<Ngram, Frequency> {
        let mut collector = NgramCollector::new(true);
        collect(&self.store, query.evaluate(&self.store), &mut collector);
        collector.into_forms()
    }
}

/// Feed matching records to a collector
fn collect(store: &IndexStore, matches: Vec<RecordId>, collector: &mut NgramCollector) {
    for id in matches {
        let record = store
            .record(id)
            .expect("query evaluation should only yield valid record ids");
        collector.collect(record.frequency(), record.surface_form());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NGramRecord;

    fn corpus(records: &[(&str, Frequency)], total: Option<Frequency>) -> Result<NgramCorpus> {
        let records = (records.iter())
            .map(|&(form, frequency)| NGramRecord::from_form(form, frequency).unwrap());
        NgramCorpus::new(Arc::new(IndexStore::build(records, total)?))
    }

    fn sample() -> NgramCorpus {
        corpus(
            &[
                ("the", 231221),
                ("The", 1000),
                ("cat", 8351),
                ("big cat", 120),
                ("the big cat", 30),
                ("a b", 5),
                ("b a", 5),
            ],
            Some(500000),
        )
        .unwrap()
    }

    #[test]
    fn unigrams_and_totals() {
        let corpus = corpus(&[("the", 231221), ("cat", 8351)], Some(500000)).unwrap();
        assert_eq!(corpus.total_tokens(), 500000);
        assert_eq!(corpus.occurrences("the", false).unwrap(), 231221);
        assert_eq!(corpus.occurrences("cat", false).unwrap(), 8351);
        assert_eq!(corpus.occurrences("dog", false).unwrap(), 0);
    }

    #[test]
    fn bigrams() {
        let corpus = sample();
        assert_eq!(corpus.occurrences("big cat", false).unwrap(), 120);
        assert_eq!(corpus.occurrences("  big \t cat ", false).unwrap(), 120);
        assert_eq!(corpus.occurrences("cat big", false).unwrap(), 0);
    }

    #[test]
    fn length_discrimination() {
        let corpus = sample();
        assert_eq!(corpus.occurrences("big cat", false).unwrap(), 120);
        assert_eq!(corpus.occurrences("the big cat", false).unwrap(), 30);
        assert_eq!(corpus.occurrences("the big", false).unwrap(), 0);
    }

    #[test]
    fn order_sensitivity() {
        let corpus = sample();
        assert_eq!(corpus.occurrences("a b", false).unwrap(), 5);
        assert_eq!(corpus.occurrences("b a", false).unwrap(), 5);
        assert_eq!(corpus.occurrences("big cat", false).unwrap(), 120);
        assert_eq!(corpus.occurrences("cat big", false).unwrap(), 0);
    }

    #[test]
    fn case_insensitive_union() {
        let corpus = sample();
        assert_eq!(corpus.occurrences("the", false).unwrap(), 231221);
        assert_eq!(corpus.occurrences("The", false).unwrap(), 1000);
        assert_eq!(corpus.occurrences("the", true).unwrap(), 232221);
        assert_eq!(corpus.occurrences("THE", true).unwrap(), 232221);
        assert_eq!(corpus.occurrences("BIG Cat", true).unwrap(), 120);
        assert_eq!(corpus.occurrences("BIG Cat", false).unwrap(), 0);
    }

    #[test]
    fn round_trip() {
        let records = [
            ("the", 231221),
            ("The", 1000),
            ("big cat", 120),
            ("a b c d e", 40),
        ];
        let corpus = corpus(&records, Some(1)).unwrap();
        for (form, frequency) in records {
            assert_eq!(corpus.occurrences(form, false).unwrap(), frequency);
        }
    }

    #[test]
    fn idempotence() {
        let (first, second) = (sample(), sample());
        assert_eq!(first.store(), second.store());
        for text in ["the", "The", "big cat", "cat big", "a b", "dog"] {
            for case_insensitive in [false, true] {
                assert_eq!(
                    first.occurrences(text, case_insensitive).unwrap(),
                    second.occurrences(text, case_insensitive).unwrap()
                );
            }
        }
    }

    #[test]
    fn invalid_query() {
        let corpus = sample();
        assert!(matches!(corpus.occurrences("   ", false), Err(Error::InvalidQuery)));
        assert!(matches!(corpus.occurrences("", true), Err(Error::InvalidQuery)));
        assert!(matches!(
            corpus.occurrences_of_tokens(&[" ", ""], false),
            Err(Error::InvalidQuery)
        ));
    }

    #[test]
    fn control_value_stays_hidden() {
        let corpus = sample();
        let all_lengths = Query::term(Field::Length, "1");
        let forms = corpus.forms(&all_lengths);
        assert_eq!(forms.len(), 3);
        assert!(!forms.contains_key(""));
        assert_eq!(corpus.query_occurrences(&all_lengths), 231221 + 1000 + 8351);
    }

    #[test]
    fn exploratory_forms() {
        let corpus = sample();
        let forms = corpus.forms(&Query::term(Field::Lowercase, "CAT"));
        assert_eq!(
            forms,
            HashMap::from([
                ("cat".into(), 8351),
                ("big cat".into(), 120),
                ("the big cat".into(), 30),
            ])
        );
        let sub_phrase = Query::phrase(Field::Text, ["big"], 3);
        assert_eq!(corpus.query_occurrences(&sub_phrase), 30);
    }

    #[test]
    fn missing_totals() {
        assert!(matches!(
            corpus(&[("the", 1)], None),
            Err(Error::CorpusMissingTotals { .. })
        ));
    }

    #[test]
    fn concurrent_queries() {
        let corpus = sample();
        std::thread::scope(|scope| {
            for _ in 0..4 {
                let corpus = corpus.clone();
                scope.spawn(move || {
                    for _ in 0..100 {
                        assert_eq!(corpus.occurrences("the", true).unwrap(), 232221);
                        assert_eq!(corpus.occurrences("big cat", false).unwrap(), 120);
                    }
                });
            }
        });
    }
}
