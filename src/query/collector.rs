//! Aggregation of the records that match a query

use crate::{add_frequencies, Frequency, Ngram};
use std::collections::HashMap;

/// Accumulator for the records that match a query
///
/// Always sums up the frequency of matching records. If requested on
/// construction, also collects the surface form and frequency of each one.
///
/// Use one collector per query.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NgramCollector {
    /// Sum of the frequencies of the records seen so far
    total_occurrences: Frequency,

    /// Frequency of each surface form seen so far, if collected
    forms: Option<HashMap<Ngram, Frequency>>,
}
//
impl NgramCollector {
    /// Set up a collector, telling whether surface forms should be collected
    pub fn new(collect_forms: bool) -> Self {
        Self {
            total_occurrences: 0,
            forms: collect_forms.then(HashMap::new),
        }
    }

    /// Account for a matching record
    pub fn collect(&mut self, frequency: Frequency, surface_form: &str) {
        self.total_occurrences = add_frequencies(self.total_occurrences, frequency);
        if let Some(forms) = &mut self.forms {
            // Records are unique per ngram, so a repeated form would be an
            // anomaly of the source corpus. The last one wins.
            if let Some(previous) = forms.insert(surface_form.into(), frequency) {
                log::debug!(
                    "Surface form {surface_form:?} matched twice, replacing frequency {previous} with {frequency}"
                );
            }
        }
    }

    /// Sum of the frequencies of all matching records
    pub fn total_occurrences(&self) -> Frequency {
        self.total_occurrences
    }

    /// Truth that surface forms are being collected
    pub fn collects_forms(&self) -> bool {
        self.forms.is_some()
    }

    /// Extract the frequency of each surface form
    ///
    /// This is empty if surface forms were not collected.
    pub fn into_forms(self) -> HashMap<Ngram, Frequency> {
        self.forms.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_only() {
        let mut collector = NgramCollector::new(false);
        assert!(!collector.collects_forms());
        collector.collect(3, "big cat");
        collector.collect(4, "the cat");
        assert_eq!(collector.total_occurrences(), 7);
        assert!(collector.into_forms().is_empty());
    }

    #[test]
    fn forms() {
        let mut collector = NgramCollector::new(true);
        collector.collect(3, "big cat");
        collector.collect(4, "the cat");
        collector.collect(5, "big cat");
        assert_eq!(collector.total_occurrences(), 12);
        let forms = collector.into_forms();
        assert_eq!(forms.len(), 2);
        assert_eq!(forms["big cat"], 5);
        assert_eq!(forms["the cat"], 4);
    }

    #[test]
    fn saturation() {
        let mut collector = NgramCollector::new(false);
        collector.collect(Frequency::MAX - 1, "the");
        collector.collect(10, "a");
        assert_eq!(collector.total_occurrences(), Frequency::MAX);
    }
}
