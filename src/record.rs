//! Representation of a single corpus entry

use crate::{Frequency, Ngram, Position};

/// One ngram from the corpus and its number of occurences
///
/// An ngram is made of 1+ tokens, which are non-empty and contain no
/// whitespace. The ngram's length is its number of tokens.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct NGramRecord {
    /// Tokens of the ngram, in order
    tokens: Box<[Ngram]>,

    /// Number of occurences across the corpus
    frequency: Frequency,
}
//
impl NGramRecord {
    /// Maximal number of tokens in a record
    pub const MAX_LENGTH: usize = Position::MAX as usize;

    /// Build a record from its tokens
    ///
    /// Fails with a human-readable reason if the tokens do not form a valid
    /// ngram.
    pub fn new(
        tokens: impl IntoIterator<Item = impl Into<Ngram>>,
        frequency: Frequency,
    ) -> Result<Self, &'static str> {
        let tokens = tokens.into_iter().map(Into::into).collect::<Box<[Ngram]>>();
        if tokens.is_empty() {
            return Err("ngram has no token");
        }
        if tokens.len() > Self::MAX_LENGTH {
            return Err("ngram has too many tokens");
        }
        for token in tokens.iter() {
            if token.is_empty() {
                return Err("ngram has an empty token");
            }
            if token.chars().any(char::is_whitespace) {
                return Err("ngram token contains whitespace");
            }
        }
        Ok(Self { tokens, frequency })
    }

    /// Build a record from a whitespace-separated ngram
    pub fn from_form(form: &str, frequency: Frequency) -> Result<Self, &'static str> {
        Self::new(form.split_whitespace(), frequency)
    }

    /// Tokens of the ngram
    pub fn tokens(&self) -> &[Ngram] {
        &self.tokens
    }

    /// Number of tokens
    pub fn length(&self) -> usize {
        self.tokens.len()
    }

    /// Number of occurences across the corpus
    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    /// Split the record into its tokens and frequency
    pub fn into_parts(self) -> (Box<[Ngram]>, Frequency) {
        (self.tokens, self.frequency)
    }

    /// Literal text of the ngram, with tokens separated by single spaces
    pub fn surface_form(&self) -> String {
        self.tokens.join(" ")
    }

    /// Lowercase counterpart of [`surface_form()`](Self::surface_form)
    ///
    /// Case-insensitive lookups do not compare this string, they compare
    /// tokens under Unicode case folding. It is provided for display.
    pub fn lowercase_form(&self) -> String {
        self.surface_form().to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forms() {
        let record = NGramRecord::from_form("The  big\tCat", 42).unwrap();
        assert_eq!(record.length(), 3);
        assert_eq!(record.frequency(), 42);
        assert_eq!(record.surface_form(), "The big Cat");
        assert_eq!(record.lowercase_form(), "the big cat");
        assert_eq!(
            record.tokens().iter().map(|t| &**t).collect::<Vec<_>>(),
            ["The", "big", "Cat"]
        );
    }

    #[test]
    fn rejects_invalid_tokens() {
        assert!(NGramRecord::from_form("   ", 1).is_err());
        assert!(NGramRecord::new(["a", ""], 1).is_err());
        assert!(NGramRecord::new(["a b"], 1).is_err());
        let too_long = vec!["x"; NGramRecord::MAX_LENGTH + 1];
        assert!(NGramRecord::new(too_long, 1).is_err());
    }
}
