//! Error taxonomy of the frequency store

use std::{io, path::PathBuf};
use thiserror::Error;

/// Use our error type by default
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Things that can go wrong while building or querying a corpus
#[derive(Debug, Error)]
pub enum Error {
    /// A corpus line could not be decoded into a record
    ///
    /// Recovered locally: the line is skipped and ingestion continues.
    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord {
        /// 1-based line number within the source file
        line: u64,

        /// What is wrong with the line
        reason: String,
    },

    /// A corpus file could not be opened or read
    ///
    /// Recovered at file granularity: the rest of the bucket is still ingested.
    #[error("failed to read corpus file {}", path.display())]
    SourceFile {
        /// File that could not be read
        path: PathBuf,

        /// Underlying I/O or decoding error
        #[source]
        source: io::Error,
    },

    /// The total token count of the corpus is missing or unparsable
    #[error("corpus total token count is unavailable: {reason}")]
    CorpusMissingTotals {
        /// Why the total could not be determined
        reason: String,
    },

    /// A query does not contain any token to search for
    #[error("query does not contain any token")]
    InvalidQuery,

    /// The store was used in a way that its lifecycle does not allow
    #[error("invalid store state: {0}")]
    StoreState(&'static str),

    /// A persisted store could not be opened
    #[error("failed to open store at {}: {reason}", path.display())]
    StoreOpen {
        /// Location where the store was expected
        path: PathBuf,

        /// Why it could not be opened
        reason: String,
    },

    /// Any other I/O failure
    #[error("{context}")]
    Io {
        /// What we were doing when the failure happened
        context: String,

        /// Underlying I/O error
        #[source]
        source: io::Error,
    },
}
//
impl Error {
    /// Shorthand for building a [`Error::MalformedRecord`]
    pub fn malformed(line: u64, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            line,
            reason: reason.into(),
        }
    }

    /// Shorthand for building a [`Error::StoreOpen`]
    pub fn store_open(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::StoreOpen {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Wrap an I/O error with some context
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
