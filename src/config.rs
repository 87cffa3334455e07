//! Corpus build configuration

use std::sync::Arc;

/// Extension of the secondary index files that come with the Web-1T corpus
pub const DEFAULT_EXCLUDED_EXTENSION: &str = "idx";

/// Final build configuration
///
/// The CLI front end derives this from its arguments. Library users can start
/// from the [`Default`] configuration.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct BuildConfig {
    /// Extension of files which should not be ingested from ngram buckets
    pub excluded_extension: Box<str>,

    /// Truth that an unreadable corpus file should abort the build, instead of
    /// being reported and skipped
    pub fail_on_skipped_files: bool,
}
//
impl BuildConfig {
    /// Set up a build configuration
    pub fn new(excluded_extension: impl Into<Box<str>>, fail_on_skipped_files: bool) -> Arc<Self> {
        Arc::new(Self {
            excluded_extension: excluded_extension.into(),
            fail_on_skipped_files,
        })
    }

    /// Truth that a file with this extension should be ingested
    pub fn accepts_extension(&self, extension: Option<&str>) -> bool {
        extension != Some(&*self.excluded_extension)
    }
}
//
impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            excluded_extension: DEFAULT_EXCLUDED_EXTENSION.into(),
            fail_on_skipped_files: false,
        }
    }
}
