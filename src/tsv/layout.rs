//! Discovery of the frequency files of a Web-1T style corpus
//!
//! The corpus root contains one directory per ngram length, whose name starts
//! with that length (e.g. "1gms", "2gms"...). The unigram directory contains a
//! "vocab" frequency file, possibly gzipped, and a "total" file holding the
//! total number of tokens in the corpus. Other directories contain any number
//! of frequency files, alongside secondary index files that must be skipped.

use crate::{
    config::BuildConfig,
    error::{Error, Result},
    store::builder::TOTALS_LENGTH,
};
use std::{
    collections::BTreeMap,
    ffi::OsString,
    path::{Path, PathBuf},
};

/// Name of the unigram frequency file
pub const VOCAB_FILE: &str = "vocab";

/// Name of the gzipped unigram frequency file
pub const GZIPPED_VOCAB_FILE: &str = "vocab.gz";

/// Name of the file holding the total token count of the corpus
pub const TOTAL_FILE: &str = "total";

/// Frequency files of a corpus, grouped by ngram length
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CorpusLayout {
    /// Ngram buckets, in order of increasing length
    pub buckets: Vec<Bucket>,
}
//
impl CorpusLayout {
    /// Bucket of ngrams of a certain length, if any
    pub fn bucket(&self, length: usize) -> Option<&Bucket> {
        self.buckets.iter().find(|bucket| bucket.length == length)
    }

    /// Number of frequency files across all buckets
    pub fn num_files(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.files.len()).sum()
    }
}

/// Frequency files for ngrams of a given length
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Bucket {
    /// Number of tokens of the ngrams in this bucket
    pub length: usize,

    /// Frequency files, sorted by name
    pub files: Vec<PathBuf>,

    /// File holding the total token count (unigram bucket only)
    pub total_file: Option<PathBuf>,
}
//
impl Bucket {
    /// Set up an empty bucket
    fn new(length: usize) -> Self {
        Self {
            length,
            files: Vec::new(),
            total_file: None,
        }
    }
}

/// Enumerate the frequency files of a corpus
///
/// Files that do not exist, like a missing vocabulary, are still listed so
/// that they get reported when ingestion fails to open them.
pub async fn scan(root: &Path, config: &BuildConfig) -> Result<CorpusLayout> {
    let mut buckets = BTreeMap::new();
    for (name, path) in sorted_entries(root).await? {
        // Only directories whose name starts with a length are buckets
        if !is_dir(&path).await {
            log::debug!("Ignoring {} which is not a directory", path.display());
            continue;
        }
        let Some(length) = bucket_length(&name.to_string_lossy()) else {
            log::debug!("Ignoring {} which is not an ngram bucket", path.display());
            continue;
        };
        let bucket = buckets
            .entry(length)
            .or_insert_with(|| Bucket::new(length));

        // Unigram buckets have a fixed layout
        if length == TOTALS_LENGTH {
            if bucket.total_file.is_some() {
                log::warn!(
                    "Ignoring {} since another unigram bucket was found before",
                    path.display()
                );
                continue;
            }
            bucket.files.push(vocab_file(&path).await);
            bucket.total_file = Some(path.join(TOTAL_FILE));
            continue;
        }

        // Other buckets contain any number of frequency files
        for (_, file) in sorted_entries(&path).await? {
            let extension = file.extension().and_then(|ext| ext.to_str());
            if !config.accepts_extension(extension) {
                log::trace!("Skipping excluded file {}", file.display());
                continue;
            }
            if is_dir(&file).await {
                log::debug!("Ignoring nested directory {}", file.display());
                continue;
            }
            bucket.files.push(file);
        }
    }
    let layout = CorpusLayout {
        buckets: buckets.into_values().collect(),
    };
    log::info!(
        "Found {} frequency files in {} ngram buckets",
        layout.num_files(),
        layout.buckets.len()
    );
    Ok(layout)
}

/// Length of the ngrams in a bucket, given the bucket directory's name
fn bucket_length(name: &str) -> Option<usize> {
    let digits = name.len() - name.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    name[..digits].parse().ok().filter(|&length| length > 0)
}

/// Location of the unigram frequency file
async fn vocab_file(bucket: &Path) -> PathBuf {
    let plain = bucket.join(VOCAB_FILE);
    if exists(&plain).await {
        return plain;
    }
    let gzipped = bucket.join(GZIPPED_VOCAB_FILE);
    if exists(&gzipped).await {
        return gzipped;
    }
    plain
}

/// Directory entries, sorted by name
async fn sorted_entries(dir: &Path) -> Result<Vec<(OsString, PathBuf)>> {
    let context = || format!("failed to list directory {}", dir.display());
    let mut entries = Vec::new();
    let mut read_dir = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| Error::io(context(), e))?;
    while let Some(entry) = read_dir
        .next_entry()
        .await
        .map_err(|e| Error::io(context(), e))?
    {
        entries.push((entry.file_name(), entry.path()));
    }
    entries.sort_unstable();
    Ok(entries)
}

/// Truth that a path exists
async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Truth that a path designates a directory, following symlinks
async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|metadata| metadata.is_dir())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn touch(path: PathBuf) {
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(path, "").await.unwrap();
    }

    #[test]
    fn lengths() {
        assert_eq!(bucket_length("1gms"), Some(1));
        assert_eq!(bucket_length("12gms"), Some(12));
        assert_eq!(bucket_length("3"), Some(3));
        assert_eq!(bucket_length("gms"), None);
        assert_eq!(bucket_length("0gms"), None);
        assert_eq!(bucket_length(""), None);
    }

    #[tokio::test]
    async fn web1t_layout() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root.join("1gms/vocab.gz")).await;
        touch(root.join("1gms/total")).await;
        touch(root.join("2gms/2gm-0001")).await;
        touch(root.join("2gms/2gm-0000")).await;
        touch(root.join("2gms/2gm.idx")).await;
        touch(root.join("3gms/3gm-0000.gz")).await;
        touch(root.join("docs/readme.txt")).await;
        touch(root.join("4gms.tar")).await;

        let layout = scan(root, &BuildConfig::default()).await.unwrap();
        assert_eq!(layout.buckets.len(), 3);
        assert_eq!(layout.num_files(), 4);
        assert_eq!(
            layout.bucket(1).unwrap(),
            &Bucket {
                length: 1,
                files: vec![root.join("1gms/vocab.gz")],
                total_file: Some(root.join("1gms/total")),
            }
        );
        assert_eq!(
            layout.bucket(2).unwrap().files,
            [root.join("2gms/2gm-0000"), root.join("2gms/2gm-0001")]
        );
        assert_eq!(
            layout.bucket(3).unwrap().files,
            [root.join("3gms/3gm-0000.gz")]
        );
        assert!(layout.bucket(4).is_none());
    }

    #[tokio::test]
    async fn plain_vocab_first() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path().join("1gms/vocab")).await;
        touch(dir.path().join("1gms/vocab.gz")).await;
        let layout = scan(dir.path(), &BuildConfig::default()).await.unwrap();
        assert_eq!(
            layout.bucket(1).unwrap().files,
            [dir.path().join("1gms/vocab")]
        );
    }

    #[tokio::test]
    async fn missing_vocab_still_listed() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir(dir.path().join("1gms")).await.unwrap();
        let layout = scan(dir.path(), &BuildConfig::default()).await.unwrap();
        assert_eq!(
            layout.bucket(1).unwrap().files,
            [dir.path().join("1gms/vocab")]
        );
    }

    #[tokio::test]
    async fn custom_exclusion() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path().join("2gms/2gm-0000")).await;
        touch(dir.path().join("2gms/2gm.idx")).await;
        touch(dir.path().join("2gms/notes.txt")).await;
        let config = BuildConfig::new("txt", false);
        let layout = scan(dir.path(), &config).await.unwrap();
        assert_eq!(
            layout.bucket(2).unwrap().files,
            [dir.path().join("2gms/2gm-0000"), dir.path().join("2gms/2gm.idx")]
        );
    }

    #[tokio::test]
    async fn missing_root() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            scan(&dir.path().join("nope"), &BuildConfig::default()).await,
            Err(Error::Io { .. })
        ));
    }
}
