//! Processing of tab-separated ngram frequency files
//!
//! Every line of a frequency file is made of an ngram, a tab, and the number
//! of occurences of the ngram. Files may be gzipped, which is detected from
//! their ".gz" extension.

pub mod layout;

use crate::{
    error::{Error, Result},
    Frequency, NGramRecord,
};
use async_compression::tokio::bufread::GzipDecoder;
use csv_async::{AsyncReaderBuilder, ErrorKind, StringRecord};
use futures::stream::{BoxStream, StreamExt};
use std::path::Path;
use tokio::{
    fs::File,
    io::{AsyncRead, BufReader},
};

/// Entry from a frequency file
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Entry {
    /// Line of the file where the entry was found (1-based)
    pub line: u64,

    /// Ngram and frequency
    pub record: NGramRecord,
}

/// Open a frequency file and decode its entries
///
/// The resulting stream yields [`Error::MalformedRecord`] for lines that cannot
/// be decoded, after which reading can go on. Any other error means that the
/// rest of the file is unreadable.
pub async fn read_entries(path: &Path) -> Result<BoxStream<'static, Result<Entry>>> {
    // Open the file, decompressing it if needed
    let file = File::open(path).await.map_err(|source| Error::SourceFile {
        path: path.into(),
        source,
    })?;
    let bytes = BufReader::new(file);
    let bytes: Box<dyn AsyncRead + Send + Unpin> = if is_gzipped(path) {
        Box::new(GzipDecoder::new(bytes))
    } else {
        Box::new(bytes)
    };

    // Apply TSV decoder to uncompressed bytes
    //
    // Ngrams may legitimately contain quotes, so quoting must be disabled.
    // Malformed lines may have any number of fields, which we want to report
    // ourselves instead of getting the decoder to reject the rest of the file.
    let records = AsyncReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quoting(false)
        .flexible(true)
        .create_reader(bytes)
        .into_records();

    // Turn TSV records into entries
    let path = path.to_owned();
    Ok(records
        .map(move |fields| match fields {
            Ok(fields) => {
                let line = fields.position().map_or(0, |pos| pos.line());
                parse_fields(line, &fields)
            }
            Err(e) => Err(classify_error(&path, e)),
        })
        .boxed())
}

/// Decode a single line of a frequency file
pub fn parse_line(line: u64, text: &str) -> Result<Entry> {
    let Some((form, count)) = text.split_once('\t') else {
        return Err(missing_separator(line));
    };
    parse_entry(line, form, count)
}

/// Truth that a file is gzipped
pub fn is_gzipped(path: &Path) -> bool {
    path.extension().is_some_and(|extension| extension == "gz")
}

/// Decode the fields of a TSV record
fn parse_fields(line: u64, fields: &StringRecord) -> Result<Entry> {
    match (fields.len(), fields.get(0), fields.get(1)) {
        (2, Some(form), Some(count)) => parse_entry(line, form, count),
        (0 | 1, _, _) => Err(missing_separator(line)),
        (num_fields, _, _) => Err(Error::malformed(
            line,
            format!("expected an ngram and a count, found {num_fields} tab-separated fields"),
        )),
    }
}

/// Decode an ngram and its count
fn parse_entry(line: u64, form: &str, count: &str) -> Result<Entry> {
    let frequency = count.trim().parse::<Frequency>().map_err(|_| {
        Error::malformed(line, format!("count {count:?} is not a non-negative integer"))
    })?;
    let record =
        NGramRecord::from_form(form, frequency).map_err(|reason| Error::malformed(line, reason))?;
    Ok(Entry { line, record })
}

/// Error for lines that lack a tab separator
fn missing_separator(line: u64) -> Error {
    Error::malformed(line, "missing tab separator between ngram and count")
}

/// Tell apart TSV decoding errors that only affect a line from I/O errors
fn classify_error(path: &Path, error: csv_async::Error) -> Error {
    let line = error.position().map_or(0, |pos| pos.line());
    match error.into_kind() {
        ErrorKind::Io(source) => Error::SourceFile {
            path: path.into(),
            source,
        },
        other => Error::malformed(line, format!("undecodable line ({other:?})")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_compression::tokio::write::GzipEncoder;
    use futures::TryStreamExt;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn lines() {
        let entry = parse_line(3, "big cat\t120").unwrap();
        assert_eq!(entry.line, 3);
        assert_eq!(entry.record, NGramRecord::from_form("big cat", 120).unwrap());
        assert!(matches!(
            parse_line(4, "big cat 120"),
            Err(Error::MalformedRecord { line: 4, .. })
        ));
        assert!(parse_line(5, "big cat\tmany").is_err());
        assert!(parse_line(6, "big cat\t-3").is_err());
        assert!(parse_line(7, "\t12").is_err());
        assert!(parse_line(8, "big\t1\t2").is_err());
    }

    #[tokio::test]
    async fn plain_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2gm-0000");
        tokio::fs::write(&path, "not a record\n\"big\" cat\t120\nbig cat\tmany\nfat cat\t7\n")
            .await
            .unwrap();
        let entries = read_entries(&path).await.unwrap().collect::<Vec<_>>().await;
        assert_eq!(entries.len(), 4);
        assert!(matches!(
            entries[0],
            Err(Error::MalformedRecord { line: 1, .. })
        ));
        let second = entries[1].as_ref().unwrap();
        assert_eq!(second.line, 2);
        assert_eq!(second.record.surface_form(), "\"big\" cat");
        assert!(matches!(
            entries[2],
            Err(Error::MalformedRecord { line: 3, .. })
        ));
        let fourth = entries[3].as_ref().unwrap();
        assert_eq!(fourth.line, 4);
        assert_eq!(fourth.record.frequency(), 7);
    }

    #[tokio::test]
    async fn gzipped_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.gz");
        let mut encoder = GzipEncoder::new(Vec::new());
        encoder.write_all(b"the\t231221\ncat\t8351\n").await.unwrap();
        encoder.shutdown().await.unwrap();
        tokio::fs::write(&path, encoder.into_inner()).await.unwrap();

        let entries = read_entries(&path)
            .await
            .unwrap()
            .map_ok(|entry| (entry.record.surface_form(), entry.record.frequency()))
            .try_collect::<Vec<_>>()
            .await
            .unwrap();
        assert_eq!(
            entries,
            [("the".to_string(), 231221), ("cat".to_string(), 8351)]
        );
    }

    #[tokio::test]
    async fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_entries(&dir.path().join("nope")).await,
            Err(Error::SourceFile { .. })
        ));
    }
}
