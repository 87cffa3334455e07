//! On-disk representation of a finalized store
//!
//! A store directory contains two files:
//!
//! - "store.bin" is the bincode-encoded [`IndexStore`]
//! - "manifest.json" describes the store in a human-readable way, and is
//!   checked before the much larger store body is loaded.
//!
//! Both files are first written under a temporary name, then moved into
//! place. The manifest is moved last, so a directory with a manifest always
//! holds a complete store.

use super::IndexStore;
use crate::{
    error::{Error, Result},
    Frequency,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{self, BufReader, BufWriter, ErrorKind},
    path::Path,
};

/// Name of the store body file
const STORE_FILE: &str = "store.bin";

/// Name of the manifest file
const MANIFEST_FILE: &str = "manifest.json";

/// Version of the on-disk format, to be bumped on incompatible changes
const FORMAT_VERSION: u32 = 1;

/// Human-readable description of a saved store
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
struct Manifest {
    /// On-disk format version
    format_version: u32,

    /// Number of ngram records
    num_records: usize,

    /// Number of ngram records of each length
    records_per_length: BTreeMap<usize, usize>,

    /// Total number of tokens in the corpus
    total_tokens: Option<Frequency>,
}

impl IndexStore {
    /// Save the store into a directory, which is created if needed
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)
            .map_err(|e| Error::io(format!("creating store directory {}", dir.display()), e))?;

        // Write the store body
        let store_path = dir.join(STORE_FILE);
        let store_tmp = dir.join(format!("{STORE_FILE}.tmp"));
        let context = || format!("writing store body to {}", store_tmp.display());
        let file = File::create(&store_tmp).map_err(|e| Error::io(context(), e))?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, self)
            .map_err(|e| Error::io(context(), io::Error::new(ErrorKind::Other, e)))?;
        (writer.into_inner().map_err(io::IntoInnerError::into_error))
            .and_then(|file| file.sync_all())
            .map_err(|e| Error::io(context(), e))?;

        // Write the manifest
        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            num_records: self.num_records(),
            records_per_length: self.records_per_length(),
            total_tokens: self.control_value(),
        };
        let manifest_path = dir.join(MANIFEST_FILE);
        let manifest_tmp = dir.join(format!("{MANIFEST_FILE}.tmp"));
        let manifest_json = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| Error::io("encoding store manifest", e.into()))?;
        fs::write(&manifest_tmp, manifest_json).map_err(|e| {
            Error::io(format!("writing store manifest to {}", manifest_tmp.display()), e)
        })?;

        // Move everything into place
        for (tmp, path) in [(store_tmp, store_path), (manifest_tmp, manifest_path)] {
            fs::rename(&tmp, &path).map_err(|e| {
                Error::io(format!("moving {} into place", path.display()), e)
            })?;
        }
        log::info!(
            "Saved store with {} records to {}",
            manifest.num_records,
            dir.display()
        );
        Ok(())
    }

    /// Load a store that was previously saved into a directory
    pub fn open(dir: &Path) -> Result<Self> {
        // Check the manifest first
        let manifest_json = fs::read(dir.join(MANIFEST_FILE))
            .map_err(|e| Error::store_open(dir, format!("cannot read manifest ({e})")))?;
        let manifest = serde_json::from_slice::<Manifest>(&manifest_json)
            .map_err(|e| Error::store_open(dir, format!("invalid manifest ({e})")))?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(Error::store_open(
                dir,
                format!(
                    "unsupported format version {} (expected {FORMAT_VERSION})",
                    manifest.format_version
                ),
            ));
        }

        // Then load the store body and make sure it matches
        let file = File::open(dir.join(STORE_FILE))
            .map_err(|e| Error::store_open(dir, format!("cannot read store body ({e})")))?;
        let store = bincode::deserialize_from::<_, Self>(BufReader::new(file))
            .map_err(|e| Error::store_open(dir, format!("corrupt store body ({e})")))?;
        store
            .validate()
            .map_err(|e| Error::store_open(dir, format!("inconsistent store body ({e})")))?;
        if store.num_records() != manifest.num_records
            || store.control_value() != manifest.total_tokens
        {
            return Err(Error::store_open(
                dir,
                "store body does not match its manifest",
            ));
        }
        log::info!(
            "Opened store with {} records from {}",
            manifest.num_records,
            dir.display()
        );
        Ok(store)
    }
}
