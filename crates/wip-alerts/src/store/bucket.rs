//! Bucket file format.
//!
//! A bucket is a map from record id to codec bytes, written to disk as one
//! file so that replacing it is a single rename:
//!
//! ```text
//! bincode { version: u32, entries: { "<record id>": <record bytes>, ... } }
//! ```

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::{AlertsError, Result};

// ── File format constants ─────────────────────────────────────────────────────

const BUCKET_FILE_VERSION: u32 = 1;

/// Extension of bucket files. Temp files end in `.bucket.tmp` and are never
/// mistaken for buckets.
pub const BUCKET_EXTENSION: &str = "bucket";

// ── On-disk structure ─────────────────────────────────────────────────────────

/// An in-memory copy of one namespace.
#[derive(Debug, Serialize, Deserialize)]
pub struct Bucket {
    version: u32,
    entries: BTreeMap<String, Vec<u8>>,
}

impl Default for Bucket {
    fn default() -> Self {
        Self {
            version: BUCKET_FILE_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

impl Bucket {
    /// Read a bucket file. Returns `Ok(None)` if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns `AlertsError::StorageFailure` for filesystem errors and
    /// `AlertsError::CodecFailure` if the file cannot be decoded or carries an
    /// unknown version.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AlertsError::StorageFailure(format!(
                    "failed to read {}: {e}",
                    path.display()
                )))
            }
        };

        let bucket: Bucket = codec::decode(&bytes)?;
        if bucket.version != BUCKET_FILE_VERSION {
            return Err(AlertsError::CodecFailure(format!(
                "unsupported bucket version {} in {}",
                bucket.version,
                path.display()
            )));
        }
        Ok(Some(bucket))
    }

    /// Read a bucket file, starting from an empty bucket if it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        Ok(Self::load(path)?.unwrap_or_default())
    }

    /// Insert or replace an entry.
    pub fn put(&mut self, key: impl Into<String>, value: Vec<u8>) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Write the bucket to `path`, replacing any previous version atomically.
    ///
    /// The bytes go to a sibling temp file which is synced and then renamed
    /// into place, so a concurrent reader sees either the old or the new
    /// bucket, never a partial write.
    pub fn write(&self, path: &Path) -> Result<()> {
        let bytes = codec::encode(self)?;
        write_atomic(path, &bytes)
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let storage_err = |e: std::io::Error| {
        AlertsError::StorageFailure(format!("failed to write {}: {e}", path.display()))
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(storage_err)?;
    }

    let tmp_path = path.with_extension("bucket.tmp");
    let mut file = std::fs::File::create(&tmp_path).map_err(storage_err)?;
    file.write_all(data).map_err(storage_err)?;
    file.sync_all().map_err(storage_err)?;
    drop(file);

    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(storage_err(e));
    }

    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
