//! Transactional object store over bucket files.
//!
//! Every public operation is one store-level transaction: writers hold the
//! store's write lock for the whole read-modify-replace of a bucket, readers
//! hold the read lock for the whole scan. There is no transaction spanning
//! two calls.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::codec;
use crate::error::{AlertsError, Result};
use crate::store::bucket::{Bucket, BUCKET_EXTENSION};
use crate::store::{EntityKind, Record};

/// Filesystem-backed, bucketed key-value store.
///
/// The store is safe to share between request threads of one process;
/// concurrent writers from multiple processes are not coordinated.
pub struct ObjectStore {
    root: PathBuf,
    lock: RwLock<()>,
}

impl ObjectStore {
    /// Open (creating if needed) a store rooted at `root`.
    ///
    /// Creates the root directory and one namespace directory per scoped
    /// entity kind.
    ///
    /// # Errors
    ///
    /// Returns `AlertsError::StorageFailure` if a directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for kind in EntityKind::ALL {
            if kind.is_scoped() {
                let dir = root.join(kind.bucket_name());
                log::debug!("creating {kind} namespace");
                std::fs::create_dir_all(&dir).map_err(|e| {
                    AlertsError::StorageFailure(format!(
                        "failed to create {kind} namespace at {}: {e}",
                        dir.display()
                    ))
                })?;
            }
        }
        Ok(Self {
            root,
            lock: RwLock::new(()),
        })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ── Scoped operations ─────────────────────────────────────────────────────

    /// Upsert `records` into the `kind` namespace owned by `parent_id`.
    ///
    /// The namespace is created if absent. All records are encoded before the
    /// bucket is touched and the bucket is replaced in a single rename, so
    /// either every record of the call is stored or none is.
    pub fn save_scoped<'a, R, I>(&self, kind: EntityKind, parent_id: &str, records: I) -> Result<()>
    where
        R: Record + 'a,
        I: IntoIterator<Item = &'a R>,
    {
        require_scoped(kind)?;
        validate_namespace_key(parent_id)?;

        let encoded = records
            .into_iter()
            .map(|r| -> Result<(String, Vec<u8>)> {
                Ok((r.persistence_id().to_string(), codec::encode(r)?))
            })
            .collect::<Result<Vec<_>>>()?;

        log::debug!("saving {} {kind} for account {parent_id}", encoded.len());

        let _guard = self.write()?;
        let path = self.scoped_path(kind, parent_id);
        let mut bucket = Bucket::load_or_default(&path)?;
        for (id, bytes) in encoded {
            bucket.put(id, bytes);
        }
        bucket.write(&path)?;
        log::debug!("{kind} bucket of account {parent_id} holds {} records", bucket.len());
        Ok(())
    }

    /// Return every record in the `kind` namespace owned by `parent_id`.
    ///
    /// A namespace that does not exist yet yields an empty map.
    pub fn list_scoped<R: Record>(
        &self,
        kind: EntityKind,
        parent_id: &str,
    ) -> Result<HashMap<String, R>> {
        require_scoped(kind)?;
        validate_namespace_key(parent_id)?;

        let _guard = self.read()?;
        match Bucket::load(&self.scoped_path(kind, parent_id))? {
            Some(bucket) => decode_all(&bucket),
            None => {
                log::debug!("account {parent_id} has no {kind} namespace");
                Ok(HashMap::new())
            }
        }
    }

    /// Find a record of `kind` by id across every owning account.
    ///
    /// Returns the record together with the id of the account that owns it,
    /// or `None` if no namespace holds `record_id`.
    pub fn find_global<R: Record>(
        &self,
        kind: EntityKind,
        record_id: &str,
    ) -> Result<Option<(R, String)>> {
        require_scoped(kind)?;

        let _guard = self.read()?;
        for (parent_id, path) in self.parent_buckets(kind)? {
            if let Some(bucket) = Bucket::load(&path)? {
                if let Some(bytes) = bucket.get(record_id) {
                    let record: R = codec::decode(bytes)?;
                    return Ok(Some((record, parent_id)));
                }
            }
        }
        Ok(None)
    }

    /// Return every record of `kind`, grouped by owning account.
    ///
    /// Accounts whose namespace exists but is empty are omitted.
    pub fn list_global<R: Record>(&self, kind: EntityKind) -> Result<HashMap<String, Vec<R>>> {
        require_scoped(kind)?;

        let _guard = self.read()?;
        let mut grouped = HashMap::new();
        for (parent_id, path) in self.parent_buckets(kind)? {
            let Some(bucket) = Bucket::load(&path)? else {
                continue;
            };
            if bucket.is_empty() {
                continue;
            }
            let records = bucket
                .iter()
                .map(|(_, bytes)| codec::decode::<R>(bytes))
                .collect::<Result<Vec<R>>>()?;
            grouped.insert(parent_id, records);
        }
        Ok(grouped)
    }

    // ── Flat operations ───────────────────────────────────────────────────────

    /// Upsert one record into the flat `kind` namespace.
    pub fn save_flat<R: Record>(&self, kind: EntityKind, record: &R) -> Result<()> {
        require_flat(kind)?;
        let bytes = codec::encode(record)?;

        log::debug!("saving {kind} record {}", record.persistence_id());

        let _guard = self.write()?;
        let path = self.flat_path(kind);
        let mut bucket = Bucket::load_or_default(&path)?;
        bucket.put(record.persistence_id(), bytes);
        bucket.write(&path)
    }

    /// Load one record from the flat `kind` namespace.
    pub fn get_flat<R: Record>(&self, kind: EntityKind, record_id: &str) -> Result<Option<R>> {
        require_flat(kind)?;

        let _guard = self.read()?;
        let Some(bucket) = Bucket::load(&self.flat_path(kind))? else {
            return Ok(None);
        };
        bucket.get(record_id).map(codec::decode::<R>).transpose()
    }

    /// Return every record of the flat `kind` namespace.
    pub fn list_flat<R: Record>(&self, kind: EntityKind) -> Result<HashMap<String, R>> {
        require_flat(kind)?;

        let _guard = self.read()?;
        match Bucket::load(&self.flat_path(kind))? {
            Some(bucket) => decode_all(&bucket),
            None => Ok(HashMap::new()),
        }
    }

    // ── Internal helpers ──────────────────────────────────────────────────────

    fn read(&self) -> Result<RwLockReadGuard<'_, ()>> {
        self.lock
            .read()
            .map_err(|_| AlertsError::StorageFailure("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, ()>> {
        self.lock
            .write()
            .map_err(|_| AlertsError::StorageFailure("store lock poisoned".to_string()))
    }

    fn scoped_path(&self, kind: EntityKind, parent_id: &str) -> PathBuf {
        self.root
            .join(kind.bucket_name())
            .join(format!("{parent_id}.{BUCKET_EXTENSION}"))
    }

    fn flat_path(&self, kind: EntityKind) -> PathBuf {
        self.root
            .join(format!("{}.{BUCKET_EXTENSION}", kind.bucket_name()))
    }

    /// List `(parent_id, path)` for every bucket file of `kind`, sorted by id.
    fn parent_buckets(&self, kind: EntityKind) -> Result<Vec<(String, PathBuf)>> {
        let dir = self.root.join(kind.bucket_name());
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AlertsError::StorageFailure(format!(
                    "failed to read {kind} namespace: {e}"
                )))
            }
        };

        let mut parents = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                AlertsError::StorageFailure(format!("failed to read {kind} namespace: {e}"))
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(BUCKET_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                parents.push((stem.to_string(), path.clone()));
            }
        }
        parents.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(parents)
    }
}

fn decode_all<R: Record>(bucket: &Bucket) -> Result<HashMap<String, R>> {
    bucket
        .iter()
        .map(|(id, bytes)| -> Result<(String, R)> { Ok((id.to_string(), codec::decode(bytes)?)) })
        .collect()
}

fn require_scoped(kind: EntityKind) -> Result<()> {
    if kind.is_scoped() {
        Ok(())
    } else {
        Err(AlertsError::StorageFailure(format!(
            "{kind} is a flat namespace"
        )))
    }
}

fn require_flat(kind: EntityKind) -> Result<()> {
    if kind.is_scoped() {
        Err(AlertsError::StorageFailure(format!(
            "{kind} is an account-scoped namespace"
        )))
    } else {
        Ok(())
    }
}

/// Namespace keys become file names, so only `[A-Za-z0-9_-]` is accepted.
fn validate_namespace_key(key: &str) -> Result<()> {
    let ok = !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if ok {
        Ok(())
    } else {
        Err(AlertsError::StorageFailure(format!(
            "invalid namespace key {key:?}"
        )))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
