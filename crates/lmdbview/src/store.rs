//! Ordered key/value store access
//!
//! The browser only needs a handful of primitives from the storage engine:
//! a scoped read transaction with a seek-and-advance cursor, point reads and
//! single-key writes. [`KvStore`] captures exactly that, with an LMDB backend
//! built on `heed` and an in-memory backend used by the demo mode and tests.

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RoTxn};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use thiserror::Error;

use crate::settings::ConnectionConfig;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("lmdb error: {0}")]
    Lmdb(#[from] heed::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database path {} does not exist", .0.display())]
    MissingPath(PathBuf),
    #[error("database path {} is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("read failed: {0}")]
    Read(String),
    #[error("store lock poisoned")]
    Poisoned,
}

/// Whether a cursor walk should keep going after the current entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Read access scoped to a single transaction.
pub trait ReadView {
    /// Position a cursor at the first key `>= start` and feed entries to `visit`
    /// in ascending key order until it answers [`Flow::Stop`] or the store ends.
    /// An empty `start` begins at the first key of the store.
    fn scan_from(
        &self,
        start: &[u8],
        visit: &mut dyn FnMut(&[u8], &[u8]) -> Flow,
    ) -> Result<(), StoreError>;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;
}

pub trait KvStore: Send {
    /// Run `f` inside one read transaction.
    fn read(
        &self,
        f: &mut dyn FnMut(&dyn ReadView) -> Result<(), StoreError>,
    ) -> Result<(), StoreError>;

    /// Insert or overwrite `key` in its own write transaction.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Remove `key` in its own write transaction. Returns false if it was absent.
    fn delete(&self, key: &[u8]) -> Result<bool, StoreError>;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let mut found = None;
        self.read(&mut |view| {
            found = view.get(key)?;
            Ok(())
        })?;
        Ok(found)
    }

    /// Release the underlying handle. Must complete before the same database
    /// can be opened again.
    fn close(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Opens stores for configured connections.
pub trait Connector {
    fn open(&self, connection: &ConnectionConfig) -> Result<Box<dyn KvStore>, StoreError>;
}

pub struct LmdbStore {
    env: Env,
    db: Database<Bytes, Bytes>,
    path: PathBuf,
}

impl LmdbStore {
    /// Open the unnamed root database of the LMDB environment in `path`.
    pub fn open<P: AsRef<Path>>(path: P, map_size: usize) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(StoreError::MissingPath(path.to_path_buf()));
        }
        if !path.is_dir() {
            return Err(StoreError::NotADirectory(path.to_path_buf()));
        }

        // SAFETY: the environment is opened once per process and closed
        // through `close`, which waits for every handle to be released.
        let env = unsafe { EnvOpenOptions::new().map_size(map_size).max_dbs(0).open(path)? };

        let mut wtxn = env.write_txn()?;
        let db: Database<Bytes, Bytes> = env.create_database(&mut wtxn, None)?;
        wtxn.commit()?;

        log::debug!("opened lmdb environment at {}", path.display());

        Ok(Self {
            env,
            db,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

struct LmdbView<'a, 'e> {
    db: Database<Bytes, Bytes>,
    txn: &'a RoTxn<'e>,
}

fn drain<'t, I>(entries: I, visit: &mut dyn FnMut(&[u8], &[u8]) -> Flow) -> Result<(), StoreError>
where
    I: Iterator<Item = heed::Result<(&'t [u8], &'t [u8])>>,
{
    for entry in entries {
        let (key, value) = entry?;
        if visit(key, value) == Flow::Stop {
            break;
        }
    }
    Ok(())
}

impl ReadView for LmdbView<'_, '_> {
    fn scan_from(
        &self,
        start: &[u8],
        visit: &mut dyn FnMut(&[u8], &[u8]) -> Flow,
    ) -> Result<(), StoreError> {
        // LMDB rejects zero-length keys, so an empty start walks from the beginning.
        if start.is_empty() {
            return drain(self.db.iter(self.txn)?, visit);
        }
        let range: (Bound<&[u8]>, Bound<&[u8]>) = (Bound::Included(start), Bound::Unbounded);
        drain(self.db.range(self.txn, &range)?, visit)
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        if key.is_empty() {
            return Ok(None);
        }
        Ok(self.db.get(self.txn, key)?.map(<[u8]>::to_vec))
    }
}

impl KvStore for LmdbStore {
    fn read(
        &self,
        f: &mut dyn FnMut(&dyn ReadView) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let rtxn = self.env.read_txn()?;
        let view = LmdbView {
            db: self.db,
            txn: &rtxn,
        };
        f(&view)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn()?;
        self.db.put(&mut wtxn, key, value)?;
        wtxn.commit()?;
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<bool, StoreError> {
        let mut wtxn = self.env.write_txn()?;
        let deleted = self.db.delete(&mut wtxn, key)?;
        wtxn.commit()?;
        Ok(deleted)
    }

    fn close(self: Box<Self>) -> Result<(), StoreError> {
        let LmdbStore { env, path, .. } = *self;
        env.prepare_for_closing().wait();
        log::debug!("closed lmdb environment at {}", path.display());
        Ok(())
    }
}

/// Connects to LMDB environments on disk.
pub struct LmdbConnector;

impl Connector for LmdbConnector {
    fn open(&self, connection: &ConnectionConfig) -> Result<Box<dyn KvStore>, StoreError> {
        let store = LmdbStore::open(connection.expanded_path(), connection.map_size_bytes())?;
        Ok(Box::new(store))
    }
}

/// Shared in-memory ordered map. Clones see the same data, so a clone kept
/// outside a session can play the part of another writer.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<K, V, I>(entries: I) -> Self
    where
        K: Into<Vec<u8>>,
        V: Into<Vec<u8>>,
        I: IntoIterator<Item = (K, V)>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            entries: Arc::new(RwLock::new(map)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct MemoryView<'a> {
    entries: &'a BTreeMap<Vec<u8>, Vec<u8>>,
}

impl ReadView for MemoryView<'_> {
    fn scan_from(
        &self,
        start: &[u8],
        visit: &mut dyn FnMut(&[u8], &[u8]) -> Flow,
    ) -> Result<(), StoreError> {
        let range = self
            .entries
            .range::<[u8], _>((Bound::Included(start), Bound::Unbounded));
        for (key, value) in range {
            if visit(key, value) == Flow::Stop {
                break;
            }
        }
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }
}

impl KvStore for MemoryStore {
    fn read(
        &self,
        f: &mut dyn FnMut(&dyn ReadView) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        f(&MemoryView { entries: &entries })
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.remove(key).is_some())
    }
}

impl Connector for MemoryStore {
    fn open(&self, _connection: &ConnectionConfig) -> Result<Box<dyn KvStore>, StoreError> {
        Ok(Box::new(self.clone()))
    }
}
