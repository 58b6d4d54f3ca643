//! Key-value backends.
//!
//! [`MemoryStore`] is a locked `BTreeMap`, good for tests and replays.
//! [`SledStore`] keeps the same blobs in a sled tree on disk.

use std::collections::BTreeMap;
use std::path::Path;

use parking_lot::RwLock;
use sled::{Db, Tree};

use super::{KvStore, StateResult};

/// Volatile store. Entries iterate in key order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> StateResult<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StateResult<()> {
        self.entries.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn entries(&self) -> StateResult<Vec<(Vec<u8>, Vec<u8>)>> {
        Ok(self
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

/// sled-backed store. All blobs live in one `state` tree; sled orders keys
/// lexicographically, which is the order `entries` needs.
#[derive(Debug, Clone)]
pub struct SledStore {
    db: Db,
    state: Tree,
}

impl SledStore {
    /// Opens or creates the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StateResult<Self> {
        Self::from_db(sled::open(path)?)
    }

    /// A database removed when dropped.
    pub fn open_temporary() -> StateResult<Self> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: Db) -> StateResult<Self> {
        let state = db.open_tree("state")?;
        Ok(Self { db, state })
    }
}

impl KvStore for SledStore {
    fn get(&self, key: &[u8]) -> StateResult<Option<Vec<u8>>> {
        Ok(self.state.get(key)?.map(|v| v.to_vec()))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StateResult<()> {
        self.state.insert(key, value)?;
        Ok(())
    }

    fn entries(&self) -> StateResult<Vec<(Vec<u8>, Vec<u8>)>> {
        self.state
            .iter()
            .map(|item| {
                let (k, v) = item?;
                Ok((k.to_vec(), v.to_vec()))
            })
            .collect()
    }

    fn flush(&self) -> StateResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(store: &dyn KvStore) {
        assert_eq!(store.get(b"b").unwrap(), None);
        store.put(b"b", b"2").unwrap();
        store.put(b"a", b"1").unwrap();
        store.put(b"b", b"3").unwrap();
        assert_eq!(store.get(b"b").unwrap(), Some(b"3".to_vec()));
        let keys: Vec<_> = store.entries().unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec()]);
        store.flush().unwrap();
    }

    #[test]
    fn memory_store_basics() {
        let store = MemoryStore::new();
        exercise(&store);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn sled_store_basics() {
        let store = SledStore::open_temporary().unwrap();
        exercise(&store);
    }

    #[test]
    fn sled_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SledStore::open(dir.path()).unwrap();
            store.put(b"k", b"v").unwrap();
            store.flush().unwrap();
        }
        let store = SledStore::open(dir.path()).unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"v".to_vec()));
    }
}
