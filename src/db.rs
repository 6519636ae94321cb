use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use bytes::Bytes;

/// Instantiates a single db and hands out clones of it to the server
#[derive(Debug, Default)]
pub struct DbGuard {
    db: Db,
}

/// Handle on the shared in-memory store.
///
/// Cloning is cheap; all clones observe the same entries.
#[derive(Debug, Clone, Default)]
pub struct Db {
    inner: Arc<SharedDb>,
}

#[derive(Debug, Default)]
struct SharedDb {
    state: Mutex<State>,
}

/// Keys and values are uninterpreted byte strings. Every public operation
/// takes the lock once, so each command is atomic with respect to the rest.
#[derive(Debug, Default)]
struct State {
    entries: HashMap<Vec<u8>, Bytes>,
}

impl DbGuard {
    pub fn new() -> DbGuard {
        DbGuard { db: Db::new() }
    }

    pub fn db(&self) -> Db {
        self.db.clone()
    }
}

impl Db {
    pub fn new() -> Db {
        Db {
            inner: Arc::new(SharedDb::default()),
        }
    }

    /// Get the value associated with a key, or `None` when absent.
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        let state = self.inner.state.lock().expect("db mutex poisoned");
        state.entries.get(key).cloned()
    }

    /// Associate a value with a key, overwriting any previous value.
    pub fn set(&self, key: Vec<u8>, value: Bytes) {
        let mut state = self.inner.state.lock().expect("db mutex poisoned");
        state.entries.insert(key, value);
    }

    /// Remove a key. Returns whether an entry was actually removed.
    pub fn del(&self, key: &[u8]) -> bool {
        let mut state = self.inner.state.lock().expect("db mutex poisoned");
        state.entries.remove(key).is_some()
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        let state = self.inner.state.lock().expect("db mutex poisoned");
        state.entries.contains_key(key)
    }

    /// Drop every entry and return how many there were.
    pub fn flush(&self) -> usize {
        let mut state = self.inner.state.lock().expect("db mutex poisoned");
        let size = state.entries.len();
        state.entries.clear();
        size
    }

    /// Byte length of the value stored at `key`, or `None` when absent.
    pub fn strlen(&self, key: &[u8]) -> Option<usize> {
        let state = self.inner.state.lock().expect("db mutex poisoned");
        state.entries.get(key).map(|value| value.len())
    }

    pub fn len(&self) -> usize {
        let state = self.inner.state.lock().expect("db mutex poisoned");
        state.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get() {
        let db = Db::new();
        assert_eq!(db.get(b"key"), None);

        db.set(b"key".to_vec(), Bytes::from_static(b"val"));
        assert_eq!(db.get(b"key"), Some(Bytes::from_static(b"val")));
        assert!(db.contains(b"key"));

        db.set(b"key".to_vec(), Bytes::from_static(b"other"));
        assert_eq!(db.get(b"key"), Some(Bytes::from_static(b"other")));
    }

    #[test]
    fn del_is_idempotent() {
        let db = Db::new();
        db.set(b"key".to_vec(), Bytes::from_static(b"val"));

        assert!(db.del(b"key"));
        assert_eq!(db.get(b"key"), None);
        assert!(!db.contains(b"key"));
        assert!(!db.del(b"key"));
    }

    #[test]
    fn flush_reports_prior_size() {
        let db = Db::new();
        assert_eq!(db.flush(), 0);

        db.set(b"k1".to_vec(), Bytes::from_static(b"1"));
        db.set(b"k2".to_vec(), Bytes::from_static(b"1"));
        db.set(b"k3".to_vec(), Bytes::from_static(b"1"));
        assert_eq!(db.flush(), 3);
        assert!(db.is_empty());
    }

    #[test]
    fn strlen_of_absent_key() {
        let db = Db::new();
        db.set(b"k1".to_vec(), Bytes::from_static(b"Hello, I am byte string"));
        assert_eq!(db.strlen(b"k1"), Some(23));
        assert_eq!(db.strlen(b"k3"), None);
    }

    #[test]
    fn clones_share_state() {
        let db = Db::new();
        let other = db.clone();
        db.set(b"key".to_vec(), Bytes::from_static(b"val"));
        assert_eq!(other.get(b"key"), Some(Bytes::from_static(b"val")));
        assert_eq!(other.len(), 1);
    }
}
