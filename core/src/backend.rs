use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::{StoreError, StoreResult};

/// A string key-value medium the [`crate::store::Store`] persists into.
///
/// Implemented by the SQLite [`crate::db::Database`] and by [`MemoryStorage`].
/// Methods take `&self`; backends are used from a single thread.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> StoreResult<()>;

    /// Write several keys at once. Either every entry lands or none does.
    fn set_many(&self, entries: &[(&str, &str)]) -> StoreResult<()>;

    /// Every stored key, sorted.
    fn keys(&self) -> StoreResult<Vec<String>>;
}

/// In-process storage, optionally capped at a byte quota the way browser
/// local storage is.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RefCell<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that rejects writes once keys plus values exceed `bytes`.
    #[must_use]
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            entries: RefCell::default(),
            quota: Some(bytes),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    fn check_quota(&self, writes: &[(&str, &str)]) -> StoreResult<()> {
        let Some(quota) = self.quota else {
            return Ok(());
        };
        let entries = self.entries.borrow();
        let mut projected: HashMap<&str, usize> = entries
            .iter()
            .map(|(k, v)| (k.as_str(), k.len() + v.len()))
            .collect();
        for &(key, value) in writes {
            projected.insert(key, key.len() + value.len());
        }
        let needed: usize = projected.values().sum();
        if needed > quota {
            let key = writes.first().map(|(k, _)| (*k).to_string()).unwrap_or_default();
            return Err(StoreError::QuotaExceeded {
                key,
                needed,
                available: quota,
            });
        }
        Ok(())
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.set_many(&[(key, value)])
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> StoreResult<()> {
        self.check_quota(entries)?;
        let mut map = self.entries.borrow_mut();
        for (key, value) in entries {
            map.insert((*key).to_string(), (*value).to_string());
        }
        Ok(())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        let mut keys: Vec<String> = self.entries.borrow().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_set_get_remove() {
        let mem = MemoryStorage::new();
        assert!(mem.is_empty());
        assert!(mem.get("a").unwrap().is_none());

        mem.set("a", "1").unwrap();
        mem.set("a", "2").unwrap();
        assert_eq!(mem.get("a").unwrap().as_deref(), Some("2"));
        assert_eq!(mem.len(), 1);

        mem.remove("a").unwrap();
        mem.remove("a").unwrap();
        assert!(mem.get("a").unwrap().is_none());
    }

    #[test]
    fn test_memory_keys_sorted() {
        let mem = MemoryStorage::new();
        mem.set_many(&[("b", "2"), ("a", "1"), ("c", "3")]).unwrap();
        assert_eq!(mem.keys().unwrap(), vec!["a", "b", "c"]);
        mem.remove("b").unwrap();
        assert_eq!(mem.keys().unwrap(), vec!["a", "c"]);
    }

    #[test]
    fn test_memory_quota_rejects_whole_batch() {
        let mem = MemoryStorage::with_quota(10);
        mem.set("k", "12345").unwrap();

        let err = mem.set_many(&[("a", "1"), ("b", "123456789")]).unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { available: 10, .. }));
        assert!(mem.get("a").unwrap().is_none());
        assert_eq!(mem.get("k").unwrap().as_deref(), Some("12345"));
    }

    #[test]
    fn test_memory_quota_counts_replacements_once() {
        let mem = MemoryStorage::with_quota(6);
        mem.set("k", "12345").unwrap();
        // Replacing the value does not double-count the key
        mem.set("k", "54321").unwrap();
        assert!(mem.set("k", "543210").is_err());
    }
}
