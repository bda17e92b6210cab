// Copyright (c) 2024 Botho Foundation

//! Key-value storage for transactions and UTXOs.
//!
//! The ledger only relies on get/put/delete/exists semantics, so storage is a
//! trait and the node wires in whatever backend it was built with.

use parking_lot::RwLock;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Id-keyed storage of `V`.
pub trait Store<V>: Send + Sync {
    /// Insert or replace the value stored under `id`.
    fn save(&self, id: &str, value: V) -> Result<(), StoreError>;

    /// Save and make the write visible to every subsequent read before returning.
    fn save_and_flush(&self, id: &str, value: V) -> Result<(), StoreError> {
        self.save(id, value)
    }

    fn exists_by_id(&self, id: &str) -> Result<bool, StoreError>;

    fn get_by_id(&self, id: &str) -> Result<Option<V>, StoreError>;

    /// Remove `id`. Returns whether a value was present.
    fn delete_by_id(&self, id: &str) -> Result<bool, StoreError>;

    /// All stored ids, in no particular order.
    fn ids(&self) -> Result<Vec<String>, StoreError>;
}

/// In-memory store. Writes are visible to readers as soon as `save` returns.
#[derive(Debug)]
pub struct MemoryStore<V> {
    entries: RwLock<HashMap<String, V>>,
}

impl<V> MemoryStore<V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + Sync> Store<V> for MemoryStore<V> {
    fn save(&self, id: &str, value: V) -> Result<(), StoreError> {
        self.entries.write().insert(id.to_string(), value);
        Ok(())
    }

    fn exists_by_id(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.entries.read().contains_key(id))
    }

    fn get_by_id(&self, id: &str) -> Result<Option<V>, StoreError> {
        Ok(self.entries.read().get(id).cloned())
    }

    fn delete_by_id(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.entries.write().remove(id).is_some())
    }

    fn ids(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.read().keys().cloned().collect())
    }
}
