//! In-process implementation of CounterStore.
//!
//! Suitable for tests and single-instance deployments; counters are lost on
//! restart and are not shared between processes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::errors::DomainError;

use super::clock::{Clock, SystemClock};
use super::r#trait::{merge_documents, CounterStore, StoredRecord};

type DocumentMap = HashMap<(String, String), StoredRecord>;

/// HashMap-backed counter store with an injectable clock
pub struct InMemoryCounterStore {
    documents: Mutex<DocumentMap>,
    clock: Arc<dyn Clock>,
}

impl InMemoryCounterStore {
    /// Create an empty store on the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store whose `server_time` comes from `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            documents: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Number of stored documents across all collections
    pub fn len(&self) -> usize {
        self.lock().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, DocumentMap>, DomainError> {
        self.documents.lock().map_err(|_| DomainError::Storage {
            message: "in-memory counter store lock poisoned".to_string(),
        })
    }

    fn slot(collection: &str, key: &str) -> (String, String) {
        (collection.to_string(), key.to_string())
    }
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<StoredRecord>, DomainError> {
        let docs = self.lock()?;
        Ok(docs.get(&Self::slot(collection, key)).cloned())
    }

    async fn put(
        &self,
        collection: &str,
        key: &str,
        data: Value,
        merge: bool,
    ) -> Result<u64, DomainError> {
        let mut docs = self.lock()?;
        let slot = Self::slot(collection, key);

        let (data, revision) = match docs.remove(&slot) {
            Some(existing) if merge => (merge_documents(existing.data, data), existing.revision + 1),
            Some(existing) => (data, existing.revision + 1),
            None => (data, 1),
        };

        docs.insert(slot, StoredRecord { data, revision });
        Ok(revision)
    }

    async fn put_if_revision(
        &self,
        collection: &str,
        key: &str,
        data: Value,
        expected_revision: Option<u64>,
    ) -> Result<bool, DomainError> {
        let mut docs = self.lock()?;
        let slot = Self::slot(collection, key);

        let current = docs.get(&slot).map(|record| record.revision);
        if current != expected_revision {
            return Ok(false);
        }

        let revision = current.unwrap_or(0) + 1;
        docs.insert(slot, StoredRecord { data, revision });
        Ok(true)
    }

    async fn server_time(&self) -> Result<DateTime<Utc>, DomainError> {
        Ok(self.clock.now())
    }
}
