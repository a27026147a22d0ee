//! Counter store trait defining the interface for attempt-record persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::errors::DomainError;

/// A stored document together with its revision
///
/// Revisions start at 1 for a newly created document and grow by one on every
/// write; an absent document has no revision.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    /// Document body (a JSON object)
    pub data: Value,
    /// Revision of this body
    pub revision: u64,
}

/// Keyed document store holding attempt counters
///
/// Documents live in named collections and are addressed by a string key.
/// Every read-modify-write performed by the security services goes through
/// [`CounterStore::put_if_revision`], so implementations must make that call
/// atomic with respect to concurrent writers of the same key.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Fetch a document
    ///
    /// # Returns
    /// * `Ok(Some(record))` - Document and its current revision
    /// * `Ok(None)` - No document under this key
    /// * `Err(DomainError)` - If the store cannot be reached
    async fn get(&self, collection: &str, key: &str) -> Result<Option<StoredRecord>, DomainError>;

    /// Write a document unconditionally
    ///
    /// With `merge` the top-level fields of `data` are merged into the
    /// existing document (fields not mentioned are kept); without it the
    /// document is replaced.
    ///
    /// # Returns
    /// * `Ok(revision)` - Revision of the written document
    async fn put(
        &self,
        collection: &str,
        key: &str,
        data: Value,
        merge: bool,
    ) -> Result<u64, DomainError>;

    /// Replace a document only if it is still at `expected_revision`
    ///
    /// `None` means "only if the document does not exist yet".
    ///
    /// # Returns
    /// * `Ok(true)` - The write was applied
    /// * `Ok(false)` - Another writer got there first; nothing was written
    async fn put_if_revision(
        &self,
        collection: &str,
        key: &str,
        data: Value,
        expected_revision: Option<u64>,
    ) -> Result<bool, DomainError>;

    /// Current time as seen by the store
    ///
    /// All block and window comparisons use this clock, never the caller's.
    async fn server_time(&self) -> Result<DateTime<Utc>, DomainError>;
}

/// Shallow-merge `incoming` into `existing`
///
/// Both sides must be JSON objects for a field-level merge; otherwise the
/// incoming value replaces the existing one.
pub fn merge_documents(existing: Value, incoming: Value) -> Value {
    match (existing, incoming) {
        (Value::Object(mut base), Value::Object(fields)) => {
            for (field, value) in fields {
                base.insert(field, value);
            }
            Value::Object(base)
        }
        (_, incoming) => incoming,
    }
}
