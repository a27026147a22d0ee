//! Counter store repository module.

mod r#trait;
pub use r#trait::{merge_documents, CounterStore, StoredRecord};

mod clock;
pub use clock::{Clock, ManualClock, SystemClock};

mod memory;
pub use memory::InMemoryCounterStore;

#[cfg(test)]
mod tests;

use serde::de::DeserializeOwned;

use crate::errors::DomainResult;

/// A typed document together with the revision it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub revision: u64,
}

/// Read and deserialize a document
pub async fn fetch_typed<C, T>(store: &C, collection: &str, key: &str) -> DomainResult<Option<Versioned<T>>>
where
    C: CounterStore + ?Sized,
    T: DeserializeOwned,
{
    match store.get(collection, key).await? {
        Some(StoredRecord { data, revision }) => Ok(Some(Versioned {
            value: serde_json::from_value(data)?,
            revision,
        })),
        None => Ok(None),
    }
}
