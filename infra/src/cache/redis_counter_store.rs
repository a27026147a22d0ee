//! Redis-backed counter store
//!
//! Each document lives in a hash with two fields: `rev` (revision counter)
//! and `data` (the JSON body). Writes go through Lua scripts so a revision
//! check and the write that follows it are atomic on the server. Keys are
//! `{prefix}{collection}:{sha256(identifier)}`, so raw emails never appear in
//! key names.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::Script;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use tm_core::errors::DomainError;
use tm_core::repositories::counter_store::{merge_documents, CounterStore, StoredRecord};
use tm_shared::config::CacheConfig;

use crate::InfrastructureError;

use super::redis_client::RedisClient;

/// Replace the body only if the revision still matches; returns the new
/// revision, or 0 when another writer got there first
const COMPARE_AND_SET: &str = r#"
local current = tonumber(redis.call('HGET', KEYS[1], 'rev') or '0')
if current ~= tonumber(ARGV[1]) then
    return 0
end
local rev = current + 1
redis.call('HSET', KEYS[1], 'rev', rev, 'data', ARGV[2])
return rev
"#;

/// Replace the body unconditionally; returns the new revision
const OVERWRITE: &str = r#"
local rev = tonumber(redis.call('HGET', KEYS[1], 'rev') or '0') + 1
redis.call('HSET', KEYS[1], 'rev', rev, 'data', ARGV[1])
return rev
"#;

/// Read-merge-write attempts before a merge put gives up
const MERGE_ATTEMPTS: u32 = 8;

/// Build the Redis key for a document
pub(crate) fn storage_key(prefix: &str, collection: &str, key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    format!("{}{}:{}", prefix, collection, hex::encode(digest))
}

/// Decode the `rev` and `data` fields of a document hash
pub(crate) fn decode_document(rev: Option<&str>, data: Option<&str>) -> Result<Option<StoredRecord>, InfrastructureError> {
    let (Some(rev), Some(data)) = (rev, data) else {
        return Ok(None);
    };

    let revision = rev
        .parse::<u64>()
        .map_err(|e| InfrastructureError::Serialization(format!("Invalid revision '{}': {}", rev, e)))?;
    let data = serde_json::from_str(data)?;

    Ok(Some(StoredRecord { data, revision }))
}

/// Counter store over Redis hashes
pub struct RedisCounterStore {
    client: RedisClient,
    key_prefix: String,
    cas_script: Script,
    overwrite_script: Script,
}

impl RedisCounterStore {
    /// Wrap an existing client
    pub fn new(client: RedisClient, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
            cas_script: Script::new(COMPARE_AND_SET),
            overwrite_script: Script::new(OVERWRITE),
        }
    }

    /// Connect to the Redis instance described by `config`
    pub async fn connect(config: &CacheConfig) -> Result<Self, InfrastructureError> {
        let client = RedisClient::new(config).await?;
        Ok(Self::new(client, config.key_prefix.clone()))
    }

    /// Underlying client, for health checks
    pub fn client(&self) -> &RedisClient {
        &self.client
    }

    fn key(&self, collection: &str, key: &str) -> String {
        storage_key(&self.key_prefix, collection, key)
    }

    async fn compare_and_set(
        &self,
        redis_key: String,
        data: &Value,
        expected_revision: Option<u64>,
    ) -> Result<Option<u64>, InfrastructureError> {
        let args = [expected_revision.unwrap_or(0).to_string(), serde_json::to_string(data)?];
        let revision: u64 = self.client.run_script(&self.cas_script, &[redis_key], &args).await?;
        Ok((revision > 0).then_some(revision))
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<StoredRecord>, DomainError> {
        let fields = self.client.hash_fields(&self.key(collection, key), &["rev", "data"]).await?;
        let rev = fields.first().and_then(|f| f.as_deref());
        let data = fields.get(1).and_then(|f| f.as_deref());
        Ok(decode_document(rev, data)?)
    }

    async fn put(&self, collection: &str, key: &str, data: Value, merge: bool) -> Result<u64, DomainError> {
        let redis_key = self.key(collection, key);

        if !merge {
            let body = serde_json::to_string(&data)?;
            let revision: u64 = self.client.run_script(&self.overwrite_script, &[redis_key], &[body]).await?;
            return Ok(revision);
        }

        for attempt in 1..=MERGE_ATTEMPTS {
            let current = self.get(collection, key).await?;
            let expected = current.as_ref().map(|record| record.revision);
            let merged = match current {
                Some(record) => merge_documents(record.data, data.clone()),
                None => data.clone(),
            };

            if let Some(revision) = self.compare_and_set(redis_key.clone(), &merged, expected).await? {
                return Ok(revision);
            }
            debug!(collection = collection, attempt = attempt, "Merge write lost a race, retrying");
        }

        warn!(collection = collection, attempts = MERGE_ATTEMPTS, "Merge write kept conflicting");
        Err(DomainError::Storage {
            message: format!("merge write to {} kept conflicting", collection),
        })
    }

    async fn put_if_revision(
        &self,
        collection: &str,
        key: &str,
        data: Value,
        expected_revision: Option<u64>,
    ) -> Result<bool, DomainError> {
        let written = self
            .compare_and_set(self.key(collection, key), &data, expected_revision)
            .await?;
        Ok(written.is_some())
    }

    async fn server_time(&self) -> Result<DateTime<Utc>, DomainError> {
        Ok(self.client.server_time().await?)
    }
}
