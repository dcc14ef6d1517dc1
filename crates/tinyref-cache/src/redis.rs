use async_trait::async_trait;
use redis::AsyncCommands;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::ops::Range;
use std::time::Duration;
use tinyref_core::backend::Result;
use tinyref_core::{base62, BackendError, GroupKey, MinifiedId, StorageBackend};
use tracing::{debug, trace, warn};
use typed_builder::TypedBuilder;

/// Configuration for a [`RedisStore`].
#[derive(Debug, TypedBuilder)]
pub struct RedisStoreConfig {
    /// Prefix for every key written by this store.
    #[builder(default = "tr:".to_string())]
    pub key_prefix: String,
    /// Per-entry expiry. `None` means entries persist until evicted by
    /// the server's own policy.
    #[builder(default, setter(strip_option))]
    pub ttl: Option<Duration>,
    /// When true this store is a source of truth: asked to create, it
    /// allocates ids from an atomic counter instead of reporting misses.
    /// Leave false when a durable tier sits behind it.
    #[builder(default = false)]
    pub authoritative: bool,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A distributed cache tier backed by Redis.
///
/// String→id entries are keyed by `{prefix}s:{group}:{sha256(string)}`
/// so that arbitrarily long strings produce bounded keys; id→string
/// entries are keyed by `{prefix}i:{id}`. In the authoritative
/// configuration, ids come from `INCRBY` on a single counter key, which
/// allocates a contiguous block per batch.
#[derive(Clone)]
pub struct RedisStore {
    conn: redis::aio::MultiplexedConnection,
    key_prefix: String,
    ttl: Option<Duration>,
    authoritative: bool,
}

/// String→id key: the string is hashed so arbitrarily long inputs
/// produce bounded keys, and the group key scopes uniqueness.
fn string_key(prefix: &str, group: &GroupKey, string: &str) -> String {
    let digest = Sha256::digest(string.as_bytes());
    format!("{prefix}s:{group}:{digest:x}")
}

/// Id→string key: ids are short and globally unique, no hashing needed.
fn id_key(prefix: &str, id: &MinifiedId) -> String {
    format!("{prefix}i:{id}")
}

fn map_redis_error(operation: &str, err: redis::RedisError) -> BackendError {
    let message = format!("{operation}: {err}");
    if err.is_timeout()
        || err.is_io_error()
        || err.is_connection_dropped()
        || err.is_connection_refusal()
    {
        BackendError::Transient(message)
    } else {
        BackendError::Fatal(message)
    }
}

impl RedisStore {
    /// Creates a non-authoritative cache store with default settings.
    pub fn new(conn: redis::aio::MultiplexedConnection) -> Self {
        Self::with_config(conn, RedisStoreConfig::default())
    }

    /// Creates a store with explicit configuration.
    pub fn with_config(conn: redis::aio::MultiplexedConnection, config: RedisStoreConfig) -> Self {
        Self {
            conn,
            key_prefix: config.key_prefix,
            ttl: config.ttl,
            authoritative: config.authoritative,
        }
    }

    fn string_key(&self, group: &GroupKey, string: &str) -> String {
        string_key(&self.key_prefix, group, string)
    }

    fn id_key(&self, id: &MinifiedId) -> String {
        id_key(&self.key_prefix, id)
    }

    fn counter_key(&self) -> String {
        format!("{}next_id", self.key_prefix)
    }

    /// Atomically allocates the next `count` ids from the counter key.
    async fn next_ids(&self, count: u64) -> Result<Range<u64>> {
        let mut conn = self.conn.clone();
        let end: u64 = conn
            .incr(self.counter_key(), count)
            .await
            .map_err(|e| map_redis_error("failed to advance id counter", e))?;
        Ok(end - count..end)
    }

    /// Writes raw key/value pairs, honoring the configured expiry.
    async fn write_entries(&self, entries: &[(String, String)]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        for (key, value) in entries {
            match self.ttl {
                Some(ttl) => {
                    pipe.set_ex(key, value, ttl.as_secs().max(1)).ignore();
                }
                None => {
                    pipe.set(key, value).ignore();
                }
            }
        }

        let mut conn = self.conn.clone();
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(|e| map_redis_error("failed to write cache entries", e))
    }

    async fn mget(&self, keys: &[String], operation: &str) -> Result<Vec<Option<String>>> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("MGET");
        for key in keys {
            cmd.arg(key);
        }
        cmd.query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error(operation, e))
    }
}

#[async_trait]
impl StorageBackend for RedisStore {
    async fn get_ids(
        &self,
        strings: &[String],
        group: &GroupKey,
        create_missing: bool,
    ) -> Result<HashMap<String, Option<MinifiedId>>> {
        if strings.is_empty() {
            return Ok(HashMap::new());
        }

        trace!(count = strings.len(), group = %group, "looking up ids in redis");
        let keys: Vec<String> = strings.iter().map(|s| self.string_key(group, s)).collect();
        let values = self
            .mget(&keys, "failed to fetch ids from redis")
            .await?;

        let mut out = HashMap::with_capacity(strings.len());
        for (s, value) in strings.iter().zip(values) {
            let id = match value {
                Some(text) => Some(MinifiedId::parse(&text).map_err(|e| {
                    warn!(string = %s, error = %e, "corrupt cached id");
                    BackendError::InvalidData(format!("cached id for '{s}' is invalid: {e}"))
                })?),
                None => None,
            };
            out.insert(s.clone(), id);
        }

        // Not authoritative means not a source of truth: misses stay
        // absent regardless of the create flag.
        if !create_missing || !self.authoritative {
            return Ok(out);
        }

        let missing: Vec<String> = out
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(s, _)| s.clone())
            .collect();
        if missing.is_empty() {
            return Ok(out);
        }

        let allocated = self.next_ids(missing.len() as u64).await?;
        debug!(count = missing.len(), "allocated ids from redis counter");

        let mut entries = Vec::with_capacity(missing.len() * 2);
        for (s, n) in missing.iter().zip(allocated) {
            let id = base62::encode_u64(n);
            entries.push((self.string_key(group, s), id.as_str().to_string()));
            entries.push((self.id_key(&id), s.clone()));
            out.insert(s.clone(), Some(id));
        }
        self.write_entries(&entries).await?;

        Ok(out)
    }

    async fn get_strings(
        &self,
        ids: &[MinifiedId],
    ) -> Result<HashMap<MinifiedId, Option<String>>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        trace!(count = ids.len(), "looking up strings in redis");
        let keys: Vec<String> = ids.iter().map(|id| self.id_key(id)).collect();
        let values = self
            .mget(&keys, "failed to fetch strings from redis")
            .await?;

        Ok(ids.iter().cloned().zip(values).collect())
    }

    async fn cache_id_results(
        &self,
        results: &HashMap<String, MinifiedId>,
        group: &GroupKey,
    ) -> Result<()> {
        trace!(count = results.len(), "backfilling redis with resolved ids");
        let mut entries = Vec::with_capacity(results.len() * 2);
        for (s, id) in results {
            entries.push((self.string_key(group, s), id.as_str().to_string()));
            entries.push((self.id_key(id), s.clone()));
        }
        self.write_entries(&entries).await
    }

    async fn cache_string_results(&self, results: &HashMap<MinifiedId, String>) -> Result<()> {
        trace!(count = results.len(), "backfilling redis with resolved strings");
        let entries: Vec<(String, String)> = results
            .iter()
            .map(|(id, s)| (self.id_key(id), s.clone()))
            .collect();
        self.write_entries(&entries).await
    }
}
