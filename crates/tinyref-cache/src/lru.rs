use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use tinyref_core::backend::Result;
use tinyref_core::{BackendError, GroupKey, MinifiedId, StorageBackend};
use tracing::trace;

/// Keys for the shared LRU, covering both lookup directions.
#[derive(Clone, PartialEq, Eq, Hash)]
enum CacheKey {
    ByString(GroupKey, String),
    ById(MinifiedId),
}

#[derive(Clone)]
enum CacheValue {
    Id(MinifiedId),
    String(String),
}

/// A fixed-capacity in-process cache tier with least-recently-used
/// eviction.
///
/// Never authoritative: asked to create, it refuses with
/// [`BackendError::Unsupported`]. Lookups are pure hits or misses with no
/// backing I/O. Both directions share one capacity budget, so a heavily
/// one-sided workload can evict the other direction's entries.
///
/// Eviction bookkeeping is the only shared mutable state; it is guarded
/// by a single mutex that is never held across an await point.
pub struct LruStore {
    entries: Mutex<LruCache<CacheKey, CacheValue>>,
}

impl LruStore {
    /// Creates a store holding at most `capacity` entries.
    ///
    /// A zero capacity is clamped to one entry.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }
}

#[async_trait]
impl StorageBackend for LruStore {
    async fn get_ids(
        &self,
        strings: &[String],
        group: &GroupKey,
        create_missing: bool,
    ) -> Result<HashMap<String, Option<MinifiedId>>> {
        if create_missing {
            return Err(BackendError::Unsupported(
                "lru cache cannot allocate ids".to_string(),
            ));
        }

        trace!(count = strings.len(), "looking up ids in lru cache");
        let mut entries = self.entries.lock();
        Ok(strings
            .iter()
            .map(|s| {
                let key = CacheKey::ByString(group.clone(), s.clone());
                let hit = match entries.get(&key) {
                    Some(CacheValue::Id(id)) => Some(id.clone()),
                    _ => None,
                };
                (s.clone(), hit)
            })
            .collect())
    }

    async fn get_strings(
        &self,
        ids: &[MinifiedId],
    ) -> Result<HashMap<MinifiedId, Option<String>>> {
        trace!(count = ids.len(), "looking up strings in lru cache");
        let mut entries = self.entries.lock();
        Ok(ids
            .iter()
            .map(|id| {
                let hit = match entries.get(&CacheKey::ById(id.clone())) {
                    Some(CacheValue::String(s)) => Some(s.clone()),
                    _ => None,
                };
                (id.clone(), hit)
            })
            .collect())
    }

    async fn cache_id_results(
        &self,
        results: &HashMap<String, MinifiedId>,
        group: &GroupKey,
    ) -> Result<()> {
        let mut entries = self.entries.lock();
        for (s, id) in results {
            entries.put(
                CacheKey::ByString(group.clone(), s.clone()),
                CacheValue::Id(id.clone()),
            );
            entries.put(CacheKey::ById(id.clone()), CacheValue::String(s.clone()));
        }
        Ok(())
    }

    async fn cache_string_results(&self, results: &HashMap<MinifiedId, String>) -> Result<()> {
        let mut entries = self.entries.lock();
        for (id, s) in results {
            entries.put(CacheKey::ById(id.clone()), CacheValue::String(s.clone()));
        }
        Ok(())
    }
}
