use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tinyref_core::backend::Result;
use tinyref_core::{base62, BackendError, GroupKey, MinifiedId, StorageBackend};

/// An authoritative in-process store.
///
/// Fills the source-of-truth role without external infrastructure, for
/// tests and single-process deployments. Ids come from a process-local
/// atomic counter; the winner of a concurrent create for the same string
/// is decided by the map's shard lock, so exactly one record survives.
///
/// Like any source of truth, it refuses backfill.
#[derive(Debug, Default)]
pub struct MemoryStore {
    next_id: AtomicU64,
    by_string: DashMap<(GroupKey, String), u64>,
    by_id: DashMap<u64, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of mapping records currently stored.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[async_trait]
impl StorageBackend for MemoryStore {
    async fn get_ids(
        &self,
        strings: &[String],
        group: &GroupKey,
        create_missing: bool,
    ) -> Result<HashMap<String, Option<MinifiedId>>> {
        let mut out = HashMap::with_capacity(strings.len());
        for s in strings {
            let key = (group.clone(), s.clone());
            let value = if create_missing {
                // The entry guard makes the check-allocate-insert step
                // atomic per key: a losing racer observes the winner's id.
                let n = match self.by_string.entry(key) {
                    Entry::Occupied(occupied) => *occupied.get(),
                    Entry::Vacant(vacant) => {
                        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
                        vacant.insert(n);
                        self.by_id.insert(n, s.clone());
                        n
                    }
                };
                Some(n)
            } else {
                self.by_string.get(&key).map(|n| *n)
            };
            out.insert(s.clone(), value.map(base62::encode_u64));
        }
        Ok(out)
    }

    async fn get_strings(
        &self,
        ids: &[MinifiedId],
    ) -> Result<HashMap<MinifiedId, Option<String>>> {
        let mut out = HashMap::with_capacity(ids.len());
        for id in ids {
            let digits = base62::decode(id.as_str())?.to_u64_digits();
            // Ids beyond u64 cannot have been allocated by this store.
            let value = if digits.len() <= 1 {
                let n = digits.first().copied().unwrap_or(0);
                self.by_id.get(&n).map(|s| s.clone())
            } else {
                None
            };
            out.insert(id.clone(), value);
        }
        Ok(out)
    }

    async fn cache_id_results(
        &self,
        _results: &HashMap<String, MinifiedId>,
        _group: &GroupKey,
    ) -> Result<()> {
        Err(BackendError::Unsupported(
            "memory store is a source of truth, not a cache".to_string(),
        ))
    }

    async fn cache_string_results(&self, _results: &HashMap<MinifiedId, String>) -> Result<()> {
        Err(BackendError::Unsupported(
            "memory store is a source of truth, not a cache".to_string(),
        ))
    }
}
