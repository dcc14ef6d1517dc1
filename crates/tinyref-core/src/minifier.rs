use crate::backend;
use crate::backend::StorageBackend;
use crate::error::{MinifierError, Result};
use crate::id::{GroupKey, MinifiedId};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, trace};

type ChainFuture<'a, K, V> =
    Pin<Box<dyn Future<Output = backend::Result<HashMap<K, Option<V>>>> + Send + 'a>>;

/// The tiered resolver over an ordered chain of storage backends.
///
/// Tier 0 is the fastest/cheapest backend, the last tier the most
/// durable and the only one permitted to allocate ids. Lookups cascade
/// down the chain; anything a deeper tier resolves is backfilled into
/// the tiers above it so later reads stay warm.
///
/// The chain is fixed at construction and never mutated. The resolver is
/// safe to share across concurrent callers; no lock serializes
/// resolution.
#[derive(Clone)]
pub struct Minifier {
    backends: Vec<Arc<dyn StorageBackend>>,
}

impl Minifier {
    /// Creates a resolver over the given backend chain, fastest first.
    ///
    /// The chain must not be empty; resolution against an empty chain
    /// reports every key as absent.
    pub fn new(backends: Vec<Arc<dyn StorageBackend>>) -> Self {
        debug_assert!(!backends.is_empty(), "backend chain must not be empty");
        Self { backends }
    }

    /// Resolves a batch of strings to their minified ids under `group`.
    ///
    /// Duplicates within the batch are collapsed before any tier is
    /// queried, so one logical request never allocates twice. Misses are
    /// reported as `None`; an empty input short-circuits without touching
    /// any tier.
    pub async fn resolve_ids(
        &self,
        strings: &[String],
        group: &GroupKey,
        create_missing: bool,
    ) -> Result<HashMap<String, Option<MinifiedId>>> {
        if strings.is_empty() {
            return Ok(HashMap::new());
        }

        let mut seen = HashSet::new();
        let unique: Vec<String> = strings
            .iter()
            .filter(|s| seen.insert(s.as_str()))
            .cloned()
            .collect();

        trace!(count = unique.len(), group = %group, "resolving strings to ids");
        let resolved = self
            .resolve_ids_chain(&self.backends, unique, group, create_missing)
            .await?;
        Ok(resolved)
    }

    /// Resolves a batch of minified ids back to their original strings.
    ///
    /// Structurally identical to [`resolve_ids`](Minifier::resolve_ids),
    /// substituting the reverse-direction backfill.
    pub async fn resolve_strings(
        &self,
        ids: &[MinifiedId],
    ) -> Result<HashMap<MinifiedId, Option<String>>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut seen = HashSet::new();
        let unique: Vec<MinifiedId> = ids.iter().filter(|id| seen.insert(*id)).cloned().collect();

        trace!(count = unique.len(), "resolving ids to strings");
        let resolved = self.resolve_strings_chain(&self.backends, unique).await?;
        Ok(resolved)
    }

    /// Resolves a single string, optionally creating its mapping.
    pub async fn get_id(
        &self,
        string: &str,
        group: &GroupKey,
        create_missing: bool,
    ) -> Result<Option<MinifiedId>> {
        let mut resolved = self
            .resolve_ids(&[string.to_owned()], group, create_missing)
            .await?;
        Ok(resolved.remove(string).flatten())
    }

    /// Resolves a single minified id to its original string.
    ///
    /// Unlike the batch form, a miss here is an error: the caller asked
    /// for one specific mapping and it does not exist.
    pub async fn get_string(&self, id: &MinifiedId) -> Result<String> {
        let mut resolved = self.resolve_strings(std::slice::from_ref(id)).await?;
        resolved
            .remove(id)
            .flatten()
            .ok_or_else(|| MinifierError::NotFound(id.clone()))
    }

    /// Recursive descent over the backend chain for the string→id
    /// direction.
    ///
    /// Creation is only permitted at the last tier of the chain; every
    /// tier above it is a cache. After the deeper tiers resolve the
    /// misses, this tier is backfilled with exactly those newly resolved
    /// pairs.
    fn resolve_ids_chain<'a>(
        &'a self,
        tiers: &'a [Arc<dyn StorageBackend>],
        strings: Vec<String>,
        group: &'a GroupKey,
        create_missing: bool,
    ) -> ChainFuture<'a, String, MinifiedId> {
        Box::pin(async move {
            let Some((tier, deeper)) = tiers.split_first() else {
                return Ok(strings.into_iter().map(|s| (s, None)).collect());
            };

            let create_here = create_missing && deeper.is_empty();
            let mut resolved = tier.get_ids(&strings, group, create_here).await?;

            let unresolved: Vec<String> = strings
                .iter()
                .filter(|s| !matches!(resolved.get(*s), Some(Some(_))))
                .cloned()
                .collect();

            if !unresolved.is_empty() && !deeper.is_empty() {
                trace!(
                    misses = unresolved.len(),
                    remaining_tiers = deeper.len(),
                    "tier miss, descending"
                );
                let from_deeper = self
                    .resolve_ids_chain(deeper, unresolved, group, create_missing)
                    .await?;

                let newly: HashMap<String, MinifiedId> = from_deeper
                    .iter()
                    .filter_map(|(s, id)| id.clone().map(|id| (s.clone(), id)))
                    .collect();
                if !newly.is_empty() {
                    debug!(count = newly.len(), "backfilling tier with resolved ids");
                    tier.cache_id_results(&newly, group).await?;
                }

                resolved.extend(from_deeper);
            }

            Ok(resolved)
        })
    }

    /// Recursive descent for the id→string direction.
    fn resolve_strings_chain<'a>(
        &'a self,
        tiers: &'a [Arc<dyn StorageBackend>],
        ids: Vec<MinifiedId>,
    ) -> ChainFuture<'a, MinifiedId, String> {
        Box::pin(async move {
            let Some((tier, deeper)) = tiers.split_first() else {
                return Ok(ids.into_iter().map(|id| (id, None)).collect());
            };

            let mut resolved = tier.get_strings(&ids).await?;

            let unresolved: Vec<MinifiedId> = ids
                .iter()
                .filter(|id| !matches!(resolved.get(*id), Some(Some(_))))
                .cloned()
                .collect();

            if !unresolved.is_empty() && !deeper.is_empty() {
                trace!(
                    misses = unresolved.len(),
                    remaining_tiers = deeper.len(),
                    "tier miss, descending"
                );
                let from_deeper = self.resolve_strings_chain(deeper, unresolved).await?;

                let newly: HashMap<MinifiedId, String> = from_deeper
                    .iter()
                    .filter_map(|(id, s)| s.clone().map(|s| (id.clone(), s)))
                    .collect();
                if !newly.is_empty() {
                    debug!(count = newly.len(), "backfilling tier with resolved strings");
                    tier.cache_string_results(&newly).await?;
                }

                resolved.extend(from_deeper);
            }

            Ok(resolved)
        })
    }
}

impl std::fmt::Debug for Minifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Minifier")
            .field("tiers", &self.backends.len())
            .finish()
    }
}
