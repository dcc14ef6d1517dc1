use crate::error::BackendError;
use crate::id::{GroupKey, MinifiedId};
use async_trait::async_trait;
use std::collections::HashMap;

/// Result type for backend operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// The contract every storage tier satisfies.
///
/// Tiers fall into two roles:
///
/// - **Sources of truth** allocate ids when asked to create and refuse
///   backfill ([`BackendError::Unsupported`]).
/// - **Caches** never allocate (they report misses as absent regardless
///   of `create_missing`) and accept backfill of already-resolved pairs.
///
/// Batch operations are primary; the single-item helpers are defined over
/// them. Batch results must contain an entry for every requested key, with
/// misses mapped to `None` rather than omitted or raised; only systemic
/// failures (connectivity, unsupported operations) surface as errors.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Resolves each string to its minified id under `group`.
    ///
    /// When `create_missing` is true and this tier is a source of truth,
    /// unmapped strings are assigned freshly allocated ids and persisted
    /// before returning.
    async fn get_ids(
        &self,
        strings: &[String],
        group: &GroupKey,
        create_missing: bool,
    ) -> Result<HashMap<String, Option<MinifiedId>>>;

    /// Resolves each minified id back to its original string.
    ///
    /// Ids are globally unique, so this direction takes no group key.
    async fn get_strings(&self, ids: &[MinifiedId])
        -> Result<HashMap<MinifiedId, Option<String>>>;

    /// Opportunistically stores already-resolved string→id pairs.
    ///
    /// Used by the resolver to backfill faster tiers after a deeper tier
    /// produced the results. Cache-capable tiers store both directions;
    /// sources of truth refuse with [`BackendError::Unsupported`].
    async fn cache_id_results(
        &self,
        results: &HashMap<String, MinifiedId>,
        group: &GroupKey,
    ) -> Result<()>;

    /// Symmetric backfill for id→string results.
    ///
    /// The group key of the original lookup is unknown here, so only the
    /// id→string direction can be populated.
    async fn cache_string_results(&self, results: &HashMap<MinifiedId, String>) -> Result<()>;

    /// Single-item form of [`get_ids`](StorageBackend::get_ids).
    async fn get_id(
        &self,
        string: &str,
        group: &GroupKey,
        create_missing: bool,
    ) -> Result<Option<MinifiedId>> {
        let mut result = self
            .get_ids(&[string.to_owned()], group, create_missing)
            .await?;
        Ok(result.remove(string).flatten())
    }

    /// Single-item form of [`get_strings`](StorageBackend::get_strings).
    async fn get_string(&self, id: &MinifiedId) -> Result<Option<String>> {
        let mut result = self.get_strings(std::slice::from_ref(id)).await?;
        Ok(result.remove(id).flatten())
    }
}
