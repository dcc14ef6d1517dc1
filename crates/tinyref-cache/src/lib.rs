//! Cache-capable storage tiers for the tinyref resolver.
//!
//! Both tiers here implement the [`StorageBackend`](tinyref_core::StorageBackend)
//! contract as caches: they never allocate ids on their own (unless the
//! Redis tier is explicitly configured as a source of truth) and they
//! accept backfill of already-resolved pairs.

pub mod lru;
pub mod redis;

pub use lru::LruStore;
pub use redis::{RedisStore, RedisStoreConfig};
