//! Durable storage tiers for the tinyref resolver.
//!
//! Sources of truth for id allocation: [`MySqlStore`] against a MySQL
//! database, and [`MemoryStore`] for tests and single-process use. Both
//! refuse backfill; caches sit in front of them in the backend chain.

pub mod memory;
pub mod mysql;
pub mod retry;

pub use memory::MemoryStore;
pub use mysql::MySqlStore;
pub use retry::RetryPolicy;
