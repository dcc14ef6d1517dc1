//! Core types and traits for the tinyref string minifier.
//!
//! This crate provides the base62 codec, the storage backend contract,
//! and the tiered resolver shared by all backend implementations.

pub mod backend;
pub mod base62;
pub mod error;
pub mod id;
pub mod minifier;

pub use backend::StorageBackend;
pub use error::{BackendError, CodecError, MinifierError};
pub use id::{GroupKey, MinifiedId};
pub use minifier::Minifier;
