use crate::id::MinifiedId;
use thiserror::Error;

/// Result type for resolver operations.
pub type Result<T> = std::result::Result<T, MinifierError>;

/// Errors produced by the base62 codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("cannot encode a negative integer: {0}")]
    NegativeInput(i64),
    #[error("minified id contains a character outside the alphabet: {0:?}")]
    InvalidCharacter(char),
    #[error("minified id is empty")]
    Empty,
}

/// Errors produced by a storage backend.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The backend was asked to perform an operation outside its role,
    /// e.g. a pure cache asked to allocate ids, or a source of truth
    /// asked to accept backfill.
    #[error("operation not supported by this backend: {0}")]
    Unsupported(String),
    /// A recoverable connectivity failure. Durable tiers absorb these
    /// with their retry wrapper; cache tiers surface them directly.
    #[error("transient backend failure: {0}")]
    Transient(String),
    /// The retry budget was exhausted without a successful attempt.
    #[error("retry budget exhausted after {attempts} attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },
    /// A non-recoverable backend failure.
    #[error("backend failure: {0}")]
    Fatal(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Errors surfaced by the [`Minifier`](crate::Minifier) resolver.
#[derive(Debug, Clone, Error)]
pub enum MinifierError {
    /// A single-item id lookup found no mapping. Batch lookups never
    /// raise this; they report misses as absent entries instead.
    #[error("no mapping exists for minified id '{0}'")]
    NotFound(MinifiedId),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}
