use crate::base62;
use crate::error::CodecError;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt::Display;

/// A minified identifier encoded as a base62 string.
///
/// This is the canonical external representation of an allocated integer
/// id. A `MinifiedId` constructed through [`parse`](MinifiedId::parse) or
/// produced by the codec is guaranteed to contain only alphabet symbols.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct MinifiedId(SmolStr);

impl MinifiedId {
    /// Parses a `MinifiedId` from text, validating it against the codec
    /// alphabet. Rejects the empty string and any foreign character.
    pub fn parse(text: impl AsRef<str>) -> Result<Self, CodecError> {
        let text = text.as_ref();
        if text.is_empty() {
            return Err(CodecError::Empty);
        }
        if let Some(c) = text.chars().find(|&c| !base62::in_alphabet(c)) {
            return Err(CodecError::InvalidCharacter(c));
        }
        Ok(Self(SmolStr::new(text)))
    }

    /// Creates a `MinifiedId` without validation.
    ///
    /// Use this only for text produced by trusted internal sources
    /// (the codec itself, or a store that only ever holds codec output).
    pub fn new_unchecked(text: impl Into<SmolStr>) -> Self {
        Self(text.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for MinifiedId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("MinifiedId").field(&self.0).finish()
    }
}

impl Display for MinifiedId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for MinifiedId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MinifiedId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = SmolStr::deserialize(deserializer)?;
        MinifiedId::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A partition key scoping string→id uniqueness.
///
/// The same string minified under two different group keys is two
/// distinct entities with two distinct ids. Reverse (id→string) lookups
/// are unscoped, since ids are globally unique by construction.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupKey(SmolStr);

impl GroupKey {
    pub fn new(key: impl Into<SmolStr>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("GroupKey").field(&self.0).finish()
    }
}

impl Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_codec_output() {
        assert!(MinifiedId::parse("0U").is_ok());
        assert!(MinifiedId::parse("Fq").is_ok());
        assert!(MinifiedId::parse("YJb9aEh6bZubT").is_ok());
    }

    #[test]
    fn parse_rejects_empty() {
        assert_eq!(MinifiedId::parse(""), Err(CodecError::Empty));
    }

    #[test]
    fn parse_rejects_foreign_characters() {
        assert_eq!(
            MinifiedId::parse("ab!cd"),
            Err(CodecError::InvalidCharacter('!'))
        );
        // '-' is valid in many encodings but not in this alphabet
        assert_eq!(
            MinifiedId::parse("a-b"),
            Err(CodecError::InvalidCharacter('-'))
        );
    }

    #[test]
    fn display_round_trips() {
        let id = MinifiedId::parse("0U").unwrap();
        assert_eq!(id.to_string(), "0U");
        assert_eq!(id.as_str(), "0U");
    }

    #[test]
    fn group_keys_compare_by_value() {
        assert_eq!(GroupKey::from("test"), GroupKey::new("test"));
        assert_ne!(GroupKey::from("test"), GroupKey::from("other"));
    }
}
