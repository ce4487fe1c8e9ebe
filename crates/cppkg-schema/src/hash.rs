//! Content digests used by the registry protocol.
//!
//! Conan identifies recipe revisions and manifest entries by lowercase hex
//! MD5, so synthesized revisions follow the same shape.

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

/// Lowercase hex MD5 of a byte string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Md5Digest(String);

impl Md5Digest {
    /// Digest `data`.
    pub fn of(data: &[u8]) -> Self {
        Self(hex::encode(Md5::digest(data)))
    }

    /// Return the inner hex string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Md5Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Md5Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Revision id fabricated for a synthesized recipe.
///
/// The id is the digest of the rewritten source descriptor, so identical
/// descriptors always map to the same revision and any byte change yields a
/// new one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipeRevision(Md5Digest);

impl RecipeRevision {
    /// Revision for the given descriptor bytes.
    pub fn from_descriptor(descriptor: &[u8]) -> Self {
        Self(Md5Digest::of(descriptor))
    }

    /// Return the revision as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for RecipeRevision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
