//! Content keys for environment prefixes.

use std::fmt;

use sha2::{Digest, Sha256};

/// Marker separating the environment prefix (preamble) from the body.
pub const BODY_MARKER: &str = r"\begin{document}";

/// Hex characters kept from the SHA-256 digest.
///
/// Collisions within this length make two preambles share one cache entry;
/// that is an accepted risk for a cache, not a security boundary.
pub const KEY_LEN: usize = 16;

/// Truncated content hash of an environment prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnvironmentKey(String);

impl EnvironmentKey {
    /// Hash the exact bytes of `prefix`.
    pub fn of(prefix: &str) -> Self {
        let digest = Sha256::digest(prefix.as_bytes());
        let mut hex = hex::encode(digest);
        hex.truncate(KEY_LEN);
        Self(hex)
    }

    /// The key as lowercase hex.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EnvironmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Split a document at the first [`BODY_MARKER`] into `(prefix, body)`.
///
/// The body keeps the marker. Returns `None` when the marker is absent.
pub fn split_preamble(source: &str) -> Option<(&str, &str)> {
    source.find(BODY_MARKER).map(|idx| source.split_at(idx))
}
