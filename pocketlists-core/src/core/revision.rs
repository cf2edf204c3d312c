//! Opaque revision tokens for stored documents.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one version of a document.
///
/// Tokens have the form `{generation}-{digest}`. The generation grows by one on
/// every successful write; the digest covers the previous token, the written
/// fields and the tombstone flag. Callers must treat the value as opaque and hand
/// it back unchanged on the next write to the same document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    /// Computes the token that follows `previous` for a write of `body`.
    pub(crate) fn next(previous: Option<&Revision>, body: &str, deleted: bool) -> Self {
        let generation = previous.map(Revision::generation).unwrap_or(0) + 1;
        let mut hasher = blake3::Hasher::new();
        if let Some(prev) = previous {
            hasher.update(prev.0.as_bytes());
        }
        hasher.update(body.as_bytes());
        hasher.update(&[u8::from(deleted)]);
        let digest = hasher.finalize().to_hex();
        Self(format!("{generation}-{}", &digest.as_str()[..32]))
    }

    /// Number of writes that produced this revision.
    pub fn generation(&self) -> u64 {
        self.0
            .split_once('-')
            .and_then(|(generation, _)| generation.parse().ok())
            .unwrap_or(0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Revision {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Revision {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
