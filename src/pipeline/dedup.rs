use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Tracks review texts already seen, keyed by a content hash
///
/// Texts are compared case-insensitively with whitespace collapsed, so trivial
/// reformatting of the same review still counts as a duplicate.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<[u8; 32]>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `text` and reports whether it was new
    pub fn insert(&mut self, text: &str) -> bool {
        self.seen.insert(content_key(text))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// SHA-256 of the normalized text
pub fn content_key(text: &str) -> [u8; 32] {
    let normalized = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    let mut key = [0u8; 32];
    key.copy_from_slice(&hasher.finalize());
    key
}
