//! Content hashing for generated responses.
//!
//! The digest is a public lookup key, not a secret: identical responses map
//! to the same key and readers resolve collisions by taking the first row.

use md5::{Digest, Md5};

/// Lowercase hex MD5 of the raw UTF-8 bytes of `text`.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}
