//! Content fingerprints for cache-busting filenames.
//!
//! A fingerprint is a prefix of the SHA-256 hex digest of a file's bytes.
//! Content-based rather than mtime-based, so it survives `git checkout`
//! (which resets modification times) and two builds of the same tree always
//! agree on names.

use sha2::{Digest, Sha256};

/// Full SHA-256 hex digest of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// The first `length` hex digits of the content hash.
///
/// `length` is clamped to the digest size (64).
pub fn fingerprint(bytes: &[u8], length: usize) -> String {
    let mut hash = content_hash(bytes);
    hash.truncate(length);
    hash
}
