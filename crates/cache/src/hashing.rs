//! Key identity
//!
//! Keys are mapped to a fixed-length content identifier before they reach a
//! durable store. The identifier doubles as the blob filename, so it must be
//! filesystem-safe and at least two characters long (the shard prefix).

use sha2::{Digest, Sha256};

/// Length of an identifier in hex characters
pub const ID_LEN: usize = 64;

/// Deterministic identifier of a cache key, rendered as lowercase hex
pub fn id(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Identifier of a key assembled from several parts joined by `_`
///
/// Handy for keys derived from request components, e.g.
/// `id_of(&[scheme, host, path])`.
pub fn id_of(parts: &[&str]) -> String {
    id(&parts.join("_"))
}

/// True if `candidate` has the shape of an identifier produced by [`id`]
pub fn is_id(candidate: &str) -> bool {
    candidate.len() == ID_LEN
        && candidate
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
