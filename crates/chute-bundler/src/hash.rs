//! BLAKE3 content hashes used in asset names.

use blake3::Hasher;

/// Hex digits used when a template does not give a length.
pub const DEFAULT_HASH_LENGTH: usize = 20;

/// Full hex digest of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Digest over several parts. Each part is length-prefixed so that
/// `["ab", "c"]` and `["a", "bc"]` differ.
pub fn combined_hash<'a>(parts: impl IntoIterator<Item = &'a [u8]>) -> String {
    let mut hasher = Hasher::new();
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    hasher.finalize().to_hex().to_string()
}

/// First `len` hex digits of `hex` (all of it when shorter).
pub fn truncate(hex: &str, len: usize) -> &str {
    &hex[..len.min(hex.len())]
}
