//! Content hashing helpers.

use sha2::{Digest, Sha256};

/// Hex-encodes a byte slice.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Computes the hex-encoded SHA-256 of `data` in one shot.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex_encode(&hasher.finalize())
}
