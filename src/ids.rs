//! Correlation ID generation (spec.md §6: "8+ hex characters, generated
//! by a cryptographically strong RNG").

use rand::RngCore;

/// Mint a fresh correlation ID: 8 random bytes, hex-encoded (16 chars).
pub fn new_correlation_id() -> String {
    let mut bytes = [0u8; 8];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
