// Copyright (c) 2024 Botho Foundation

//! Merkle root over a block's transaction ids.
//!
//! Pairs are hashed as the hex SHA-256 of the concatenated hex strings. A
//! level with an odd number of elements drops its last element instead of
//! duplicating it, so `[a, b, c]` aggregates to `H(a ‖ b)`. Existing block
//! roots depend on this, keep it.

use sha2::{Digest, Sha256};

/// Hex SHA-256 of `data`.
pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(data.as_ref()))
}

/// Compute the Merkle root of `ids`.
///
/// Returns an empty string for no ids and the id itself for a single id.
pub fn calculate_merkle_root(ids: &[String]) -> String {
    let mut level: Vec<String> = ids.to_vec();

    while level.len() > 1 {
        level = level
            .chunks_exact(2)
            .map(|pair| {
                let mut hasher = Sha256::new();
                hasher.update(pair[0].as_bytes());
                hasher.update(pair[1].as_bytes());
                hex::encode(hasher.finalize())
            })
            .collect();
    }

    level.pop().unwrap_or_default()
}
