//! Merkle root builder over transaction identifiers.
//!
//! Behavior:
//! - An empty leaf set yields `sha256("")`, a deterministic sentinel rather
//!   than an error.
//! - A level with an odd count duplicates its last element before pairing.
//!   This duplication rule is a documented simplification, not a
//!   cryptographic ideal, and must be preserved for root reproducibility.
//! - A single leaf collapses to itself with no combination step.

use super::crypto::sha256_hex;

fn pair_hash(left: &str, right: &str) -> String {
    sha256_hex(format!("{left}{right}"))
}

/// Computes the Merkle root of an ordered sequence of identifiers.
pub fn merkle_root(ids: &[String]) -> String {
    if ids.is_empty() {
        return sha256_hex("");
    }

    let mut level: Vec<String> = ids.to_vec();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            let last = level[level.len() - 1].clone();
            level.push(last);
        }
        level = level
            .chunks(2)
            .map(|pair| pair_hash(&pair[0], &pair[1]))
            .collect();
    }

    level.swap_remove(0)
}
