use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::crypto::sha256_hex;
use super::transaction::Transaction;

/// A block in the chain: header fields plus the transactions it commits.
///
/// Built as a mutable candidate by the chain controller, sealed exactly once
/// by [`Block::mine`], and immutable from then on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain; 0 is the genesis block
    pub height: u64,

    /// UTC creation time of the candidate
    pub timestamp: DateTime<Utc>,

    /// Hash of the previous block; "0" for genesis
    pub prev_hash: String,

    /// Merkle root over the identifiers of `transactions`
    pub merkle_root: String,

    /// Content hash, fixed at seal time
    pub hash: String,

    /// Proof-of-work counter
    pub nonce: u64,

    /// Required count of leading zero hex characters in `hash`
    pub difficulty: u32,

    /// Wall-clock milliseconds spent sealing; informational, feeds retargeting
    pub mine_ms: u64,

    /// The transactions committed by this block
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Creates an unsealed candidate block
    pub fn candidate(
        height: u64,
        prev_hash: String,
        merkle_root: String,
        difficulty: u32,
        transactions: Vec<Transaction>,
    ) -> Self {
        Block {
            height,
            timestamp: Utc::now(),
            prev_hash,
            merkle_root,
            hash: String::new(),
            nonce: 0,
            difficulty,
            mine_ms: 0,
            transactions,
        }
    }

    /// Recomputes the content hash from the header fields.
    ///
    /// Difficulty is part of the header so a retargeted difficulty is
    /// committed by the seal along with everything else.
    pub fn calculate_hash(&self) -> String {
        sha256_hex(format!(
            "{};{};{};{};{};{}",
            self.height,
            self.timestamp.to_rfc3339(),
            self.prev_hash,
            self.merkle_root,
            self.difficulty,
            self.nonce
        ))
    }

    /// Seals the block by proof-of-work.
    ///
    /// Starts from nonce 0 and increments until the hash meets this block's
    /// difficulty. The loop is unbounded: a difficulty chosen too high will
    /// spin indefinitely rather than being silently capped. Records elapsed
    /// wall-clock time in `mine_ms` for the retargeting controller.
    pub fn mine(&mut self) {
        let start = Instant::now();

        self.nonce = 0;
        self.hash = self.calculate_hash();
        while !meets_difficulty(&self.hash, self.difficulty) {
            self.nonce += 1;
            self.hash = self.calculate_hash();
        }

        self.mine_ms = start.elapsed().as_millis() as u64;
    }
}

/// Whether the first `difficulty` hex characters of `hash` are all '0'
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let needed = difficulty as usize;
    hash.len() >= needed && hash.bytes().take(needed).all(|b| b == b'0')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::merkle::merkle_root;

    #[test]
    fn test_mined_block_meets_difficulty_and_recomputes() {
        let mut block = Block::candidate(1, "0".repeat(64), merkle_root(&[]), 2, Vec::new());
        block.mine();

        assert!(block.hash.starts_with("00"));
        assert!(meets_difficulty(&block.hash, block.difficulty));
        assert_eq!(block.calculate_hash(), block.hash);
    }

    #[test]
    fn test_zero_difficulty_seals_immediately() {
        let mut block = Block::candidate(1, "0".repeat(64), merkle_root(&[]), 0, Vec::new());
        block.mine();

        assert_eq!(block.nonce, 0);
        assert_eq!(block.calculate_hash(), block.hash);
    }

    #[test]
    fn test_meets_difficulty_edges() {
        assert!(meets_difficulty("00ab", 2));
        assert!(!meets_difficulty("0ab0", 2));
        assert!(meets_difficulty("anything", 0));
        assert!(!meets_difficulty("00", 3));
    }

    #[test]
    fn test_hash_covers_header_fields() {
        let mut block = Block::candidate(1, "0".repeat(64), merkle_root(&[]), 1, Vec::new());
        block.mine();

        let mut tampered = block.clone();
        tampered.merkle_root = "f".repeat(64);
        assert_ne!(tampered.calculate_hash(), block.hash);
    }
}
