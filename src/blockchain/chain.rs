use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::account::{AccountState, ValidationError};
use super::block::{meets_difficulty, Block};
use super::merkle::merkle_root;
use super::transaction::Transaction;

/// Errors that can occur during chain operations
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("coinbase transactions cannot be submitted to the pool")]
    CoinbaseSubmission,

    #[error("rejected transaction: {0}")]
    Validation(#[from] ValidationError),

    #[error("block does not link to the current tip")]
    BrokenLink,

    #[error("block hash does not match its contents")]
    HashMismatch,

    #[error("block hash does not meet its declared difficulty")]
    DifficultyNotMet,

    #[error("block merkle root does not match its transactions")]
    MerkleMismatch,
}

/// Consensus parameters fixed at chain creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainParams {
    /// Difficulty the chain starts at
    pub initial_difficulty: u32,

    /// Desired average seconds between blocks
    pub target_block_time_secs: u64,

    /// Number of blocks between difficulty re-evaluations
    pub retarget_interval: usize,

    /// Coinbase reward credited to the miner of each block
    pub mining_reward: u64,
}

impl Default for ChainParams {
    fn default() -> Self {
        ChainParams {
            initial_difficulty: 2,
            target_block_time_secs: 10,
            retarget_interval: 5,
            mining_reward: 50,
        }
    }
}

/// The chain controller: the single owner of all mutable ledger state.
///
/// Holds the committed block list, the pending pool, the current difficulty
/// and the live account state. Every mutation funnels through its methods so
/// the ledger invariants (nonce monotonicity, no negative balances, hash
/// links) are enforced at one choke point. The struct itself is
/// single-threaded; callers that need concurrent access wrap it in a mutex
/// and serialize on it.
#[derive(Debug, Clone)]
pub struct Blockchain {
    params: ChainParams,
    difficulty: u32,
    chain: Vec<Block>,
    pending: Vec<Transaction>,
    state: AccountState,
}

impl Blockchain {
    /// Creates a new chain holding only the genesis block
    pub fn new(params: ChainParams) -> Self {
        let difficulty = params.initial_difficulty;
        Blockchain {
            params,
            difficulty,
            chain: vec![Self::genesis()],
            pending: Vec::new(),
            state: AccountState::new(),
        }
    }

    /// Reassembles a chain from persisted parts; used by the storage layer
    pub fn from_parts(
        params: ChainParams,
        difficulty: u32,
        chain: Vec<Block>,
        state: AccountState,
    ) -> Self {
        let chain = if chain.is_empty() {
            vec![Self::genesis()]
        } else {
            chain
        };

        Blockchain {
            params,
            difficulty,
            chain,
            pending: Vec::new(),
            state,
        }
    }

    fn genesis() -> Block {
        let mut genesis = Block::candidate(0, "0".to_string(), merkle_root(&[]), 0, Vec::new());
        genesis.hash = genesis.calculate_hash();
        genesis
    }

    /// The most recently committed block
    pub fn tip(&self) -> &Block {
        &self.chain[self.chain.len() - 1]
    }

    /// The full committed block list
    pub fn blocks(&self) -> &[Block] {
        &self.chain
    }

    /// Transactions submitted but not yet committed
    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    /// The live account state
    pub fn state(&self) -> &AccountState {
        &self.state
    }

    /// The difficulty the next block will be mined at
    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// The parameters this chain was created with
    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    /// Adds a transaction to the pending pool.
    ///
    /// No validation happens here beyond refusing coinbase; the pool may
    /// accumulate transactions that a later mining attempt rejects en masse.
    /// Returns the height of the block that would include the transaction.
    pub fn submit(&mut self, tx: Transaction) -> Result<u64, ChainError> {
        if tx.is_coinbase() {
            return Err(ChainError::CoinbaseSubmission);
        }

        self.pending.push(tx);
        Ok(self.chain.len() as u64)
    }

    /// Mines the pending pool into a new block credited to `miner`.
    ///
    /// The whole pool is first applied to a disposable copy of the account
    /// state; the first failure aborts the attempt, leaving the pool and the
    /// live state untouched. On success the candidate is sealed by
    /// proof-of-work, the validated state (plus the coinbase reward) becomes
    /// the live state, the block is appended, the pool is cleared and the
    /// difficulty is re-evaluated.
    pub fn mine_pending(&mut self, miner: &str) -> Result<&Block, ChainError> {
        let mut preview = self.state.clone();
        for tx in &self.pending {
            preview.apply_transaction(tx)?;
        }

        let ids: Vec<String> = self.pending.iter().map(Transaction::id).collect();
        let mut block = Block::candidate(
            self.chain.len() as u64,
            self.tip().hash.clone(),
            merkle_root(&ids),
            self.difficulty,
            self.pending.clone(),
        );
        block.mine();

        preview.apply_coinbase(miner, self.params.mining_reward);
        self.state = preview;

        info!(
            "committed block #{} ({} txs, {} ms, difficulty {})",
            block.height,
            block.transactions.len(),
            block.mine_ms,
            block.difficulty
        );

        self.chain.push(block);
        self.pending.clear();
        self.retarget_if_needed();

        Ok(self.tip())
    }

    /// Structurally validates every adjacent block pair.
    ///
    /// Checks the hash link, the recomputed content hash, the difficulty
    /// prefix and the recomputed Merkle root. Deliberately does not
    /// re-verify signatures or replay the state machine: a chain can pass
    /// this check while containing a tampered transaction if the tamperer
    /// also re-sealed the block.
    pub fn validate(&self) -> bool {
        for pair in self.chain.windows(2) {
            if check_link(&pair[0], &pair[1]).is_err() {
                return false;
            }
        }
        true
    }

    /// Accepts a block heard from a peer.
    ///
    /// The block must pass the same structural checks as [`Blockchain::validate`]
    /// against the current tip; acceptance is a single atomic append. There
    /// is no buffering of out-of-order blocks and no fork resolution: of two
    /// conflicting blocks, whichever arrives first extends the tip and the
    /// other is refused. The pending pool and the account state are left
    /// untouched.
    pub fn accept_external_block(&mut self, block: Block) -> Result<(), ChainError> {
        check_link(self.tip(), &block)?;

        info!(
            "accepted peer block #{} with {} transactions",
            block.height,
            block.transactions.len()
        );
        self.chain.push(block);

        Ok(())
    }

    /// Re-evaluates the difficulty at every retarget-interval boundary.
    fn retarget_if_needed(&mut self) {
        let interval = self.params.retarget_interval;
        let mined = self.chain.len() - 1;
        if interval == 0 || mined == 0 || mined % interval != 0 {
            return;
        }

        let window = &self.chain[self.chain.len() - interval..];
        let recent_ms: Vec<u64> = window.iter().map(|b| b.mine_ms).collect();

        let next = retarget(self.difficulty, &recent_ms, &self.params);
        if next != self.difficulty {
            info!("difficulty retargeted: {} -> {}", self.difficulty, next);
            self.difficulty = next;
        } else {
            debug!("difficulty unchanged at {}", self.difficulty);
        }
    }
}

/// Structural check for the `prev -> block` link
fn check_link(prev: &Block, block: &Block) -> Result<(), ChainError> {
    if block.prev_hash != prev.hash {
        return Err(ChainError::BrokenLink);
    }
    if block.calculate_hash() != block.hash {
        return Err(ChainError::HashMismatch);
    }
    if !meets_difficulty(&block.hash, block.difficulty) {
        return Err(ChainError::DifficultyNotMet);
    }

    let ids: Vec<String> = block.transactions.iter().map(Transaction::id).collect();
    if merkle_root(&ids) != block.merkle_root {
        return Err(ChainError::MerkleMismatch);
    }

    Ok(())
}

/// Computes the next difficulty from the recent mining times.
///
/// A plain proportional, unit-step controller: below 80% of the target
/// block time the difficulty rises by one, above 120% it falls by one
/// (never below zero), otherwise it stays put.
fn retarget(current: u32, recent_ms: &[u64], params: &ChainParams) -> u32 {
    if recent_ms.is_empty() {
        return current;
    }

    let avg_secs =
        recent_ms.iter().sum::<u64>() as f64 / recent_ms.len() as f64 / 1000.0;
    let target = params.target_block_time_secs as f64;

    if avg_secs < target * 0.8 {
        current + 1
    } else if avg_secs > target * 1.2 && current > 0 {
        current - 1
    } else {
        current
    }
}
