// Blockchain module
//
// This module contains the core ledger implementation including:
// - Transaction structure and signing
// - Account state machine (balances and nonces)
// - Merkle commitment over pending transactions
// - Block structure and proof of work
// - Chain controller with difficulty retargeting
// - JSON persistence of the whole chain

pub mod account;
pub mod block;
pub mod chain;
pub mod crypto;
pub mod merkle;
pub mod storage;
pub mod transaction;

// Re-export main components for easier access
pub use account::{AccountState, ValidationError};
pub use block::Block;
pub use chain::{Blockchain, ChainError, ChainParams};
pub use crypto::KeyPair;
pub use transaction::Transaction;
