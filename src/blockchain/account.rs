use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::crypto::{address_from_public_key, verify};
use super::transaction::Transaction;

/// Reasons a transaction is rejected by the state machine.
///
/// All of these are recoverable: the state is never left partially mutated
/// and the caller simply learns why the transaction (or the mining attempt
/// carrying it) was refused.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("coinbase must be applied through the coinbase path")]
    CoinbaseMisuse,

    #[error("invalid signature")]
    BadSignature,

    #[error("bad nonce: expected {expected}, got {got}")]
    BadNonce { expected: u64, got: u64 },

    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u64, available: i64 },
}

/// Balances and per-sender nonces for every known address.
///
/// Owned exclusively by the chain controller. Cloning the whole state is the
/// intended way to dry-run a batch of transactions: apply to the clone, and
/// either adopt it or drop it. Balances are signed to keep the debit math
/// simple, but no committed state ever leaves an address negative.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountState {
    balances: HashMap<String, i64>,
    nonces: HashMap<String, u64>,
}

impl AccountState {
    /// Creates an empty account state
    pub fn new() -> Self {
        AccountState::default()
    }

    /// Balance of `address`, zero for addresses never seen
    pub fn balance(&self, address: &str) -> i64 {
        self.balances.get(address).copied().unwrap_or(0)
    }

    /// Last accepted nonce for `address`, zero when it has not sent yet
    pub fn last_nonce(&self, address: &str) -> u64 {
        self.nonces.get(address).copied().unwrap_or(0)
    }

    /// All addresses with a recorded balance, for display
    pub fn balances(&self) -> impl Iterator<Item = (&str, i64)> {
        self.balances.iter().map(|(a, b)| (a.as_str(), *b))
    }

    /// Verifies and applies one transaction.
    ///
    /// Checks run in a fixed order: coinbase misuse, signature, nonce
    /// (strictly last + 1, so replays and gaps are both rejected), then
    /// funds. Every check happens before any mutation, making the call
    /// all-or-nothing.
    pub fn apply_transaction(&mut self, tx: &Transaction) -> Result<(), ValidationError> {
        if tx.is_coinbase() {
            return Err(ValidationError::CoinbaseMisuse);
        }

        let valid = verify(&tx.sender_pubkey, &tx.signing_message(), &tx.signature)
            .unwrap_or(false);
        if !valid {
            return Err(ValidationError::BadSignature);
        }

        let sender = address_from_public_key(&tx.sender_pubkey);

        let expected = self.last_nonce(&sender) + 1;
        if tx.nonce != expected {
            return Err(ValidationError::BadNonce {
                expected,
                got: tx.nonce,
            });
        }

        let available = self.balance(&sender);
        if available < tx.amount as i64 {
            return Err(ValidationError::InsufficientFunds {
                required: tx.amount,
                available,
            });
        }

        *self.balances.entry(sender.clone()).or_insert(0) -= tx.amount as i64;
        *self.balances.entry(tx.recipient.clone()).or_insert(0) += tx.amount as i64;
        self.nonces.insert(sender, tx.nonce);

        Ok(())
    }

    /// Credits the fixed block reward to `address`.
    ///
    /// This is the only way new supply enters the system. It cannot fail and
    /// never touches any nonce.
    pub fn apply_coinbase(&mut self, address: &str, reward: u64) {
        *self.balances.entry(address.to_string()).or_insert(0) += reward as i64;
    }
}
