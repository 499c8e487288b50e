use serde::{Deserialize, Serialize};

use super::crypto::{sha256_hex, KeyPair};

/// A signed transfer instruction between two accounts.
///
/// An empty `sender_pubkey` marks a coinbase transaction. Coinbase
/// transactions are minted by the ledger when a block is committed and are
/// never accepted into the pending pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Hex-encoded ed25519 public key of the sender; empty means coinbase
    #[serde(default)]
    pub sender_pubkey: String,

    /// Recipient address (40 hex chars)
    pub recipient: String,

    /// Amount in minimal units
    pub amount: u64,

    /// Per-sender sequence number; the ledger requires last accepted + 1
    pub nonce: u64,

    /// Hex-encoded signature over [`Transaction::signing_message`]
    #[serde(default)]
    pub signature: String,
}

impl Transaction {
    /// Creates a new unsigned transaction
    pub fn new(sender_pubkey: String, recipient: String, amount: u64, nonce: u64) -> Self {
        Transaction {
            sender_pubkey,
            recipient,
            amount,
            nonce,
            signature: String::new(),
        }
    }

    /// Creates and signs a transaction with the given keypair
    pub fn signed(keypair: &KeyPair, recipient: String, amount: u64, nonce: u64) -> Self {
        let mut tx = Transaction::new(keypair.public_key_hex(), recipient, amount, nonce);
        tx.signature = keypair.sign(&tx.signing_message());
        tx
    }

    /// Canonical message covered by the signature.
    ///
    /// Fixed field order, no whitespace. The signature itself is excluded.
    pub fn signing_message(&self) -> String {
        format!(
            "from={};to={};amount={};nonce={}",
            self.sender_pubkey, self.recipient, self.amount, self.nonce
        )
    }

    /// Content-hash identifier of the full transaction.
    ///
    /// Used as the Merkle leaf value and as the transaction's external
    /// reference. Unlike [`Transaction::signing_message`] this covers the
    /// signature, so two identically-worded transfers with different
    /// signatures get distinct identifiers.
    pub fn id(&self) -> String {
        sha256_hex(format!("{};sig={}", self.signing_message(), self.signature))
    }

    /// Whether this transaction is a coinbase reward
    pub fn is_coinbase(&self) -> bool {
        self.sender_pubkey.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::crypto::verify;

    #[test]
    fn test_signing_message_format() {
        let tx = Transaction::new("ab".to_string(), "cd".to_string(), 5, 1);
        assert_eq!(tx.signing_message(), "from=ab;to=cd;amount=5;nonce=1");
    }

    #[test]
    fn test_signed_transaction_verifies() {
        let keypair = KeyPair::generate();
        let tx = Transaction::signed(&keypair, "deadbeefcafebabe0123".to_string(), 5, 1);

        assert!(!tx.is_coinbase());
        assert!(verify(&tx.sender_pubkey, &tx.signing_message(), &tx.signature).unwrap());
    }

    #[test]
    fn test_id_is_deterministic_and_sensitive() {
        let keypair = KeyPair::generate();
        let tx = Transaction::signed(&keypair, "deadbeefcafebabe0123".to_string(), 5, 1);

        assert_eq!(tx.id(), tx.id());

        let mut tampered = tx.clone();
        tampered.amount = 6;
        assert_ne!(tampered.id(), tx.id());
    }

    #[test]
    fn test_coinbase_detection() {
        let coinbase = Transaction::new(String::new(), "miner".to_string(), 50, 0);
        assert!(coinbase.is_coinbase());
    }
}
