//! An educational single-node blockchain: signed account-based transactions,
//! proof-of-work sealing, Merkle commitments over the pending pool and a
//! unit-step difficulty retargeting loop.
//!
//! The [`blockchain`] module holds the ledger itself; [`p2p`] is the
//! best-effort peer transport the binary wires up around it.

pub mod blockchain;
pub mod p2p;

pub use blockchain::{
    AccountState, Block, Blockchain, ChainError, ChainParams, KeyPair, Transaction,
    ValidationError,
};
