use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::account::AccountState;
use super::block::Block;
use super::chain::{Blockchain, ChainParams};

/// Errors that can occur while saving or loading a chain
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed chain document: {0}")]
    Format(#[from] serde_json::Error),
}

/// The persisted representation of a whole chain: configuration, current
/// difficulty, the ordered block list and a snapshot of account state.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChainDocument {
    pub params: ChainParams,
    pub difficulty: u32,
    pub chain: Vec<Block>,
    pub state: AccountState,
}

impl ChainDocument {
    /// Captures the persistable parts of a chain
    pub fn from_chain(chain: &Blockchain) -> Self {
        ChainDocument {
            params: chain.params().clone(),
            difficulty: chain.difficulty(),
            chain: chain.blocks().to_vec(),
            state: chain.state().clone(),
        }
    }

    /// Reassembles a chain from this document.
    ///
    /// The account snapshot is trusted as-is rather than recomputed by
    /// replay: blocks do not record their miner, so coinbase credits cannot
    /// be reconstructed from the block list alone. Callers wanting integrity
    /// should run `validate()` on the result.
    pub fn into_chain(self) -> Blockchain {
        Blockchain::from_parts(self.params, self.difficulty, self.chain, self.state)
    }
}

/// Serializes `chain` to pretty JSON at `path`.
///
/// A failed save surfaces an error; the in-memory chain is unaffected.
pub fn save_to_file(path: impl AsRef<Path>, chain: &Blockchain) -> Result<(), StorageError> {
    let path = path.as_ref();
    let document = ChainDocument::from_chain(chain);
    let json = serde_json::to_string_pretty(&document)?;

    fs::write(path, json).map_err(|source| StorageError::Io {
        path: path.display().to_string(),
        source,
    })?;

    info!(
        "saved chain of {} blocks to {}",
        chain.blocks().len(),
        path.display()
    );
    Ok(())
}

/// Loads a chain previously written by [`save_to_file`].
pub fn load_from_file(path: impl AsRef<Path>) -> Result<Blockchain, StorageError> {
    let path = path.as_ref();
    let json = fs::read_to_string(path).map_err(|source| StorageError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let document: ChainDocument = serde_json::from_str(&json)?;
    let chain = document.into_chain();

    info!(
        "loaded chain of {} blocks from {}",
        chain.blocks().len(),
        path.display()
    );
    Ok(chain)
}
