//! End-to-end flow: fund a wallet by mining, transfer, persist, reload and
//! detect tampering in the persisted document.

use std::path::PathBuf;

use simplechain::blockchain::storage;
use simplechain::{Blockchain, ChainParams, KeyPair, Transaction};

fn fast_params() -> ChainParams {
    ChainParams {
        initial_difficulty: 1,
        target_block_time_secs: 10,
        retarget_interval: 1000,
        mining_reward: 50,
    }
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("simplechain-it-{}-{}.json", name, std::process::id()))
}

#[test]
fn mine_transfer_and_validate() {
    let mut chain = Blockchain::new(fast_params());
    let wallet = KeyPair::generate();

    // Two coinbase rewards give the wallet 100 to spend
    chain.mine_pending(&wallet.address()).unwrap();
    chain.mine_pending(&wallet.address()).unwrap();
    assert_eq!(chain.state().balance(&wallet.address()), 100);

    let tx = Transaction::signed(&wallet, "deadbeefcafebabe0123".to_string(), 5, 1);
    chain.submit(tx).unwrap();
    let sealed = chain.mine_pending(&wallet.address()).unwrap().clone();

    assert_eq!(sealed.height, 3);
    assert!(sealed.hash.starts_with('0'));
    assert_eq!(chain.state().balance(&wallet.address()), 145);
    assert_eq!(chain.state().balance("deadbeefcafebabe0123"), 5);
    assert!(chain.validate());
}

#[test]
fn round_trip_preserves_validity_and_tampering_breaks_it() {
    let mut chain = Blockchain::new(fast_params());
    let wallet = KeyPair::generate();

    chain.mine_pending(&wallet.address()).unwrap();
    chain
        .submit(Transaction::signed(&wallet, "deadbeefcafebabe0123".to_string(), 7, 1))
        .unwrap();
    chain.mine_pending(&wallet.address()).unwrap();
    assert!(chain.blocks().len() >= 3);

    let path = temp_path("tamper");
    storage::save_to_file(&path, &chain).unwrap();

    let reloaded = storage::load_from_file(&path).unwrap();
    assert!(reloaded.validate());
    assert_eq!(reloaded.tip().hash, chain.tip().hash);

    // Bump the committed transfer's amount in the document without
    // re-sealing the block; the recomputed Merkle root must expose it.
    let raw = std::fs::read_to_string(&path).unwrap();
    let mut doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
    doc["chain"][2]["transactions"][0]["amount"] = serde_json::json!(700);
    std::fs::write(&path, serde_json::to_string(&doc).unwrap()).unwrap();

    let tampered = storage::load_from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert!(!tampered.validate());
}

#[test]
fn peer_block_flows_between_two_nodes() {
    let mut miner_node = Blockchain::new(fast_params());
    let mut observer_node = miner_node.clone();

    let wallet = KeyPair::generate();
    let block = miner_node.mine_pending(&wallet.address()).unwrap().clone();

    observer_node.accept_external_block(block).unwrap();
    assert_eq!(observer_node.blocks().len(), 2);
    assert_eq!(observer_node.tip().hash, miner_node.tip().hash);
    assert!(observer_node.validate());
}
