use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::Parser;
use log::{debug, info, warn};
use tokio::sync::mpsc;

use simplechain::blockchain::{chain::ChainParams, storage};
use simplechain::p2p::{self, PeerMessage};
use simplechain::{Blockchain, KeyPair, Transaction};

/// An educational proof-of-work blockchain node
#[derive(Debug, Parser)]
#[command(name = "simplechain", version, about)]
struct Args {
    /// Address to listen on for peer block announcements, e.g. 127.0.0.1:9001
    #[arg(long)]
    listen: Option<String>,

    /// Peer address to broadcast new blocks to (repeatable)
    #[arg(long = "peer")]
    peers: Vec<String>,

    /// Chain file loaded at startup and autosaved after each mined block
    #[arg(long)]
    db: Option<PathBuf>,

    /// Initial mining difficulty (leading zero hex characters)
    #[arg(long, default_value_t = 2)]
    difficulty: u32,

    /// Target seconds between blocks, used by difficulty retargeting
    #[arg(long, default_value_t = 10)]
    target_block_time: u64,

    /// Number of blocks between difficulty re-evaluations
    #[arg(long, default_value_t = 5)]
    retarget_interval: usize,

    /// Coinbase reward per mined block
    #[arg(long, default_value_t = 50)]
    mining_reward: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    let args = Args::parse();

    let params = ChainParams {
        initial_difficulty: args.difficulty,
        target_block_time_secs: args.target_block_time,
        retarget_interval: args.retarget_interval,
        mining_reward: args.mining_reward,
    };

    let chain = match &args.db {
        Some(path) if path.exists() => {
            let loaded = storage::load_from_file(path)?;
            if !loaded.validate() {
                warn!("loaded chain fails structural validation");
            }
            loaded
        }
        _ => {
            info!("starting a fresh chain at difficulty {}", params.initial_difficulty);
            Blockchain::new(params)
        }
    };
    let chain = Arc::new(Mutex::new(chain));

    if let Some(listen) = &args.listen {
        let listener = p2p::Listener::bind(listen).await?;
        let (inbound_tx, mut inbound_rx) = mpsc::channel(16);
        tokio::spawn(listener.run(inbound_tx));

        let peer_chain = chain.clone();
        tokio::spawn(async move {
            while let Some(payload) = inbound_rx.recv().await {
                match PeerMessage::from_json(&payload) {
                    Ok(PeerMessage::NewBlock { block }) => {
                        let height = block.height;
                        let result = peer_chain.lock().unwrap().accept_external_block(block);
                        if let Err(err) = result {
                            warn!("rejected peer block #{height}: {err}");
                        }
                    }
                    Err(err) => debug!("ignoring malformed peer message: {err}"),
                }
            }
        });
    }

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(16);
    let peers = args.peers.clone();
    tokio::spawn(async move {
        while let Some(payload) = outbound_rx.recv().await {
            p2p::broadcast(&peers, &payload).await;
        }
    });

    let shell_chain = chain.clone();
    let db = args.db.clone();
    tokio::task::spawn_blocking(move || shell(shell_chain, outbound_tx, db)).await?;

    Ok(())
}

fn print_menu() {
    println!();
    println!("simplechain");
    println!("1) Generate keypair");
    println!("2) Show address for a public key");
    println!("3) Add signed transaction");
    println!("4) Mine pending transactions");
    println!("5) Print chain");
    println!("6) Validate chain");
    println!("7) Save chain to file");
    println!("8) Load chain from file");
    println!("9) Show balance for address");
    println!("0) Exit");
}

fn prompt(label: &str) -> String {
    print!("{label}");
    let _ = io::stdout().flush();
    let mut line = String::new();
    if io::stdin().read_line(&mut line).is_err() {
        return String::new();
    }
    line.trim().to_string()
}

fn prompt_number<T: std::str::FromStr>(label: &str) -> Option<T> {
    match prompt(label).parse() {
        Ok(value) => Some(value),
        Err(_) => {
            println!("Not a number.");
            None
        }
    }
}

/// The interactive command loop. Runs on a blocking thread; every ledger
/// touch takes the shared lock, so mining blocks the peer listener for its
/// duration.
fn shell(chain: Arc<Mutex<Blockchain>>, outbound: mpsc::Sender<String>, db: Option<PathBuf>) {
    loop {
        print_menu();
        match prompt("> ").as_str() {
            "1" => {
                let keypair = KeyPair::generate();
                println!("Secret key: {}", keypair.secret_key_hex());
                println!("Public key: {}", keypair.public_key_hex());
                println!("Address:    {}", keypair.address());
            }
            "2" => {
                let public_key = prompt("Public key (hex): ");
                println!(
                    "Address: {}",
                    simplechain::blockchain::crypto::address_from_public_key(&public_key)
                );
            }
            "3" => add_transaction(&chain),
            "4" => mine(&chain, &outbound, db.as_deref()),
            "5" => {
                for block in chain.lock().unwrap().blocks() {
                    println!(
                        "Block #{} ts={} diff={} txs={} mine_ms={}",
                        block.height,
                        block.timestamp.to_rfc3339(),
                        block.difficulty,
                        block.transactions.len(),
                        block.mine_ms,
                    );
                    println!("  prev={}...", &block.prev_hash[..block.prev_hash.len().min(16)]);
                    println!("  hash={}...", &block.hash[..block.hash.len().min(16)]);
                }
            }
            "6" => {
                let valid = chain.lock().unwrap().validate();
                println!("{}", if valid { "VALID" } else { "INVALID" });
            }
            "7" => {
                let path = prompt("Path: ");
                let guard = chain.lock().unwrap();
                match storage::save_to_file(&path, &guard) {
                    Ok(()) => println!("Saved."),
                    Err(err) => println!("Save failed: {err}"),
                }
            }
            "8" => {
                let path = prompt("Path: ");
                match storage::load_from_file(&path) {
                    Ok(loaded) => {
                        *chain.lock().unwrap() = loaded;
                        println!("Loaded.");
                    }
                    Err(err) => println!("Load failed: {err}"),
                }
            }
            "9" => {
                let address = prompt("Address: ");
                let guard = chain.lock().unwrap();
                println!(
                    "Balance: {} (last nonce {})",
                    guard.state().balance(&address),
                    guard.state().last_nonce(&address)
                );
            }
            "0" => break,
            other => {
                if !other.is_empty() {
                    println!("Unknown choice: {other}");
                }
            }
        }
    }
}

fn add_transaction(chain: &Arc<Mutex<Blockchain>>) {
    let secret = prompt("Secret key (hex): ");
    let keypair = match KeyPair::from_secret_hex(&secret) {
        Ok(keypair) => keypair,
        Err(err) => {
            println!("Bad secret key: {err}");
            return;
        }
    };

    let recipient = prompt("Recipient address: ");
    let Some(amount) = prompt_number::<u64>("Amount: ") else {
        return;
    };

    let next_nonce = chain.lock().unwrap().state().last_nonce(&keypair.address()) + 1;
    let Some(nonce) = prompt_number::<u64>(&format!("Nonce (next is {next_nonce}): ")) else {
        return;
    };

    let tx = Transaction::signed(&keypair, recipient, amount, nonce);
    match chain.lock().unwrap().submit(tx) {
        Ok(height) => println!("Queued for block #{height}."),
        Err(err) => println!("Rejected: {err}"),
    }
}

fn mine(chain: &Arc<Mutex<Blockchain>>, outbound: &mpsc::Sender<String>, db: Option<&std::path::Path>) {
    let miner = prompt("Miner address: ");
    if miner.is_empty() {
        println!("Miner address required.");
        return;
    }

    let mut guard = chain.lock().unwrap();
    let block = match guard.mine_pending(&miner) {
        Ok(block) => block.clone(),
        Err(err) => {
            println!("Mining aborted: {err}");
            return;
        }
    };

    if let Some(path) = db {
        if let Err(err) = storage::save_to_file(path, &guard) {
            warn!("autosave failed: {err}");
        }
    }
    drop(guard);

    println!(
        "Mined block #{} in {} ms, hash={}",
        block.height, block.mine_ms, block.hash
    );

    let announcement = PeerMessage::NewBlock { block };
    match announcement.to_json() {
        Ok(payload) => {
            let _ = outbound.blocking_send(payload);
        }
        Err(err) => warn!("could not serialize block announcement: {err}"),
    }
}
