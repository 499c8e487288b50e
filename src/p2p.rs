//! Best-effort peer networking: one TCP connection per message, no
//! handshake, no acknowledgment, no retry, no ordering guarantee.
//!
//! The ledger never touches a socket. Inbound payloads arrive on an mpsc
//! channel owned by the caller, and outbound notices are fired at each known
//! peer and forgotten. Delivery failures are logged at debug level and
//! otherwise ignored; that is the designed behavior of this transport, not
//! an accident.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use crate::blockchain::Block;

/// A message exchanged between peers, serialized as tagged JSON
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PeerMessage {
    /// Announcement of a freshly mined block
    #[serde(rename = "NEWBLOCK")]
    NewBlock { block: Block },
}

impl PeerMessage {
    /// Serializes the message for the wire
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses a message received from a peer
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

/// Sends `payload` to every peer, one connection per peer, and moves on.
pub async fn broadcast(peers: &[String], payload: &str) {
    for peer in peers {
        match TcpStream::connect(peer.as_str()).await {
            Ok(mut stream) => {
                if let Err(err) = stream.write_all(payload.as_bytes()).await {
                    debug!("failed to send to peer {peer}: {err}");
                }
            }
            Err(err) => debug!("peer {peer} unreachable: {err}"),
        }
    }
}

/// Accepts inbound peer connections and forwards each payload.
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    /// Binds to `addr` (e.g. `127.0.0.1:9001`); port 0 picks a free port
    pub async fn bind(addr: &str) -> std::io::Result<Self> {
        let inner = TcpListener::bind(addr).await?;
        info!("listening for peers on {}", inner.local_addr()?);
        Ok(Listener { inner })
    }

    /// The address the listener actually bound to
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.inner.local_addr()
    }

    /// Runs the accept loop forever.
    ///
    /// Each connection is read to EOF and its payload forwarded on
    /// `inbound`. Failed reads are dropped silently in keeping with the
    /// best-effort model; the loop itself only ends when the socket or the
    /// channel is gone.
    pub async fn run(self, inbound: mpsc::Sender<String>) {
        loop {
            let (mut socket, _) = match self.inner.accept().await {
                Ok(conn) => conn,
                Err(err) => {
                    debug!("accept failed: {err}");
                    continue;
                }
            };

            let forward = inbound.clone();
            tokio::spawn(async move {
                let mut payload = String::new();
                if socket.read_to_string(&mut payload).await.is_ok() && !payload.is_empty() {
                    let _ = forward.send(payload).await;
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{Blockchain, ChainParams};

    #[test]
    fn test_peer_message_round_trip() {
        let mut chain = Blockchain::new(ChainParams {
            initial_difficulty: 0,
            ..ChainParams::default()
        });
        let block = chain.mine_pending("abcd").unwrap().clone();

        let message = PeerMessage::NewBlock {
            block: block.clone(),
        };
        let json = message.to_json().unwrap();
        assert!(json.contains("\"NEWBLOCK\""));

        let PeerMessage::NewBlock { block: parsed } = PeerMessage::from_json(&json).unwrap();
        assert_eq!(parsed.hash, block.hash);
        assert_eq!(parsed.height, block.height);
    }

    #[test]
    fn test_malformed_payload_is_an_error_not_a_panic() {
        assert!(PeerMessage::from_json("{\"type\":\"NOPE\"}").is_err());
        assert!(PeerMessage::from_json("not json at all").is_err());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_listener() {
        let listener = Listener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let (tx, mut rx) = mpsc::channel(4);
        tokio::spawn(listener.run(tx));

        broadcast(&[addr], "hello peers").await;

        let received = rx.recv().await.unwrap();
        assert_eq!(received, "hello peers");
    }

    #[tokio::test]
    async fn test_broadcast_ignores_unreachable_peer() {
        // Nothing listens here; broadcast must simply return
        broadcast(&["127.0.0.1:1".to_string()], "into the void").await;
    }
}
