//! Live peer registry and message relay.
//!
//! Each peer gets an outbound queue; the WebSocket layer drains it into the
//! socket. Dispatch never closes a connection: bad frames are logged and dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{RelayError, Result};
use crate::search::SearchService;
use crate::service::SearchResponse;

pub type ConnectionId = u64;

/// Outbound frames queued for one peer
pub type Outbox = mpsc::UnboundedReceiver<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum MessageType {
    Ping,
    Search,
    Command,
    TrackInfo,
    #[serde(other)]
    Unknown,
}

/// Inbound envelope; only `type` is inspected so relayed payloads stay opaque
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: MessageType,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
enum Reply<'a> {
    Pong { timestamp: f64 },
    SearchResults { data: &'a SearchResponse },
    Error { error: String },
}

/// Seconds since the Unix epoch, with millisecond precision
pub fn unix_timestamp() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

pub struct ConnectionHub {
    peers: RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<String>>>,
    next_id: AtomicU64,
    search: Arc<SearchService>,
    search_limit: usize,
}

impl ConnectionHub {
    pub fn new(search: Arc<SearchService>, search_limit: usize) -> Self {
        Self {
            peers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            search,
            search_limit,
        }
    }

    /// Add a peer to the connection set, returning its id and outbound queue.
    pub fn register(&self) -> (ConnectionId, Outbox) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let active = {
            let mut peers = self.peers.write();
            peers.insert(id, tx);
            peers.len()
        };
        tracing::info!(connection = id, active, "WebSocket connection opened");
        (id, rx)
    }

    /// Remove a peer. Dropping its sender ends the peer's outbound queue.
    /// Returns false if it was already gone.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        let (removed, active) = {
            let mut peers = self.peers.write();
            (peers.remove(&id).is_some(), peers.len())
        };
        if removed {
            tracing::info!(connection = id, active, "WebSocket connection closed");
        }
        removed
    }

    pub fn connection_count(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_connected(&self, id: ConnectionId) -> bool {
        self.peers.read().contains_key(&id)
    }

    /// Handle one inbound text frame from `sender`, logging rather than
    /// propagating anything that goes wrong.
    pub async fn dispatch(&self, sender: ConnectionId, frame: &str) {
        if let Err(e) = self.try_dispatch(sender, frame).await {
            match e {
                RelayError::Protocol(_) => {
                    tracing::warn!(connection = sender, error = %e, "Ignoring malformed frame")
                }
                _ => tracing::error!(connection = sender, error = %e, "Error processing message"),
            }
        }
    }

    async fn try_dispatch(&self, sender: ConnectionId, frame: &str) -> Result<()> {
        let envelope: Envelope = serde_json::from_str(frame)?;
        tracing::debug!(connection = sender, kind = ?envelope.kind, "Received message");

        match envelope.kind {
            MessageType::Ping => {
                self.reply(sender, &Reply::Pong {
                    timestamp: unix_timestamp(),
                })?;
            }
            MessageType::Search => self.handle_search(sender, frame).await?,
            MessageType::Command | MessageType::TrackInfo => {
                let delivered = self.broadcast_except(sender, frame);
                tracing::info!(connection = sender, kind = ?envelope.kind, delivered, "Relayed message");
            }
            MessageType::Unknown => {
                tracing::debug!(connection = sender, "Ignoring unknown message type");
            }
        }
        Ok(())
    }

    async fn handle_search(&self, sender: ConnectionId, frame: &str) -> Result<()> {
        let request: serde_json::Value = serde_json::from_str(frame)?;
        let outcome = match request.get("query").and_then(serde_json::Value::as_str) {
            Some(query) => self.search.search(query, self.search_limit).await,
            None => Err(RelayError::validation("SEARCH requires a query")),
        };

        match outcome {
            Ok(response) => {
                tracing::info!(connection = sender, total = response.total, cached = response.cached, "Sending search results");
                self.reply(sender, &Reply::SearchResults { data: &response })
            }
            Err(e) => {
                tracing::warn!(connection = sender, error = %e, "Search request failed");
                self.reply(sender, &Reply::Error {
                    error: e.to_string(),
                })
            }
        }
    }

    fn reply(&self, id: ConnectionId, reply: &Reply<'_>) -> Result<()> {
        let frame = serde_json::to_string(reply)?;
        if !self.send_to(id, frame) {
            tracing::debug!(connection = id, "Reply dropped, peer is gone");
        }
        Ok(())
    }

    /// Queue a frame for one peer. Returns false if the peer is gone.
    pub fn send_to(&self, id: ConnectionId, frame: String) -> bool {
        self.peers
            .read()
            .get(&id)
            .map(|tx| tx.send(frame).is_ok())
            .unwrap_or(false)
    }

    /// Queue `frame` verbatim for every peer except `sender`.
    ///
    /// A peer whose queue is closed is skipped; the rest still get the frame.
    /// Returns how many peers it was queued for.
    pub fn broadcast_except(&self, sender: ConnectionId, frame: &str) -> usize {
        let peers = self.peers.read();
        let mut delivered = 0;
        for (id, tx) in peers.iter().filter(|(id, _)| **id != sender) {
            if tx.send(frame.to_string()).is_ok() {
                delivered += 1;
            } else {
                tracing::warn!(connection = *id, "Failed to forward message to peer");
            }
        }
        delivered
    }
}
