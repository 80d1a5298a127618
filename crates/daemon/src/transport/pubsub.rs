// SPDX-License-Identifier: MIT

//! In-process durable pub/sub transport.
//!
//! Stands in for an external message broker: requests arrive over an
//! mpsc channel (fed by whatever embeds this transport — a local
//! socket listener, a test harness), replies go out over a per-request
//! oneshot, and events are appended to an in-memory durable log and
//! fanned out over a broadcast channel so late subscribers can still
//! catch up by replaying the log from their last-seen offset.

use super::{Inbound, TransportAdapter};
use async_trait::async_trait;
use fleet_core::{Event, ResultMsg};
use parking_lot::Mutex as SyncMutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex as AsyncMutex};

pub struct PubSubTransport {
    inbound_rx: AsyncMutex<mpsc::Receiver<Inbound>>,
    pending_replies: Arc<SyncMutex<HashMap<String, oneshot::Sender<ResultMsg>>>>,
    event_log: Arc<SyncMutex<Vec<Event>>>,
    event_tx: broadcast::Sender<Event>,
}

impl PubSubTransport {
    /// Build a transport plus the producer handle the embedding socket
    /// listener uses to hand off decoded requests and await their reply.
    pub fn new() -> (Self, PubSubProducer) {
        let (inbound_tx, inbound_rx) = mpsc::channel(256);
        let (event_tx, _) = broadcast::channel(1024);
        let pending_replies = Arc::new(SyncMutex::new(HashMap::new()));
        let transport = Self {
            inbound_rx: AsyncMutex::new(inbound_rx),
            pending_replies: pending_replies.clone(),
            event_log: Arc::new(SyncMutex::new(Vec::new())),
            event_tx,
        };
        let producer = PubSubProducer { inbound_tx, pending_replies };
        (transport, producer)
    }

    /// Replay every event recorded since the transport started, for a
    /// subscriber that connected late.
    pub fn replay(&self) -> Vec<Event> {
        self.event_log.lock().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }
}

/// Handle used by whatever sits in front of this transport (a socket
/// listener, a test driver) to submit a decoded action and get back a
/// future resolving to its reply.
#[derive(Clone)]
pub struct PubSubProducer {
    inbound_tx: mpsc::Sender<Inbound>,
    pending_replies: Arc<SyncMutex<HashMap<String, oneshot::Sender<ResultMsg>>>>,
}

impl PubSubProducer {
    pub async fn submit(
        &self,
        inbound: Inbound,
    ) -> Result<oneshot::Receiver<ResultMsg>, Inbound> {
        let (tx, rx) = oneshot::channel();
        self.pending_replies.lock().insert(inbound.reply_token.clone(), tx);
        match self.inbound_tx.send(inbound).await {
            Ok(()) => Ok(rx),
            Err(e) => Err(e.0),
        }
    }
}

#[async_trait]
impl TransportAdapter for PubSubTransport {
    async fn receive(&self) -> Option<Inbound> {
        self.inbound_rx.lock().await.recv().await
    }

    async fn reply(&self, reply_token: &str, result: &ResultMsg) {
        if let Some(tx) = self.pending_replies.lock().remove(reply_token) {
            let _ = tx.send(result.clone());
        }
    }

    async fn publish(&self, event: &Event) {
        self.event_log.lock().push(event.clone());
        let _ = self.event_tx.send(event.clone());
    }
}

#[cfg(test)]
#[path = "pubsub_tests.rs"]
mod tests;
