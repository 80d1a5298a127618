// SPDX-License-Identifier: MIT

//! Transport adapters (§4.5 framing is the text protocol; this module
//! is how lines actually move between the CLI and the daemon).
//!
//! Two implementations ship: `file_drop`, which watches an inbox
//! directory for atomically-renamed-in request files and writes
//! replies next to them, and `pubsub`, an in-process durable log plus
//! broadcast channel standing in for an external message broker (the
//! teacher's stack has no MQ client crate to build on here).

mod file_drop;
mod pubsub;

pub use file_drop::FileDropTransport;
pub use pubsub::PubSubTransport;

use async_trait::async_trait;
use fleet_core::{Action, Event, ResultMsg};

/// A received request paired with how to reply to it.
#[derive(Debug)]
pub struct Inbound {
    pub action: Action,
    pub reply_token: String,
}

#[async_trait]
pub trait TransportAdapter: Send + Sync {
    /// Block until the next request is available.
    async fn receive(&self) -> Option<Inbound>;

    /// Send a correlated reply for a previously received request.
    async fn reply(&self, reply_token: &str, result: &ResultMsg);

    /// Publish an asynchronous event to all subscribers.
    async fn publish(&self, event: &Event);
}
