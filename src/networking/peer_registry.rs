// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Peer registry: tracks inbound/outbound connections, resolves validator
//! identities to addresses, and fans out broadcasts through bounded,
//! never-drop-consensus outbound queues.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tokio::sync::Notify;

use crate::core::types::Message;

/// Default bounded-queue capacity for non-consensus messages per peer.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Peer registry errors.
#[derive(Debug, Error)]
pub enum PeerRegistryError {
    /// No known or dialable address for the given identity.
    #[error("no address known for peer {0}")]
    UnknownPeer(String),
}

/// Whether `msg` is a consensus-critical message that must never be dropped
/// from an outbound queue under backpressure.
pub fn is_consensus_critical(msg: &Message) -> bool {
    matches!(msg, Message::Propose(_) | Message::Ack(_) | Message::Commit(_))
}

/// A bounded, backpressure-surfacing outbound queue for one peer.
///
/// Non-consensus messages are dropped oldest-first on overflow;
/// PROPOSE/ACK/COMMIT are never dropped (the queue grows past capacity
/// instead, and the caller observes the resulting backpressure via send
/// latency rather than data loss).
pub struct OutboundQueue {
    queue: Mutex<VecDeque<Message>>,
    notify: Notify,
    capacity: usize,
}

impl OutboundQueue {
    /// New queue with the given non-consensus capacity.
    pub fn new(capacity: usize) -> Self {
        OutboundQueue {
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            capacity,
        }
    }

    /// Enqueue `msg`. Never blocks.
    pub fn push(&self, msg: Message) {
        let critical = is_consensus_critical(&msg);
        {
            let mut q = self.queue.lock().unwrap();
            if !critical && q.len() >= self.capacity {
                q.pop_front();
            }
            q.push_back(msg);
        }
        self.notify.notify_one();
    }

    /// Dequeue the next message, waiting if the queue is empty.
    pub async fn pop(&self) -> Message {
        loop {
            if let Some(m) = self.queue.lock().unwrap().pop_front() {
                return m;
            }
            self.notify.notified().await;
        }
    }

    /// Current queue length, for diagnostics.
    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A handle to one live connection's outbound queue and advertised address.
pub struct PeerHandle {
    /// `host:port` this connection is associated with.
    pub addr: String,
    /// Outbound message queue; a writer task drains this onto the socket.
    pub queue: std::sync::Arc<OutboundQueue>,
}

/// Exponential backoff with jitter for outbound dial retries: base 1s,
/// doubling to a 30s cap, +/-20% jitter.
#[derive(Clone, Debug)]
pub struct DialBackoff {
    base: Duration,
    cap: Duration,
    attempt: u32,
}

impl Default for DialBackoff {
    fn default() -> Self {
        DialBackoff {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(30),
            attempt: 0,
        }
    }
}

impl DialBackoff {
    /// Compute the next delay and advance the attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let exp = self.attempt.min(5); // 1s * 2^5 = 32s already exceeds the 30s cap
        let raw = self.base.saturating_mul(1 << exp).min(self.cap);
        self.attempt += 1;
        jitter(raw)
    }

    /// Reset after a successful connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

fn jitter(d: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(0.8..=1.2);
    Duration::from_secs_f64(d.as_secs_f64() * factor)
}

/// Tracks inbound-accepted and outbound-dialed connections, keyed by
/// `host:port`, plus identity -> address resolution for `send_to`.
pub struct PeerRegistry {
    inner: Mutex<Registry>,
}

struct Registry {
    /// identity or address label -> advertised `host:port`.
    addr_by_identity: HashMap<String, String>,
    /// `host:port` -> live connection handle (inbound or outbound).
    connections: HashMap<String, PeerHandle>,
}

impl PeerRegistry {
    /// A fresh, empty registry.
    pub fn new() -> Self {
        PeerRegistry {
            inner: Mutex::new(Registry {
                addr_by_identity: HashMap::new(),
                connections: HashMap::new(),
            }),
        }
    }

    /// Pre-register the advertised address for a validator identity, e.g.
    /// from the normalized peer list supplied at startup (§6).
    pub fn note_address(&self, identity: &str, addr: &str) {
        self.inner
            .lock()
            .unwrap()
            .addr_by_identity
            .insert(identity.to_string(), addr.to_string());
    }

    /// Register a live connection (inbound or outbound) at `addr`.
    pub fn register(&self, addr: &str, queue: std::sync::Arc<OutboundQueue>) {
        self.inner.lock().unwrap().connections.insert(
            addr.to_string(),
            PeerHandle {
                addr: addr.to_string(),
                queue,
            },
        );
    }

    /// Drop a connection, e.g. after a read/write error (peer-down, §4.1).
    pub fn remove(&self, addr: &str) {
        self.inner.lock().unwrap().connections.remove(addr);
    }

    /// Resolve `identity` to a live connection's outbound queue, matching the
    /// full identifier or its first label (short and fully-qualified names
    /// interoperate).
    pub fn resolve_queue(&self, identity: &str) -> Option<std::sync::Arc<OutboundQueue>> {
        let g = self.inner.lock().unwrap();
        if let Some(addr) = g.addr_by_identity.get(identity) {
            if let Some(h) = g.connections.get(addr) {
                return Some(h.queue.clone());
            }
        }
        let first_label = identity.split('.').next().unwrap_or(identity);
        for (id, addr) in g.addr_by_identity.iter() {
            let id_label = id.split('.').next().unwrap_or(id);
            if id_label == first_label {
                if let Some(h) = g.connections.get(addr) {
                    return Some(h.queue.clone());
                }
            }
        }
        None
    }

    /// Enqueue `msg` to every live connection.
    pub fn broadcast(&self, msg: Message) {
        let g = self.inner.lock().unwrap();
        for handle in g.connections.values() {
            handle.queue.push(msg.clone());
        }
    }

    /// Enqueue `msg` to the resolved identity's connection, if any is live.
    ///
    /// Does not dial on a miss: the persistent per-peer dial loop the
    /// orchestrator runs for every configured validator (with backoff)
    /// already converges the connection; an ad hoc second dial here would
    /// race it and risk two live sockets registered under the same address.
    /// See DESIGN.md's peer registry entry.
    pub fn send_to(&self, identity: &str, msg: Message) -> Result<(), PeerRegistryError> {
        match self.resolve_queue(identity) {
            Some(q) => {
                q.push(msg);
                Ok(())
            }
            None => Err(PeerRegistryError::UnknownPeer(identity.to_string())),
        }
    }

    /// Number of live connections, for `PeersStatus()`.
    pub fn connected_count(&self) -> usize {
        self.inner.lock().unwrap().connections.len()
    }

    /// Identities with a live connection resolvable against them.
    pub fn connected_identities(&self) -> Vec<String> {
        let g = self.inner.lock().unwrap();
        g.addr_by_identity
            .iter()
            .filter(|(_, addr)| g.connections.contains_key(*addr))
            .map(|(id, _)| id.clone())
            .collect()
    }
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
