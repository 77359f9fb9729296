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

//! Prometheus instrumentation. Nothing in this core serves `/metrics` over
//! HTTP — an external collaborator reads [`Metrics::registry`] — but the
//! instruments themselves are always registered and always updated.

use prometheus::{IntCounter, IntGauge, Registry};
use thiserror::Error;

/// Metrics errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A prometheus registration call failed (duplicate metric name).
    #[error("prometheus registration failed")]
    Prom,
}

/// Node-core metrics container.
#[derive(Clone)]
pub struct Metrics {
    /// The registry an external HTTP collaborator would expose.
    pub registry: Registry,

    /// Current committed chain height.
    pub block_height: IntGauge,
    /// Current mempool size.
    pub mempool_size: IntGauge,
    /// Number of live peer connections.
    pub peers_connected: IntGauge,
    /// Total transactions admitted to the mempool.
    pub transactions_total: IntCounter,
    /// Total blocks committed locally.
    pub consensus_commits_total: IntCounter,
    /// Total ACKs tallied as leader.
    pub consensus_acks_total: IntCounter,
    /// Total frames rejected by the codec.
    pub frame_invalid_total: IntCounter,
    /// Total frames rejected for exceeding the size cap.
    pub frame_too_large_total: IntCounter,
}

impl Metrics {
    /// Create and register every instrument.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let block_height = IntGauge::new("minichain_block_height", "Current committed chain height")
            .map_err(|_| MetricsError::Prom)?;
        let mempool_size = IntGauge::new("minichain_mempool_size", "Current mempool size")
            .map_err(|_| MetricsError::Prom)?;
        let peers_connected = IntGauge::new("minichain_peers_connected", "Live peer connections")
            .map_err(|_| MetricsError::Prom)?;
        let transactions_total = IntCounter::new(
            "minichain_transactions_total",
            "Total transactions admitted to the mempool",
        )
        .map_err(|_| MetricsError::Prom)?;
        let consensus_commits_total = IntCounter::new(
            "minichain_consensus_commits_total",
            "Total blocks committed locally",
        )
        .map_err(|_| MetricsError::Prom)?;
        let consensus_acks_total = IntCounter::new(
            "minichain_consensus_acks_total",
            "Total ACKs tallied as leader",
        )
        .map_err(|_| MetricsError::Prom)?;
        let frame_invalid_total = IntCounter::new(
            "minichain_frame_invalid_total",
            "Total frames rejected by the codec",
        )
        .map_err(|_| MetricsError::Prom)?;
        let frame_too_large_total = IntCounter::new(
            "minichain_frame_too_large_total",
            "Total frames rejected for exceeding the size cap",
        )
        .map_err(|_| MetricsError::Prom)?;

        for m in [
            Box::new(block_height.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(mempool_size.clone()),
            Box::new(peers_connected.clone()),
        ] {
            registry.register(m).map_err(|_| MetricsError::Prom)?;
        }
        for m in [
            Box::new(transactions_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(consensus_commits_total.clone()),
            Box::new(consensus_acks_total.clone()),
            Box::new(frame_invalid_total.clone()),
            Box::new(frame_too_large_total.clone()),
        ] {
            registry.register(m).map_err(|_| MetricsError::Prom)?;
        }

        Ok(Self {
            registry,
            block_height,
            mempool_size,
            peers_connected,
            transactions_total,
            consensus_commits_total,
            consensus_acks_total,
            frame_invalid_total,
            frame_too_large_total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_without_duplicate_name_collisions() {
        let m = Metrics::new().unwrap();
        assert_eq!(m.registry.gather().len(), 8);
    }
}
