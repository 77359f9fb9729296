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

//! End-to-end test driving three real node-core instances over loopback
//! TCP: gossip, framed transport, peer registry dialing, and consensus all
//! wired together, matching the happy path of S1.

#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use minichain::core::types::Amount;
use minichain::monitoring::metrics::Metrics;
use minichain::node::config::{NodeCoreConfig, PeerAddr};
use minichain::node::orchestrator::Node;

fn config(self_id: &str, port: u16, peer_ports: &[(&str, u16)]) -> NodeCoreConfig {
    NodeCoreConfig {
        self_id: self_id.to_string(),
        peers: peer_ports
            .iter()
            .map(|(id, p)| PeerAddr {
                identity: id.to_string(),
                addr: format!("127.0.0.1:{p}"),
            })
            .collect(),
        data_dir: tempfile::tempdir().unwrap().into_path(),
        listen_addr: format!("127.0.0.1:{port}"),
        block_interval: Duration::from_millis(50),
        proposal_timeout: Duration::from_secs(10),
        quorum_size: None,
        max_txs: 500,
        tick_interval: Duration::from_millis(50),
        heartbeat_enabled: false,
        heartbeat_interval: Duration::from_secs(5),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn three_nodes_commit_a_submitted_transaction() {
    let ports = (19801u16, 19802u16, 19803u16);

    let cfg_a = config("A", ports.0, &[("B", ports.1), ("C", ports.2)]);
    let cfg_b = config("B", ports.1, &[("A", ports.0), ("C", ports.2)]);
    let cfg_c = config("C", ports.2, &[("A", ports.0), ("B", ports.1)]);

    let metrics = Arc::new(Metrics::new().unwrap());
    let node_a = Node::new(cfg_a, metrics.clone()).unwrap();
    let node_b = Node::new(cfg_b, metrics.clone()).unwrap();
    let node_c = Node::new(cfg_c, metrics).unwrap();

    node_a.start().await.unwrap();
    node_b.start().await.unwrap();
    node_c.start().await.unwrap();

    // Let the dialers connect to each other before submitting.
    tokio::time::sleep(Duration::from_millis(500)).await;

    let tx_id = node_a.submit_transaction("alice", "bob", Amount::from_subunits(42)).unwrap();

    let reached = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if node_a.height() >= 1 && node_b.height() >= 1 && node_c.height() >= 1 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;

    assert!(reached.is_ok(), "all three nodes should commit height 1 within the timeout");

    let block_a = node_a.get_block(1).unwrap();
    let block_b = node_b.get_block(1).unwrap();
    let block_c = node_c.get_block(1).unwrap();
    assert_eq!(block_a.block_hash, block_b.block_hash);
    assert_eq!(block_a.block_hash, block_c.block_hash);
    assert!(block_a.tx_list.iter().any(|t| t.tx_id == tx_id));

    node_a.stop().await;
    node_b.stop().await;
    node_c.stop().await;
}
