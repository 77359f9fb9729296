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

//! In-process node configuration.
//!
//! Configuration *file* parsing is out of scope (spec.md §1); this type is
//! constructed programmatically by the embedding binary from whatever
//! external config format it chooses to parse.

use std::path::PathBuf;
use std::time::Duration;

/// One already-normalized peer: its validator identity and dial address.
/// The external launcher is responsible for producing this list (§6); the
/// core does not re-parse the plain-text peer list file itself.
#[derive(Clone, Debug)]
pub struct PeerAddr {
    /// Validator identifier.
    pub identity: String,
    /// `host:port` to dial.
    pub addr: String,
}

/// Node-core configuration, constructed by the embedding binary.
#[derive(Clone, Debug)]
pub struct NodeCoreConfig {
    /// This node's validator identifier.
    pub self_id: String,
    /// Other validators' normalized identity/address pairs.
    pub peers: Vec<PeerAddr>,
    /// Directory for `chain.json`.
    pub data_dir: PathBuf,
    /// `host:port` to bind the framed-transport listener on.
    pub listen_addr: String,
    /// Minimum time between leader proposals.
    pub block_interval: Duration,
    /// How long a leader may go without quorum before a view change is due.
    pub proposal_timeout: Duration,
    /// Override for the quorum size. `None` uses simple majority.
    pub quorum_size: Option<usize>,
    /// Maximum transactions per proposal.
    pub max_txs: usize,
    /// Consensus tick cadence (default 1 Hz per §4.7).
    pub tick_interval: Duration,
    /// Whether to emit periodic HEARTBEAT frames to peers.
    pub heartbeat_enabled: bool,
    /// Heartbeat cadence, if enabled.
    pub heartbeat_interval: Duration,
}
