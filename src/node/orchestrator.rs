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

//! The node orchestrator (C7): glues the transport, peer registry, mempool,
//! chain store and consensus engine together, routes inbound messages, and
//! exposes the operator-facing read/submit interface (§6).

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::core::chain::{ChainError, ChainStore};
use crate::core::consensus::engine::{
    AckError, CommitOutcome, ConsensusEngine, ConsensusParams, ProposalError, ProposalOutcome,
};
use crate::core::mempool::{Mempool, RejectReason};
use crate::core::types::{
    AckBody, Amount, Block, CommitBody, Hash256, HeartbeatBody, HelloBody, Message, ProposeBody, Transaction,
};
use crate::core::validator_set::ValidatorSet;
use crate::monitoring::logevent::{self, EventContext};
use crate::monitoring::metrics::Metrics;
use crate::networking::frame::{read_frame, write_frame, FrameError};
use crate::networking::peer_registry::{DialBackoff, OutboundQueue, PeerRegistry, DEFAULT_QUEUE_CAPACITY};
use crate::node::config::NodeCoreConfig;
use crate::node::sync::{handle_sync_message, handle_view_change, NeedSync, NeedSyncReason};

/// Why a transaction submission was rejected.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum SubmitError {
    /// Duplicate `tx_id` (already admitted or previously committed).
    #[error("transaction already seen")]
    AlreadySeen,
    /// Structurally invalid fields.
    #[error("invalid transaction")]
    Invalid,
}

/// Fatal node-level errors (§7): persistence failure, genesis mismatch,
/// validator identity collision.
#[derive(Debug, Error)]
pub enum NodeError {
    /// The chain store failed to load or initialize.
    #[error("chain store: {0}")]
    Chain(#[from] ChainError),
    /// The listener failed to bind.
    #[error("listen: {0}")]
    Io(#[from] std::io::Error),
    /// Two distinct configured peers canonicalized to the same identity.
    #[error("validator identity collision: {0}")]
    IdentityCollision(String),
}

/// Snapshot of one peer's connectivity, for `PeersStatus()`.
#[derive(Clone, Debug)]
pub struct PeerStatus {
    /// Validator identifier.
    pub identity: String,
    /// Whether a live connection is currently resolvable for this identity.
    pub connected: bool,
}

fn now_unix() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// The node orchestrator. Exclusive owner of the mempool and chain store;
/// holds back-reference-free, independently-mutexed consensus state.
pub struct Node {
    self_id: String,
    validators: ValidatorSet,
    chain: Mutex<ChainStore>,
    mempool: Mutex<Mempool>,
    consensus: Mutex<ConsensusEngine>,
    peers: Arc<PeerRegistry>,
    metrics: Arc<Metrics>,
    stop_notify: Notify,
    stopping: AtomicBool,
    config: NodeCoreConfig,
}

impl Node {
    /// Construct a node: load the chain, build the validator set, seed the
    /// peer registry's address book, and initialize consensus at the tip.
    pub fn new(config: NodeCoreConfig, metrics: Arc<Metrics>) -> Result<Arc<Self>, NodeError> {
        let validators = ValidatorSet::new(
            &config.self_id,
            config.peers.iter().map(|p| p.identity.clone()),
        );
        if validators.len() != config.peers.len() + 1 {
            return Err(NodeError::IdentityCollision(config.self_id.clone()));
        }

        let chain = ChainStore::load_or_init(&config.data_dir, &validators)?;
        metrics.block_height.set(chain.height() as i64);

        let peers = Arc::new(PeerRegistry::new());
        for p in &config.peers {
            peers.note_address(&p.identity, &p.addr);
        }
        metrics.peers_connected.set(0);

        let params = ConsensusParams {
            block_interval: config.block_interval,
            proposal_timeout: config.proposal_timeout,
            quorum_size: config.quorum_size.unwrap_or_else(|| validators.default_quorum()),
            max_txs: config.max_txs,
        };
        let consensus = ConsensusEngine::new(validators.clone(), config.self_id.clone(), chain.height(), params);

        Ok(Arc::new(Node {
            self_id: config.self_id.clone(),
            validators,
            chain: Mutex::new(chain),
            mempool: Mutex::new(Mempool::new()),
            consensus: Mutex::new(consensus),
            peers,
            metrics,
            stop_notify: Notify::new(),
            stopping: AtomicBool::new(false),
            config,
        }))
    }

    // ---- operator-facing read/submit interface (§6) ----

    /// Submit a new transaction. Returns its `tx_id` on admission.
    pub fn submit_transaction(
        &self,
        sender: &str,
        recipient: &str,
        amount: Amount,
    ) -> Result<Hash256, SubmitError> {
        let tx = Transaction::new(sender, recipient, amount, now_unix()).map_err(|_| SubmitError::Invalid)?;
        let tx_id = tx.tx_id;
        self.admit_and_gossip(tx)?;
        Ok(tx_id)
    }

    fn admit_and_gossip(&self, tx: Transaction) -> Result<(), SubmitError> {
        let admitted = {
            let mut mempool = self.mempool.lock().unwrap();
            mempool.add(tx.clone())
        };
        match admitted {
            Ok(()) => {
                self.metrics.transactions_total.inc();
                self.metrics.mempool_size.set(self.mempool.lock().unwrap().len() as i64);
                self.peers.broadcast(Message::Tx(tx));
                Ok(())
            }
            Err(RejectReason::AlreadySeen) => Err(SubmitError::AlreadySeen),
            Err(RejectReason::Invalid) => Err(SubmitError::Invalid),
        }
    }

    /// Current committed height.
    pub fn height(&self) -> u64 {
        self.chain.lock().unwrap().height()
    }

    /// Look up a committed block by height.
    pub fn get_block(&self, h: u64) -> Option<Block> {
        self.chain.lock().unwrap().get_block(h).cloned()
    }

    /// Snapshot of pending mempool transactions.
    pub fn mempool_snapshot(&self) -> Vec<Transaction> {
        self.mempool.lock().unwrap().snapshot()
    }

    /// Connectivity status of every configured peer.
    pub fn peers_status(&self) -> Vec<PeerStatus> {
        let connected = self.peers.connected_identities();
        self.validators
            .as_slice()
            .iter()
            .filter(|id| **id != self.self_id)
            .map(|id| PeerStatus {
                identity: id.clone(),
                connected: connected.contains(id),
            })
            .collect()
    }

    /// Deterministic leader for the next height.
    pub fn leader(&self) -> String {
        let next = self.height() + 1;
        self.validators.leader_for(next).to_string()
    }

    /// Whether this node is the leader for the next height.
    pub fn is_leader(&self) -> bool {
        self.leader() == self.self_id
    }

    // ---- lifecycle ----

    /// Start the listener, consensus tick loop, and outbound dialers.
    pub async fn start(self: &Arc<Self>) -> Result<(), NodeError> {
        let listener = TcpListener::bind(&self.config.listen_addr).await?;
        info!(addr = %self.config.listen_addr, node = %self.self_id, "node core listening");

        let accept_node = self.clone();
        tokio::spawn(async move {
            accept_node.accept_loop(listener).await;
        });

        for p in self.config.peers.clone() {
            let dial_node = self.clone();
            tokio::spawn(async move {
                dial_node.dial_loop(p.identity, p.addr).await;
            });
        }

        let tick_node = self.clone();
        tokio::spawn(async move {
            tick_node.tick_loop().await;
        });

        if self.config.heartbeat_enabled {
            let hb_node = self.clone();
            tokio::spawn(async move {
                hb_node.heartbeat_loop().await;
            });
        }

        Ok(())
    }

    /// Cooperative shutdown: stop the tick loop and listener, wait up to 5s.
    pub async fn stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        self.stop_notify.notify_waiters();
        sleep(Duration::from_secs(5)).await;
    }

    fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        loop {
            if self.is_stopping() {
                return;
            }
            tokio::select! {
                _ = self.stop_notify.notified() => return,
                accepted = listener.accept() => {
                    match accepted {
                        Ok((socket, addr)) => {
                            let node = self.clone();
                            tokio::spawn(async move { node.serve_connection(socket, addr).await; });
                        }
                        Err(e) => {
                            logevent::transient(EventContext::new("accept"), &e.to_string());
                        }
                    }
                }
            }
        }
    }

    async fn dial_loop(self: Arc<Self>, identity: String, addr: String) {
        let mut backoff = DialBackoff::default();
        loop {
            if self.is_stopping() {
                return;
            }
            match tokio::time::timeout(Duration::from_secs(5), TcpStream::connect(&addr)).await {
                Ok(Ok(socket)) => {
                    backoff.reset();
                    let peer_addr = addr.clone();
                    self.serve_outbound(socket, identity.clone(), peer_addr).await;
                }
                Ok(Err(e)) => {
                    logevent::transient(
                        EventContext::new("dial").peer(&identity),
                        &e.to_string(),
                    );
                }
                Err(_) => {
                    logevent::transient(EventContext::new("dial").peer(&identity), "dial timeout");
                }
            }
            let delay = backoff.next_delay();
            sleep(delay).await;
        }
    }

    async fn serve_outbound(self: &Arc<Self>, socket: TcpStream, identity: String, addr: String) {
        let (mut read_half, mut write_half) = socket.into_split();
        let queue = Arc::new(OutboundQueue::new(DEFAULT_QUEUE_CAPACITY));
        self.peers.register(&addr, queue.clone());
        self.metrics.peers_connected.set(self.peers.connected_count() as i64);

        let hello = Message::Hello(HelloBody {
            node_id: self.self_id.clone(),
            listening_port: 0,
            version: env!("CARGO_PKG_VERSION").to_string(),
        });
        queue.push(hello);

        let writer_stop = self.clone();
        let writer_queue = queue.clone();
        let writer = tokio::spawn(async move {
            loop {
                let msg = writer_queue.pop().await;
                if write_frame(&mut write_half, &msg).await.is_err() {
                    return;
                }
                if writer_stop.is_stopping() {
                    return;
                }
            }
        });

        loop {
            match read_frame(&mut read_half).await {
                Ok(msg) => self.dispatch(msg, &identity).await,
                Err(e) => {
                    self.on_frame_error(&e, &identity);
                    break;
                }
            }
            if self.is_stopping() {
                break;
            }
        }
        writer.abort();
        self.peers.remove(&addr);
        self.metrics.peers_connected.set(self.peers.connected_count() as i64);
    }

    async fn serve_connection(self: Arc<Self>, socket: TcpStream, addr: SocketAddr) {
        let addr = addr.to_string();
        let (mut read_half, mut write_half) = socket.into_split();
        let queue = Arc::new(OutboundQueue::new(DEFAULT_QUEUE_CAPACITY));
        self.peers.register(&addr, queue.clone());
        self.metrics.peers_connected.set(self.peers.connected_count() as i64);

        let writer_stop = self.clone();
        let writer_queue = queue.clone();
        let writer = tokio::spawn(async move {
            loop {
                let msg = writer_queue.pop().await;
                if write_frame(&mut write_half, &msg).await.is_err() {
                    return;
                }
                if writer_stop.is_stopping() {
                    return;
                }
            }
        });

        // The peer's identity isn't known until its first HELLO; until then,
        // attribute inbound messages to the connection's raw address.
        let mut from = addr.clone();
        loop {
            match read_frame(&mut read_half).await {
                Ok(Message::Hello(hello)) => {
                    from = hello.node_id.clone();
                    self.peers.note_address(&from, &addr);
                }
                Ok(msg) => self.dispatch(msg, &from).await,
                Err(e) => {
                    self.on_frame_error(&e, &from);
                    break;
                }
            }
            if self.is_stopping() {
                break;
            }
        }
        writer.abort();
        self.peers.remove(&addr);
        self.metrics.peers_connected.set(self.peers.connected_count() as i64);
    }

    fn on_frame_error(&self, e: &FrameError, peer: &str) {
        match e {
            FrameError::TooLarge(_) => self.metrics.frame_too_large_total.inc(),
            FrameError::Codec(_) => self.metrics.frame_invalid_total.inc(),
            FrameError::Io(_) => {}
        }
        logevent::transient(EventContext::new("frame").peer(peer), &e.to_string());
    }

    async fn tick_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.tick_interval);
        loop {
            tokio::select! {
                _ = self.stop_notify.notified() => return,
                _ = interval.tick() => {
                    if self.is_stopping() {
                        return;
                    }
                    self.consensus_tick().await;
                }
            }
        }
    }

    /// §4.7 step 2: call `ShouldPropose`; if true, build and broadcast a
    /// proposal, then route a self-ACK as if it came from this node.
    async fn consensus_tick(self: &Arc<Self>) {
        let now = Instant::now();
        let next_height = self.height() + 1;

        let should = {
            let consensus = self.consensus.lock().unwrap();
            consensus.should_propose(next_height, now)
        };
        if !should {
            let should_view_change = self.consensus.lock().unwrap().should_view_change(now);
            if should_view_change {
                warn!(height = next_height, node = %self.self_id, "proposal timeout elapsed; view change due (unimplemented)");
            }
            return;
        }

        let tip_hash = self.chain.lock().unwrap().tip().block_hash;
        let txs = {
            let mempool = self.mempool.lock().unwrap();
            mempool.take(self.config.max_txs)
        };

        let block = {
            let mut consensus = self.consensus.lock().unwrap();
            match consensus.create_proposal(next_height, now_unix(), tip_hash, &txs) {
                Ok(b) => b,
                Err(e) => {
                    logevent::fatal(EventContext::new("create_proposal").height(next_height), &e.to_string());
                    return;
                }
            }
        };

        info!(height = next_height, node = %self.self_id, txs = block.tx_list.len(), "proposing block");
        self.peers.broadcast(Message::Propose(ProposeBody::from(&block)));
        self.route_self_ack(next_height, block.block_hash).await;
    }

    /// §4.1/§6: periodic application-level liveness signal, gated by
    /// `heartbeat_enabled` since receive loops carry no read deadline.
    async fn heartbeat_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.heartbeat_interval);
        loop {
            tokio::select! {
                _ = self.stop_notify.notified() => return,
                _ = interval.tick() => {
                    if self.is_stopping() {
                        return;
                    }
                    let tip = self.chain.lock().unwrap().tip().block_hash;
                    self.peers.broadcast(Message::Heartbeat(HeartbeatBody {
                        node_id: self.self_id.clone(),
                        height: self.height(),
                        last_block_hash: tip,
                    }));
                }
            }
        }
    }

    async fn route_self_ack(self: &Arc<Self>, height: u64, block_hash: Hash256) {
        self.handle_ack(height, block_hash, self.self_id.clone()).await;
    }

    /// §4.7 step 3: dispatch on an inbound decoded message.
    async fn dispatch(self: &Arc<Self>, msg: Message, from: &str) {
        match msg {
            Message::Tx(tx) => self.handle_tx(tx).await,
            Message::Propose(body) => self.handle_propose(body, from).await,
            Message::Ack(body) => self.handle_ack(body.height, body.block_hash, body.voter_id).await,
            Message::Commit(body) => self.handle_commit(body).await,
            Message::Hello(hello) => {
                self.peers.note_address(&hello.node_id, from);
            }
            Message::Heartbeat(hb) => {
                self.peers.note_address(&hb.node_id, from);
            }
            other @ (Message::GetHeaders(_)
            | Message::Headers(_)
            | Message::GetBlocks(_)
            | Message::BlockMsg(_)) => handle_sync_message(&other),
            Message::ViewChange(body) => handle_view_change(&body),
        }
    }

    async fn handle_tx(self: &Arc<Self>, tx: Transaction) {
        let tx_id = tx.tx_id;
        match self.admit_and_gossip(tx) {
            Ok(()) => {}
            Err(SubmitError::AlreadySeen) => {
                // Already-seen TXs are silently dropped (no re-gossip).
            }
            Err(SubmitError::Invalid) => {
                logevent::validation(EventContext::new("tx").tx_id(tx_id), "invalid transaction");
            }
        }
    }

    async fn handle_propose(self: &Arc<Self>, body: ProposeBody, from: &str) {
        let height = body.height;
        let block: Block = body.into();
        let tip_hash = self.chain.lock().unwrap().tip().block_hash;

        let outcome = {
            let mut consensus = self.consensus.lock().unwrap();
            consensus.on_proposal(block.clone(), from, tip_hash)
        };

        match outcome {
            Ok(ProposalOutcome::Accepted) => {
                let ack = Message::Ack(AckBody {
                    height,
                    block_hash: block.block_hash,
                    voter_id: self.self_id.clone(),
                    signature: String::new(),
                });
                if let Err(e) = self.peers.send_to(&block.proposer_id, ack) {
                    logevent::transient(
                        EventContext::new("ack").height(height).peer(&block.proposer_id),
                        &e.to_string(),
                    );
                }
            }
            Ok(ProposalOutcome::AlreadyCached) => {}
            Err(ProposalError::Equivocation) => {
                logevent::validation(
                    EventContext::new("propose").height(height).peer(from),
                    "equivocating proposal dropped",
                );
            }
            Err(ProposalError::WrongHeight { expected, got }) if got > expected => {
                let gap = NeedSync {
                    height: got,
                    reason: NeedSyncReason::HeightJump,
                };
                logevent::sync_gap(
                    EventContext::new("propose").height(gap.height).peer(from),
                    gap.describe(),
                );
            }
            Err(e) => {
                logevent::validation(EventContext::new("propose").height(height).peer(from), &e.to_string());
            }
        }
    }

    async fn handle_ack(self: &Arc<Self>, height: u64, block_hash: Hash256, voter: String) {
        // Only meaningful when local is the proposer for that height.
        if !self.consensus.lock().unwrap().is_leader_for(height) {
            return;
        }
        self.metrics.consensus_acks_total.inc();

        let decision = {
            let mut consensus = self.consensus.lock().unwrap();
            consensus.on_ack(height, block_hash, &voter)
        };
        match decision {
            Ok(Some(commit)) => self.finalize_as_leader(commit.height, commit.block).await,
            Ok(None) => {}
            Err(e) => {
                logevent::validation(EventContext::new("ack").height(height).peer(&voter), &e.to_string());
            }
        }
    }

    async fn finalize_as_leader(self: &Arc<Self>, height: u64, block: Block) {
        let ids: Vec<Hash256> = block.tx_list.iter().map(|t| t.tx_id).collect();
        if !self.commit_block(block.clone(), height) {
            return;
        }
        {
            let mut mempool = self.mempool.lock().unwrap();
            mempool.remove_many(&ids);
            mempool.mark_seen(ids.iter().copied());
        }
        self.metrics.mempool_size.set(self.mempool.lock().unwrap().len() as i64);

        let commit_msg = Message::Commit(CommitBody {
            height,
            block_hash: block.block_hash,
            leader_id: self.self_id.clone(),
            block: ProposeBody::from(&block),
        });
        self.peers.broadcast(commit_msg);
    }

    async fn handle_commit(self: &Arc<Self>, body: CommitBody) {
        let height = body.height;
        let block_hash = body.block_hash;
        let outcome = self.consensus.lock().unwrap().on_commit(height, block_hash);
        match outcome {
            CommitOutcome::Finalize(block) => {
                let ids: Vec<Hash256> = block.tx_list.iter().map(|t| t.tx_id).collect();
                if self.commit_block(block, height) {
                    {
                        let mut mempool = self.mempool.lock().unwrap();
                        mempool.remove_many(&ids);
                        mempool.mark_seen(ids.iter().copied());
                    }
                    self.metrics.mempool_size.set(self.mempool.lock().unwrap().len() as i64);
                }
            }
            CommitOutcome::NeedSync => {
                let gap = NeedSync {
                    height,
                    reason: NeedSyncReason::CommitWithoutProposal,
                };
                logevent::sync_gap(
                    EventContext::new("commit").height(gap.height).block_hash(block_hash),
                    gap.describe(),
                );
            }
        }
    }

    /// Validate + persist `block`, then advance consensus. Returns whether
    /// the commit succeeded; a failure here is fatal for this height (§4.6).
    fn commit_block(&self, block: Block, height: u64) -> bool {
        let result = self.chain.lock().unwrap().add_block(block.clone(), &self.validators);
        match result {
            Ok(()) => {
                self.consensus.lock().unwrap().on_block_committed(&block, Instant::now());
                self.metrics.block_height.set(block.height as i64);
                self.metrics.consensus_commits_total.inc();
                info!(height = block.height, hash = %block.block_hash, "block committed");
                true
            }
            Err(e) => {
                logevent::fatal(EventContext::new("commit_block").height(height), &e.to_string());
                false
            }
        }
    }
}
