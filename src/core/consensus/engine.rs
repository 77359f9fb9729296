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

//! Round-robin leader selection, proposal construction, ACK tally, and
//! commit decisions. The heart of the node core (§4.6).

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::core::types::{Block, Hash256};
use crate::core::validator_set::ValidatorSet;

/// Tunable consensus parameters, injected by configuration.
#[derive(Clone, Debug)]
pub struct ConsensusParams {
    /// Minimum time between consensus ticks producing a proposal at the leader.
    pub block_interval: Duration,
    /// How long a leader has to reach quorum before a view change is due.
    pub proposal_timeout: Duration,
    /// Minimum distinct ACKs required to commit. Defaults to simple majority.
    pub quorum_size: usize,
    /// Maximum transactions a leader may include in one proposal.
    pub max_txs: usize,
}

impl ConsensusParams {
    /// Defaults derived from the validator set: simple-majority quorum.
    pub fn with_default_quorum(validators: &ValidatorSet) -> Self {
        ConsensusParams {
            block_interval: Duration::from_secs(1),
            proposal_timeout: Duration::from_secs(10),
            quorum_size: validators.default_quorum(),
            max_txs: 500,
        }
    }
}

/// Per-height consensus state, derived from the engine's internal bookkeeping.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HeightState {
    /// No proposal cached yet for this height.
    Idle,
    /// Local node is the leader and has broadcast a proposal, tally not yet at quorum.
    Proposed,
    /// Local node is a follower that validated a proposal and sent its ACK.
    Acked,
    /// Local node is the leader, quorum reached, broadcasting COMMIT.
    Committing,
    /// The block at this height has been applied locally.
    Committed,
}

/// Why a proposal was rejected (§4.6 `OnProposal` (i)-(v), plus equivocation).
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ProposalError {
    /// (i) `block.height != current_height + 1`.
    #[error("wrong height: expected {expected}, got {got}")]
    WrongHeight {
        /// Expected height.
        expected: u64,
        /// Height actually supplied.
        got: u64,
    },
    /// (ii) `prev_hash` does not match the chain tip.
    #[error("prev_hash does not match tip")]
    PrevHashMismatch,
    /// (iii) `proposer_id` is not the deterministic leader for this height, or
    /// does not match the sender.
    #[error("proposer is not the leader for this height")]
    WrongProposer,
    /// (iv) Recomputed `block_hash` does not match.
    #[error("block hash mismatch")]
    HashMismatch,
    /// (v) An embedded transaction failed structural validation.
    #[error("invalid embedded transaction")]
    InvalidTransaction,
    /// A second, differently-hashed proposal arrived from the legitimate
    /// leader for a height already cached; the first proposal wins.
    #[error("equivocating proposal dropped")]
    Equivocation,
}

/// Outcome of a successful `on_proposal` call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProposalOutcome {
    /// Freshly cached; the caller should send an ACK.
    Accepted,
    /// Identical to the already-cached proposal; no new ACK should be sent.
    AlreadyCached,
}

/// Why an ACK was ignored.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum AckError {
    /// Voter is not a member of the validator set.
    #[error("voter is not a validator")]
    NotValidator,
    /// No pending proposal at this height, or the ACK doesn't match it.
    #[error("ack does not match the pending proposal")]
    Mismatch,
    /// This height has already reached quorum and started committing.
    #[error("height already committing")]
    AlreadyCommitting,
}

/// A quorum has been reached; the leader should finalize this block.
#[derive(Clone, Debug)]
pub struct CommitDecision {
    /// Height that reached quorum.
    pub height: u64,
    /// The block to finalize and broadcast as COMMIT.
    pub block: Block,
}

/// Outcome of `on_commit`.
#[derive(Clone, Debug)]
pub enum CommitOutcome {
    /// The cached proposal matches; finalize this block.
    Finalize(Block),
    /// No matching cached proposal — this node missed the PROPOSE and needs
    /// to catch up via the sync collaborator (§9 open question).
    NeedSync,
}

/// The round-robin PoA consensus state machine, one instance per node.
pub struct ConsensusEngine {
    validators: ValidatorSet,
    self_id: String,
    current_height: u64,
    last_block_time: Instant,
    pending_proposal: Option<Block>,
    ack_voters: HashMap<u64, HashSet<String>>,
    committing: HashSet<u64>,
    params: ConsensusParams,
}

impl ConsensusEngine {
    /// Construct a fresh engine, mirroring the chain tip's height.
    pub fn new(validators: ValidatorSet, self_id: impl Into<String>, tip_height: u64, params: ConsensusParams) -> Self {
        ConsensusEngine {
            validators,
            self_id: self_id.into(),
            current_height: tip_height,
            last_block_time: Instant::now(),
            pending_proposal: None,
            ack_voters: HashMap::new(),
            committing: HashSet::new(),
            params,
        }
    }

    /// The deterministic leader for height `h`.
    pub fn leader_for(&self, h: u64) -> &str {
        self.validators.leader_for(h)
    }

    /// Current committed height this engine is tracking.
    pub fn current_height(&self) -> u64 {
        self.current_height
    }

    /// Whether `self_id` is the leader for `h`.
    pub fn is_leader_for(&self, h: u64) -> bool {
        self.leader_for(h) == self.self_id
    }

    /// The validator set this engine was constructed with.
    pub fn validators(&self) -> &ValidatorSet {
        &self.validators
    }

    /// The cached proposal at `current_height + 1`, if any.
    pub fn pending_proposal(&self) -> Option<&Block> {
        self.pending_proposal.as_ref()
    }

    /// Derive the per-height state machine position for `h`.
    pub fn state_at(&self, h: u64) -> HeightState {
        if h <= self.current_height {
            return HeightState::Committed;
        }
        if self.committing.contains(&h) {
            return HeightState::Committing;
        }
        match &self.pending_proposal {
            Some(b) if b.height == h => {
                if self.is_leader_for(h) {
                    HeightState::Proposed
                } else {
                    HeightState::Acked
                }
            }
            _ => HeightState::Idle,
        }
    }

    /// §4.6 `ShouldPropose`.
    pub fn should_propose(&self, h: u64, now: Instant) -> bool {
        self.is_leader_for(h)
            && h == self.current_height + 1
            && now.saturating_duration_since(self.last_block_time) >= self.params.block_interval
            && !self.committing.contains(&h)
            && !matches!(&self.pending_proposal, Some(b) if b.height == h)
    }

    /// §4.6 `CreateProposal`: assemble up to `max_txs` from `mempool_txs` in
    /// insertion order, fill the header from the chain tip, cache as pending.
    pub fn create_proposal(
        &mut self,
        h: u64,
        now_unix: f64,
        tip_hash: Hash256,
        mempool_txs: &[crate::core::types::Transaction],
    ) -> Result<Block, crate::core::types::CodecError> {
        let tx_list: Vec<_> = mempool_txs.iter().take(self.params.max_txs).cloned().collect();
        let block = Block::new(h, tip_hash, now_unix, tx_list, self.self_id.clone())?;
        self.pending_proposal = Some(block.clone());
        Ok(block)
    }

    /// §4.6 `OnProposal`: validate against current tip and the deterministic leader.
    pub fn on_proposal(
        &mut self,
        block: Block,
        from: &str,
        tip_hash: Hash256,
    ) -> Result<ProposalOutcome, ProposalError> {
        let expected_height = self.current_height + 1;
        if block.height != expected_height {
            return Err(ProposalError::WrongHeight {
                expected: expected_height,
                got: block.height,
            });
        }
        if block.prev_hash != tip_hash {
            return Err(ProposalError::PrevHashMismatch);
        }
        let leader = self.leader_for(block.height);
        if block.proposer_id != leader || from != leader {
            return Err(ProposalError::WrongProposer);
        }
        if !block.hash_is_valid() {
            return Err(ProposalError::HashMismatch);
        }
        if !block.tx_list.iter().all(|t| t.is_valid()) {
            return Err(ProposalError::InvalidTransaction);
        }

        if let Some(existing) = &self.pending_proposal {
            if existing.height == block.height {
                return if existing.block_hash == block.block_hash {
                    Ok(ProposalOutcome::AlreadyCached)
                } else {
                    Err(ProposalError::Equivocation)
                };
            }
        }

        self.pending_proposal = Some(block);
        Ok(ProposalOutcome::Accepted)
    }

    /// §4.6 `OnAck`: meaningful only when `self_id` is the proposer.
    pub fn on_ack(
        &mut self,
        height: u64,
        block_hash: Hash256,
        voter: &str,
    ) -> Result<Option<CommitDecision>, AckError> {
        if !self.validators.contains(voter) {
            return Err(AckError::NotValidator);
        }
        if self.committing.contains(&height) {
            return Err(AckError::AlreadyCommitting);
        }
        let matches_pending = matches!(
            &self.pending_proposal,
            Some(p) if p.height == height && p.block_hash == block_hash
        );
        if !matches_pending {
            return Err(AckError::Mismatch);
        }

        let voters = self.ack_voters.entry(height).or_default();
        voters.insert(self.self_id.clone());
        voters.insert(voter.to_string());

        if voters.len() >= self.params.quorum_size && !self.committing.contains(&height) {
            self.committing.insert(height);
            let block = self.pending_proposal.clone().expect("checked above");
            return Ok(Some(CommitDecision { height, block }));
        }
        Ok(None)
    }

    /// §4.6 `OnCommit`.
    pub fn on_commit(&self, height: u64, block_hash: Hash256) -> CommitOutcome {
        match &self.pending_proposal {
            Some(p) if p.height == height && p.block_hash == block_hash => {
                CommitOutcome::Finalize(p.clone())
            }
            _ => CommitOutcome::NeedSync,
        }
    }

    /// §4.6 `OnBlockCommitted`: advance height, clear per-height bookkeeping.
    pub fn on_block_committed(&mut self, block: &Block, now: Instant) {
        self.current_height = block.height;
        self.last_block_time = now;
        self.pending_proposal = None;
        self.ack_voters.remove(&block.height);
        self.committing.remove(&block.height);
    }

    /// §4.6 `ShouldViewChange`. Hook only — the view-change flow (new-leader
    /// re-proposal, follower recognition) is an explicit open question (§9);
    /// this predicate is wired up but nothing currently acts on `true`.
    pub fn should_view_change(&self, now: Instant) -> bool {
        let next = self.current_height + 1;
        self.is_leader_for(next)
            && now.saturating_duration_since(self.last_block_time) > self.params.proposal_timeout
            && !matches!(&self.pending_proposal, Some(b) if b.height == next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{genesis, Amount, Transaction};

    fn engine(self_id: &str) -> ConsensusEngine {
        let v = ValidatorSet::new("A", vec!["B".to_string(), "C".to_string()]);
        let params = ConsensusParams::with_default_quorum(&v);
        ConsensusEngine::new(v, self_id, 0, params)
    }

    #[test]
    fn should_propose_true_only_for_leader_at_next_height() {
        let a = engine("A");
        let leader = a.leader_for(1).to_string();
        let e = engine(&leader);
        assert!(e.should_propose(1, Instant::now() + Duration::from_secs(2)));
        assert!(!a.should_propose(1, Instant::now() + Duration::from_secs(2)) || leader == "A");
    }

    #[test]
    fn quorum_boundary_commits_exactly_once() {
        let v = ValidatorSet::new("A", vec!["B".to_string(), "C".to_string()]);
        let leader = v.leader_for(1).to_string();
        let params = ConsensusParams::with_default_quorum(&v);
        let mut e = ConsensusEngine::new(v.clone(), leader.clone(), 0, params);

        let tx = Transaction::new("alice", "bob", Amount::from_subunits(10), 1.0).unwrap();
        let block = e
            .create_proposal(1, 1.0, genesis().block_hash, &[tx])
            .unwrap();

        let others: Vec<_> = v.as_slice().iter().filter(|id| **id != leader).cloned().collect();
        let d1 = e.on_ack(1, block.block_hash, &others[0]).unwrap();
        assert!(d1.is_none());
        let d2 = e.on_ack(1, block.block_hash, &others[1]).unwrap();
        assert!(d2.is_some());

        // A third ACK at quorum+1 is a no-op (AlreadyCommitting).
        let err = e.on_ack(1, block.block_hash, &others[0]).unwrap_err();
        assert_eq!(err, AckError::AlreadyCommitting);
    }

    #[test]
    fn wrong_proposer_is_rejected() {
        let v = ValidatorSet::new("A", vec!["B".to_string(), "C".to_string()]);
        let params = ConsensusParams::with_default_quorum(&v);
        let leader = v.leader_for(1).to_string();
        let not_leader = v.as_slice().iter().find(|id| **id != leader).unwrap().clone();
        let mut e = ConsensusEngine::new(v, not_leader.clone(), 0, params);

        let forged = Block::new(1, genesis().block_hash, 1.0, vec![], not_leader.clone()).unwrap();
        let err = e.on_proposal(forged, &not_leader, genesis().block_hash).unwrap_err();
        assert_eq!(err, ProposalError::WrongProposer);
        assert!(e.pending_proposal().is_none());
    }

    #[test]
    fn equivocating_second_proposal_is_dropped() {
        let v = ValidatorSet::new("A", vec!["B".to_string(), "C".to_string()]);
        let leader = v.leader_for(1).to_string();
        let params = ConsensusParams::with_default_quorum(&v);
        let follower = v.as_slice().iter().find(|id| **id != leader).unwrap().clone();
        let mut e = ConsensusEngine::new(v, follower, 0, params);

        let b1 = Block::new(1, genesis().block_hash, 1.0, vec![], leader.clone()).unwrap();
        let outcome = e.on_proposal(b1.clone(), &leader, genesis().block_hash).unwrap();
        assert_eq!(outcome, ProposalOutcome::Accepted);

        let b2 = Block::new(1, genesis().block_hash, 2.0, vec![], leader.clone()).unwrap();
        let err = e.on_proposal(b2, &leader, genesis().block_hash).unwrap_err();
        assert_eq!(err, ProposalError::Equivocation);
        assert_eq!(e.pending_proposal().unwrap().block_hash, b1.block_hash);
    }

    #[test]
    fn on_block_committed_clears_per_height_state() {
        let v = ValidatorSet::new("A", vec!["B".to_string(), "C".to_string()]);
        let leader = v.leader_for(1).to_string();
        let params = ConsensusParams::with_default_quorum(&v);
        let mut e = ConsensusEngine::new(v, leader, 0, params);
        let block = e.create_proposal(1, 1.0, genesis().block_hash, &[]).unwrap();
        e.on_block_committed(&block, Instant::now());
        assert_eq!(e.current_height(), 1);
        assert!(e.pending_proposal().is_none());
        assert_eq!(e.state_at(1), HeightState::Committed);
    }
}
