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

//! Catch-up sync and view-change flags.
//!
//! §9 leaves the concrete sync algorithm (pull vs. push, batch sizes,
//! fork-choice) and the view-change re-proposal/new-leader-recognition flow
//! as open questions: "do not guess intent — surface to operator". This
//! module ships exactly what spec.md requires and nothing more: the wire
//! types are declared in [`crate::core::types::Message`] and parsed by the
//! orchestrator's dispatch loop, but GETHEADERS/HEADERS/GETBLOCKS/BLOCK and
//! VIEWCHANGE have no handler algorithm here.

/// Reason a `need-sync` condition was raised.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NeedSyncReason {
    /// A COMMIT arrived for a height this node has no cached proposal for
    /// (it missed the PROPOSE).
    CommitWithoutProposal,
    /// A PROPOSE or COMMIT arrived for a height more than one ahead of the
    /// local tip.
    HeightJump,
}

/// A flagged catch-up requirement. The orchestrator emits this as a
/// structured log event (§7 "Sync gap") and otherwise takes no further
/// action — there is no sync subsystem wired up behind it yet.
#[derive(Clone, Debug)]
pub struct NeedSync {
    /// Height at which the gap was observed.
    pub height: u64,
    /// Why sync is needed.
    pub reason: NeedSyncReason,
}

impl NeedSync {
    /// Human-readable reason, for the structured log line's `reason` field.
    pub fn describe(&self) -> &'static str {
        match self.reason {
            NeedSyncReason::CommitWithoutProposal => "commit for unknown proposal",
            NeedSyncReason::HeightJump => "proposal height jumps ahead of the local tip",
        }
    }
}

/// TODO: implement the pull-based catch-up algorithm once the sync
/// subsystem's batch size and fork-choice tie-break are decided (§9).
/// Declared so the orchestrator's GETHEADERS/HEADERS/GETBLOCKS/BLOCK
/// dispatch arms have somewhere to route to; presently a no-op.
pub fn handle_sync_message(_msg: &crate::core::types::Message) {}

/// TODO: implement the view-change flow (timeout duration already lives in
/// [`crate::core::consensus::engine::ConsensusParams::proposal_timeout`],
/// but re-proposal and new-leader recognition are undecided, §9). Presently
/// a no-op: `ShouldViewChange` becoming true produces no protocol action
/// beyond what S3 asserts ("no progress").
pub fn handle_view_change(_msg: &crate::core::types::ViewChangeBody) {}
