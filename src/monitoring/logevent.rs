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

//! Canonical structured-log field set (§7): one function per error
//! taxonomy class, so the orchestrator never hand-rolls `tracing` field
//! lists with inconsistent shapes across call sites.

use tracing::{error, warn};

/// One dispatch decision the orchestrator logs, identifying `event` (the
/// message/operation kind) plus optional context fields.
pub struct EventContext<'a> {
    /// Stable event name, e.g. `"tx"`, `"propose"`, `"ack"`, `"commit"`.
    pub event: &'a str,
    /// Height the event concerns, if any.
    pub height: Option<u64>,
    /// Remote peer identifier the event concerns, if any.
    pub peer: Option<&'a str>,
    /// `tx_id` as hex, if this event concerns a transaction.
    pub tx_id: Option<String>,
    /// `block_hash` as hex, if this event concerns a block.
    pub block_hash: Option<String>,
}

impl<'a> EventContext<'a> {
    /// A bare event with no extra context.
    pub fn new(event: &'a str) -> Self {
        EventContext {
            event,
            height: None,
            peer: None,
            tx_id: None,
            block_hash: None,
        }
    }

    /// Attach a height.
    pub fn height(mut self, h: u64) -> Self {
        self.height = Some(h);
        self
    }

    /// Attach a peer identifier.
    pub fn peer(mut self, p: &'a str) -> Self {
        self.peer = Some(p);
        self
    }

    /// Attach a `tx_id`.
    pub fn tx_id(mut self, id: impl ToString) -> Self {
        self.tx_id = Some(id.to_string());
        self
    }

    /// Attach a `block_hash`.
    pub fn block_hash(mut self, h: impl ToString) -> Self {
        self.block_hash = Some(h.to_string());
        self
    }
}

/// Validation failure: recoverable, local. Dropped silently beyond this
/// warning; never propagated to the peer other than not-ACKing (§7).
pub fn validation(ctx: EventContext<'_>, reason: &str) {
    warn!(
        event = ctx.event,
        height = ctx.height,
        peer = ctx.peer,
        tx_id = ctx.tx_id.as_deref(),
        block_hash = ctx.block_hash.as_deref(),
        reason,
        "validation failure"
    );
}

/// Transient I/O failure: connection reset, dial failure, short write.
/// Action taken by the caller: close the connection, mark peer down,
/// schedule reconnect with backoff.
pub fn transient(ctx: EventContext<'_>, reason: &str) {
    warn!(
        event = ctx.event,
        height = ctx.height,
        peer = ctx.peer,
        tx_id = ctx.tx_id.as_deref(),
        block_hash = ctx.block_hash.as_deref(),
        reason,
        "transient I/O error"
    );
}

/// Sync gap: a COMMIT for an unknown proposal, or a height jump. Flagged for
/// the sync collaborator; does not stall the main loop.
pub fn sync_gap(ctx: EventContext<'_>, reason: &str) {
    warn!(
        event = ctx.event,
        height = ctx.height,
        peer = ctx.peer,
        tx_id = ctx.tx_id.as_deref(),
        block_hash = ctx.block_hash.as_deref(),
        reason,
        need_sync = true,
        "sync gap"
    );
}

/// Fatal: persistence failure after fsync, genesis mismatch, validator
/// identity collision. Caller stops the consensus tick, keeps read
/// accessors alive, and exits the process after a short drain.
pub fn fatal(ctx: EventContext<'_>, reason: &str) {
    error!(
        event = ctx.event,
        height = ctx.height,
        peer = ctx.peer,
        tx_id = ctx.tx_id.as_deref(),
        block_hash = ctx.block_hash.as_deref(),
        reason,
        "fatal error"
    );
}
