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

//! Deterministic core types, canonical encoding, and wire messages.

use bincode::Options;
use ring::digest;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

/// Canonical serialization error.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Failed to serialize a value with the canonical encoder.
    #[error("serialization")]
    Serialize,
    /// Failed to deserialize bytes with the canonical decoder.
    #[error("deserialization")]
    Deserialize,
    /// Payload exceeded the configured size cap.
    #[error("size limit exceeded")]
    TooLarge,
}

/// Canonical bincode options: fixed-width integers, no trailing bytes.
///
/// Used for both wire frames and hash preimages so two nodes hashing the
/// same structure always produce identical bytes.
fn bincode_opts() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// Encode with the canonical, deterministic rules.
pub fn encode_canonical<T: Serialize>(v: &T) -> Result<Vec<u8>, CodecError> {
    bincode_opts()
        .serialize(v)
        .map_err(|_| CodecError::Serialize)
}

/// Decode with a hard size cap, matching the framed-transport limit.
pub fn decode_canonical_limited<T: DeserializeOwned>(
    bytes: &[u8],
    max: usize,
) -> Result<T, CodecError> {
    if bytes.len() > max {
        return Err(CodecError::TooLarge);
    }
    bincode_opts()
        .with_limit(max as u64)
        .deserialize(bytes)
        .map_err(|_| CodecError::Deserialize)
}

/// SHA-256 of the canonical encoding of `v`, as lowercase hex.
pub fn hash_canonical<T: Serialize>(v: &T) -> Result<Hash256, CodecError> {
    let bytes = encode_canonical(v)?;
    Ok(Hash256::digest(&bytes))
}

/// 256-bit hash, rendered as 64 lowercase hex characters on the wire.
#[derive(Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct Hash256([u8; 32]);

impl Hash256 {
    /// The all-zero hash used as genesis's `prev_hash`.
    pub const ZERO: Hash256 = Hash256([0u8; 32]);

    /// SHA-256 digest of `bytes`.
    pub fn digest(bytes: &[u8]) -> Self {
        let out = digest::digest(&digest::SHA256, bytes);
        let mut buf = [0u8; 32];
        buf.copy_from_slice(out.as_ref());
        Hash256(buf)
    }

    /// Lowercase hex representation (64 chars).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 64-char lowercase hex string.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        if bytes.len() != 32 {
            return None;
        }
        let mut buf = [0u8; 32];
        buf.copy_from_slice(&bytes);
        Some(Hash256(buf))
    }
}

impl std::fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Fixed-precision value transfer amount, carried as integer subunits.
///
/// §9 flags the source's floating-point `amount` as a mandatory correction:
/// float hashing is not deterministic across platforms, so `tx_id` must be
/// computed over an integer representation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Amount(pub u64);

impl Amount {
    /// Construct from a whole-subunit integer amount.
    pub fn from_subunits(v: u64) -> Self {
        Amount(v)
    }

    /// Raw subunit value.
    pub fn subunits(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A signed value-transfer transaction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    /// Sender identifier string.
    pub sender: String,
    /// Recipient identifier string.
    pub recipient: String,
    /// Non-negative fixed-precision amount.
    pub amount: Amount,
    /// Unix seconds timestamp (submitter-supplied).
    pub timestamp: f64,
    /// Lowercase hex SHA-256 over the canonical encoding of the first four fields.
    pub tx_id: Hash256,
}

/// The first four fields of a `Transaction`, used as the `tx_id` preimage.
#[derive(Serialize)]
struct TxPreimage<'a> {
    sender: &'a str,
    recipient: &'a str,
    amount: Amount,
    timestamp: OrderedFloat,
}

/// A float wrapper with a canonical bit-pattern encoding for hashing.
///
/// `f64` does not implement `Serialize` deterministically across NaN
/// encodings; transaction timestamps are never NaN/inf in practice, so we
/// hash the raw bits, which is deterministic and platform-independent for
/// the finite values this protocol produces.
#[derive(Clone, Copy, Serialize)]
struct OrderedFloat(u64);

impl From<f64> for OrderedFloat {
    fn from(v: f64) -> Self {
        OrderedFloat(v.to_bits())
    }
}

impl Transaction {
    /// Compute `tx_id` from `(sender, recipient, amount, timestamp)`.
    pub fn compute_tx_id(
        sender: &str,
        recipient: &str,
        amount: Amount,
        timestamp: f64,
    ) -> Result<Hash256, CodecError> {
        hash_canonical(&TxPreimage {
            sender,
            recipient,
            amount,
            timestamp: timestamp.into(),
        })
    }

    /// Build a new transaction, computing its `tx_id`.
    pub fn new(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: Amount,
        timestamp: f64,
    ) -> Result<Self, CodecError> {
        let sender = sender.into();
        let recipient = recipient.into();
        let tx_id = Self::compute_tx_id(&sender, &recipient, amount, timestamp)?;
        Ok(Transaction {
            sender,
            recipient,
            amount,
            timestamp,
            tx_id,
        })
    }

    /// Validate structural fields and recompute `tx_id`, returning whether it matches.
    pub fn is_valid(&self) -> bool {
        if self.sender.is_empty() || self.recipient.is_empty() {
            return false;
        }
        match Self::compute_tx_id(&self.sender, &self.recipient, self.amount, self.timestamp) {
            Ok(id) => id == self.tx_id,
            Err(_) => false,
        }
    }
}

/// A committed or proposed block.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    /// Height, 0 for genesis.
    pub height: u64,
    /// Hash of the preceding block.
    pub prev_hash: Hash256,
    /// Unix seconds timestamp.
    pub timestamp: f64,
    /// Ordered transactions included in this block.
    pub tx_list: Vec<Transaction>,
    /// Identifier of the validator that proposed this block.
    pub proposer_id: String,
    /// SHA-256 over the canonical encoding of the header fields below.
    pub block_hash: Hash256,
}

/// The preimage used to hash a block: header fields plus the ordered tx_ids.
#[derive(Serialize)]
struct BlockPreimage<'a> {
    height: u64,
    prev_hash: Hash256,
    tx_ids: Vec<Hash256>,
    timestamp: OrderedFloat,
    proposer_id: &'a str,
}

impl Block {
    /// Compute `block_hash` over `(height, prev_hash, concat(tx_ids), timestamp, proposer_id)`.
    pub fn compute_hash(
        height: u64,
        prev_hash: Hash256,
        tx_list: &[Transaction],
        timestamp: f64,
        proposer_id: &str,
    ) -> Result<Hash256, CodecError> {
        hash_canonical(&BlockPreimage {
            height,
            prev_hash,
            tx_ids: tx_list.iter().map(|t| t.tx_id).collect(),
            timestamp: timestamp.into(),
            proposer_id,
        })
    }

    /// Build a block, computing its `block_hash`.
    pub fn new(
        height: u64,
        prev_hash: Hash256,
        timestamp: f64,
        tx_list: Vec<Transaction>,
        proposer_id: impl Into<String>,
    ) -> Result<Self, CodecError> {
        let proposer_id = proposer_id.into();
        let block_hash = Self::compute_hash(height, prev_hash, &tx_list, timestamp, &proposer_id)?;
        Ok(Block {
            height,
            prev_hash,
            timestamp,
            tx_list,
            proposer_id,
            block_hash,
        })
    }

    /// Recompute `block_hash` from the stored fields and compare.
    pub fn hash_is_valid(&self) -> bool {
        match Self::compute_hash(
            self.height,
            self.prev_hash,
            &self.tx_list,
            self.timestamp,
            &self.proposer_id,
        ) {
            Ok(h) => h == self.block_hash,
            Err(_) => false,
        }
    }
}

/// The deterministic genesis block every node constructs identically.
pub fn genesis() -> Block {
    Block::new(0, Hash256::ZERO, 0.0, Vec::new(), "genesis")
        .expect("genesis encoding never fails")
}

/// A wire-level protocol message. Tagged union, one variant per §6 `type`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Message {
    /// A gossiped transaction.
    Tx(Transaction),
    /// A leader's block proposal.
    Propose(ProposeBody),
    /// A follower's vote for a proposal.
    Ack(AckBody),
    /// The leader's finality announcement.
    Commit(CommitBody),
    /// Peer introduction on connect.
    Hello(HelloBody),
    /// Periodic liveness signal.
    Heartbeat(HeartbeatBody),
    /// Request for block headers starting at a height (sync, unimplemented handler).
    GetHeaders(GetHeadersBody),
    /// Block headers response (sync, unimplemented handler).
    Headers(HeadersBody),
    /// Request for full blocks (sync, unimplemented handler).
    GetBlocks(GetBlocksBody),
    /// Full block payload (sync, unimplemented handler).
    BlockMsg(BlockMsgBody),
    /// View-change announcement (view-change handler is an open item, §9).
    ViewChange(ViewChangeBody),
}

/// `PROPOSE` payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProposeBody {
    /// Target height.
    pub height: u64,
    /// Parent block hash.
    pub prev_hash: Hash256,
    /// Proposal timestamp.
    pub timestamp: f64,
    /// Proposing validator's identifier.
    pub proposer_id: String,
    /// Recomputable block hash.
    pub block_hash: Hash256,
    /// Transactions included in the proposal.
    pub tx_list: Vec<Transaction>,
}

impl From<&Block> for ProposeBody {
    fn from(b: &Block) -> Self {
        ProposeBody {
            height: b.height,
            prev_hash: b.prev_hash,
            timestamp: b.timestamp,
            proposer_id: b.proposer_id.clone(),
            block_hash: b.block_hash,
            tx_list: b.tx_list.clone(),
        }
    }
}

impl From<ProposeBody> for Block {
    fn from(p: ProposeBody) -> Self {
        Block {
            height: p.height,
            prev_hash: p.prev_hash,
            timestamp: p.timestamp,
            tx_list: p.tx_list,
            proposer_id: p.proposer_id,
            block_hash: p.block_hash,
        }
    }
}

/// `ACK` payload. `signature` is reserved; always empty in this prototype (§9).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AckBody {
    /// Height being acknowledged.
    pub height: u64,
    /// Block hash being acknowledged.
    pub block_hash: Hash256,
    /// Acknowledging validator's identifier.
    pub voter_id: String,
    /// Reserved signature field, empty in this prototype.
    #[serde(default)]
    pub signature: String,
}

/// `COMMIT` payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommitBody {
    /// Committed height.
    pub height: u64,
    /// Committed block hash.
    pub block_hash: Hash256,
    /// Identifier of the leader that committed.
    pub leader_id: String,
    /// The full committed block body.
    pub block: ProposeBody,
}

/// `HELLO` payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HelloBody {
    /// Sender's node identifier.
    pub node_id: String,
    /// Sender's advertised listening port.
    pub listening_port: u16,
    /// Protocol version string.
    pub version: String,
}

/// `HEARTBEAT` payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HeartbeatBody {
    /// Sender's node identifier.
    pub node_id: String,
    /// Sender's current chain height.
    pub height: u64,
    /// Sender's current tip block hash.
    pub last_block_hash: Hash256,
}

/// `GETHEADERS` payload (sync, handler unimplemented — §9 open question).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetHeadersBody {
    /// Height to start from.
    pub from_height: u64,
}

/// `HEADERS` payload (sync, handler unimplemented — §9 open question).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HeadersBody {
    /// Header-only block summaries.
    pub headers: Vec<BlockHeader>,
}

/// A block with its body stripped, for header-only sync exchanges.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Height.
    pub height: u64,
    /// Parent hash.
    pub prev_hash: Hash256,
    /// Block hash.
    pub block_hash: Hash256,
    /// Proposer identifier.
    pub proposer_id: String,
}

/// `GETBLOCKS` payload (sync, handler unimplemented — §9 open question).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetBlocksBody {
    /// Heights requested.
    pub heights: Vec<u64>,
}

/// `BLOCK` payload (sync, handler unimplemented — §9 open question).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockMsgBody {
    /// The full block.
    pub block: ProposeBody,
}

/// `VIEWCHANGE` payload (handler unimplemented — §9 open question).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ViewChangeBody {
    /// Height the view change targets.
    pub height: u64,
    /// Identifier of the validator proposing the view change.
    pub proposer_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_id_is_pure_function_of_first_four_fields() {
        let a = Transaction::new("alice", "bob", Amount::from_subunits(1000), 1.0).unwrap();
        let b = Transaction::new("alice", "bob", Amount::from_subunits(1000), 1.0).unwrap();
        assert_eq!(a.tx_id, b.tx_id);
        assert!(a.is_valid());
    }

    #[test]
    fn tx_id_changes_with_any_field() {
        let a = Transaction::new("alice", "bob", Amount::from_subunits(1000), 1.0).unwrap();
        let b = Transaction::new("alice", "bob", Amount::from_subunits(1001), 1.0).unwrap();
        assert_ne!(a.tx_id, b.tx_id);
    }

    #[test]
    fn genesis_is_deterministic() {
        let g1 = genesis();
        let g2 = genesis();
        assert_eq!(g1.block_hash, g2.block_hash);
        assert_eq!(g1.height, 0);
        assert_eq!(g1.prev_hash, Hash256::ZERO);
        assert_eq!(g1.proposer_id, "genesis");
        assert!(g1.tx_list.is_empty());
    }

    #[test]
    fn block_hash_roundtrips() {
        let tx = Transaction::new("alice", "bob", Amount::from_subunits(10), 1.0).unwrap();
        let b = Block::new(1, genesis().block_hash, 1.5, vec![tx], "B").unwrap();
        assert!(b.hash_is_valid());
        let mut tampered = b.clone();
        tampered.timestamp = 2.0;
        assert!(!tampered.hash_is_valid());
    }

    #[test]
    fn canonical_codec_roundtrips_message() {
        let tx = Transaction::new("alice", "bob", Amount::from_subunits(10), 1.0).unwrap();
        let msg = Message::Tx(tx.clone());
        let bytes = encode_canonical(&msg).unwrap();
        let decoded: Message = decode_canonical_limited(&bytes, 16 * 1024 * 1024).unwrap();
        match decoded {
            Message::Tx(t) => assert_eq!(t.tx_id, tx.tx_id),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn decode_rejects_oversized_payload() {
        let bytes = vec![0u8; 100];
        let res: Result<Message, _> = decode_canonical_limited(&bytes, 10);
        assert!(matches!(res, Err(CodecError::TooLarge)));
    }

    #[test]
    fn hash_hex_roundtrips() {
        let h = Hash256::digest(b"hello");
        let hex = h.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(Hash256::from_hex(&hex).unwrap(), h);
    }
}
