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

//! MiniChain node core: a permissioned replicated ledger.
//!
//! A fixed set of validator processes cooperatively maintain an
//! append-only sequence of blocks ordering signed value-transfer
//! transactions. This crate provides:
//! - Deterministic types and canonical encoding (`core::types`)
//! - A deduplicated mempool with gossip-suppression history (`core::mempool`)
//! - A durably-persisted, crash-safe chain store (`core::chain`)
//! - Round-robin Proof-of-Authority consensus (`core::consensus`)
//! - Length-prefixed framed transport and a peer registry (`networking`)
//! - The node orchestrator gluing the above into one event loop (`node`)
//! - Prometheus metrics and structured log helpers (`monitoring`)

/// Core protocol primitives: types, mempool, chain store, consensus.
pub mod core;
/// Observability: metrics and structured logging helpers.
pub mod monitoring;
/// Framed transport and the peer registry.
pub mod networking;
/// The node orchestrator and its configuration.
pub mod node;
