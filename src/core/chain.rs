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

//! Ordered, durably-persisted sequence of committed blocks.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{genesis, Block};
use crate::core::validator_set::ValidatorSet;

/// Chain store errors.
#[derive(Debug, Error)]
pub enum ChainError {
    /// `height` did not extend the tip at `tip_height + 1`.
    #[error("height mismatch: expected {expected}, got {got}")]
    HeightMismatch {
        /// Expected next height.
        expected: u64,
        /// Height actually supplied.
        got: u64,
    },
    /// `prev_hash` did not match the current tip's `block_hash`.
    #[error("prev_hash does not match tip")]
    PrevHashMismatch,
    /// `proposer_id` did not match the deterministic leader for this height.
    #[error("proposer {got} is not the leader for height {height}")]
    WrongProposer {
        /// Height being validated.
        height: u64,
        /// Proposer id actually supplied.
        got: String,
    },
    /// The stored/recomputed `block_hash` did not match.
    #[error("block hash mismatch")]
    HashMismatch,
    /// A block already exists at the current tip height (idempotence boundary, R2).
    #[error("already at height {0}")]
    AlreadyAtHeight(u64),
    /// On-disk genesis does not match the deterministic genesis this node expects.
    #[error("genesis hash mismatch: expected {expected}, found {found}")]
    GenesisMismatch {
        /// Expected genesis hash.
        expected: String,
        /// Hash found on disk.
        found: String,
    },
    /// Persistence I/O failure (fatal per §7).
    #[error("persistence I/O: {0}")]
    Io(#[from] std::io::Error),
    /// Persisted document was not valid JSON for the chain schema.
    #[error("persisted chain document is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// The persisted document shape: `{ "blocks": [ Block... ] }`.
#[derive(Serialize, Deserialize)]
struct ChainDocument {
    blocks: Vec<Block>,
}

/// Ordered sequence of committed blocks, durably persisted as `chain.json`.
pub struct ChainStore {
    blocks: Vec<Block>,
    path: PathBuf,
}

impl ChainStore {
    /// Load the persisted chain at `<data_dir>/chain.json`, or initialize a
    /// fresh one containing only genesis. Re-validates every block on load
    /// (I1-I4); refuses to start if the on-disk genesis does not match the
    /// deterministic genesis.
    pub fn load_or_init(data_dir: &Path, validators: &ValidatorSet) -> Result<Self, ChainError> {
        fs::create_dir_all(data_dir)?;
        let path = data_dir.join("chain.json");
        let expected_genesis = genesis();

        if path.exists() {
            let bytes = fs::read(&path)?;
            let doc: ChainDocument = serde_json::from_slice(&bytes)?;
            let mut store = ChainStore {
                blocks: Vec::new(),
                path: path.clone(),
            };
            for block in doc.blocks {
                if block.height == 0 {
                    if block.block_hash != expected_genesis.block_hash {
                        return Err(ChainError::GenesisMismatch {
                            expected: expected_genesis.block_hash.to_hex(),
                            found: block.block_hash.to_hex(),
                        });
                    }
                    store.blocks.push(block);
                    continue;
                }
                store.validate_next(&block, validators)?;
                store.blocks.push(block);
            }
            Ok(store)
        } else {
            let mut store = ChainStore {
                blocks: vec![expected_genesis],
                path,
            };
            store.persist()?;
            Ok(store)
        }
    }

    /// Height of the tip. Genesis is height 0.
    pub fn height(&self) -> u64 {
        self.tip().height
    }

    /// The highest committed block.
    pub fn tip(&self) -> &Block {
        self.blocks.last().expect("genesis is always present")
    }

    /// Look up a block by height.
    pub fn get_block(&self, height: u64) -> Option<&Block> {
        self.blocks.get(height as usize)
    }

    /// Validate `block` against I1-I4 relative to the current tip, without mutating state.
    fn validate_next(&self, block: &Block, validators: &ValidatorSet) -> Result<(), ChainError> {
        let tip = self.tip();
        if block.height == tip.height {
            return Err(ChainError::AlreadyAtHeight(tip.height));
        }
        let expected_height = tip.height + 1;
        if block.height != expected_height {
            return Err(ChainError::HeightMismatch {
                expected: expected_height,
                got: block.height,
            });
        }
        if block.prev_hash != tip.block_hash {
            return Err(ChainError::PrevHashMismatch);
        }
        let leader = validators.leader_for(block.height);
        if block.proposer_id != leader {
            return Err(ChainError::WrongProposer {
                height: block.height,
                got: block.proposer_id.clone(),
            });
        }
        if !block.hash_is_valid() {
            return Err(ChainError::HashMismatch);
        }
        Ok(())
    }

    /// Validate and append `block`, durably persisting before returning `Ok`.
    /// Rejecting a block leaves memory and disk unchanged (R2).
    pub fn add_block(&mut self, block: Block, validators: &ValidatorSet) -> Result<(), ChainError> {
        self.validate_next(&block, validators)?;
        self.blocks.push(block);
        if let Err(e) = self.persist() {
            self.blocks.pop();
            return Err(e);
        }
        Ok(())
    }

    /// Write the full chain via temp-file + fsync + atomic rename.
    fn persist(&self) -> Result<(), ChainError> {
        let doc = ChainDocument {
            blocks: self.blocks.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&doc)?;
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut f = fs::File::create(&tmp_path)?;
            f.write_all(&bytes)?;
            f.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}
