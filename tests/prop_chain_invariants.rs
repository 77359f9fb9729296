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

//! Property tests for the chain store's committed-chain invariants
//! (I1-I4, spec.md §3/§8 P1) across random-length runs of valid blocks.

#![forbid(unsafe_code)]

use proptest::prelude::*;

use minichain::core::chain::ChainStore;
use minichain::core::types::{Amount, Block, Transaction};
use minichain::core::validator_set::ValidatorSet;

fn build_chain_of(n_blocks: u64, n_validators: usize) -> (ChainStore, ValidatorSet, tempfile::TempDir) {
    let peers: Vec<String> = (1..n_validators).map(|i| format!("V{i}")).collect();
    let validators = ValidatorSet::new("V0", peers);
    let dir = tempfile::tempdir().unwrap();
    let mut store = ChainStore::load_or_init(dir.path(), &validators).unwrap();

    for h in 1..=n_blocks {
        let leader = validators.leader_for(h).to_string();
        let tx = Transaction::new("alice", "bob", Amount::from_subunits(h), h as f64).unwrap();
        let block = Block::new(h, store.tip().block_hash, h as f64, vec![tx], leader).unwrap();
        store.add_block(block, &validators).unwrap();
    }
    (store, validators, dir)
}

proptest! {
    #[test]
    fn invariants_hold_for_any_valid_run(n_blocks in 0u64..20, n_validators in 1usize..6) {
        let (store, validators, _dir) = build_chain_of(n_blocks, n_validators);
        for h in 1..=n_blocks {
            let block = store.get_block(h).unwrap();
            let prev = store.get_block(h - 1).unwrap();
            prop_assert_eq!(block.height, h); // I1
            prop_assert_eq!(block.prev_hash, prev.block_hash); // I2
            prop_assert_eq!(&block.proposer_id, validators.leader_for(h)); // I3
            prop_assert!(block.hash_is_valid()); // I4
        }
    }
}

/// R4 — restart safety: reloading from disk yields the same tip as pre-crash.
#[test]
fn reload_after_crash_matches_pre_crash_tip() {
    let (store, validators, dir) = build_chain_of(5, 3);
    let pre_crash_tip = store.tip().block_hash;
    drop(store);

    let reloaded = ChainStore::load_or_init(dir.path(), &validators).unwrap();
    assert_eq!(reloaded.height(), 5);
    assert_eq!(reloaded.tip().block_hash, pre_crash_tip);
}

/// R2 — AddBlock is idempotent iff the block is the current tip: a repeat
/// of the tip at the same height is rejected and never mutates state.
#[test]
fn add_block_is_idempotent_at_the_tip() {
    let (mut store, validators, _dir) = build_chain_of(3, 3);
    let tip = store.tip().clone();
    let height_before = store.height();
    let err = store.add_block(tip, &validators).unwrap_err();
    assert!(matches!(err, minichain::core::chain::ChainError::AlreadyAtHeight(_)));
    assert_eq!(store.height(), height_before);
}
