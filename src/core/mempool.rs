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

//! Deduplicated pending-transaction store with gossip-suppression history.

use std::collections::{HashSet, VecDeque};

use crate::core::types::{Hash256, Transaction};

/// Why a transaction was rejected from the mempool.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RejectReason {
    /// `tx_id` was already seen (admitted before, or observed in a committed block).
    AlreadySeen,
    /// The transaction failed structural validation (bad fields or `tx_id` mismatch).
    Invalid,
}

/// Pending-transaction store. Single mutex owns both the ordered map and
/// `seen`; all operations are O(1) except `take`, which is O(n).
#[derive(Default)]
pub struct Mempool {
    order: VecDeque<Hash256>,
    pending: std::collections::HashMap<Hash256, Transaction>,
    seen: HashSet<Hash256>,
}

impl Mempool {
    /// New, empty mempool.
    pub fn new() -> Self {
        Mempool::default()
    }

    /// Admit `tx` if it is structurally valid and its `tx_id` is unseen.
    pub fn add(&mut self, tx: Transaction) -> Result<(), RejectReason> {
        if !tx.is_valid() {
            return Err(RejectReason::Invalid);
        }
        if self.seen.contains(&tx.tx_id) {
            return Err(RejectReason::AlreadySeen);
        }
        self.seen.insert(tx.tx_id);
        self.order.push_back(tx.tx_id);
        self.pending.insert(tx.tx_id, tx);
        Ok(())
    }

    /// Up to `n` pending transactions in insertion order. Does not remove them.
    pub fn take(&self, n: usize) -> Vec<Transaction> {
        self.order
            .iter()
            .take(n)
            .filter_map(|id| self.pending.get(id).cloned())
            .collect()
    }

    /// Remove the given `tx_id`s after their containing block commits. Unknown
    /// ids are a silent no-op.
    pub fn remove_many(&mut self, ids: &[Hash256]) {
        for id in ids {
            if self.pending.remove(id).is_some() {
                self.order.retain(|x| x != id);
            }
        }
    }

    /// Whether `tx_id` has ever been admitted or observed committed.
    pub fn has_seen(&self, tx_id: &Hash256) -> bool {
        self.seen.contains(tx_id)
    }

    /// Mark a set of `tx_id`s as seen without adding them to the pending map,
    /// e.g. transactions observed in a committed block during sync.
    pub fn mark_seen(&mut self, ids: impl IntoIterator<Item = Hash256>) {
        for id in ids {
            self.seen.insert(id);
        }
    }

    /// Number of pending (not-yet-committed) transactions.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether there are no pending transactions.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop every pending entry. Does not forget `seen` history.
    pub fn clear(&mut self) {
        self.order.clear();
        self.pending.clear();
    }

    /// Snapshot of pending transactions, for the operator-facing read interface.
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.take(self.pending.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Amount;

    fn tx(n: u64) -> Transaction {
        Transaction::new("alice", "bob", Amount::from_subunits(n), n as f64).unwrap()
    }

    #[test]
    fn duplicate_submission_rejected_second_time() {
        let mut m = Mempool::new();
        assert!(m.add(tx(1)).is_ok());
        assert_eq!(m.add(tx(1)).unwrap_err(), RejectReason::AlreadySeen);
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn take_preserves_insertion_order_and_does_not_remove() {
        let mut m = Mempool::new();
        m.add(tx(1)).unwrap();
        m.add(tx(2)).unwrap();
        let batch = m.take(10);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].tx_id, tx(1).tx_id);
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn max_txs_boundary_leaves_remainder_pending() {
        let mut m = Mempool::new();
        for i in 0..5 {
            m.add(tx(i)).unwrap();
        }
        let batch = m.take(3);
        assert_eq!(batch.len(), 3);
        assert_eq!(m.len(), 5);
    }

    #[test]
    fn remove_many_is_noop_for_unknown_ids() {
        let mut m = Mempool::new();
        m.add(tx(1)).unwrap();
        m.remove_many(&[tx(99).tx_id]);
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn remove_many_clears_committed_txs() {
        let mut m = Mempool::new();
        m.add(tx(1)).unwrap();
        m.add(tx(2)).unwrap();
        m.remove_many(&[tx(1).tx_id]);
        assert_eq!(m.len(), 1);
        assert!(m.has_seen(&tx(1).tx_id));
    }

    #[test]
    fn invalid_transaction_rejected() {
        let mut m = Mempool::new();
        let mut bad = tx(1);
        bad.tx_id = tx(2).tx_id;
        assert_eq!(m.add(bad).unwrap_err(), RejectReason::Invalid);
    }
}
