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

//! Sorted-deterministic validator identifier set and leader rotation.

use std::collections::BTreeSet;

/// The fixed, sorted-deterministic set of validator identifiers for a run.
///
/// Canonicalized to one representation per host: identifiers are
/// deduplicated and sorted lexicographically, so every node derives the
/// same order from the self identity union with the configured peers.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValidatorSet {
    ordered: Vec<String>,
}

impl ValidatorSet {
    /// Build from the self identity and the peer identifiers, canonicalized.
    pub fn new(self_id: &str, peers: impl IntoIterator<Item = String>) -> Self {
        let mut set: BTreeSet<String> = peers.into_iter().collect();
        set.insert(self_id.to_string());
        ValidatorSet {
            ordered: set.into_iter().collect(),
        }
    }

    /// Number of validators.
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    /// Whether the set is empty (never true for a constructed node).
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Deterministic leader for height `h`: `validators[h mod |validators|]`.
    pub fn leader_for(&self, height: u64) -> &str {
        let idx = (height as usize) % self.ordered.len();
        &self.ordered[idx]
    }

    /// Whether `id` is a member of this validator set.
    pub fn contains(&self, id: &str) -> bool {
        self.ordered.iter().any(|v| v == id)
    }

    /// The sorted validator identifiers.
    pub fn as_slice(&self) -> &[String] {
        &self.ordered
    }

    /// Default simple-majority quorum size: `floor(|V|/2) + 1`.
    pub fn default_quorum(&self) -> usize {
        self.ordered.len() / 2 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_deterministic_regardless_of_input_order() {
        let a = ValidatorSet::new("B", vec!["C".to_string(), "A".to_string()]);
        let b = ValidatorSet::new("A", vec!["C".to_string(), "B".to_string()]);
        assert_eq!(a.as_slice(), b.as_slice());
        assert_eq!(a.as_slice(), &["A".to_string(), "B".to_string(), "C".to_string()]);
    }

    #[test]
    fn leader_rotates_round_robin() {
        let v = ValidatorSet::new("A", vec!["B".to_string(), "C".to_string()]);
        assert_eq!(v.leader_for(0), "A");
        assert_eq!(v.leader_for(1), "B");
        assert_eq!(v.leader_for(2), "C");
        assert_eq!(v.leader_for(3), "A");
    }

    #[test]
    fn default_quorum_is_simple_majority() {
        let v = ValidatorSet::new("A", vec!["B".to_string(), "C".to_string()]);
        assert_eq!(v.default_quorum(), 2);
    }

    #[test]
    fn duplicate_identities_collapse_to_one() {
        let v = ValidatorSet::new("A", vec!["A".to_string(), "B".to_string()]);
        assert_eq!(v.len(), 2);
    }
}
