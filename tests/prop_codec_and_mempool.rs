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

//! Round-trip (R1) and mempool idempotence (R3) property tests.

#![forbid(unsafe_code)]

use proptest::prelude::*;

use minichain::core::mempool::{Mempool, RejectReason};
use minichain::core::types::{decode_canonical_limited, encode_canonical, Amount, Message, Transaction};

fn arb_identifier() -> impl Strategy<Value = String> {
    "[a-z]{1,12}"
}

proptest! {
    #[test]
    fn r1_transaction_round_trips_through_the_wire_codec(
        sender in arb_identifier(),
        recipient in arb_identifier(),
        amount in 0u64..1_000_000,
        timestamp in 0i64..2_000_000_000,
    ) {
        let tx = Transaction::new(&sender, &recipient, Amount::from_subunits(amount), timestamp as f64).unwrap();
        let bytes = encode_canonical(&Message::Tx(tx.clone())).unwrap();
        let decoded: Message = decode_canonical_limited(&bytes, 16 * 1024 * 1024).unwrap();
        match decoded {
            Message::Tx(t) => {
                prop_assert_eq!(t.sender, tx.sender);
                prop_assert_eq!(t.recipient, tx.recipient);
                prop_assert_eq!(t.amount, tx.amount);
                prop_assert_eq!(t.tx_id, tx.tx_id);
                prop_assert!(t.is_valid());
            }
            _ => prop_assert!(false, "wrong variant decoded"),
        }
    }

    #[test]
    fn r3_redelivering_a_seen_tx_does_not_change_mempool_state(
        sender in arb_identifier(),
        recipient in arb_identifier(),
        amount in 0u64..1_000_000,
        timestamp in 0i64..2_000_000_000,
    ) {
        let tx = Transaction::new(&sender, &recipient, Amount::from_subunits(amount), timestamp as f64).unwrap();
        let mut m = Mempool::new();
        m.add(tx.clone()).unwrap();
        let before = m.len();

        let result = m.add(tx);
        prop_assert_eq!(result, Err(RejectReason::AlreadySeen));
        prop_assert_eq!(m.len(), before);
    }
}
