// Copyright (c) 2026 Amunchain
// Licensed under the Apache-2.0 License.

#![no_main]
#![forbid(unsafe_code)]

use libfuzzer_sys::fuzz_target;
use minichain::core::types::{decode_canonical_limited, Message};
use minichain::networking::frame::MAX_FRAME_BYTES;

fuzz_target!(|data: &[u8]| {
    let _ = decode_canonical_limited::<Message>(data, MAX_FRAME_BYTES);
});
