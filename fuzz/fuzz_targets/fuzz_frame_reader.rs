// Copyright (c) 2026 Amunchain
// Licensed under the Apache-2.0 License.

#![no_main]
#![forbid(unsafe_code)]

use libfuzzer_sys::fuzz_target;
use tokio::io::AsyncWriteExt;

use minichain::networking::frame::read_frame;

fuzz_target!(|data: &[u8]| {
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");
    rt.block_on(async {
        let (mut client, mut server) = tokio::io::duplex(data.len().max(1));
        if client.write_all(data).await.is_ok() {
            let _ = client.shutdown().await;
        }
        let _ = read_frame(&mut server).await;
    });
});
