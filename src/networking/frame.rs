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

//! Length-prefixed framed transport over any `AsyncRead`/`AsyncWrite` stream.
//!
//! Wire framing: a 4-byte unsigned big-endian length `N`, followed by `N`
//! bytes of a canonically bincode-encoded [`Message`]. There is no
//! response/ack at the framing layer.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::core::types::{decode_canonical_limited, encode_canonical, CodecError, Message};

/// Maximum frame payload size: 16 MiB. Frames over this are fatal for the connection.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Framing errors.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Underlying I/O failure (closed socket, reset, short read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Declared frame length exceeded [`MAX_FRAME_BYTES`].
    #[error("frame too large: {0} bytes")]
    TooLarge(usize),
    /// Payload failed to decode as a [`Message`].
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Write `msg` as one length-prefixed frame.
pub async fn write_frame<W: AsyncWrite + Unpin>(w: &mut W, msg: &Message) -> Result<(), FrameError> {
    let body = encode_canonical(msg)?;
    if body.len() > MAX_FRAME_BYTES {
        return Err(FrameError::TooLarge(body.len()));
    }
    let len = body.len() as u32;
    w.write_all(&len.to_be_bytes()).await?;
    w.write_all(&body).await?;
    w.flush().await?;
    Ok(())
}

/// Read exactly one length-prefixed frame and decode it as a [`Message`].
///
/// Refuses frames whose declared length exceeds [`MAX_FRAME_BYTES`] without
/// reading the body; this is fatal for the connection per §4.1.
pub async fn read_frame<R: AsyncRead + Unpin>(r: &mut R) -> Result<Message, FrameError> {
    let mut len_buf = [0u8; 4];
    r.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_BYTES {
        return Err(FrameError::TooLarge(len));
    }
    let mut body = vec![0u8; len];
    r.read_exact(&mut body).await?;
    let msg = decode_canonical_limited(&body, MAX_FRAME_BYTES)?;
    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Amount, Transaction};

    #[tokio::test]
    async fn round_trips_a_message_over_an_in_memory_pipe() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        let tx = Transaction::new("alice", "bob", Amount::from_subunits(5), 1.0).unwrap();
        let msg = Message::Tx(tx.clone());

        write_frame(&mut client, &msg).await.unwrap();
        let decoded = read_frame(&mut server).await.unwrap();
        match decoded {
            Message::Tx(t) => assert_eq!(t.tx_id, tx.tx_id),
            _ => panic!("wrong variant"),
        }
    }

    #[tokio::test]
    async fn rejects_oversized_declared_length() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        let too_big = (MAX_FRAME_BYTES as u32) + 1;
        client.write_all(&too_big.to_be_bytes()).await.unwrap();
        let err = read_frame(&mut server).await.unwrap_err();
        assert!(matches!(err, FrameError::TooLarge(_)));
    }
}
