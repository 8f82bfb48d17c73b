//! ALFA Reveal - Byte Stream Collector
//!
//! Drains a response body chunk by chunk into a [`TransferBuffer`], reporting
//! the running byte count after every chunk. The callback may abort the
//! transfer; whatever arrived so far is still returned.

use futures_util::{Stream, StreamExt};

use crate::error::{RevealError, RevealResult};

/// Callback verdict after each chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Abort,
}

/// Chunks received so far for one in-flight transfer
#[derive(Debug, Default)]
pub struct TransferBuffer {
    chunks: Vec<Vec<u8>>,
    received: u64,
}

impl TransferBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a chunk and return the new running total
    pub fn push(&mut self, chunk: Vec<u8>) -> u64 {
        self.received += chunk.len() as u64;
        self.chunks.push(chunk);
        self.received
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    /// Concatenate all chunks. Consumes the buffer.
    pub fn assemble(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.received as usize);
        for chunk in self.chunks {
            out.extend_from_slice(&chunk);
        }
        out
    }
}

/// Result of [`collect`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collected {
    pub bytes: Vec<u8>,
    /// `false` when the callback aborted before end of stream
    pub complete: bool,
}

/// Read `stream` to the end, calling `on_chunk(received, known_total)` after
/// every chunk.
///
/// Returning [`Flow::Abort`] drops the stream immediately. Stream errors are
/// not retried and surface as [`RevealError::StreamReadFailure`].
pub async fn collect<S, F>(
    mut stream: S,
    known_total: Option<u64>,
    mut on_chunk: F,
) -> RevealResult<Collected>
where
    S: Stream<Item = RevealResult<Vec<u8>>> + Unpin,
    F: FnMut(u64, Option<u64>) -> Flow,
{
    let mut buffer = TransferBuffer::new();

    loop {
        let chunk = match stream.next().await {
            Some(Ok(chunk)) => chunk,
            Some(Err(RevealError::StreamReadFailure(msg))) => {
                return Err(RevealError::StreamReadFailure(msg));
            }
            Some(Err(other)) => return Err(RevealError::StreamReadFailure(other.to_string())),
            None => break,
        };

        let received = buffer.push(chunk);

        if on_chunk(received, known_total) == Flow::Abort {
            log::debug!("Transfer aborted by caller after {} bytes", received);
            return Ok(Collected {
                bytes: buffer.assemble(),
                complete: false,
            });
        }
    }

    Ok(Collected {
        bytes: buffer.assemble(),
        complete: true,
    })
}
