//! Virtual standard streams for one compiler invocation.
//!
//! Each request owns a fresh set: a pre-filled, write-closed stdin and two
//! unbounded byte channels for stdout and stderr. The module holds the write
//! halves ([`ModuleStdio`]); the HTTP layer holds the read halves
//! ([`HostStreams`]).

use std::io::{self, Read};

use bytes::{Buf, Bytes};
use futures::Stream;
use tokio::sync::mpsc;

/// A unit of data travelling through a channel.
///
/// `Err` terminates the stream early; readers treat it as the end of data.
pub type Chunk = Result<Bytes, StreamAbort>;

/// Marker written to a channel when the producer faulted mid-stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("stream aborted: {0}")]
pub struct StreamAbort(pub String);

/// Write half of a virtual channel.
#[derive(Debug, Clone)]
pub struct ByteSender {
    tx: mpsc::UnboundedSender<Chunk>,
}

impl ByteSender {
    /// Append `buf` to the channel and report it as fully written.
    ///
    /// Empty writes send nothing, so a reader that receives a chunk has
    /// received at least one byte. If the reader is gone the bytes are
    /// discarded and the write still succeeds.
    pub fn write(&self, buf: &[u8]) -> usize {
        if !buf.is_empty() {
            self.send_chunk(Ok(Bytes::copy_from_slice(buf)));
        }
        buf.len()
    }

    /// Terminate the stream with an error visible to the reader.
    pub fn abort(&self, reason: impl Into<String>) {
        self.send_chunk(Err(StreamAbort(reason.into())));
    }

    /// `true` once the read half has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub(crate) fn send_chunk(&self, chunk: Chunk) {
        // reader gone: discard
        let _ = self.tx.send(chunk);
    }
}

/// Read half of a virtual channel.
#[derive(Debug)]
pub struct ByteReceiver {
    rx: mpsc::UnboundedReceiver<Chunk>,
}

impl ByteReceiver {
    /// Wait for the next chunk. `None` means every writer has been dropped.
    pub async fn read(&mut self) -> Option<Chunk> {
        self.rx.recv().await
    }

    /// Drain the channel to its end and decode it as UTF-8.
    ///
    /// Bytes are collected before decoding so multi-byte sequences split
    /// across chunks survive. Invalid sequences are replaced. An abort marker
    /// ends the drain early.
    pub async fn read_to_string(mut self) -> String {
        let mut collected = Vec::new();
        while let Some(Ok(bytes)) = self.read().await {
            collected.extend_from_slice(&bytes);
        }
        String::from_utf8_lossy(&collected).into_owned()
    }

    /// Convert into a stream suitable for a streaming HTTP body.
    pub fn into_stream(self) -> impl Stream<Item = Chunk> + Send + 'static {
        futures::stream::unfold(self.rx, |mut rx| async move {
            rx.recv().await.map(|chunk| (chunk, rx))
        })
    }
}

/// Create an unbounded virtual channel.
#[must_use]
pub fn byte_channel() -> (ByteSender, ByteReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ByteSender { tx }, ByteReceiver { rx })
}

/// Module-side stdin: the full schema, already closed for writing.
///
/// Reads drain the buffer and then report end-of-input with `Ok(0)`.
#[derive(Debug, Clone)]
pub struct StdinReader {
    remaining: Bytes,
}

impl StdinReader {
    /// Materialize stdin from the schema text.
    #[must_use]
    pub fn from_schema(schema: &str) -> Self {
        Self {
            remaining: Bytes::copy_from_slice(schema.as_bytes()),
        }
    }

    /// Bytes not yet read.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }
}

impl Read for StdinReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.remaining.len());
        buf[..n].copy_from_slice(&self.remaining[..n]);
        self.remaining.advance(n);
        Ok(n)
    }
}

/// The halves handed to the compiler module.
#[derive(Debug)]
pub struct ModuleStdio {
    /// Schema input.
    pub stdin: StdinReader,
    /// Generated source output.
    pub stdout: ByteSender,
    /// Diagnostics output.
    pub stderr: ByteSender,
}

/// The halves kept by the HTTP layer.
#[derive(Debug)]
pub struct HostStreams {
    /// Generated source, forwarded live on success.
    pub stdout: ByteReceiver,
    /// Diagnostics, inspected to classify the outcome.
    pub stderr: ByteReceiver,
}

/// The three per-request channels.
#[derive(Debug)]
pub struct VirtualChannels {
    /// Write side, for the module.
    pub module: ModuleStdio,
    /// Read side, for the response.
    pub host: HostStreams,
}

impl VirtualChannels {
    /// Allocate fresh channels with stdin pre-populated from `schema`.
    #[must_use]
    pub fn open(schema: &str) -> Self {
        let (stdout_tx, stdout_rx) = byte_channel();
        let (stderr_tx, stderr_rx) = byte_channel();
        Self {
            module: ModuleStdio {
                stdin: StdinReader::from_schema(schema),
                stdout: stdout_tx,
                stderr: stderr_tx,
            },
            host: HostStreams {
                stdout: stdout_rx,
                stderr: stderr_rx,
            },
        }
    }

    /// Separate the module and host halves.
    #[must_use]
    pub fn split(self) -> (ModuleStdio, HostStreams) {
        (self.module, self.host)
    }
}
