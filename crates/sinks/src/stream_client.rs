//! Streaming event-builder client
//!
//! Serializes each fragment batch as consecutive
//! `[20-byte header][record image]` frames on an `AsyncWrite` - a TCP
//! connection to the event builder, or stdout when fragsrc feeds a pipe.
//! One flush per batch, not per fragment.

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use fragsrc_protocol::{FragmentBatch, FragmentHeader, FRAGMENT_HEADER_SIZE};
use fragsrc_source::{ClientError, EventBuilderClient};

/// Event-builder client over any byte stream
pub struct StreamClient<W> {
    writer: W,
    frame_buf: BytesMut,
}

impl<W> StreamClient<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Create a client over a byte sink
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            frame_buf: BytesMut::new(),
        }
    }

    /// Give the sink back (for shutdown flushes by the caller)
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl StreamClient<tokio::io::Stdout> {
    /// Client writing frames to stdout
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

#[async_trait]
impl<W> EventBuilderClient for StreamClient<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn submit(&mut self, batch: FragmentBatch) -> Result<(), ClientError> {
        // One contiguous write per batch keeps the frames together on the
        // wire even through small pipe buffers.
        self.frame_buf.clear();
        self.frame_buf
            .reserve(batch.bytes_used() + batch.len() * FRAGMENT_HEADER_SIZE);

        for (frag, bytes) in batch.iter() {
            FragmentHeader::for_fragment(frag).encode_into(&mut self.frame_buf);
            self.frame_buf.extend_from_slice(bytes);
        }

        self.writer.write_all(&self.frame_buf).await?;
        self.writer.flush().await?;

        tracing::trace!(
            fragments = batch.len(),
            bytes = self.frame_buf.len(),
            "fragment batch streamed"
        );
        Ok(())
    }
}

#[cfg(test)]
#[path = "stream_client_test.rs"]
mod stream_client_test;
