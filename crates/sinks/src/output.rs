//! The output drain
//!
//! Second half of the pass-through path: dequeues raw records from the
//! bounded queue, writes `[20-byte header][record image]` to the sink with
//! a flush per record, and frees the slot. The drain never touches an item
//! after freeing it; the end-of-run check is captured before the free.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use fragsrc_protocol::{FragmentHeader, RawRecord, FRAGMENT_HEADER_SIZE};
use fragsrc_queue::QueueConsumer;

use crate::error::SinkError;

/// How an output drain run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputOutcome {
    /// An end-of-run record was written and exit-on-end is configured
    EndOfRun,

    /// Every producer is gone and the queue is drained
    QueueClosed,

    /// The cancellation token fired
    Cancelled,
}

/// Output drain metrics
#[derive(Debug, Default)]
pub struct OutputMetrics {
    /// Records written to the sink
    pub records_written: AtomicU64,

    /// Bytes written to the sink (headers included)
    pub bytes_written: AtomicU64,

    /// End-of-run records written
    pub ends_written: AtomicU64,
}

impl OutputMetrics {
    /// Get a snapshot of all counters
    pub fn snapshot(&self) -> OutputSnapshot {
        OutputSnapshot {
            records_written: self.records_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            ends_written: self.ends_written.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of output metrics
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputSnapshot {
    pub records_written: u64,
    pub bytes_written: u64,
    pub ends_written: u64,
}

/// Queue -> byte sink drain
pub struct OutputDrain<W> {
    consumer: QueueConsumer<RawRecord>,
    writer: W,
    exit_on_end: bool,
    default_source: u32,
    metrics: Arc<OutputMetrics>,
}

impl<W> OutputDrain<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Create an output drain over a byte sink
    pub fn new(consumer: QueueConsumer<RawRecord>, writer: W) -> Self {
        Self {
            consumer,
            writer,
            exit_on_end: false,
            default_source: 0,
            metrics: Arc::new(OutputMetrics::default()),
        }
    }

    /// Stop (and let the process exit) after writing an end-of-run record
    pub fn exit_on_end(mut self, enabled: bool) -> Self {
        self.exit_on_end = enabled;
        self
    }

    /// Source id framed for records without a body header
    pub fn default_source(mut self, source_id: u32) -> Self {
        self.default_source = source_id;
        self
    }

    /// Metrics handle, valid after `run` consumes the drain
    pub fn metrics_handle(&self) -> Arc<OutputMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run until cancellation, queue closure, or end-of-run (if configured)
    pub async fn run(mut self, cancel: CancellationToken) -> Result<OutputOutcome, SinkError> {
        tracing::info!(
            exit_on_end = self.exit_on_end,
            capacity = self.consumer.capacity(),
            "output drain starting"
        );

        let outcome = loop {
            let item = tokio::select! {
                _ = cancel.cancelled() => break OutputOutcome::Cancelled,
                item = self.consumer.recv() => match item {
                    Some(item) => item,
                    None => break OutputOutcome::QueueClosed,
                },
            };

            // Everything needed after the free is captured now.
            let is_end = item.is_end_run();
            let record_bytes = item.size();

            let header = FragmentHeader::for_record(&item, self.default_source);
            self.writer.write_all(&header.to_bytes()).await?;
            self.writer.write_all(item.as_bytes()).await?;
            self.writer.flush().await?;

            self.consumer.free(item);

            self.metrics.records_written.fetch_add(1, Ordering::Relaxed);
            self.metrics
                .bytes_written
                .fetch_add((FRAGMENT_HEADER_SIZE + record_bytes) as u64, Ordering::Relaxed);
            if is_end {
                self.metrics.ends_written.fetch_add(1, Ordering::Relaxed);
                if self.exit_on_end {
                    break OutputOutcome::EndOfRun;
                }
            }
        };

        self.writer.flush().await?;

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            outcome = ?outcome,
            records_written = snapshot.records_written,
            bytes_written = snapshot.bytes_written,
            ends_written = snapshot.ends_written,
            "output drain stopping"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
#[path = "output_test.rs"]
mod output_test;
