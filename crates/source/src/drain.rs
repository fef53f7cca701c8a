//! The drain loop
//!
//! Polls the ring with a bounded wait, drives the assembler across all
//! currently available records up to the packed-buffer budget, submits
//! each non-empty batch downstream, and tracks one-shot end-of-run
//! completion.
//!
//! Completion and cancellation are typed results returned up the stack;
//! the loop never exits the process itself, so the caller can flush and
//! log before shutting down.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use fragsrc_assembler::{Decision, FragmentAssembler, Outcome, RecordPredicate};
use fragsrc_protocol::{FragmentBatch, DEFAULT_BATCH_BUDGET};

use crate::client::EventBuilderClient;
use crate::error::SourceError;
use crate::oneshot::OneshotState;
use crate::ring::RingConsumer;

/// Default ring poll interval
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How a drain loop run ended (errors are separate)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// One-shot completion: every expected source delivered its end-of-run
    Completed,

    /// The cancellation token fired
    Cancelled,
}

/// Drain loop tuning
#[derive(Debug, Clone)]
pub struct DrainConfig {
    /// Maximum time one ring poll may wait
    pub poll_interval: Duration,

    /// Soft byte budget for one batch's packed buffer
    pub batch_budget: usize,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            batch_budget: DEFAULT_BATCH_BUDGET,
        }
    }
}

/// Drain loop metrics
#[derive(Debug, Default)]
pub struct DrainMetrics {
    /// Records pulled from the ring
    pub records_read: AtomicU64,

    /// Records the predicate rejected
    pub records_rejected: AtomicU64,

    /// Sampled records skipped because newer data was waiting
    pub records_skipped_sampling: AtomicU64,

    /// Fragments appended to batches
    pub fragments_built: AtomicU64,

    /// Fragments dropped by source-id filtering
    pub fragments_filtered: AtomicU64,

    /// Records skipped for a missing body header
    pub records_skipped: AtomicU64,

    /// Batches handed to the client
    pub batches_submitted: AtomicU64,

    /// Packed bytes handed to the client
    pub bytes_submitted: AtomicU64,

    /// End-of-run records observed
    pub ends_seen: AtomicU64,
}

impl DrainMetrics {
    /// Get a snapshot of all counters
    pub fn snapshot(&self) -> DrainSnapshot {
        DrainSnapshot {
            records_read: self.records_read.load(Ordering::Relaxed),
            records_rejected: self.records_rejected.load(Ordering::Relaxed),
            records_skipped_sampling: self.records_skipped_sampling.load(Ordering::Relaxed),
            fragments_built: self.fragments_built.load(Ordering::Relaxed),
            fragments_filtered: self.fragments_filtered.load(Ordering::Relaxed),
            records_skipped: self.records_skipped.load(Ordering::Relaxed),
            batches_submitted: self.batches_submitted.load(Ordering::Relaxed),
            bytes_submitted: self.bytes_submitted.load(Ordering::Relaxed),
            ends_seen: self.ends_seen.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of drain metrics
#[derive(Debug, Clone, Copy, Default)]
pub struct DrainSnapshot {
    pub records_read: u64,
    pub records_rejected: u64,
    pub records_skipped_sampling: u64,
    pub fragments_built: u64,
    pub fragments_filtered: u64,
    pub records_skipped: u64,
    pub batches_submitted: u64,
    pub bytes_submitted: u64,
    pub ends_seen: u64,
}

/// The orchestrating loop: ring -> predicate -> assembler -> client
pub struct DrainLoop<R, C> {
    ring: R,
    predicate: Box<dyn RecordPredicate>,
    assembler: FragmentAssembler,
    client: C,
    oneshot: Option<OneshotState>,
    config: DrainConfig,
    metrics: Arc<DrainMetrics>,
}

impl<R, C> DrainLoop<R, C>
where
    R: RingConsumer,
    C: EventBuilderClient,
{
    /// Create a drain loop with default tuning, running forever
    pub fn new(
        ring: R,
        predicate: Box<dyn RecordPredicate>,
        assembler: FragmentAssembler,
        client: C,
    ) -> Self {
        Self {
            ring,
            predicate,
            assembler,
            client,
            oneshot: None,
            config: DrainConfig::default(),
            metrics: Arc::new(DrainMetrics::default()),
        }
    }

    /// Replace the tuning parameters
    pub fn with_config(mut self, config: DrainConfig) -> Self {
        self.config = config;
        self
    }

    /// Enable one-shot mode
    pub fn with_oneshot(mut self, oneshot: OneshotState) -> Self {
        self.oneshot = Some(oneshot);
        self
    }

    /// Metrics handle, valid after `run` consumes the loop
    pub fn metrics_handle(&self) -> Arc<DrainMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run until cancellation, one-shot completion, or a fatal error
    pub async fn run(mut self, cancel: CancellationToken) -> Result<DrainOutcome, SourceError> {
        tracing::info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            batch_budget = self.config.batch_budget,
            oneshot = self.oneshot.as_ref().map(OneshotState::sources_expected),
            extractor = self.assembler.extractor_name(),
            "drain loop starting"
        );

        let outcome = loop {
            let available = tokio::select! {
                _ = cancel.cancelled() => break DrainOutcome::Cancelled,
                available = self.ring.wait_available(self.config.poll_interval) => available?,
            };

            if !available {
                if let Some(oneshot) = self.oneshot.as_mut() {
                    oneshot.note_idle(self.config.poll_interval);
                    if oneshot.timed_out() {
                        tracing::error!(
                            idle_ms = oneshot.idle().as_millis() as u64,
                            ends_seen = oneshot.ends_seen(),
                            ends_expected = oneshot.sources_expected(),
                            "run stalled after end-of-run, giving up"
                        );
                        return Err(SourceError::IdleTimeout {
                            waited_ms: oneshot.idle().as_millis() as u64,
                            timeout_ms: oneshot.timeout().as_millis() as u64,
                        });
                    }
                }
                continue;
            }

            if self.drain_available().await? {
                break DrainOutcome::Completed;
            }
        };

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            outcome = ?outcome,
            records_read = snapshot.records_read,
            fragments_built = snapshot.fragments_built,
            fragments_filtered = snapshot.fragments_filtered,
            batches_submitted = snapshot.batches_submitted,
            bytes_submitted = snapshot.bytes_submitted,
            ends_seen = snapshot.ends_seen,
            "drain loop stopping"
        );
        Ok(outcome)
    }

    /// Drain every currently available record into one batch and submit it
    ///
    /// Returns `true` on one-shot completion. The terminal end-of-run
    /// record is itself transformed before the loop stops pulling, and the
    /// finished batch is always submitted before the completion result
    /// propagates - no fragment is lost at shutdown.
    async fn drain_available(&mut self) -> Result<bool, SourceError> {
        let mut batch = FragmentBatch::with_budget(self.config.batch_budget);
        let mut completed = false;

        while !batch.over_budget() {
            let Some(record) = self.ring.pop()? else {
                break;
            };
            self.metrics.records_read.fetch_add(1, Ordering::Relaxed);

            if let Some(oneshot) = self.oneshot.as_mut() {
                oneshot.observe_data();
                if record.is_end_run() {
                    let seen = oneshot.observe_end();
                    self.metrics.ends_seen.fetch_add(1, Ordering::Relaxed);
                    tracing::info!(
                        ends_seen = seen,
                        ends_expected = oneshot.sources_expected(),
                        "end-of-run observed"
                    );
                    completed = oneshot.is_complete();
                }
            } else if record.is_end_run() {
                self.metrics.ends_seen.fetch_add(1, Ordering::Relaxed);
            }

            match self.predicate.evaluate(&record) {
                Decision::Reject => {
                    self.metrics.records_rejected.fetch_add(1, Ordering::Relaxed);
                }
                Decision::Sample if self.ring.available() > 0 => {
                    // Keep-latest: newer data is already waiting.
                    self.metrics
                        .records_skipped_sampling
                        .fetch_add(1, Ordering::Relaxed);
                }
                Decision::Accept | Decision::Sample => {
                    match self.assembler.transform(&record, &mut batch) {
                        Outcome::Appended(_) => {
                            self.metrics.fragments_built.fetch_add(1, Ordering::Relaxed);
                        }
                        Outcome::FilteredSourceId(_) => {
                            self.metrics
                                .fragments_filtered
                                .fetch_add(1, Ordering::Relaxed);
                        }
                        Outcome::MissingBodyHeader => {
                            self.metrics.records_skipped.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            }

            if completed {
                // All expected sources ended: stop pulling immediately,
                // even with more records sitting in the ring.
                break;
            }
        }

        if !batch.is_empty() {
            let fragments = batch.len();
            let bytes = batch.bytes_used();
            self.client
                .submit(batch)
                .await
                .map_err(|e| SourceError::Submit(e.to_string()))?;
            self.metrics.batches_submitted.fetch_add(1, Ordering::Relaxed);
            self.metrics
                .bytes_submitted
                .fetch_add(bytes as u64, Ordering::Relaxed);
            tracing::debug!(fragments, bytes, "batch submitted");
        }

        Ok(completed)
    }
}

#[cfg(test)]
#[path = "drain_test.rs"]
mod drain_test;
