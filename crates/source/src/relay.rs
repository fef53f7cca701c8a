//! The relay producer
//!
//! Feeds raw records from the ring into the bounded queue for the output
//! drain, under an explicit admission policy: blocking admission exerts
//! backpressure on the ring side, non-blocking admission drops records
//! when every slot is in flight.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use fragsrc_protocol::RawRecord;
use fragsrc_queue::QueueProducer;

use crate::error::SourceError;
use crate::ring::RingConsumer;

/// Queue admission policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdmissionMode {
    /// Wait for a free slot; never drop
    #[default]
    Blocking,

    /// Drop the record when no slot is free
    NonBlocking,
}

/// Relay tuning
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Maximum time one ring poll may wait
    pub poll_interval: Duration,

    /// Admission policy for the bounded queue
    pub admission: AdmissionMode,

    /// Stop reading after this many end-of-run records (None = run forever)
    pub stop_after_ends: Option<u32>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            admission: AdmissionMode::Blocking,
            stop_after_ends: None,
        }
    }
}

/// Relay metrics
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Records pulled from the ring
    pub records_read: AtomicU64,

    /// Records enqueued for the output drain
    pub records_sent: AtomicU64,

    /// Records dropped under non-blocking admission
    pub records_dropped: AtomicU64,

    /// End-of-run records observed
    pub ends_seen: AtomicU64,
}

impl RelayMetrics {
    /// Get a snapshot of all counters
    pub fn snapshot(&self) -> RelaySnapshot {
        RelaySnapshot {
            records_read: self.records_read.load(Ordering::Relaxed),
            records_sent: self.records_sent.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
            ends_seen: self.ends_seen.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of relay metrics
#[derive(Debug, Clone, Copy, Default)]
pub struct RelaySnapshot {
    pub records_read: u64,
    pub records_sent: u64,
    pub records_dropped: u64,
    pub ends_seen: u64,
}

/// Ring -> bounded queue pass-through producer
pub struct RecordRelay<R> {
    ring: R,
    producer: QueueProducer<RawRecord>,
    config: RelayConfig,
    metrics: Arc<RelayMetrics>,
}

impl<R: RingConsumer> RecordRelay<R> {
    /// Create a relay with default tuning
    pub fn new(ring: R, producer: QueueProducer<RawRecord>) -> Self {
        Self {
            ring,
            producer,
            config: RelayConfig::default(),
            metrics: Arc::new(RelayMetrics::default()),
        }
    }

    /// Replace the tuning parameters
    pub fn with_config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    /// Metrics handle, valid after `run` consumes the relay
    pub fn metrics_handle(&self) -> Arc<RelayMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run until cancellation, the configured end count, or a fatal error
    ///
    /// The consumer going away is a normal shutdown (the output drain
    /// exits on end-of-run when configured to), not an error.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), SourceError> {
        tracing::info!(
            admission = ?self.config.admission,
            capacity = self.producer.capacity(),
            stop_after_ends = self.config.stop_after_ends,
            "relay starting"
        );

        'outer: loop {
            let available = tokio::select! {
                _ = cancel.cancelled() => break,
                available = self.ring.wait_available(self.config.poll_interval) => available?,
            };
            if !available {
                continue;
            }

            while let Some(record) = self.ring.pop()? {
                self.metrics.records_read.fetch_add(1, Ordering::Relaxed);
                let is_end = record.is_end_run();

                match self.config.admission {
                    AdmissionMode::NonBlocking => match self.producer.try_acquire() {
                        Some(slot) => {
                            if self.enqueue(slot, record) {
                                break 'outer;
                            }
                        }
                        None => {
                            // Queue full: drop the record and its buffer.
                            self.metrics.records_dropped.fetch_add(1, Ordering::Relaxed);
                            tracing::debug!(
                                capacity = self.producer.capacity(),
                                "queue full, dropping record"
                            );
                        }
                    },
                    AdmissionMode::Blocking => {
                        let slot = tokio::select! {
                            _ = cancel.cancelled() => break 'outer,
                            slot = self.producer.acquire() => slot,
                        };
                        if self.enqueue(slot, record) {
                            break 'outer;
                        }
                    }
                }

                if is_end {
                    let seen = self.metrics.ends_seen.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(stop_after) = self.config.stop_after_ends
                        && seen >= u64::from(stop_after)
                    {
                        tracing::info!(ends_seen = seen, "all expected runs ended");
                        break 'outer;
                    }
                }
            }
        }

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            records_read = snapshot.records_read,
            records_sent = snapshot.records_sent,
            records_dropped = snapshot.records_dropped,
            ends_seen = snapshot.ends_seen,
            "relay stopping"
        );
        Ok(())
    }

    /// Send one record; returns true if the consumer side is gone
    fn enqueue(&self, slot: fragsrc_queue::FreeSlot, record: RawRecord) -> bool {
        match self.producer.send(slot, record) {
            Ok(()) => {
                self.metrics.records_sent.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(_rejected) => {
                tracing::warn!("output side gone, stopping relay");
                true
            }
        }
    }
}

#[cfg(test)]
#[path = "relay_test.rs"]
mod relay_test;
