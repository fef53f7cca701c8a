//! Event-builder client seam
//!
//! The event builder's own sequencing is out of scope; the drain loop only
//! needs somewhere to hand ownership of each finished batch.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use thiserror::Error;

use fragsrc_protocol::FragmentBatch;

/// Errors a client may raise while taking a batch
#[derive(Debug, Error)]
pub enum ClientError {
    /// I/O failure towards the event builder
    #[error("submit i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else the client wants to surface
    #[error("{0}")]
    Other(String),
}

/// Downstream consumer of fragment batches
///
/// `submit` takes ownership: the batch's packed buffer belongs to the
/// client once the call returns.
#[async_trait]
pub trait EventBuilderClient: Send {
    /// Hand one non-empty batch to the event builder
    async fn submit(&mut self, batch: FragmentBatch) -> Result<(), ClientError>;
}

/// Client that stores every submitted batch in memory
///
/// Used by tests and by dry-run tooling to inspect exactly what the drain
/// loop produced.
#[derive(Clone, Default)]
pub struct CollectingClient {
    batches: Arc<Mutex<Vec<FragmentBatch>>>,
}

impl CollectingClient {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every batch collected so far
    pub fn take_batches(&self) -> Vec<FragmentBatch> {
        std::mem::take(
            &mut *self
                .batches
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    /// Total fragments across all collected batches
    pub fn fragment_count(&self) -> usize {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(FragmentBatch::len)
            .sum()
    }

    /// Number of batches collected
    pub fn batch_count(&self) -> usize {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl EventBuilderClient for CollectingClient {
    async fn submit(&mut self, batch: FragmentBatch) -> Result<(), ClientError> {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(batch);
        Ok(())
    }
}
