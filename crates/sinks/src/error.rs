//! Sink error types

use thiserror::Error;

/// Errors raised on the output side
///
/// Output failures are fatal: the sink is a pipe or file whose failure
/// means the consumer is gone, so there is nothing to retry against.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Write or flush to the sink failed
    #[error("output write failed: {0}")]
    Io(#[from] std::io::Error),
}
