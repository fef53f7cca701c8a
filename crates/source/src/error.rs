//! Source error types

use std::io;

use thiserror::Error;

use fragsrc_protocol::ProtocolError;

/// Errors raised on the ring side
#[derive(Debug, Error)]
pub enum SourceError {
    /// Ring address string could not be parsed
    #[error("invalid ring address '{address}': {message}")]
    InvalidAddress { address: String, message: String },

    /// Could not attach to the ring transport
    #[error("failed to attach to ring '{address}': {source}")]
    Attach {
        address: String,
        #[source]
        source: io::Error,
    },

    /// Ring transport i/o failed mid-stream
    #[error("ring i/o failed: {0}")]
    Io(#[from] io::Error),

    /// The ring handed us bytes that do not parse as a record
    #[error("corrupt record from ring: {0}")]
    Corrupt(#[from] ProtocolError),

    /// The downstream event-builder client rejected a batch
    #[error("batch submission failed: {0}")]
    Submit(String),

    /// One-shot idle timeout tripped after at least one end-of-run
    #[error(
        "no data for {waited_ms} ms after end-of-run was seen (timeout {timeout_ms} ms); \
         treating the run as stalled"
    )]
    IdleTimeout { waited_ms: u64, timeout_ms: u64 },
}

impl SourceError {
    /// Create an invalid-address error
    pub fn invalid_address(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.into(),
            message: message.into(),
        }
    }
}
