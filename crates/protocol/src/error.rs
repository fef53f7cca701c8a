//! Protocol error types

use thiserror::Error;

/// Errors raised while decoding records or fragment frames
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Record image is shorter than its own header
    #[error("record too short: expected at least {expected} bytes, got {actual}")]
    RecordTooShort { expected: usize, actual: usize },

    /// The size field disagrees with the byte image
    #[error("record size mismatch: header says {declared} bytes, image is {actual}")]
    SizeMismatch { declared: usize, actual: usize },

    /// The body header size field is neither 0 nor the fixed size
    #[error("invalid body header size: {0}")]
    InvalidBodyHeaderSize(usize),

    /// Record exceeds the sanity bound
    #[error("record oversized: {size} bytes exceeds maximum {max}")]
    Oversized { size: usize, max: usize },

    /// Fragment frame is shorter than its fixed header
    #[error("fragment header too short: expected {expected} bytes, got {actual}")]
    HeaderTooShort { expected: usize, actual: usize },
}

impl ProtocolError {
    /// Create a record-too-short error
    #[inline]
    pub fn too_short(expected: usize, actual: usize) -> Self {
        Self::RecordTooShort { expected, actual }
    }

    /// Create a size mismatch error
    #[inline]
    pub fn size_mismatch(declared: usize, actual: usize) -> Self {
        Self::SizeMismatch { declared, actual }
    }

    /// Create an oversized-record error
    #[inline]
    pub fn oversized(size: usize) -> Self {
        Self::Oversized {
            size,
            max: crate::MAX_RECORD_SIZE,
        }
    }
}
