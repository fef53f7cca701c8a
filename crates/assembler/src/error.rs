//! Assembly error types

use thiserror::Error;

/// Result type for assembly operations
pub type Result<T> = std::result::Result<T, AssembleError>;

/// Errors raised while configuring the assembly side
///
/// All of these are startup errors: once a [`crate::FragmentAssembler`] is
/// built, per-record anomalies are reported through
/// [`crate::Outcome`] instead.
#[derive(Debug, Error)]
pub enum AssembleError {
    /// Neither body headers nor a default source id were configured
    #[error("no source id available: configure a default id or expect body headers")]
    NoSourceId,

    /// Extractor name not present in the registry
    #[error("unknown timestamp extractor '{name}', available: [{available}]")]
    UnknownExtractor { name: String, available: String },

    /// Extractor factory rejected its parameter table
    #[error("timestamp extractor '{name}' rejected its parameters: {message}")]
    InvalidParams {
        name: &'static str,
        message: String,
    },
}

impl AssembleError {
    /// Create an invalid-parameters error
    pub fn invalid_params(name: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidParams {
            name,
            message: message.into(),
        }
    }
}
