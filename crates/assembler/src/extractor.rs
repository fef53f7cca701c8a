//! Timestamp extractors and their registry
//!
//! Exactly one extractor is chosen at startup and applied uniformly to
//! every physics record that carries no body header, for the lifetime of
//! the process. Extractors are statically linked and selected by name
//! through the registry; sites with private event formats register their
//! own factory before building the drain loop.
//!
//! # Example
//!
//! ```ignore
//! let registry = default_registry();
//! let extractor = registry.create("payload-word", &params)?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use fragsrc_protocol::{RawRecord, NULL_TIMESTAMP};

use crate::error::{AssembleError, Result};

/// Parameter table handed to extractor factories, straight from the
/// `[extractor]` config section
pub type ExtractorParams = HashMap<String, toml::Value>;

/// Derives a timestamp from a record that carries no body header
///
/// Implementations must be total: any record of a type they are asked to
/// handle yields a value, with [`NULL_TIMESTAMP`] as the "cannot say"
/// answer.
pub trait TimestampExtractor: Send + Sync + std::fmt::Debug {
    /// Derive the timestamp for `record`
    fn timestamp(&self, record: &RawRecord) -> u64;

    /// Registry name of this extractor (for logs and diagnostics)
    fn name(&self) -> &'static str;
}

/// Factory trait for creating extractors from configuration
pub trait ExtractorFactory: Send + Sync {
    /// Create an extractor instance from the parameter table
    ///
    /// # Errors
    ///
    /// Returns [`AssembleError::InvalidParams`] on a bad parameter table.
    fn create(&self, params: &ExtractorParams) -> Result<Arc<dyn TimestampExtractor>>;

    /// Name under which this factory registers
    fn name(&self) -> &'static str;
}

/// Registry mapping extractor names to factories
pub struct ExtractorRegistry {
    factories: HashMap<String, Box<dyn ExtractorFactory>>,
}

impl ExtractorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a factory
    ///
    /// # Panics
    ///
    /// Panics if a factory is already registered under this name;
    /// registration happens once at startup, a duplicate is a programming
    /// error.
    pub fn register<F: ExtractorFactory + 'static>(&mut self, factory: F) {
        let name = factory.name();
        if self.factories.contains_key(name) {
            panic!("extractor factory '{name}' already registered");
        }
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    /// Create an extractor by name
    ///
    /// # Errors
    ///
    /// [`AssembleError::UnknownExtractor`] if the name is not registered,
    /// listing the available names; factory errors pass through.
    pub fn create(
        &self,
        name: &str,
        params: &ExtractorParams,
    ) -> Result<Arc<dyn TimestampExtractor>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| AssembleError::UnknownExtractor {
                name: name.to_string(),
                available: self.available_names().join(", "),
            })?;
        factory.create(params)
    }

    /// Is a name registered?
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted for stable diagnostics
    pub fn available_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered factories
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Is the registry empty?
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry with the built-in extractors registered
///
/// - `null` - every record gets [`NULL_TIMESTAMP`]; for setups where all
///   timestamped records carry body headers
/// - `payload-word` - little-endian `u64` at a configured byte offset into
///   the payload
pub fn default_registry() -> ExtractorRegistry {
    let mut registry = ExtractorRegistry::new();
    registry.register(NullFactory);
    registry.register(PayloadWordFactory);
    registry
}

/// Extractor that never produces a timestamp
#[derive(Debug)]
pub struct NullExtractor;

impl TimestampExtractor for NullExtractor {
    fn timestamp(&self, _record: &RawRecord) -> u64 {
        NULL_TIMESTAMP
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

/// Factory for [`NullExtractor`]
struct NullFactory;

impl ExtractorFactory for NullFactory {
    fn create(&self, _params: &ExtractorParams) -> Result<Arc<dyn TimestampExtractor>> {
        Ok(Arc::new(NullExtractor))
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

/// Extractor reading a little-endian `u64` at a byte offset into the payload
///
/// The usual convention for front-ends that put the hardware timestamp in
/// the first word of the event body. A payload too short to contain the
/// word yields [`NULL_TIMESTAMP`].
#[derive(Debug)]
pub struct PayloadWordExtractor {
    offset: usize,
}

impl PayloadWordExtractor {
    /// Create an extractor reading at the given payload byte offset
    pub fn new(offset: usize) -> Self {
        Self { offset }
    }
}

impl TimestampExtractor for PayloadWordExtractor {
    fn timestamp(&self, record: &RawRecord) -> u64 {
        let payload = record.payload();
        match payload.get(self.offset..self.offset + 8) {
            Some(word) => u64::from_le_bytes(word.try_into().unwrap_or([0; 8])),
            None => {
                tracing::debug!(
                    offset = self.offset,
                    payload_len = payload.len(),
                    "payload too short for timestamp word"
                );
                NULL_TIMESTAMP
            }
        }
    }

    fn name(&self) -> &'static str {
        "payload-word"
    }
}

/// Factory for [`PayloadWordExtractor`]; takes an optional `offset` integer
struct PayloadWordFactory;

impl ExtractorFactory for PayloadWordFactory {
    fn create(&self, params: &ExtractorParams) -> Result<Arc<dyn TimestampExtractor>> {
        let offset = match params.get("offset") {
            None => 0,
            Some(toml::Value::Integer(n)) if *n >= 0 => *n as usize,
            Some(toml::Value::Integer(n)) => {
                return Err(AssembleError::invalid_params(
                    self.name(),
                    format!("offset must be non-negative, got {n}"),
                ));
            }
            Some(other) => {
                return Err(AssembleError::invalid_params(
                    self.name(),
                    format!("offset must be an integer, got {other}"),
                ));
            }
        };
        Ok(Arc::new(PayloadWordExtractor::new(offset)))
    }

    fn name(&self) -> &'static str {
        "payload-word"
    }
}

#[cfg(test)]
#[path = "extractor_test.rs"]
mod extractor_test;
