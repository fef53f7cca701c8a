//! The fragment assembler
//!
//! Resolves source id, timestamp and barrier classification for one
//! accepted record and appends its image to the caller's packed batch.
//!
//! Resolution rules:
//!
//! - a body header always wins: its source id and timestamp are used
//!   directly (timestamp adjusted by the configured tick offset);
//! - without a body header, the source id falls back to the configured
//!   default, and the timestamp comes from the injected extractor - except
//!   for state transitions and other untimestamped record types, which get
//!   [`NULL_TIMESTAMP`];
//! - a non-empty allowed-ids list drops fragments from any other source.

use std::collections::HashSet;
use std::sync::Arc;

use fragsrc_protocol::{carries_timestamp, Fragment, FragmentBatch, RawRecord, NULL_TIMESTAMP};

use crate::error::{AssembleError, Result};
use crate::extractor::TimestampExtractor;

/// Assembly policy resolved from configuration at startup
#[derive(Debug, Clone, Default)]
pub struct AssemblerPolicy {
    /// Source id used for records without a body header
    pub default_id: Option<u32>,

    /// Allowed source ids; empty = allow all
    pub allowed_ids: Vec<u32>,

    /// Every record is expected to carry a body header
    pub expect_body_headers: bool,

    /// Signed tick adjustment added to every resolved timestamp
    pub tick_offset: i64,
}

/// Per-record result of a transform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// One fragment was appended to the batch
    Appended(Fragment),

    /// Resolved source id is outside the allowed list; nothing appended
    FilteredSourceId(u32),

    /// No body header and no default id to fall back on; nothing appended
    MissingBodyHeader,
}

impl Outcome {
    /// Did this transform append a fragment?
    #[inline]
    pub fn appended(&self) -> bool {
        matches!(self, Self::Appended(_))
    }
}

/// Converts accepted records into fragments
#[derive(Debug)]
pub struct FragmentAssembler {
    default_id: Option<u32>,
    allowed_ids: HashSet<u32>,
    expect_body_headers: bool,
    tick_offset: i64,
    extractor: Arc<dyn TimestampExtractor>,
}

impl FragmentAssembler {
    /// Build an assembler from policy and the chosen extractor
    ///
    /// # Errors
    ///
    /// [`AssembleError::NoSourceId`] when body headers are not expected and
    /// no default source id is configured - every headerless record would
    /// be unattributable, so this is rejected before any data flows.
    pub fn new(policy: AssemblerPolicy, extractor: Arc<dyn TimestampExtractor>) -> Result<Self> {
        if !policy.expect_body_headers && policy.default_id.is_none() {
            return Err(AssembleError::NoSourceId);
        }

        Ok(Self {
            default_id: policy.default_id,
            allowed_ids: policy.allowed_ids.into_iter().collect(),
            expect_body_headers: policy.expect_body_headers,
            tick_offset: policy.tick_offset,
            extractor,
        })
    }

    /// Transform one record, appending at most one fragment to `batch`
    pub fn transform(&self, record: &RawRecord, batch: &mut FragmentBatch) -> Outcome {
        let source_id = match record.body_header() {
            Some(bh) => bh.source_id,
            None => match self.default_id {
                Some(id) => id,
                None => {
                    // Only reachable with expect_body_headers set; the
                    // record violates that expectation.
                    tracing::warn!(
                        type_tag = record.type_tag(),
                        size = record.size(),
                        "record without body header where one was expected, skipping"
                    );
                    return Outcome::MissingBodyHeader;
                }
            },
        };

        if !self.allowed_ids.is_empty() && !self.allowed_ids.contains(&source_id) {
            tracing::trace!(source_id, "source id outside allowed list, dropping");
            return Outcome::FilteredSourceId(source_id);
        }

        let timestamp = self.resolve_timestamp(record);
        let barrier = self.resolve_barrier(record);

        let frag = batch.push(timestamp, source_id, barrier, record.as_bytes());
        Outcome::Appended(frag)
    }

    /// Does this assembler expect body headers on every record?
    #[inline]
    pub fn expects_body_headers(&self) -> bool {
        self.expect_body_headers
    }

    /// Name of the extractor in use
    #[inline]
    pub fn extractor_name(&self) -> &'static str {
        self.extractor.name()
    }

    fn resolve_timestamp(&self, record: &RawRecord) -> u64 {
        if let Some(bh) = record.body_header() {
            return self.apply_offset(bh.timestamp);
        }
        if !carries_timestamp(record.type_tag()) {
            // State transitions, scalers, text: no meaningful timestamp.
            return NULL_TIMESTAMP;
        }
        self.apply_offset(self.extractor.timestamp(record))
    }

    /// Adjust a real timestamp by the configured tick offset
    ///
    /// The sentinel is never adjusted: an offset applied to "no timestamp"
    /// would fabricate one.
    #[inline]
    fn apply_offset(&self, timestamp: u64) -> u64 {
        if timestamp == NULL_TIMESTAMP {
            timestamp
        } else {
            timestamp.wrapping_add_signed(self.tick_offset)
        }
    }

    fn resolve_barrier(&self, record: &RawRecord) -> Option<u32> {
        if let Some(bh) = record.body_header() {
            return (bh.barrier != 0).then_some(bh.barrier);
        }
        record.is_state_change().then_some(record.type_tag())
    }
}

#[cfg(test)]
#[path = "transformer_test.rs"]
mod transformer_test;
