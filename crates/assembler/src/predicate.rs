//! Record predicates
//!
//! The drain loop consults a predicate before transforming each record.
//! Predicates look only at the record itself (in practice, its type tag);
//! source-id filtering is the assembler's job.

use std::collections::HashSet;

use fragsrc_protocol::RawRecord;

/// What the drain loop should do with a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Transform the record into a fragment
    Accept,
    /// Skip the record entirely
    Reject,
    /// Keep-latest: transform only if no newer data is already waiting
    Sample,
}

/// Per-record accept/reject/sample decision
pub trait RecordPredicate: Send {
    /// Decide what to do with `record`
    fn evaluate(&self, record: &RawRecord) -> Decision;
}

/// Predicate that accepts every record
pub struct AcceptAll;

impl RecordPredicate for AcceptAll {
    fn evaluate(&self, _record: &RawRecord) -> Decision {
        Decision::Accept
    }
}

/// Predicate driven by an accept-list of record type tags
///
/// Types on the sample list are forwarded with keep-latest semantics;
/// types on neither list are rejected.
pub struct TypeFilter {
    accepted: HashSet<u32>,
    sampled: HashSet<u32>,
}

impl TypeFilter {
    /// Accept exactly the given type tags
    pub fn new(accepted: impl IntoIterator<Item = u32>) -> Self {
        Self {
            accepted: accepted.into_iter().collect(),
            sampled: HashSet::new(),
        }
    }

    /// Mark type tags for keep-latest sampling instead of full acceptance
    pub fn sampled(mut self, types: impl IntoIterator<Item = u32>) -> Self {
        self.sampled = types.into_iter().collect();
        self
    }
}

impl RecordPredicate for TypeFilter {
    fn evaluate(&self, record: &RawRecord) -> Decision {
        let tag = record.type_tag();
        if self.sampled.contains(&tag) {
            Decision::Sample
        } else if self.accepted.contains(&tag) {
            Decision::Accept
        } else {
            Decision::Reject
        }
    }
}

#[cfg(test)]
#[path = "predicate_test.rs"]
mod predicate_test;
