//! fragsrc assembler - record-to-fragment policy
//!
//! Turns accepted ring records into event-builder fragments:
//!
//! - [`RecordPredicate`] decides accept/reject/sample per record;
//! - [`TimestampExtractor`] derives a timestamp for records that carry no
//!   body header, chosen once at startup from the [`ExtractorRegistry`];
//! - [`FragmentAssembler`] resolves source id, timestamp and barrier class
//!   and appends the record image to the caller's packed batch.

mod error;
mod extractor;
mod predicate;
mod transformer;

pub use error::{AssembleError, Result};
pub use extractor::{
    default_registry, ExtractorFactory, ExtractorParams, ExtractorRegistry, NullExtractor,
    PayloadWordExtractor, TimestampExtractor,
};
pub use predicate::{AcceptAll, Decision, RecordPredicate, TypeFilter};
pub use transformer::{AssemblerPolicy, FragmentAssembler, Outcome};
