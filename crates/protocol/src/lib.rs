//! fragsrc protocol - record and fragment wire formats
//!
//! Everything that flows through fragsrc is built from two shapes:
//!
//! - **Records**: the self-describing binary units read from the ring
//!   transport, carrying a type tag, an optional body header and a payload.
//! - **Fragments**: the per-record units handed to the event builder,
//!   carrying a resolved timestamp, source id and barrier classification
//!   plus a reference into a packed batch buffer.
//!
//! All wire layouts are little-endian.

mod error;
mod fragment;
mod record;

pub use error::ProtocolError;
pub use fragment::{
    Fragment, FragmentBatch, FragmentHeader, DEFAULT_BATCH_BUDGET, FRAGMENT_HEADER_SIZE,
};
pub use record::{BodyHeader, RawRecord, RecordBuilder};

/// Base record header size: `[u32 size][u32 type][u32 body_header_size]`
pub const BASE_HEADER_SIZE: usize = 12;

/// Body header size: `[u64 timestamp][u32 source_id][u32 barrier]`
pub const BODY_HEADER_SIZE: usize = 16;

/// Upper bound on a single record (64 MiB) - anything larger is corrupt
pub const MAX_RECORD_SIZE: usize = 64 * 1024 * 1024;

/// Timestamp sentinel for records that carry no timestamp (scalers, text)
pub const NULL_TIMESTAMP: u64 = u64::MAX;

/// Record type tags
///
/// State transitions occupy the low tags; physics events and their
/// bookkeeping live at 30+. The tag space is sparse on purpose - sites add
/// private tags above `PHYSICS_EVENT_COUNT`.
pub mod types {
    /// Begin of run state transition
    pub const BEGIN_RUN: u32 = 1;
    /// End of run state transition
    pub const END_RUN: u32 = 2;
    /// Pause of run state transition
    pub const PAUSE_RUN: u32 = 3;
    /// Resume of run state transition
    pub const RESUME_RUN: u32 = 4;
    /// Periodic scaler readout
    pub const PERIODIC_SCALERS: u32 = 20;
    /// Monitored variable dump
    pub const MONITORED_VARIABLES: u32 = 21;
    /// Free-form run state text
    pub const RUN_STATE_TEXT: u32 = 22;
    /// Triggered physics event
    pub const PHYSICS_EVENT: u32 = 30;
    /// Trigger count bookkeeping
    pub const PHYSICS_EVENT_COUNT: u32 = 31;
}

/// Is this tag a run state transition (begin/end/pause/resume)?
#[inline]
pub fn is_state_change(type_tag: u32) -> bool {
    matches!(
        type_tag,
        types::BEGIN_RUN | types::END_RUN | types::PAUSE_RUN | types::RESUME_RUN
    )
}

/// Is this tag an end-of-run marker?
#[inline]
pub fn is_end_run(type_tag: u32) -> bool {
    type_tag == types::END_RUN
}

/// Does this record type carry a meaningful timestamp?
///
/// Only triggered physics events do; state transitions, scalers and text
/// records get [`NULL_TIMESTAMP`] unless a body header says otherwise.
#[inline]
pub fn carries_timestamp(type_tag: u32) -> bool {
    type_tag == types::PHYSICS_EVENT
}
