//! Fragments and the packed fragment batch
//!
//! A fragment is the unit handed to the event builder: a resolved
//! timestamp, source id and barrier classification, plus an `(offset, size)`
//! reference into a packed buffer holding the full record image. The packed
//! buffer lives exactly one drain iteration; the whole batch is moved to
//! the downstream client and a fresh one is built for the next pass.

use bytes::BufMut;

use crate::error::ProtocolError;
use crate::NULL_TIMESTAMP;

/// Fixed fragment frame header:
/// `[u64 timestamp][u32 source_id][u32 size][u32 barrier]`
pub const FRAGMENT_HEADER_SIZE: usize = 20;

/// One fragment descriptor referencing bytes in a [`FragmentBatch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    timestamp: u64,
    source_id: u32,
    barrier: Option<u32>,
    offset: usize,
    size: usize,
}

impl Fragment {
    /// Resolved timestamp ([`NULL_TIMESTAMP`] for untimestamped records)
    #[inline]
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Resolved source id
    #[inline]
    pub fn source_id(&self) -> u32 {
        self.source_id
    }

    /// Barrier class, present iff this fragment is a state transition
    #[inline]
    pub fn barrier(&self) -> Option<u32> {
        self.barrier
    }

    /// Is this a barrier fragment?
    #[inline]
    pub fn is_barrier(&self) -> bool {
        self.barrier.is_some()
    }

    /// Byte offset into the batch buffer
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Payload size in bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Does this fragment carry a real timestamp?
    #[inline]
    pub fn has_timestamp(&self) -> bool {
        self.timestamp != NULL_TIMESTAMP
    }
}

/// The fixed 20-byte frame header written ahead of each fragment payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentHeader {
    /// Fragment timestamp
    pub timestamp: u64,
    /// Fragment source id
    pub source_id: u32,
    /// Payload size in bytes
    pub size: u32,
    /// Barrier class; 0 = not a barrier
    pub barrier: u32,
}

impl FragmentHeader {
    /// Build the frame header for a fragment descriptor
    #[inline]
    pub fn for_fragment(frag: &Fragment) -> Self {
        Self {
            timestamp: frag.timestamp(),
            source_id: frag.source_id(),
            size: frag.size() as u32,
            barrier: frag.barrier().unwrap_or(0),
        }
    }

    /// Build the frame header for a raw record on the pass-through path
    ///
    /// A body header supplies timestamp, source id and barrier directly;
    /// without one the record is framed with [`NULL_TIMESTAMP`], the
    /// caller's default source id, and the type tag as barrier class for
    /// state transitions. No extractor runs on this path.
    pub fn for_record(record: &crate::RawRecord, default_source: u32) -> Self {
        let size = record.size() as u32;
        match record.body_header() {
            Some(bh) => Self {
                timestamp: bh.timestamp,
                source_id: bh.source_id,
                size,
                barrier: bh.barrier,
            },
            None => Self {
                timestamp: NULL_TIMESTAMP,
                source_id: default_source,
                size,
                barrier: if record.is_state_change() {
                    record.type_tag()
                } else {
                    0
                },
            },
        }
    }

    /// Encode to a fixed byte array
    pub fn to_bytes(&self) -> [u8; FRAGMENT_HEADER_SIZE] {
        let mut buf = [0u8; FRAGMENT_HEADER_SIZE];
        buf[0..8].copy_from_slice(&self.timestamp.to_le_bytes());
        buf[8..12].copy_from_slice(&self.source_id.to_le_bytes());
        buf[12..16].copy_from_slice(&self.size.to_le_bytes());
        buf[16..20].copy_from_slice(&self.barrier.to_le_bytes());
        buf
    }

    /// Append the encoded header to a buffer
    pub fn encode_into(&self, buf: &mut impl BufMut) {
        buf.put_u64_le(self.timestamp);
        buf.put_u32_le(self.source_id);
        buf.put_u32_le(self.size);
        buf.put_u32_le(self.barrier);
    }

    /// Decode a header from the front of `buf`
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() < FRAGMENT_HEADER_SIZE {
            return Err(ProtocolError::HeaderTooShort {
                expected: FRAGMENT_HEADER_SIZE,
                actual: buf.len(),
            });
        }
        Ok(Self {
            timestamp: u64::from_le_bytes(buf[0..8].try_into().unwrap_or([0; 8])),
            source_id: u32::from_le_bytes(buf[8..12].try_into().unwrap_or([0; 4])),
            size: u32::from_le_bytes(buf[12..16].try_into().unwrap_or([0; 4])),
            barrier: u32::from_le_bytes(buf[16..20].try_into().unwrap_or([0; 4])),
        })
    }
}

/// Default packed-buffer budget for one drain pass (10 MiB)
pub const DEFAULT_BATCH_BUDGET: usize = 10 * 1024 * 1024;

/// Packed batch of fragments built during one drain iteration
///
/// Fragment descriptors hold offsets, not pointers, so growing the buffer
/// re-bases every prior fragment for free: growth copies the whole packed
/// buffer into a fresh allocation sized `current_len + needed` and prior
/// `(offset, size)` pairs stay valid against the new allocation.
#[derive(Debug)]
pub struct FragmentBatch {
    buffer: Vec<u8>,
    fragments: Vec<Fragment>,
    budget: usize,
    grows: u32,
}

impl FragmentBatch {
    /// Create a batch with the given soft byte budget, pre-allocated in full
    pub fn with_budget(budget: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(budget),
            fragments: Vec::new(),
            budget,
            grows: 0,
        }
    }

    /// Create a batch with the default budget
    pub fn new() -> Self {
        Self::with_budget(DEFAULT_BATCH_BUDGET)
    }

    /// Append one fragment, copying `image` into the packed buffer
    ///
    /// Grows the buffer first if `image` does not fit, so no previously
    /// returned descriptor ever references a stale allocation.
    pub fn push(
        &mut self,
        timestamp: u64,
        source_id: u32,
        barrier: Option<u32>,
        image: &[u8],
    ) -> Fragment {
        self.ensure_capacity(image.len());

        let offset = self.buffer.len();
        self.buffer.extend_from_slice(image);

        let frag = Fragment {
            timestamp,
            source_id,
            barrier,
            offset,
            size: image.len(),
        };
        self.fragments.push(frag);
        frag
    }

    /// Grow the packed buffer to hold `additional` more bytes
    ///
    /// Reallocates to exactly `len + additional` and copies the whole batch;
    /// offsets are relative so prior fragments need no fixup.
    fn ensure_capacity(&mut self, additional: usize) {
        let needed = self.buffer.len() + additional;
        if needed <= self.buffer.capacity() {
            return;
        }
        let mut grown = Vec::with_capacity(needed);
        grown.extend_from_slice(&self.buffer);
        self.buffer = grown;
        self.grows += 1;
    }

    /// Read a fragment's packed bytes back
    #[inline]
    pub fn payload_of(&self, frag: &Fragment) -> &[u8] {
        &self.buffer[frag.offset()..frag.offset() + frag.size()]
    }

    /// Fragment descriptors in append order
    #[inline]
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Iterate fragments paired with their packed bytes
    pub fn iter(&self) -> impl Iterator<Item = (&Fragment, &[u8])> {
        self.fragments.iter().map(|f| (f, self.payload_of(f)))
    }

    /// Number of fragments in the batch
    #[inline]
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// Is the batch empty?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Bytes used in the packed buffer
    #[inline]
    pub fn bytes_used(&self) -> usize {
        self.buffer.len()
    }

    /// Has the soft byte budget been consumed?
    #[inline]
    pub fn over_budget(&self) -> bool {
        self.buffer.len() >= self.budget
    }

    /// Number of times the packed buffer grew past its budgeted allocation
    #[inline]
    pub fn grow_count(&self) -> u32 {
        self.grows
    }
}

impl Default for FragmentBatch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "fragment_test.rs"]
mod fragment_test;
