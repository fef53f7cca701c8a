//! Record parsing and construction
//!
//! A record is a self-describing binary unit:
//!
//! ```text
//! [u32 size][u32 type][u32 body_header_size][body header?][payload]
//! ```
//!
//! `size` counts the whole record including headers. `body_header_size` is
//! either 0 or [`BODY_HEADER_SIZE`]; when present, the body header carries
//! the source id, timestamp and barrier classification directly, so no
//! timestamp extraction is needed downstream.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;
use crate::{BASE_HEADER_SIZE, BODY_HEADER_SIZE, MAX_RECORD_SIZE};

/// Structured record prefix carrying timestamp, source id and barrier class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyHeader {
    /// Hardware timestamp in clock ticks
    pub timestamp: u64,

    /// Id of the data source that produced the record
    pub source_id: u32,

    /// Barrier class; 0 means "not a barrier"
    pub barrier: u32,
}

impl BodyHeader {
    /// Create a non-barrier body header
    #[inline]
    pub fn new(timestamp: u64, source_id: u32) -> Self {
        Self {
            timestamp,
            source_id,
            barrier: 0,
        }
    }

    /// Create a barrier body header
    #[inline]
    pub fn barrier(timestamp: u64, source_id: u32, barrier: u32) -> Self {
        Self {
            timestamp,
            source_id,
            barrier,
        }
    }
}

/// One immutable record, parsed over its raw byte image
///
/// `RawRecord` is a zero-copy view: the byte image is reference counted via
/// `bytes::Bytes`, so cloning a record or passing it across a channel never
/// copies the payload.
#[derive(Debug, Clone)]
pub struct RawRecord {
    bytes: Bytes,
    type_tag: u32,
    body_header: Option<BodyHeader>,
    payload_offset: usize,
}

impl RawRecord {
    /// Parse a record from its full byte image
    ///
    /// The image must be exactly one record: the size field must equal
    /// `bytes.len()`.
    pub fn decode(bytes: Bytes) -> Result<Self, ProtocolError> {
        if bytes.len() < BASE_HEADER_SIZE {
            return Err(ProtocolError::too_short(BASE_HEADER_SIZE, bytes.len()));
        }

        let mut view = &bytes[..];
        let size = view.get_u32_le() as usize;
        let type_tag = view.get_u32_le();
        let bh_size = view.get_u32_le() as usize;

        if size > MAX_RECORD_SIZE {
            return Err(ProtocolError::oversized(size));
        }
        if size != bytes.len() {
            return Err(ProtocolError::size_mismatch(size, bytes.len()));
        }

        let body_header = match bh_size {
            0 => None,
            BODY_HEADER_SIZE => {
                if bytes.len() < BASE_HEADER_SIZE + BODY_HEADER_SIZE {
                    return Err(ProtocolError::too_short(
                        BASE_HEADER_SIZE + BODY_HEADER_SIZE,
                        bytes.len(),
                    ));
                }
                let timestamp = view.get_u64_le();
                let source_id = view.get_u32_le();
                let barrier = view.get_u32_le();
                Some(BodyHeader {
                    timestamp,
                    source_id,
                    barrier,
                })
            }
            other => return Err(ProtocolError::InvalidBodyHeaderSize(other)),
        };

        Ok(Self {
            bytes,
            type_tag,
            body_header,
            payload_offset: BASE_HEADER_SIZE + bh_size,
        })
    }

    /// Peek the declared size of the next record in a raw byte stream
    ///
    /// Returns `None` until at least the size field is buffered. Used by
    /// stream adapters to frame records without copying.
    #[inline]
    pub fn peek_size(buf: &[u8]) -> Option<usize> {
        if buf.len() < 4 {
            return None;
        }
        Some(u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize)
    }

    /// Record type tag
    #[inline]
    pub fn type_tag(&self) -> u32 {
        self.type_tag
    }

    /// Total record size in bytes (headers + payload)
    #[inline]
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Body header, if the record carries one
    #[inline]
    pub fn body_header(&self) -> Option<&BodyHeader> {
        self.body_header.as_ref()
    }

    /// Payload bytes (everything after the headers)
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.bytes[self.payload_offset..]
    }

    /// The full record image
    #[inline]
    pub fn as_bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Consume the record, returning its byte image
    #[inline]
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    /// Is this record an end-of-run marker?
    #[inline]
    pub fn is_end_run(&self) -> bool {
        crate::is_end_run(self.type_tag)
    }

    /// Is this record a run state transition?
    #[inline]
    pub fn is_state_change(&self) -> bool {
        crate::is_state_change(self.type_tag)
    }
}

/// Builder for record byte images
///
/// Used by record producers and by tests; the drain side only ever parses.
#[derive(Debug, Default)]
pub struct RecordBuilder {
    type_tag: u32,
    body_header: Option<BodyHeader>,
    payload: Vec<u8>,
}

impl RecordBuilder {
    /// Start a record of the given type
    pub fn new(type_tag: u32) -> Self {
        Self {
            type_tag,
            body_header: None,
            payload: Vec::new(),
        }
    }

    /// Attach a body header
    pub fn body_header(mut self, header: BodyHeader) -> Self {
        self.body_header = Some(header);
        self
    }

    /// Set the payload bytes
    pub fn payload(mut self, payload: impl AsRef<[u8]>) -> Self {
        self.payload = payload.as_ref().to_vec();
        self
    }

    /// Encode the record image
    pub fn build(self) -> Bytes {
        let bh_size = if self.body_header.is_some() {
            BODY_HEADER_SIZE
        } else {
            0
        };
        let size = BASE_HEADER_SIZE + bh_size + self.payload.len();

        let mut buf = BytesMut::with_capacity(size);
        buf.put_u32_le(size as u32);
        buf.put_u32_le(self.type_tag);
        buf.put_u32_le(bh_size as u32);
        if let Some(bh) = self.body_header {
            buf.put_u64_le(bh.timestamp);
            buf.put_u32_le(bh.source_id);
            buf.put_u32_le(bh.barrier);
        }
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Encode and parse back into a [`RawRecord`]
    ///
    /// Building a record we cannot re-parse is a bug, hence the unwrap-free
    /// signature: the decode cannot fail on a builder-produced image.
    pub fn build_record(self) -> RawRecord {
        let bytes = self.build();
        match RawRecord::decode(bytes) {
            Ok(record) => record,
            Err(_) => unreachable!("builder produced an undecodable record"),
        }
    }
}

#[cfg(test)]
#[path = "record_test.rs"]
mod record_test;
