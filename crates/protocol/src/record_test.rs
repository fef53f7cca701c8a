//! Tests for record parsing and construction

use bytes::Bytes;

use crate::record::{BodyHeader, RawRecord, RecordBuilder};
use crate::{types, ProtocolError, BASE_HEADER_SIZE, BODY_HEADER_SIZE};

#[test]
fn test_round_trip_without_body_header() {
    let record = RecordBuilder::new(types::PHYSICS_EVENT)
        .payload(b"event-bytes")
        .build_record();

    assert_eq!(record.type_tag(), types::PHYSICS_EVENT);
    assert_eq!(record.size(), BASE_HEADER_SIZE + 11);
    assert!(record.body_header().is_none());
    assert_eq!(record.payload(), b"event-bytes");
}

#[test]
fn test_round_trip_with_body_header() {
    let record = RecordBuilder::new(types::PHYSICS_EVENT)
        .body_header(BodyHeader::new(0xDEAD_BEEF_CAFE, 7))
        .payload(b"xyz")
        .build_record();

    let bh = record.body_header().expect("body header present");
    assert_eq!(bh.timestamp, 0xDEAD_BEEF_CAFE);
    assert_eq!(bh.source_id, 7);
    assert_eq!(bh.barrier, 0);
    assert_eq!(record.size(), BASE_HEADER_SIZE + BODY_HEADER_SIZE + 3);
    assert_eq!(record.payload(), b"xyz");
}

#[test]
fn test_barrier_body_header() {
    let record = RecordBuilder::new(types::END_RUN)
        .body_header(BodyHeader::barrier(100, 3, 2))
        .build_record();

    assert_eq!(record.body_header().map(|b| b.barrier), Some(2));
    assert!(record.is_end_run());
    assert!(record.is_state_change());
}

#[test]
fn test_empty_payload() {
    let record = RecordBuilder::new(types::BEGIN_RUN).build_record();
    assert!(record.payload().is_empty());
    assert_eq!(record.size(), BASE_HEADER_SIZE);
}

#[test]
fn test_decode_truncated_header() {
    let err = RawRecord::decode(Bytes::from_static(&[1, 2, 3])).unwrap_err();
    assert!(matches!(err, ProtocolError::RecordTooShort { .. }));
}

#[test]
fn test_decode_size_mismatch() {
    let image = RecordBuilder::new(types::PHYSICS_EVENT)
        .payload(b"abcdef")
        .build();
    // Chop the tail off: the size field no longer matches the image.
    let truncated = image.slice(0..image.len() - 2);
    let err = RawRecord::decode(truncated).unwrap_err();
    assert!(matches!(err, ProtocolError::SizeMismatch { .. }));
}

#[test]
fn test_decode_bad_body_header_size() {
    let mut raw = Vec::new();
    raw.extend_from_slice(&(BASE_HEADER_SIZE as u32).to_le_bytes());
    raw.extend_from_slice(&types::PHYSICS_EVENT.to_le_bytes());
    raw.extend_from_slice(&7u32.to_le_bytes()); // neither 0 nor 16
    let err = RawRecord::decode(Bytes::from(raw)).unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidBodyHeaderSize(7)));
}

#[test]
fn test_decode_oversized() {
    let mut raw = Vec::new();
    raw.extend_from_slice(&u32::MAX.to_le_bytes());
    raw.extend_from_slice(&types::PHYSICS_EVENT.to_le_bytes());
    raw.extend_from_slice(&0u32.to_le_bytes());
    let err = RawRecord::decode(Bytes::from(raw)).unwrap_err();
    assert!(matches!(err, ProtocolError::Oversized { .. }));
}

#[test]
fn test_peek_size() {
    let image = RecordBuilder::new(types::PHYSICS_EVENT)
        .payload(b"pay")
        .build();

    assert_eq!(RawRecord::peek_size(&image), Some(image.len()));
    assert_eq!(RawRecord::peek_size(&image[..3]), None);
    assert_eq!(RawRecord::peek_size(&[]), None);
}

#[test]
fn test_record_is_zero_copy() {
    let record = RecordBuilder::new(types::PHYSICS_EVENT)
        .payload(vec![0xAB; 1024])
        .build_record();

    // Cloning shares the same underlying image.
    let clone = record.clone();
    assert_eq!(
        record.as_bytes().as_ptr(),
        clone.as_bytes().as_ptr(),
        "clone must not copy the image"
    );
}

#[test]
fn test_classification_helpers() {
    assert!(crate::is_state_change(types::BEGIN_RUN));
    assert!(crate::is_state_change(types::END_RUN));
    assert!(crate::is_state_change(types::PAUSE_RUN));
    assert!(crate::is_state_change(types::RESUME_RUN));
    assert!(!crate::is_state_change(types::PHYSICS_EVENT));
    assert!(!crate::is_state_change(types::PERIODIC_SCALERS));

    assert!(crate::carries_timestamp(types::PHYSICS_EVENT));
    assert!(!crate::carries_timestamp(types::PERIODIC_SCALERS));
    assert!(!crate::carries_timestamp(types::RUN_STATE_TEXT));

    assert!(crate::is_end_run(types::END_RUN));
    assert!(!crate::is_end_run(types::BEGIN_RUN));
}
