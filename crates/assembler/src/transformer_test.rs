//! Tests for the fragment assembler

use std::sync::Arc;

use fragsrc_protocol::{
    types, BodyHeader, FragmentBatch, RecordBuilder, NULL_TIMESTAMP,
};

use crate::error::AssembleError;
use crate::extractor::{NullExtractor, PayloadWordExtractor};
use crate::transformer::{AssemblerPolicy, FragmentAssembler, Outcome};

fn assembler(policy: AssemblerPolicy) -> FragmentAssembler {
    FragmentAssembler::new(policy, Arc::new(PayloadWordExtractor::new(0)))
        .expect("valid policy")
}

fn default_policy() -> AssemblerPolicy {
    AssemblerPolicy {
        default_id: Some(1),
        ..Default::default()
    }
}

#[test]
fn test_init_fails_without_source_id_path() {
    let err = FragmentAssembler::new(AssemblerPolicy::default(), Arc::new(NullExtractor))
        .unwrap_err();
    assert!(matches!(err, AssembleError::NoSourceId));
}

#[test]
fn test_init_ok_with_body_header_expectation_alone() {
    let policy = AssemblerPolicy {
        expect_body_headers: true,
        ..Default::default()
    };
    assert!(FragmentAssembler::new(policy, Arc::new(NullExtractor)).is_ok());
}

#[test]
fn test_body_header_wins_for_source_and_timestamp() {
    let asm = assembler(default_policy());
    let mut batch = FragmentBatch::with_budget(1024);

    let record = RecordBuilder::new(types::PHYSICS_EVENT)
        .body_header(BodyHeader::new(5000, 9))
        .payload(777u64.to_le_bytes()) // extractor would say 777
        .build_record();

    let Outcome::Appended(frag) = asm.transform(&record, &mut batch) else {
        panic!("expected appended fragment");
    };
    assert_eq!(frag.source_id(), 9);
    assert_eq!(frag.timestamp(), 5000);
    assert_eq!(frag.barrier(), None);
}

#[test]
fn test_extractor_used_without_body_header() {
    let asm = assembler(default_policy());
    let mut batch = FragmentBatch::with_budget(1024);

    let record = RecordBuilder::new(types::PHYSICS_EVENT)
        .payload(777u64.to_le_bytes())
        .build_record();

    let Outcome::Appended(frag) = asm.transform(&record, &mut batch) else {
        panic!("expected appended fragment");
    };
    assert_eq!(frag.source_id(), 1, "default id applies");
    assert_eq!(frag.timestamp(), 777);
}

#[test]
fn test_tick_offset_applied_to_both_paths() {
    let policy = AssemblerPolicy {
        tick_offset: 100,
        ..default_policy()
    };
    let asm = assembler(policy);
    let mut batch = FragmentBatch::with_budget(1024);

    let with_bh = RecordBuilder::new(types::PHYSICS_EVENT)
        .body_header(BodyHeader::new(5000, 2))
        .build_record();
    let without_bh = RecordBuilder::new(types::PHYSICS_EVENT)
        .payload(777u64.to_le_bytes())
        .build_record();

    let Outcome::Appended(a) = asm.transform(&with_bh, &mut batch) else {
        panic!("expected appended fragment");
    };
    let Outcome::Appended(b) = asm.transform(&without_bh, &mut batch) else {
        panic!("expected appended fragment");
    };
    assert_eq!(a.timestamp(), 5100);
    assert_eq!(b.timestamp(), 877);
}

#[test]
fn test_negative_tick_offset() {
    let policy = AssemblerPolicy {
        tick_offset: -50,
        ..default_policy()
    };
    let asm = assembler(policy);
    let mut batch = FragmentBatch::with_budget(1024);

    let record = RecordBuilder::new(types::PHYSICS_EVENT)
        .body_header(BodyHeader::new(5000, 2))
        .build_record();
    let Outcome::Appended(frag) = asm.transform(&record, &mut batch) else {
        panic!("expected appended fragment");
    };
    assert_eq!(frag.timestamp(), 4950);
}

#[test]
fn test_offset_never_applied_to_null_timestamp() {
    let policy = AssemblerPolicy {
        tick_offset: 100,
        ..default_policy()
    };
    let asm = assembler(policy);
    let mut batch = FragmentBatch::with_budget(1024);

    // Scalers carry no timestamp; the offset must not fabricate one.
    let record = RecordBuilder::new(types::PERIODIC_SCALERS)
        .payload([0u8; 32])
        .build_record();
    let Outcome::Appended(frag) = asm.transform(&record, &mut batch) else {
        panic!("expected appended fragment");
    };
    assert_eq!(frag.timestamp(), NULL_TIMESTAMP);
}

#[test]
fn test_state_change_without_body_header_is_null_barrier() {
    let asm = assembler(default_policy());
    let mut batch = FragmentBatch::with_budget(1024);

    let record = RecordBuilder::new(types::END_RUN).build_record();
    let Outcome::Appended(frag) = asm.transform(&record, &mut batch) else {
        panic!("expected appended fragment");
    };
    assert_eq!(frag.timestamp(), NULL_TIMESTAMP);
    assert_eq!(frag.barrier(), Some(types::END_RUN));
    assert!(frag.is_barrier());
}

#[test]
fn test_body_header_barrier_classification() {
    let asm = assembler(default_policy());
    let mut batch = FragmentBatch::with_budget(1024);

    let barrier = RecordBuilder::new(types::BEGIN_RUN)
        .body_header(BodyHeader::barrier(0, 4, 1))
        .build_record();
    let ordinary = RecordBuilder::new(types::PHYSICS_EVENT)
        .body_header(BodyHeader::new(10, 4))
        .build_record();

    let Outcome::Appended(a) = asm.transform(&barrier, &mut batch) else {
        panic!("expected appended fragment");
    };
    let Outcome::Appended(b) = asm.transform(&ordinary, &mut batch) else {
        panic!("expected appended fragment");
    };
    assert_eq!(a.barrier(), Some(1));
    assert_eq!(b.barrier(), None);
}

#[test]
fn test_allowed_ids_filtering_preserves_order() {
    let policy = AssemblerPolicy {
        default_id: Some(2),
        allowed_ids: vec![2],
        ..Default::default()
    };
    let asm = assembler(policy);
    let mut batch = FragmentBatch::with_budget(4096);

    // Stream with source ids 1, 2, 3, 2 - only id 2 survives, in order.
    let stream = [
        (1u32, 10u64),
        (2, 20),
        (3, 30),
        (2, 40),
    ];
    for (source_id, ts) in stream {
        let record = RecordBuilder::new(types::PHYSICS_EVENT)
            .body_header(BodyHeader::new(ts, source_id))
            .build_record();
        asm.transform(&record, &mut batch);
    }

    let ids: Vec<u32> = batch.fragments().iter().map(|f| f.source_id()).collect();
    let stamps: Vec<u64> = batch.fragments().iter().map(|f| f.timestamp()).collect();
    assert_eq!(ids, vec![2, 2]);
    assert_eq!(stamps, vec![20, 40], "relative order preserved");
}

#[test]
fn test_filtered_outcome_reports_id() {
    let policy = AssemblerPolicy {
        default_id: Some(2),
        allowed_ids: vec![2],
        ..Default::default()
    };
    let asm = assembler(policy);
    let mut batch = FragmentBatch::with_budget(1024);

    let record = RecordBuilder::new(types::PHYSICS_EVENT)
        .body_header(BodyHeader::new(1, 7))
        .build_record();
    assert_eq!(
        asm.transform(&record, &mut batch),
        Outcome::FilteredSourceId(7)
    );
    assert!(batch.is_empty());
}

#[test]
fn test_missing_body_header_skipped() {
    let policy = AssemblerPolicy {
        expect_body_headers: true,
        ..Default::default()
    };
    let asm = FragmentAssembler::new(policy, Arc::new(NullExtractor)).expect("policy");
    let mut batch = FragmentBatch::with_budget(1024);

    let record = RecordBuilder::new(types::PHYSICS_EVENT)
        .payload(b"naked")
        .build_record();
    assert_eq!(asm.transform(&record, &mut batch), Outcome::MissingBodyHeader);
    assert!(batch.is_empty());
}

#[test]
fn test_batch_holds_full_record_image() {
    let asm = assembler(default_policy());
    let mut batch = FragmentBatch::with_budget(1024);

    let record = RecordBuilder::new(types::PHYSICS_EVENT)
        .body_header(BodyHeader::new(5, 1))
        .payload(b"imaging")
        .build_record();

    let Outcome::Appended(frag) = asm.transform(&record, &mut batch) else {
        panic!("expected appended fragment");
    };
    assert_eq!(frag.size(), record.size());
    assert_eq!(batch.payload_of(&frag), record.as_bytes().as_ref());
}
