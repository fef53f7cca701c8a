//! Tests for the relay producer

use std::time::Duration;

use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use fragsrc_protocol::{types, RawRecord, RecordBuilder};
use fragsrc_queue::bounded;

use crate::relay::{AdmissionMode, RecordRelay, RelayConfig};
use crate::ring::MemoryRing;

fn physics(word: u64) -> RawRecord {
    RecordBuilder::new(types::PHYSICS_EVENT)
        .payload(word.to_le_bytes())
        .build_record()
}

fn quick_config(admission: AdmissionMode) -> RelayConfig {
    RelayConfig {
        poll_interval: Duration::from_millis(10),
        admission,
        stop_after_ends: None,
    }
}

#[tokio::test]
async fn test_relay_passes_records_in_order() {
    let (writer, ring) = MemoryRing::channel();
    let (producer, mut consumer) = bounded::<RawRecord>(16);

    for i in 0..5u64 {
        writer.push(physics(i));
    }

    let relay = RecordRelay::new(ring, producer)
        .with_config(quick_config(AdmissionMode::Blocking));
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(relay.run(cancel.clone()));

    for expected in 0..5u64 {
        let item = timeout(Duration::from_secs(2), consumer.recv())
            .await
            .expect("recv timed out")
            .expect("queue open");
        let mut word = [0u8; 8];
        word.copy_from_slice(&item.payload()[..8]);
        assert_eq!(u64::from_le_bytes(word), expected);
        consumer.free(item);
    }

    cancel.cancel();
    handle.await.expect("join").expect("run");
}

#[tokio::test]
async fn test_non_blocking_drops_on_full_queue() {
    let (writer, ring) = MemoryRing::channel();
    let (producer, mut consumer) = bounded::<RawRecord>(2);

    for i in 0..6u64 {
        writer.push(physics(i));
    }

    let relay = RecordRelay::new(ring, producer)
        .with_config(quick_config(AdmissionMode::NonBlocking));
    let metrics = relay.metrics_handle();
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(relay.run(cancel.clone()));

    // Consumer never frees until the relay has read everything: only the
    // first two records fit, the rest are dropped.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.records_read, 6);
    assert_eq!(snapshot.records_sent, 2);
    assert_eq!(snapshot.records_dropped, 4);

    let first = consumer.recv().await.expect("first");
    let mut word = [0u8; 8];
    word.copy_from_slice(&first.payload()[..8]);
    assert_eq!(u64::from_le_bytes(word), 0, "drops lose the tail, not the head");
    consumer.free(first);

    cancel.cancel();
    handle.await.expect("join").expect("run");
}

#[tokio::test]
async fn test_blocking_admission_waits_for_free_slot() {
    let (writer, ring) = MemoryRing::channel();
    let (producer, mut consumer) = bounded::<RawRecord>(1);

    writer.push(physics(0));
    writer.push(physics(1));

    let relay = RecordRelay::new(ring, producer)
        .with_config(quick_config(AdmissionMode::Blocking));
    let metrics = relay.metrics_handle();
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(relay.run(cancel.clone()));

    // With one slot and a parked consumer, the relay blocks after the
    // first record instead of dropping the second.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(metrics.snapshot().records_sent, 1);
    assert_eq!(metrics.snapshot().records_dropped, 0);

    let first = consumer.recv().await.expect("first");
    consumer.free(first);

    let second = timeout(Duration::from_secs(2), consumer.recv())
        .await
        .expect("recv timed out")
        .expect("queue open");
    consumer.free(second);
    assert_eq!(metrics.snapshot().records_sent, 2);

    cancel.cancel();
    handle.await.expect("join").expect("run");
}

#[tokio::test]
async fn test_relay_stops_after_configured_ends() {
    let (writer, ring) = MemoryRing::channel();
    let (producer, mut consumer) = bounded::<RawRecord>(16);

    writer.push(physics(0));
    writer.push(RecordBuilder::new(types::END_RUN).build_record());
    writer.push(RecordBuilder::new(types::END_RUN).build_record());
    writer.push(physics(1)); // behind the final end; must not be read

    let relay = RecordRelay::new(ring, producer).with_config(RelayConfig {
        poll_interval: Duration::from_millis(10),
        admission: AdmissionMode::Blocking,
        stop_after_ends: Some(2),
    });

    timeout(Duration::from_secs(2), relay.run(CancellationToken::new()))
        .await
        .expect("relay timed out")
        .expect("relay failed");

    let mut types_seen = Vec::new();
    while let Some(item) = consumer.recv().await {
        types_seen.push(item.type_tag());
        consumer.free(item);
    }
    assert_eq!(
        types_seen,
        vec![types::PHYSICS_EVENT, types::END_RUN, types::END_RUN]
    );
}

#[tokio::test]
async fn test_relay_stops_when_consumer_gone() {
    let (writer, ring) = MemoryRing::channel();
    let (producer, consumer) = bounded::<RawRecord>(4);
    drop(consumer);

    writer.push(physics(0));

    let relay = RecordRelay::new(ring, producer)
        .with_config(quick_config(AdmissionMode::Blocking));

    // The consumer being gone is a normal shutdown, not an error.
    timeout(Duration::from_secs(2), relay.run(CancellationToken::new()))
        .await
        .expect("relay timed out")
        .expect("relay treats closed queue as shutdown");
}
