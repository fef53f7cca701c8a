//! Tests for the bounded ownership-transfer queue

use std::time::Duration;

use tokio::time::timeout;

use crate::bounded;

#[test]
fn test_new_queue_has_full_capacity() {
    let (producer, consumer) = bounded::<u32>(8);
    assert_eq!(producer.capacity(), 8);
    assert_eq!(producer.available(), 8);
    assert_eq!(producer.in_flight(), 0);
    assert_eq!(consumer.available(), 8);
}

#[test]
#[should_panic(expected = "non-zero")]
fn test_zero_capacity_panics() {
    let _ = bounded::<u32>(0);
}

#[test]
fn test_try_acquire_exhausts_exactly_at_capacity() {
    let (producer, _consumer) = bounded::<u32>(3);

    let s1 = producer.try_acquire().expect("slot 1");
    let s2 = producer.try_acquire().expect("slot 2");
    let s3 = producer.try_acquire().expect("slot 3");

    // All slots held: the only backpressure signal is None.
    assert!(producer.try_acquire().is_none());
    assert_eq!(producer.in_flight(), 3);

    // Returning one slot makes exactly one acquire succeed again.
    drop(s2);
    assert!(producer.try_acquire().is_some());
    assert!(producer.try_acquire().is_none());

    drop(s1);
    drop(s3);
}

#[tokio::test]
async fn test_capacity_invariant_across_send_recv_free() {
    let (producer, mut consumer) = bounded::<u32>(2);

    let slot = producer.try_acquire().expect("slot");
    producer.send(slot, 1).expect("send");
    let slot = producer.try_acquire().expect("slot");
    producer.send(slot, 2).expect("send");

    // Both slots queued: still exhausted.
    assert!(producer.try_acquire().is_none());

    // Receiving does not free the slot; the item still occupies it.
    let item = consumer.recv().await.expect("item");
    assert!(producer.try_acquire().is_none());
    assert_eq!(producer.in_flight(), 2);

    // Freeing does.
    let value = consumer.free(item);
    assert_eq!(value, 1);
    assert_eq!(producer.in_flight(), 1);
    assert!(producer.try_acquire().is_some());
}

#[tokio::test]
async fn test_fifo_order() {
    let (producer, mut consumer) = bounded::<u32>(16);

    for tag in 0..10u32 {
        let slot = producer.try_acquire().expect("slot");
        producer.send(slot, tag).expect("send");
    }

    for expected in 0..10u32 {
        let item = consumer.recv().await.expect("item");
        assert_eq!(*item, expected);
        consumer.free(item);
    }
}

#[tokio::test]
async fn test_blocking_acquire_waits_for_free() {
    let (producer, mut consumer) = bounded::<u32>(1);

    let slot = producer.try_acquire().expect("slot");
    producer.send(slot, 42).expect("send");

    // acquire() must not resolve while the single slot is occupied.
    assert!(
        timeout(Duration::from_millis(50), producer.acquire())
            .await
            .is_err(),
        "acquire resolved with no free slot"
    );

    // Consumer frees the slot from another task; acquire resolves.
    let waiter = {
        let producer = producer.clone();
        tokio::spawn(async move { producer.acquire().await })
    };

    let item = consumer.recv().await.expect("item");
    consumer.free(item);

    let slot = timeout(Duration::from_secs(1), waiter)
        .await
        .expect("acquire timed out")
        .expect("task panicked");
    drop(slot);
}

#[tokio::test]
async fn test_recv_none_after_producers_gone() {
    let (producer, mut consumer) = bounded::<u32>(4);

    let slot = producer.try_acquire().expect("slot");
    producer.send(slot, 7).expect("send");
    drop(producer);

    let item = consumer.recv().await.expect("queued item survives");
    assert_eq!(*item, 7);
    consumer.free(item);

    assert!(consumer.recv().await.is_none());
}

#[test]
fn test_send_after_consumer_gone_returns_item() {
    let (producer, consumer) = bounded::<String>(2);
    drop(consumer);

    let slot = producer.try_acquire().expect("slot");
    let rejected = producer
        .send(slot, "orphan".to_string())
        .expect_err("send must fail with consumer gone");
    assert_eq!(rejected, "orphan");

    // The slot came back with the rejection.
    assert_eq!(producer.available(), 2);
}

#[tokio::test]
async fn test_dropped_item_returns_slot() {
    let (producer, mut consumer) = bounded::<u32>(1);

    let slot = producer.try_acquire().expect("slot");
    producer.send(slot, 1).expect("send");

    let item = consumer.recv().await.expect("item");
    // Shutdown path: item dropped without an explicit free.
    drop(item);

    assert_eq!(producer.available(), 1);
}

#[tokio::test]
async fn test_try_recv() {
    let (producer, mut consumer) = bounded::<u32>(2);
    assert!(consumer.try_recv().is_none());

    let slot = producer.try_acquire().expect("slot");
    producer.send(slot, 5).expect("send");

    let item = consumer.try_recv().expect("queued item");
    assert_eq!(*item, 5);
    consumer.free(item);
    assert!(consumer.try_recv().is_none());
}

#[tokio::test]
async fn test_multiple_producers_share_capacity() {
    let (producer_a, mut consumer) = bounded::<u32>(2);
    let producer_b = producer_a.clone();

    let s1 = producer_a.try_acquire().expect("slot");
    let s2 = producer_b.try_acquire().expect("slot");
    assert!(producer_a.try_acquire().is_none());
    assert!(producer_b.try_acquire().is_none());

    producer_a.send(s1, 1).expect("send");
    producer_b.send(s2, 2).expect("send");

    let first = consumer.recv().await.expect("first");
    assert_eq!(*first, 1);
    consumer.free(first);
    let second = consumer.recv().await.expect("second");
    assert_eq!(*second, 2);
    consumer.free(second);
}
