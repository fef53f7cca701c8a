//! Bounded ownership-transfer queue
//!
//! Connects the ring-reading producer to the output drain. Capacity is
//! enforced entirely through a free-slot gate, not through the channel:
//! a producer must hold a [`FreeSlot`] before it may `send`, and the
//! consumer returns the slot with [`QueueConsumer::free`] once the item is
//! fully processed. The channel itself is unbounded and never blocks a
//! sender.
//!
//! # Admission modes
//!
//! - **Non-blocking**: [`QueueProducer::try_acquire`] returns `None` when
//!   all slots are in flight; the caller drops the input. This is the sole
//!   backpressure signal in this mode.
//! - **Blocking**: [`QueueProducer::acquire`] waits for the consumer to
//!   free a slot.
//!
//! # Ownership discipline
//!
//! Slots and items are move-only. An item received from the queue can be
//! freed exactly once because `free` consumes it; double-free and
//! use-after-free do not compile. Dropping a [`QueuedItem`] without calling
//! `free` still returns its slot, so shutdown paths cannot leak capacity.
//!
//! # Example
//!
//! ```ignore
//! let (producer, mut consumer) = fragsrc_queue::bounded::<Record>(1000);
//!
//! // Producer side (non-blocking admission):
//! match producer.try_acquire() {
//!     Some(slot) => producer.send(slot, record).ok(),
//!     None => drop(record), // queue full
//! };
//!
//! // Consumer side:
//! while let Some(item) = consumer.recv().await {
//!     write_out(&item)?;
//!     consumer.free(item);
//! }
//! ```

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Create a bounded queue with `capacity` free slots
///
/// # Panics
///
/// Panics if `capacity` is zero; a zero-slot queue can never admit an item.
pub fn bounded<T>(capacity: usize) -> (QueueProducer<T>, QueueConsumer<T>) {
    assert!(capacity > 0, "queue capacity must be non-zero");

    let gate = Arc::new(Semaphore::new(capacity));
    let (tx, rx) = mpsc::unbounded_channel();

    (
        QueueProducer {
            gate: Arc::clone(&gate),
            tx,
            capacity,
        },
        QueueConsumer { rx, gate, capacity },
    )
}

/// A free-slot token; holding one is the right to enqueue exactly one item
///
/// Dropping the token without sending returns the slot to the gate.
#[derive(Debug)]
pub struct FreeSlot {
    permit: OwnedSemaphorePermit,
}

/// An item in flight, paired with the slot it occupies
///
/// Dereferences to the payload. The slot travels with the item: it is
/// released when the consumer calls [`QueueConsumer::free`] (or when the
/// item is dropped on a shutdown path).
#[derive(Debug)]
pub struct QueuedItem<T> {
    item: T,
    _permit: OwnedSemaphorePermit,
}

impl<T> QueuedItem<T> {
    /// Borrow the payload
    #[inline]
    pub fn item(&self) -> &T {
        &self.item
    }
}

impl<T> std::ops::Deref for QueuedItem<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.item
    }
}

/// Producer half: acquires free slots and enqueues items
#[derive(Debug)]
pub struct QueueProducer<T> {
    gate: Arc<Semaphore>,
    tx: UnboundedSender<QueuedItem<T>>,
    capacity: usize,
}

impl<T> Clone for QueueProducer<T> {
    fn clone(&self) -> Self {
        Self {
            gate: Arc::clone(&self.gate),
            tx: self.tx.clone(),
            capacity: self.capacity,
        }
    }
}

impl<T> QueueProducer<T> {
    /// Take a free slot without waiting
    ///
    /// Returns `None` exactly when all `capacity` slots are in flight.
    pub fn try_acquire(&self) -> Option<FreeSlot> {
        Arc::clone(&self.gate)
            .try_acquire_owned()
            .ok()
            .map(|permit| FreeSlot { permit })
    }

    /// Wait until a free slot exists, then take it
    pub async fn acquire(&self) -> FreeSlot {
        match Arc::clone(&self.gate).acquire_owned().await {
            Ok(permit) => FreeSlot { permit },
            // The gate is owned by this queue and never closed.
            Err(_) => unreachable!("slot gate closed"),
        }
    }

    /// Enqueue an item into the slot; never waits
    ///
    /// Returns the item back if the consumer side is gone.
    pub fn send(&self, slot: FreeSlot, item: T) -> Result<(), T> {
        self.tx
            .send(QueuedItem {
                item,
                _permit: slot.permit,
            })
            .map_err(|rejected| rejected.0.item)
    }

    /// Configured slot capacity
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free slots currently available
    #[inline]
    pub fn available(&self) -> usize {
        self.gate.available_permits()
    }

    /// Slots currently in flight (held, queued, or received but not freed)
    #[inline]
    pub fn in_flight(&self) -> usize {
        self.capacity - self.gate.available_permits()
    }
}

/// Consumer half: receives items in FIFO order and frees their slots
#[derive(Debug)]
pub struct QueueConsumer<T> {
    rx: UnboundedReceiver<QueuedItem<T>>,
    gate: Arc<Semaphore>,
    capacity: usize,
}

impl<T> QueueConsumer<T> {
    /// Wait for the next item, FIFO order
    ///
    /// Returns `None` once every producer is gone and the queue is drained.
    pub async fn recv(&mut self) -> Option<QueuedItem<T>> {
        self.rx.recv().await
    }

    /// Take the next item if one is already queued
    pub fn try_recv(&mut self) -> Option<QueuedItem<T>> {
        self.rx.try_recv().ok()
    }

    /// Release an item's slot back to the gate, returning the payload
    ///
    /// Consumes the item: a freed item cannot be freed again or touched
    /// afterwards.
    pub fn free(&self, item: QueuedItem<T>) -> T {
        // The permit rides inside the item; dropping it here is the release.
        item.item
    }

    /// Configured slot capacity
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free slots currently available
    #[inline]
    pub fn available(&self) -> usize {
        self.gate.available_permits()
    }

    /// Slots currently in flight
    #[inline]
    pub fn in_flight(&self) -> usize {
        self.capacity - self.gate.available_permits()
    }
}

#[cfg(test)]
#[path = "queue_test.rs"]
mod queue_test;
