//! fragsrc source - the ring side
//!
//! Owns everything between the ring transport and the downstream
//! consumers:
//!
//! - [`RingConsumer`] is the seam to the ring transport, with a TCP stream
//!   adapter and an in-process loopback ring;
//! - [`DrainLoop`] polls the ring, applies the predicate and assembler,
//!   and submits fragment batches to an [`EventBuilderClient`];
//! - [`OneshotState`] tracks end-of-run completion across independent
//!   sources so a one-shot process can terminate deterministically;
//! - [`RecordRelay`] is the pass-through producer feeding raw records into
//!   the bounded queue under an explicit admission policy.

mod client;
mod drain;
mod error;
mod oneshot;
mod relay;
mod ring;

pub use client::{ClientError, CollectingClient, EventBuilderClient};
pub use drain::{DrainConfig, DrainLoop, DrainMetrics, DrainOutcome, DrainSnapshot};
pub use error::SourceError;
pub use oneshot::OneshotState;
pub use relay::{AdmissionMode, RecordRelay, RelayConfig, RelayMetrics, RelaySnapshot};
pub use ring::{MemoryRing, MemoryRingWriter, RingAddress, RingConsumer, TcpRing};
