//! fragsrc sinks - the output side
//!
//! Two consumers live here:
//!
//! - [`OutputDrain`] dequeues raw records from the bounded queue, frames
//!   each as `[20-byte header][record image]` on a byte sink, and returns
//!   the slot to the free pool;
//! - [`StreamClient`] is the concrete event-builder client, streaming
//!   fragment batches over any `AsyncWrite`.

mod error;
mod output;
mod stream_client;

pub use error::SinkError;
pub use output::{OutputDrain, OutputMetrics, OutputOutcome, OutputSnapshot};
pub use stream_client::StreamClient;
