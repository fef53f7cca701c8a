//! Ring transport adapters
//!
//! The shared ring buffer itself is an external collaborator; this module
//! defines the narrow seam the drain loop needs ("attach, poll, read") and
//! ships two adapters:
//!
//! - [`TcpRing`] consumes the self-describing record stream over a TCP
//!   connection (the usual proxy transport for a remote ring);
//! - [`MemoryRing`] is an in-process loopback ring for tests and demos.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::Notify;

use fragsrc_protocol::{RawRecord, BASE_HEADER_SIZE, MAX_RECORD_SIZE};

use crate::error::SourceError;

/// Read buffer size for the TCP adapter (1 MiB)
const TCP_READ_BUFFER: usize = 1024 * 1024;

/// Parsed ring address
///
/// # Example
///
/// ```
/// use fragsrc_source::RingAddress;
///
/// let addr = RingAddress::parse("tcp://daq-host:30000").unwrap();
/// assert_eq!(addr, RingAddress::Tcp("daq-host:30000".into()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RingAddress {
    /// Record stream over TCP: `tcp://host:port`
    Tcp(String),

    /// In-process loopback ring: `mem://name`
    Memory(String),
}

impl RingAddress {
    /// Parse a ring address string
    ///
    /// # Errors
    ///
    /// [`SourceError::InvalidAddress`] on a missing scheme, an unsupported
    /// scheme, or an empty authority.
    pub fn parse(address: &str) -> Result<Self, SourceError> {
        let Some((scheme, rest)) = address.split_once("://") else {
            return Err(SourceError::invalid_address(
                address,
                "expected '<scheme>://...'",
            ));
        };
        if rest.is_empty() {
            return Err(SourceError::invalid_address(address, "empty authority"));
        }
        match scheme {
            "tcp" => Ok(Self::Tcp(rest.to_string())),
            "mem" => Ok(Self::Memory(rest.to_string())),
            other => Err(SourceError::invalid_address(
                address,
                format!("unsupported scheme '{other}' (expected tcp or mem)"),
            )),
        }
    }
}

impl std::fmt::Display for RingAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tcp(authority) => write!(f, "tcp://{authority}"),
            Self::Memory(name) => write!(f, "mem://{name}"),
        }
    }
}

/// The drain loop's view of a ring transport
#[async_trait]
pub trait RingConsumer: Send {
    /// Wait up to `timeout` for at least one complete record
    ///
    /// Returns `Ok(true)` when [`RingConsumer::pop`] would yield a record,
    /// `Ok(false)` on an empty poll.
    async fn wait_available(&mut self, timeout: Duration) -> Result<bool, SourceError>;

    /// Take the next complete record without waiting
    fn pop(&mut self) -> Result<Option<RawRecord>, SourceError>;

    /// Bytes currently buffered and readable without waiting
    fn available(&self) -> usize;
}

/// Record stream over a TCP connection
#[derive(Debug)]
pub struct TcpRing {
    stream: TcpStream,
    buf: BytesMut,
    address: String,
    eof: bool,
}

impl TcpRing {
    /// Connect to a record stream
    ///
    /// # Errors
    ///
    /// [`SourceError::Attach`] if the connection cannot be established.
    pub async fn attach(authority: &str) -> Result<Self, SourceError> {
        let stream = TcpStream::connect(authority)
            .await
            .map_err(|source| SourceError::Attach {
                address: format!("tcp://{authority}"),
                source,
            })?;
        tracing::info!(address = %authority, "attached to ring stream");
        Ok(Self {
            stream,
            buf: BytesMut::with_capacity(TCP_READ_BUFFER),
            address: authority.to_string(),
            eof: false,
        })
    }

    /// Has the far side closed the stream?
    pub fn at_eof(&self) -> bool {
        self.eof
    }

    /// One complete record is buffered
    fn decodable(&self) -> bool {
        match RawRecord::peek_size(&self.buf) {
            Some(size) => self.buf.len() >= size.max(BASE_HEADER_SIZE),
            None => false,
        }
    }

    /// Read more bytes from the stream; returns false at EOF
    async fn fill(&mut self) -> Result<bool, SourceError> {
        let n = self.stream.read_buf(&mut self.buf).await?;
        if n == 0 {
            if !self.eof {
                tracing::warn!(address = %self.address, "ring stream closed by peer");
            }
            self.eof = true;
            return Ok(false);
        }
        Ok(true)
    }
}

#[async_trait]
impl RingConsumer for TcpRing {
    async fn wait_available(&mut self, timeout: Duration) -> Result<bool, SourceError> {
        if self.decodable() {
            return Ok(true);
        }
        if self.eof {
            tokio::time::sleep(timeout).await;
            return Ok(false);
        }
        let deadline = tokio::time::Instant::now() + timeout;
        while !self.decodable() {
            match tokio::time::timeout_at(deadline, self.fill()).await {
                Ok(Ok(true)) => continue,
                Ok(Ok(false)) => return Ok(false), // EOF
                Ok(Err(e)) => return Err(e),
                Err(_) => return Ok(false), // poll interval elapsed
            }
        }
        Ok(true)
    }

    fn pop(&mut self) -> Result<Option<RawRecord>, SourceError> {
        let Some(size) = RawRecord::peek_size(&self.buf) else {
            return Ok(None);
        };
        // A corrupt size field means the stream is out of sync; there is no
        // way to resynchronize a self-describing stream.
        if size < BASE_HEADER_SIZE {
            return Err(fragsrc_protocol::ProtocolError::too_short(BASE_HEADER_SIZE, size).into());
        }
        if size > MAX_RECORD_SIZE {
            return Err(fragsrc_protocol::ProtocolError::oversized(size).into());
        }
        if self.buf.len() < size {
            return Ok(None);
        }
        let image = self.buf.split_to(size).freeze();
        Ok(Some(RawRecord::decode(image)?))
    }

    fn available(&self) -> usize {
        self.buf.len()
    }
}

/// Shared state behind the loopback ring
struct MemoryState {
    queue: Mutex<VecDeque<RawRecord>>,
    bytes: AtomicUsize,
    notify: Notify,
    closed: AtomicBool,
}

/// In-process loopback ring, consumer half
pub struct MemoryRing {
    state: Arc<MemoryState>,
}

/// In-process loopback ring, producer half
#[derive(Clone)]
pub struct MemoryRingWriter {
    state: Arc<MemoryState>,
}

impl MemoryRing {
    /// Create a connected writer/consumer pair
    pub fn channel() -> (MemoryRingWriter, MemoryRing) {
        let state = Arc::new(MemoryState {
            queue: Mutex::new(VecDeque::new()),
            bytes: AtomicUsize::new(0),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        });
        (
            MemoryRingWriter {
                state: Arc::clone(&state),
            },
            MemoryRing { state },
        )
    }

    fn is_empty(&self) -> bool {
        self.state
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

impl MemoryRingWriter {
    /// Push one record into the ring
    pub fn push(&self, record: RawRecord) {
        let size = record.size();
        self.state
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(record);
        self.state.bytes.fetch_add(size, Ordering::Relaxed);
        self.state.notify.notify_one();
    }

    /// Mark the ring closed (no more records will be pushed)
    pub fn close(&self) {
        self.state.closed.store(true, Ordering::Relaxed);
        self.state.notify.notify_one();
    }
}

#[async_trait]
impl RingConsumer for MemoryRing {
    async fn wait_available(&mut self, timeout: Duration) -> Result<bool, SourceError> {
        if !self.is_empty() {
            return Ok(true);
        }
        let notified = self.state.notify.notified();
        tokio::pin!(notified);
        // Re-check after registering for notification: a push may have
        // landed between the emptiness test and the registration.
        if !self.is_empty() {
            return Ok(true);
        }
        tokio::select! {
            _ = &mut notified => Ok(!self.is_empty()),
            _ = tokio::time::sleep(timeout) => Ok(!self.is_empty()),
        }
    }

    fn pop(&mut self) -> Result<Option<RawRecord>, SourceError> {
        let record = self
            .state
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(ref record) = record {
            self.state.bytes.fetch_sub(record.size(), Ordering::Relaxed);
        }
        Ok(record)
    }

    fn available(&self) -> usize {
        self.state.bytes.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
#[path = "ring_test.rs"]
mod ring_test;
