use async_trait::async_trait;
use thiserror::Error;
use tracing::trace;

use crate::utils::format_hex;

/// Errors reported by a byte-stream transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is closed")]
    Closed,
    #[error("transport write failed")]
    Io(#[from] std::io::Error),
}

/// Ordered, reliable byte sink the driver writes frames to.
///
/// Inbound bytes are pushed to the driver separately, one chunk at a time.
#[async_trait]
pub trait Transport: Send {
    /// Writes all of `bytes`.
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
}

/// Transport that records every write in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryTransport {
    writes: Vec<Vec<u8>>,
    closed: bool,
}

impl MemoryTransport {
    /// Creates an open transport with no recorded writes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns each write in order.
    #[must_use]
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }

    /// Removes and returns the recorded writes.
    pub fn take_writes(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.writes)
    }

    /// Makes subsequent writes fail with [`TransportError::Closed`].
    pub fn close(&mut self) {
        self.closed = true;
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        trace!(bytes = %format_hex(bytes), "memory transport write");
        self.writes.push(bytes.to_vec());
        Ok(())
    }
}
