//! UDP transport for telemetry datagrams.
//!
//! There is no acknowledgment channel in either direction: a datagram that is
//! lost, truncated or rejected is gone.

pub mod receiver;
pub mod sender;

pub use receiver::{Datagram, IngestPipeline, PipelineSettings, RECEIVE_BUFFER_SIZE};
pub use sender::{SentPacket, TelemetrySender};

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind UDP socket on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("datagram send failed: {0}")]
    Send(#[source] io::Error),
    #[error("short write: {written} of {expected} bytes sent")]
    ShortWrite { written: usize, expected: usize },
    #[error("socket error: {0}")]
    Socket(#[from] io::Error),
}
