use super::TransportError;
use crate::config::{IngestConfig, DEFAULT_QUEUE_DEPTH, DEFAULT_WORKERS};
use crate::metrics::TelemetryMetrics;
use crate::processor::PacketProcessor;
use crate::protocol::PACKET_SIZE;
use static_assertions::const_assert;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info, warn};

/// Datagrams longer than this are truncated by the socket; only the first
/// [`PACKET_SIZE`] bytes matter anyway.
pub const RECEIVE_BUFFER_SIZE: usize = 1024;

const_assert!(RECEIVE_BUFFER_SIZE >= PACKET_SIZE);

/// Pause after a failed `recv_from` so a persistent socket error cannot spin.
const RECEIVE_ERROR_PAUSE: Duration = Duration::from_millis(100);

/// A received datagram with its own copy of the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub source: SocketAddr,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub workers: usize,
    pub queue_depth: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

impl From<&IngestConfig> for PipelineSettings {
    fn from(config: &IngestConfig) -> Self {
        Self {
            workers: config.workers,
            queue_depth: config.queue_depth,
        }
    }
}

type SharedQueue = Arc<Mutex<mpsc::Receiver<Datagram>>>;

/// Receive loop feeding a bounded queue drained by a fixed pool of workers.
///
/// The receive loop never waits for a worker. When the queue is full the
/// datagram is dropped and counted.
#[derive(Debug)]
pub struct IngestPipeline {
    socket: UdpSocket,
    queue: mpsc::Sender<Datagram>,
    metrics: Arc<TelemetryMetrics>,
    workers: Vec<JoinHandle<()>>,
}

impl IngestPipeline {
    /// Binds the socket and starts the workers. A bind failure is returned to
    /// the caller; nothing is retried.
    pub async fn start(
        addr: SocketAddr,
        settings: PipelineSettings,
        processor: PacketProcessor,
    ) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: addr.to_string(),
                source,
            })?;

        // mpsc::channel panics on zero capacity
        let (queue, inbox) = mpsc::channel(settings.queue_depth.max(1));
        let metrics = Arc::clone(processor.metrics());
        let workers = spawn_workers(processor, inbox, settings.workers.max(1));

        info!(
            "🛰️  Telemetry ingestion listening on {} ({} workers, queue depth {})",
            socket.local_addr()?,
            workers.len(),
            settings.queue_depth
        );

        Ok(Self {
            socket,
            queue,
            metrics,
            workers,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Sequential receive loop. Returns only if every worker has gone away.
    pub async fn run(self) {
        let mut buffer = [0u8; RECEIVE_BUFFER_SIZE];

        loop {
            let (len, source) = match self.socket.recv_from(&mut buffer).await {
                Ok(received) => received,
                Err(e) => {
                    warn!("Error reading from UDP: {}", e);
                    time::sleep(RECEIVE_ERROR_PAUSE).await;
                    continue;
                }
            };

            debug!("Received {} bytes from {}", len, source);

            let datagram = Datagram {
                source,
                bytes: buffer[..len].to_vec(),
            };

            match self.queue.try_send(datagram) {
                Ok(()) => {}
                Err(TrySendError::Full(dropped)) => {
                    self.metrics.record_dropped();
                    warn!(
                        "Processing queue full, dropping {} bytes from {}",
                        dropped.bytes.len(),
                        dropped.source
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    error!("All processing workers have stopped, leaving receive loop");
                    break;
                }
            }
        }

        for worker in &self.workers {
            worker.abort();
        }
    }
}

fn spawn_workers(
    processor: PacketProcessor,
    inbox: mpsc::Receiver<Datagram>,
    count: usize,
) -> Vec<JoinHandle<()>> {
    let inbox: SharedQueue = Arc::new(Mutex::new(inbox));

    (0..count)
        .map(|id| {
            let processor = processor.clone();
            let inbox = Arc::clone(&inbox);
            tokio::spawn(async move {
                loop {
                    // lock is held only while waiting for the next datagram
                    let next = inbox.lock().await.recv().await;
                    match next {
                        Some(datagram) => {
                            processor.process(&datagram.bytes).await;
                        }
                        None => {
                            debug!("Worker {} exiting, queue closed", id);
                            break;
                        }
                    }
                }
            })
        })
        .collect()
}
