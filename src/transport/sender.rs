use super::TransportError;
use crate::config::GeneratorConfig;
use crate::generator::{AnomalyArchetype, PayloadGenerator};
use crate::protocol::{self, Payload, SequenceCounter, PACKET_SIZE};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentPacket {
    pub sequence_count: u16,
    pub timestamp: u64,
    pub payload: Payload,
    pub archetype: Option<AnomalyArchetype>,
}

/// Owns the outbound UDP association and the per-sender sequence counter.
#[derive(Debug)]
pub struct TelemetrySender {
    socket: UdpSocket,
    generator: PayloadGenerator,
    sequence: SequenceCounter,
    subsystem_id: u16,
}

impl TelemetrySender {
    pub async fn connect(config: &GeneratorConfig) -> Result<Self, TransportError> {
        let local = SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0));
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|source| TransportError::Bind {
                addr: local.to_string(),
                source,
            })?;
        socket
            .connect(config.target.as_str())
            .await
            .map_err(|source| TransportError::Connect {
                addr: config.target.clone(),
                source,
            })?;

        Ok(Self {
            socket,
            generator: PayloadGenerator::new(),
            sequence: SequenceCounter::new(),
            subsystem_id: config.subsystem_id,
        })
    }

    #[must_use]
    pub fn with_generator(mut self, generator: PayloadGenerator) -> Self {
        self.generator = generator;
        self
    }

    #[must_use]
    pub fn with_sequence(mut self, sequence: SequenceCounter) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }

    /// Advances the sequence counter and sends one generated packet. The count
    /// is consumed even if the send fails.
    pub async fn send_next(&mut self) -> Result<SentPacket, TransportError> {
        let sequence_count = self.sequence.advance();
        let generated = self.generator.generate(sequence_count);
        let timestamp = unix_timestamp();

        self.send_packet(sequence_count, timestamp, &generated.payload)
            .await?;

        Ok(SentPacket {
            sequence_count,
            timestamp,
            payload: generated.payload,
            archetype: generated.archetype,
        })
    }

    /// Encodes and writes a single datagram.
    pub async fn send_packet(
        &self,
        sequence_count: u16,
        timestamp: u64,
        payload: &Payload,
    ) -> Result<(), TransportError> {
        let packet = protocol::encode(sequence_count, self.subsystem_id, timestamp, payload);
        let written = self
            .socket
            .send(&packet)
            .await
            .map_err(TransportError::Send)?;
        if written != PACKET_SIZE {
            return Err(TransportError::ShortWrite {
                written,
                expected: PACKET_SIZE,
            });
        }
        Ok(())
    }

    /// Tick loop. A failed send is logged, followed by a `backoff` pause; the
    /// packet is not retried and its sequence count is not reused. The tick
    /// missed during the pause fires as soon as the pause ends.
    pub async fn run(mut self, period: Duration, backoff: Duration) {
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match self.send_next().await {
                Ok(sent) => match sent.archetype {
                    Some(archetype) => info!(
                        "📡 Sent anomalous telemetry packet #{} ({})",
                        sent.sequence_count, archetype
                    ),
                    None => info!("📡 Sent normal telemetry packet #{}", sent.sequence_count),
                },
                Err(e) => {
                    error!("Error sending telemetry: {}", e);
                    time::sleep(backoff).await;
                }
            }
        }
    }
}

pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
