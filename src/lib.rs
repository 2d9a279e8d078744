//! # Satellite Telemetry Link
//!
//! A CCSDS-style telemetry generator and UDP ingestion pipeline.
//!
//! ## Features
//!
//! - **Bit-exact packet codec**: 32-byte big-endian packets with packed header fields
//! - **Telemetry generation**: nominal readings with a forced anomaly every fifth packet
//! - **UDP transport**: fire-and-forget sender, single receive loop on the ingest side
//! - **Bounded processing**: a fixed worker pool behind a bounded queue
//! - **Classification**: fixed inclusive thresholds per parameter
//! - **Metrics & storage**: Prometheus gauges/counters and PostgreSQL rows
//!
//! ## Quick Start
//!
//! ```rust
//! use satlink::protocol::{self, Payload};
//!
//! let payload = Payload { temperature: 25.0, battery: 88.5, altitude: 512.0, signal: -52.0 };
//! let bytes = protocol::encode(7, protocol::SUBSYSTEM_ID, 1_700_000_000, &payload);
//!
//! let reading = protocol::decode(&bytes).unwrap();
//! assert_eq!(reading.primary.sequence_count(), 7);
//! assert_eq!(reading.payload, payload);
//! assert!(!satlink::classifier::is_anomalous(&reading.payload));
//! ```
//!
//! ## Architecture
//!
//! - [`protocol`] - Packet layout, encode/decode, sequence counter
//! - [`generator`] - Payload generation and anomaly archetypes
//! - [`classifier`] - Threshold-based anomaly detection
//! - [`metrics`] - Prometheus metric sink
//! - [`storage`] - Persistence trait, PostgreSQL and in-memory stores
//! - [`processor`] - Per-datagram decode/classify/record/persist pipeline
//! - [`transport`] - UDP sender and receiver
//! - [`status`] - `/health` and `/metrics` HTTP endpoint
//! - [`config`] - Command-line and environment configuration

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod classifier;
pub mod config;
pub mod generator;
pub mod metrics;
pub mod processor;
pub mod protocol;
pub mod status;
pub mod storage;
pub mod transport;

// Re-export main public types for convenience
pub use classifier::{is_anomalous, AnomalyThresholds};
pub use generator::{AnomalyArchetype, PayloadGenerator};
pub use metrics::TelemetryMetrics;
pub use processor::{PacketProcessor, ProcessOutcome};
pub use protocol::{decode, encode, DecodeError, DecodedReading, Payload};
pub use storage::{MemoryStore, PostgresStore, TelemetryStore};
pub use transport::{IngestPipeline, TelemetrySender};
