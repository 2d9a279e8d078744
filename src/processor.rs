use crate::classifier::{AnomalyThresholds, ANOMALY_THRESHOLDS};
use crate::metrics::TelemetryMetrics;
use crate::protocol::{self, DecodeError};
use crate::storage::{TelemetryRecord, TelemetryStore};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// What happened to one datagram. Never an error for the caller: every
/// failure has already been logged and absorbed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProcessOutcome {
    Stored { anomalous: bool },
    Rejected(DecodeError),
    /// Metrics were recorded but the row was not written.
    StoreFailed { anomalous: bool },
}

/// Per-datagram pipeline: decode, classify, record metrics, persist.
///
/// Cheap to clone; every clone shares the same metrics and store handles.
#[derive(Clone)]
pub struct PacketProcessor {
    metrics: Arc<TelemetryMetrics>,
    store: Arc<dyn TelemetryStore>,
    thresholds: AnomalyThresholds,
}

impl PacketProcessor {
    pub fn new(metrics: Arc<TelemetryMetrics>, store: Arc<dyn TelemetryStore>) -> Self {
        Self {
            metrics,
            store,
            thresholds: ANOMALY_THRESHOLDS,
        }
    }

    #[must_use]
    pub fn with_thresholds(mut self, thresholds: AnomalyThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn metrics(&self) -> &Arc<TelemetryMetrics> {
        &self.metrics
    }

    pub async fn process(&self, datagram: &[u8]) -> ProcessOutcome {
        let reading = match protocol::decode(datagram) {
            Ok(reading) => reading,
            Err(e) => {
                warn!("Dropping datagram ({} bytes): {}", datagram.len(), e);
                return ProcessOutcome::Rejected(e);
            }
        };

        let violations = self.thresholds.violations(&reading.payload);
        let anomalous = !violations.is_empty();
        for violation in &violations {
            warn!(
                sequence = reading.primary.sequence_count(),
                "⚠️  Anomaly: {} = {:.2} breaches limit {:.2} ({:?})",
                violation.parameter.name(),
                violation.value,
                violation.limit,
                violation.breach
            );
        }

        self.metrics.record(&reading.payload, anomalous);

        let record = TelemetryRecord::from(&reading);
        match self.store.append(&record).await {
            Ok(()) => {
                debug!(
                    "Stored telemetry #{}: Temp={:.2}°C, Battery={:.2}%, Alt={:.2}km, Signal={:.2}dB",
                    reading.primary.sequence_count(),
                    record.temperature,
                    record.battery,
                    record.altitude,
                    record.signal
                );
                ProcessOutcome::Stored { anomalous }
            }
            Err(e) => {
                error!(
                    "Error storing telemetry #{}: {}",
                    reading.primary.sequence_count(),
                    e
                );
                ProcessOutcome::StoreFailed { anomalous }
            }
        }
    }
}

impl core::fmt::Debug for PacketProcessor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PacketProcessor")
            .field("metrics", &self.metrics)
            .field("thresholds", &self.thresholds)
            .finish()
    }
}
