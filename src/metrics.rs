use crate::protocol::Payload;
use prometheus::{Encoder, Gauge, IntCounter, Registry, TextEncoder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metric registration failed: {0}")]
    Registration(#[from] prometheus::Error),
    #[error("metric exposition is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Point-in-time copy of every metric, mostly for logs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub temperature: f64,
    pub battery: f64,
    pub altitude: f64,
    pub signal_strength: f64,
    pub packets: u64,
    pub anomalies: u64,
    pub dropped_datagrams: u64,
}

/// Last-value gauges plus monotonic counters, shared by every worker.
///
/// Each update is a single atomic store or add; there is no ordering between
/// workers, so the gauges show whichever reading was recorded last.
#[derive(Clone)]
pub struct TelemetryMetrics {
    registry: Registry,
    temperature: Gauge,
    battery: Gauge,
    altitude: Gauge,
    signal_strength: Gauge,
    packets: IntCounter,
    anomalies: IntCounter,
    dropped_datagrams: IntCounter,
}

impl TelemetryMetrics {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let temperature = Gauge::new(
            "satellite_temperature_celsius",
            "Current satellite temperature in Celsius",
        )?;
        let battery = Gauge::new(
            "satellite_battery_percent",
            "Current satellite battery level in percent",
        )?;
        let altitude = Gauge::new(
            "satellite_altitude_km",
            "Current satellite altitude in kilometers",
        )?;
        let signal_strength = Gauge::new(
            "satellite_signal_strength_db",
            "Current satellite signal strength in dB",
        )?;
        let packets = IntCounter::new(
            "satellite_packet_count",
            "Total number of telemetry packets ingested",
        )?;
        let anomalies = IntCounter::new(
            "satellite_anomaly_count",
            "Total number of detected anomalies",
        )?;
        let dropped_datagrams = IntCounter::new(
            "satellite_dropped_datagram_count",
            "Datagrams dropped because the processing queue was full",
        )?;

        registry.register(Box::new(temperature.clone()))?;
        registry.register(Box::new(battery.clone()))?;
        registry.register(Box::new(altitude.clone()))?;
        registry.register(Box::new(signal_strength.clone()))?;
        registry.register(Box::new(packets.clone()))?;
        registry.register(Box::new(anomalies.clone()))?;
        registry.register(Box::new(dropped_datagrams.clone()))?;

        Ok(Self {
            registry,
            temperature,
            battery,
            altitude,
            signal_strength,
            packets,
            anomalies,
            dropped_datagrams,
        })
    }

    /// Overwrites the gauges with this reading and bumps the counters.
    pub fn record(&self, payload: &Payload, anomalous: bool) {
        self.temperature.set(f64::from(payload.temperature));
        self.battery.set(f64::from(payload.battery));
        self.altitude.set(f64::from(payload.altitude));
        self.signal_strength.set(f64::from(payload.signal));

        self.packets.inc();
        if anomalous {
            self.anomalies.inc();
        }
    }

    pub fn record_dropped(&self) {
        self.dropped_datagrams.inc();
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            temperature: self.temperature.get(),
            battery: self.battery.get(),
            altitude: self.altitude.get(),
            signal_strength: self.signal_strength.get(),
            packets: self.packets.get(),
            anomalies: self.anomalies.get(),
            dropped_datagrams: self.dropped_datagrams.get(),
        }
    }

    /// Prometheus text exposition of every registered metric.
    pub fn render(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    pub fn content_type(&self) -> &'static str {
        prometheus::TEXT_FORMAT
    }
}

impl core::fmt::Debug for TelemetryMetrics {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TelemetryMetrics")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}
