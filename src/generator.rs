use crate::protocol::Payload;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Every fifth sequence count carries an anomaly.
pub const ANOMALY_CADENCE: u16 = 5;

/// Closed value band. Draws are taken from `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub min: f32,
    pub max: f32,
}

impl Band {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

// Nominal bands
pub const NOMINAL_TEMPERATURE: Band = Band::new(20.0, 30.0);
pub const NOMINAL_BATTERY: Band = Band::new(70.0, 100.0);
pub const NOMINAL_ALTITUDE: Band = Band::new(500.0, 550.0);
pub const NOMINAL_SIGNAL: Band = Band::new(-60.0, -40.0);

// Off-nominal bands, one per archetype
pub const HIGH_TEMPERATURE: Band = Band::new(35.0, 40.0);
pub const LOW_BATTERY: Band = Band::new(20.0, 40.0);
pub const LOW_ALTITUDE: Band = Band::new(300.0, 400.0);
pub const WEAK_SIGNAL: Band = Band::new(-90.0, -80.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnomalyArchetype {
    HighTemperature,
    LowBattery,
    LowAltitude,
    WeakSignal,
}

impl AnomalyArchetype {
    pub const ALL: [AnomalyArchetype; 4] = [
        AnomalyArchetype::HighTemperature,
        AnomalyArchetype::LowBattery,
        AnomalyArchetype::LowAltitude,
        AnomalyArchetype::WeakSignal,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AnomalyArchetype::HighTemperature => "high-temperature",
            AnomalyArchetype::LowBattery => "low-battery",
            AnomalyArchetype::LowAltitude => "low-altitude",
            AnomalyArchetype::WeakSignal => "weak-signal",
        }
    }
}

impl core::fmt::Display for AnomalyArchetype {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// A generated payload and the archetype forced into it, if any.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratedPayload {
    pub payload: Payload,
    pub archetype: Option<AnomalyArchetype>,
}

pub fn is_anomaly_tick(sequence_count: u16) -> bool {
    sequence_count % ANOMALY_CADENCE == 0
}

/// True when all four fields sit inside their nominal bands.
pub fn within_nominal_bands(payload: &Payload) -> bool {
    NOMINAL_TEMPERATURE.contains(payload.temperature)
        && NOMINAL_BATTERY.contains(payload.battery)
        && NOMINAL_ALTITUDE.contains(payload.altitude)
        && NOMINAL_SIGNAL.contains(payload.signal)
}

#[derive(Debug)]
pub struct PayloadGenerator {
    rng: StdRng,
}

impl PayloadGenerator {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn next_payload(&mut self, sequence_count: u16) -> Payload {
        self.generate(sequence_count).payload
    }

    pub fn generate(&mut self, sequence_count: u16) -> GeneratedPayload {
        if is_anomaly_tick(sequence_count) {
            let archetype = AnomalyArchetype::ALL[self.rng.gen_range(0..AnomalyArchetype::ALL.len())];
            GeneratedPayload {
                payload: self.payload_for(archetype),
                archetype: Some(archetype),
            }
        } else {
            GeneratedPayload {
                payload: self.nominal_payload(),
                archetype: None,
            }
        }
    }

    pub fn nominal_payload(&mut self) -> Payload {
        Payload {
            temperature: self.draw(NOMINAL_TEMPERATURE),
            battery: self.draw(NOMINAL_BATTERY),
            altitude: self.draw(NOMINAL_ALTITUDE),
            signal: self.draw(NOMINAL_SIGNAL),
        }
    }

    /// Nominal payload with exactly one field pushed out of band.
    pub fn payload_for(&mut self, archetype: AnomalyArchetype) -> Payload {
        let mut payload = self.nominal_payload();
        match archetype {
            AnomalyArchetype::HighTemperature => payload.temperature = self.draw(HIGH_TEMPERATURE),
            AnomalyArchetype::LowBattery => payload.battery = self.draw(LOW_BATTERY),
            AnomalyArchetype::LowAltitude => payload.altitude = self.draw(LOW_ALTITUDE),
            AnomalyArchetype::WeakSignal => payload.signal = self.draw(WEAK_SIGNAL),
        }
        payload
    }

    fn draw(&mut self, band: Band) -> f32 {
        self.rng.gen_range(band.min..band.max)
    }
}

impl Default for PayloadGenerator {
    fn default() -> Self {
        Self::new()
    }
}
