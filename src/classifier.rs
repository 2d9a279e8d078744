//! Fixed-threshold anomaly classification.
//!
//! Limits are inclusive: a value sitting exactly on a limit is nominal.

use crate::protocol::Payload;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parameter {
    Temperature,
    Battery,
    Altitude,
    SignalStrength,
}

impl Parameter {
    pub const ALL: [Parameter; 4] = [
        Parameter::Temperature,
        Parameter::Battery,
        Parameter::Altitude,
        Parameter::SignalStrength,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Parameter::Temperature => "temperature",
            Parameter::Battery => "battery",
            Parameter::Altitude => "altitude",
            Parameter::SignalStrength => "signal_strength",
        }
    }

    pub fn value(&self, payload: &Payload) -> f32 {
        match self {
            Parameter::Temperature => payload.temperature,
            Parameter::Battery => payload.battery,
            Parameter::Altitude => payload.altitude,
            Parameter::SignalStrength => payload.signal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Breach {
    BelowLow,
    AboveHigh,
    NotANumber,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    pub low: f32,
    pub high: f32,
}

impl Limits {
    pub const fn new(low: f32, high: f32) -> Self {
        Self { low, high }
    }

    pub fn check(&self, value: f32) -> Option<Breach> {
        if value.is_nan() {
            Some(Breach::NotANumber)
        } else if value < self.low {
            Some(Breach::BelowLow)
        } else if value > self.high {
            Some(Breach::AboveHigh)
        } else {
            None
        }
    }
}

/// One out-of-limits parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub parameter: Parameter,
    pub value: f32,
    pub limit: f32,
    pub breach: Breach,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyThresholds {
    pub temperature: Limits,
    pub battery: Limits,
    pub altitude: Limits,
    pub signal: Limits,
}

pub const ANOMALY_THRESHOLDS: AnomalyThresholds = AnomalyThresholds {
    temperature: Limits::new(0.0, 100.0),
    battery: Limits::new(20.0, 100.0),
    altitude: Limits::new(300.0, 550.0),
    signal: Limits::new(-90.0, -40.0),
};

impl AnomalyThresholds {
    pub fn limits(&self, parameter: Parameter) -> Limits {
        match parameter {
            Parameter::Temperature => self.temperature,
            Parameter::Battery => self.battery,
            Parameter::Altitude => self.altitude,
            Parameter::SignalStrength => self.signal,
        }
    }

    pub fn is_anomalous(&self, payload: &Payload) -> bool {
        Parameter::ALL
            .iter()
            .any(|parameter| self.limits(*parameter).check(parameter.value(payload)).is_some())
    }

    pub fn violations(&self, payload: &Payload) -> Vec<Violation> {
        Parameter::ALL
            .iter()
            .filter_map(|&parameter| {
                let limits = self.limits(parameter);
                let value = parameter.value(payload);
                limits.check(value).map(|breach| Violation {
                    parameter,
                    value,
                    limit: match breach {
                        Breach::BelowLow => limits.low,
                        Breach::AboveHigh | Breach::NotANumber => limits.high,
                    },
                    breach,
                })
            })
            .collect()
    }
}

impl Default for AnomalyThresholds {
    fn default() -> Self {
        ANOMALY_THRESHOLDS
    }
}

pub fn is_anomalous(payload: &Payload) -> bool {
    ANOMALY_THRESHOLDS.is_anomalous(payload)
}
