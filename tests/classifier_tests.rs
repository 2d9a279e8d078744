use satlink::classifier::*;
use satlink::protocol::Payload;

const NOMINAL: Payload = Payload {
    temperature: 25.0,
    battery: 80.0,
    altitude: 520.0,
    signal: -50.0,
};

fn with(parameter: Parameter, value: f32) -> Payload {
    let mut p = NOMINAL;
    match parameter {
        Parameter::Temperature => p.temperature = value,
        Parameter::Battery => p.battery = value,
        Parameter::Altitude => p.altitude = value,
        Parameter::SignalStrength => p.signal = value,
    }
    p
}

#[test]
fn test_nominal_reading_is_clean() {
    assert!(!is_anomalous(&NOMINAL));
    assert!(ANOMALY_THRESHOLDS.violations(&NOMINAL).is_empty());
}

#[test]
fn test_temperature_boundaries() {
    assert!(!is_anomalous(&with(Parameter::Temperature, 100.0)));
    assert!(is_anomalous(&with(Parameter::Temperature, 100.0001)));
    assert!(!is_anomalous(&with(Parameter::Temperature, 0.0)));
    assert!(is_anomalous(&with(Parameter::Temperature, -0.0001)));
}

#[test]
fn test_battery_boundaries() {
    assert!(!is_anomalous(&with(Parameter::Battery, 20.0)));
    assert!(is_anomalous(&with(Parameter::Battery, 19.9999)));
    assert!(!is_anomalous(&with(Parameter::Battery, 100.0)));
    assert!(is_anomalous(&with(Parameter::Battery, 100.0001)));
}

#[test]
fn test_altitude_boundaries() {
    assert!(!is_anomalous(&with(Parameter::Altitude, 300.0)));
    assert!(is_anomalous(&with(Parameter::Altitude, 299.999)));
    assert!(!is_anomalous(&with(Parameter::Altitude, 550.0)));
    assert!(is_anomalous(&with(Parameter::Altitude, 550.001)));
}

#[test]
fn test_signal_boundaries() {
    assert!(!is_anomalous(&with(Parameter::SignalStrength, -90.0)));
    assert!(is_anomalous(&with(Parameter::SignalStrength, -90.0001)));
    assert!(!is_anomalous(&with(Parameter::SignalStrength, -40.0)));
    assert!(is_anomalous(&with(Parameter::SignalStrength, -39.9999)));
}

#[test]
fn test_nan_is_anomalous() {
    let violations = ANOMALY_THRESHOLDS.violations(&with(Parameter::Battery, f32::NAN));
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].breach, Breach::NotANumber);
}

#[test]
fn test_verdict_matches_violation_list() {
    let samples = [
        NOMINAL,
        with(Parameter::Temperature, 150.0),
        with(Parameter::Altitude, 120.0),
        Payload { temperature: -5.0, battery: 5.0, altitude: 600.0, signal: -100.0 },
    ];
    for sample in &samples {
        assert_eq!(
            ANOMALY_THRESHOLDS.is_anomalous(sample),
            !ANOMALY_THRESHOLDS.violations(sample).is_empty()
        );
    }
    assert_eq!(ANOMALY_THRESHOLDS.violations(&samples[3]).len(), 4);
}

#[test]
fn test_parameter_names_match_storage_columns() {
    let names: Vec<&str> = Parameter::ALL.iter().map(Parameter::name).collect();
    assert_eq!(names, ["temperature", "battery", "altitude", "signal_strength"]);
}
