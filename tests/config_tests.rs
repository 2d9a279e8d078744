use satlink::config::*;
use satlink::transport::PipelineSettings;
use std::time::Duration;

#[test]
fn test_ingest_defaults() {
    let config = IngestConfig::from_args(["satlink-ingest"]).unwrap();

    assert_eq!(config.udp_port, 8090);
    assert_eq!(config.status_port, 8091);
    assert_eq!(config.workers, 16);
    assert_eq!(config.queue_depth, 1024);
    assert!(config.persist);
    assert_eq!(config.database.host, "localhost");
    assert_eq!(config.database.port, 5432);
    assert_eq!(config.database.name, "telemetry");
    assert_eq!(config.database.pool_size, 16);
}

#[test]
fn test_ingest_overrides() {
    let config = IngestConfig::from_args([
        "satlink-ingest",
        "--udp-port",
        "9000",
        "--workers",
        "4",
        "--queue-depth",
        "32",
        "--db-host",
        "timescale",
        "--no-store",
    ])
    .unwrap();

    assert_eq!(config.udp_port, 9000);
    assert_eq!(config.udp_addr().port(), 9000);
    assert_eq!(config.database.host, "timescale");
    assert_eq!(config.database.pool_size, 4);
    assert!(!config.persist);

    let settings = PipelineSettings::from(&config);
    assert_eq!(settings.workers, 4);
    assert_eq!(settings.queue_depth, 32);
}

#[test]
fn test_invalid_values_rejected() {
    let zero_workers = IngestConfig::from_args(["satlink-ingest", "--workers", "0"]);
    assert!(matches!(zero_workers, Err(ConfigError::Invalid { .. })));

    let bad_port = IngestConfig::from_args(["satlink-ingest", "--udp-port", "70000"]);
    assert!(matches!(bad_port, Err(ConfigError::Invalid { .. })));

    let unknown = IngestConfig::from_args(["satlink-ingest", "--bogus"]);
    assert!(matches!(unknown, Err(ConfigError::Cli(_))));
}

#[test]
fn test_password_never_serialized() {
    let config = IngestConfig::default();
    let json = serde_json::to_string(&config).unwrap();
    assert!(!json.contains("telemetry_pass"));
    assert!(json.contains("telemetry_user"));
}

#[test]
fn test_generator_defaults_and_overrides() {
    let defaults = GeneratorConfig::from_args(["satlink-generator"]).unwrap();
    assert_eq!(defaults, GeneratorConfig::default());
    assert_eq!(defaults.target, "telemetry-ingestion:8090");
    assert_eq!(defaults.period(), Duration::from_secs(1));
    assert_eq!(defaults.backoff(), Duration::from_secs(5));

    let tuned = GeneratorConfig::from_args([
        "satlink-generator",
        "--target",
        "127.0.0.1:9000",
        "--period-ms",
        "250",
    ])
    .unwrap();
    assert_eq!(tuned.target, "127.0.0.1:9000");
    assert_eq!(tuned.period(), Duration::from_millis(250));

    let stalled = GeneratorConfig::from_args(["satlink-generator", "--period-ms", "0"]);
    assert!(stalled.is_err());
}
