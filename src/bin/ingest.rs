use colored::*;
use satlink::config::{ConfigError, IngestConfig};
use satlink::metrics::TelemetryMetrics;
use satlink::processor::PacketProcessor;
use satlink::status;
use satlink::storage::{MemoryStore, PostgresStore, TelemetryStore};
use satlink::transport::{IngestPipeline, PipelineSettings};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = match IngestConfig::from_env() {
        Ok(config) => config,
        Err(ConfigError::Cli(e)) => e.exit(),
        Err(e) => return Err(e.into()),
    };

    println!("{}", "🛰️  Satellite Telemetry Ingestion".bold().cyan());
    println!("=================================");
    println!("   UDP port:    {}", config.udp_port.to_string().as_str().green());
    println!("   Status port: {}", config.status_port);
    println!("   Workers:     {}", config.workers);

    info!("Ingestion configuration: {}", serde_json::to_string(&config)?);

    let metrics = Arc::new(TelemetryMetrics::new()?);

    let store: Arc<dyn TelemetryStore> = if config.persist {
        Arc::new(PostgresStore::connect(&config.database).await?)
    } else {
        warn!("Persistence disabled, readings are kept in memory only");
        Arc::new(MemoryStore::new())
    };

    let listener = status::bind(config.status_addr()).await?;
    let status_server = tokio::spawn(status::serve(listener, Arc::clone(&metrics)));

    let processor = PacketProcessor::new(Arc::clone(&metrics), store);
    let pipeline =
        IngestPipeline::start(config.udp_addr(), PipelineSettings::from(&config), processor).await?;

    tokio::select! {
        () = pipeline.run() => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Shutdown requested");
        }
    }

    status_server.abort();
    info!("Final metrics: {:?}", metrics.snapshot());
    println!("{}", "🚀 Telemetry ingestion stopped".yellow());
    Ok(())
}
