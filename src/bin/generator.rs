use colored::*;
use satlink::config::{ConfigError, GeneratorConfig};
use satlink::transport::TelemetrySender;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = match GeneratorConfig::from_env() {
        Ok(config) => config,
        Err(ConfigError::Cli(e)) => e.exit(),
        Err(e) => return Err(e.into()),
    };

    println!("{}", "🛰️  Satellite Telemetry Generator".bold().cyan());
    println!("================================");
    println!("   Target:    {}", config.target.as_str().green());
    println!("   Subsystem: {:#06x}", config.subsystem_id);
    println!("   Period:    {} ms", config.period_ms);

    info!("Generator configuration: {}", serde_json::to_string(&config)?);

    let sender = TelemetrySender::connect(&config).await?;
    info!(
        "Telemetry generator started. Sending packets to {} from {}",
        config.target,
        sender.local_addr()?
    );

    tokio::select! {
        () = sender.run(config.period(), config.backoff()) => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Shutdown requested");
        }
    }

    println!("{}", "🚀 Telemetry generator stopped".yellow());
    Ok(())
}
