//! Superhero marketplace indexer.
//!
//! Reads `RPC_URL`, `DATABASE_URL` (optional; entities stay in memory
//! without it) and `NETWORK_CONFIG` (default `config/network.json`) from the
//! environment or a `.env` file, then indexes until Ctrl+C. Built with the
//! `opentelemetry` feature it also exports spans to the OTLP endpoint named
//! by `OTEL_EXPORTER_OTLP_ENDPOINT`.

#[cfg(not(feature = "opentelemetry"))]
use evm_indexer_sdk::telemetry::init_telemetry;
use evm_indexer_sdk::telemetry::TelemetryConfig;
use evm_indexer_sdk::{Indexer, IndexerConfigBuilder, NetworkConfig, Result};
use std::env;
use tracing::info;

const DEFAULT_NETWORK_CONFIG: &str = "config/network.json";

fn env_u64(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|value| value.parse().ok())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let telemetry = TelemetryConfig::for_service("superhero-indexer");
    #[cfg(feature = "opentelemetry")]
    let _telemetry = evm_indexer_sdk::telemetry::init_telemetry_with_otel(
        telemetry,
        &evm_indexer_sdk::telemetry::OtelConfig::from_env(),
    )
    .map_err(|e| evm_indexer_sdk::IndexerError::ConfigError(format!("OTLP exporter: {e}")))?;
    #[cfg(not(feature = "opentelemetry"))]
    let _telemetry = init_telemetry(telemetry);

    let network_path =
        env::var("NETWORK_CONFIG").unwrap_or_else(|_| DEFAULT_NETWORK_CONFIG.to_string());
    let network = NetworkConfig::from_file(&network_path)?;

    let mut builder = IndexerConfigBuilder::new()
        .with_rpc(env::var("RPC_URL").unwrap_or_else(|_| "http://127.0.0.1:8545".to_string()))
        .with_network(network);
    if let Ok(url) = env::var("DATABASE_URL") {
        builder = builder.with_database(url);
    }
    if let Some(blocks) = env_u64("BATCH_SIZE") {
        builder = builder.with_batch_size(blocks);
    }
    if let Some(blocks) = env_u64("CONFIRMATIONS") {
        builder = builder.with_confirmations(blocks);
    }
    if let Some(millis) = env_u64("POLL_INTERVAL_MS") {
        builder = builder.with_poll_interval_ms(millis);
    }
    let config = builder.build()?;

    info!(network = %config.network.name, config = %network_path, "Starting superhero indexer");

    let mut indexer = Indexer::new(config).await?;
    superhero_indexer::register_handlers(&mut indexer)?;
    indexer.start().await
}
