use std::sync::Arc;

use pricefeed::config::AppConfig;
use pricefeed::error::Result;
use pricefeed::sources::build_sources;
use pricefeed::types::Pair;
use pricefeed::{Collector, PricePublisher, PriceService};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let env = std::env::var("PRICEFEED_ENV").unwrap_or_else(|_| "dev".to_string());
    let config = AppConfig::load(&env)?;
    tracing::info!(env = %env, pairs = config.collector.pairs.len(), "Configuration loaded");

    let mut service = PriceService::new(config.aggregation.clone());
    let sources = build_sources(&config.collector, &config.mock)?;
    let collector = Arc::new(Collector::new(
        service.store(),
        sources,
        config.collector.clone(),
    )?);
    service.attach_collector(collector.clone());
    let service = Arc::new(service);

    let pairs: Vec<Pair> = config
        .collector
        .pairs
        .iter()
        .map(|p| Pair::new(p.clone()))
        .collect();
    let publisher = PricePublisher::new(service.clone(), pairs, config.publisher.clone());
    let mut feed = publisher.subscribe();

    collector.start()?;
    publisher.start()?;

    loop {
        tokio::select! {
            agg = feed.recv() => match agg {
                Ok(agg) => tracing::info!(
                    pair = %agg.pair,
                    price = agg.price,
                    algorithm = %agg.algorithm,
                    confidence = agg.confidence,
                    inputs = agg.inputs_used,
                    outliers = agg.outliers_removed,
                    "Aggregated price"
                ),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped = skipped, "Feed consumer lagging");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    tracing::info!("Shutting down");
    publisher.stop().await?;
    collector.stop().await?;
    Ok(())
}
