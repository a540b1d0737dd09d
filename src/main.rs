/// Entry point: load one window of historical bars for a set of symbols
use anyhow::Context;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use histloader::{
    config::load_config,
    data::{AcquisitionSummary, Orchestrator, SymbolSelection, TracingObserver},
    provider::build_provider,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("histloader=info,info")),
        )
        .init();

    let config_path = std::env::var("CONFIG_PATH")
        .ok()
        .or_else(|| std::env::args().nth(1))
        .unwrap_or_else(|| "config.toml".to_string());

    info!("🚀 Starting historical data load ({})", config_path);

    let config = load_config(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path))?;
    let provider = build_provider(&config.provider).context("building market data provider")?;
    let observer = Arc::new(TracingObserver::default());
    let orchestrator = Orchestrator::from_config(&config, provider, observer).await?;

    let window = *orchestrator.window();
    info!(
        "📅 Window {} → {} at {} into {}",
        window.start,
        window.end,
        window.timeframe,
        config.cache_dir.display()
    );

    let selection = SymbolSelection::from_config(&config);
    let result = match orchestrator.run(&selection).await {
        Ok(result) => result,
        Err(e) => {
            error!("❌ Acquisition failed [{}]: {}", e.error_code(), e);
            return Err(e.into());
        }
    };

    let summary = AcquisitionSummary::from_result(&result, &window);
    info!(
        "✅ Loaded {}/{} symbols ({} bars, {} from cache, {} fetched) in {}ms",
        summary.loaded,
        summary.requested,
        summary.bars,
        summary.cache_hits,
        summary.fetched,
        summary.duration_ms()
    );
    for failure in &summary.failures {
        warn!("   ✗ {} [{}]: {}", failure.symbol, failure.code, failure.message);
    }

    if config.write_summary {
        summary.save(&config.cache_dir).await?;
    }

    Ok(())
}
