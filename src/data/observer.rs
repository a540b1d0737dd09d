/// Injected observability hooks for the acquisition pipeline
use tracing::{debug, error, info, warn};

use crate::error::{CacheError, DataLoaderError};

/// Receives pipeline events. Every hook defaults to a no-op so
/// implementations only override what they care about.
pub trait LoadObserver: Send + Sync {
    fn provider_connected(&self, _provider: &str) {}

    fn provider_closed(&self, _provider: &str) {}

    fn run_started(&self, _requested: usize) {}

    fn symbols_resolved(&self, _base_asset: &str, _symbols: &[String]) {}

    fn cache_hit(&self, _symbol: &str, _bars: usize) {}

    fn cache_miss(&self, _symbol: &str) {}

    fn cache_read_failed(&self, _symbol: &str, _error: &CacheError) {}

    fn cached_series_rejected(&self, _symbol: &str, _error: &DataLoaderError) {}

    fn fetch_started(&self, _symbol: &str) {}

    fn fetch_completed(&self, _symbol: &str, _bars: usize) {}

    fn cache_written(&self, _symbol: &str) {}

    fn cache_write_failed(&self, _symbol: &str, _error: &CacheError) {}

    fn symbol_failed(&self, _symbol: &str, _error: &DataLoaderError) {}

    fn run_finished(&self, _loaded: usize, _requested: usize) {}
}

/// Default observer: forwards every event to `tracing`
#[derive(Debug, Clone)]
pub struct TracingObserver {
    component: &'static str,
}

impl TracingObserver {
    pub fn new(component: &'static str) -> Self {
        TracingObserver { component }
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        TracingObserver::new("loader")
    }
}

impl LoadObserver for TracingObserver {
    fn provider_connected(&self, provider: &str) {
        info!(component = self.component, provider, "🔌 Provider connected");
    }

    fn provider_closed(&self, provider: &str) {
        debug!(component = self.component, provider, "Provider closed");
    }

    fn run_started(&self, requested: usize) {
        info!(component = self.component, "🚀 Starting data load for {} symbols", requested);
    }

    fn symbols_resolved(&self, base_asset: &str, symbols: &[String]) {
        info!(
            component = self.component,
            "Selected {} {} pairs by liquidity: {:?}",
            symbols.len(),
            base_asset,
            symbols
        );
    }

    fn cache_hit(&self, symbol: &str, bars: usize) {
        info!(component = self.component, symbol, bars, "Cache hit");
    }

    fn cache_miss(&self, symbol: &str) {
        debug!(component = self.component, symbol, "Cache miss");
    }

    fn cache_read_failed(&self, symbol: &str, error: &CacheError) {
        warn!(component = self.component, symbol, error = %error, "⚠️  Cache read failed");
    }

    fn cached_series_rejected(&self, symbol: &str, error: &DataLoaderError) {
        warn!(
            component = self.component,
            symbol,
            error = %error,
            "⚠️  Cached series invalid, refetching"
        );
    }

    fn fetch_started(&self, symbol: &str) {
        debug!(component = self.component, symbol, "Fetching from provider");
    }

    fn fetch_completed(&self, symbol: &str, bars: usize) {
        info!(component = self.component, symbol, bars, "Fetched");
    }

    fn cache_written(&self, symbol: &str) {
        debug!(component = self.component, symbol, "Cached");
    }

    fn cache_write_failed(&self, symbol: &str, error: &CacheError) {
        warn!(component = self.component, symbol, error = %error, "⚠️  Cache write failed");
    }

    fn symbol_failed(&self, symbol: &str, error: &DataLoaderError) {
        if error.is_network() || matches!(error, DataLoaderError::DataValidation { .. }) {
            warn!(
                component = self.component,
                symbol,
                code = error.error_code(),
                "Skipped {}: {}",
                symbol,
                error
            );
        } else {
            error!(
                component = self.component,
                symbol,
                code = error.error_code(),
                "Unexpected error with {}: {}",
                symbol,
                error
            );
        }
    }

    fn run_finished(&self, loaded: usize, requested: usize) {
        if loaded == 0 {
            error!(component = self.component, "❌ No data loaded for any symbol");
        } else {
            info!(component = self.component, "✅ Completed: {}/{} loaded", loaded, requested);
        }
    }
}
