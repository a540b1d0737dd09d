pub mod binance;
pub mod csv_dir;

pub use binance::BinanceProvider;
pub use csv_dir::CsvDirProvider;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{DataLoaderError, Result};
use crate::types::{FetchWindow, PriceSeries, ProviderConfig, ProviderKind};

/// Market-data backend. The pipeline depends on this trait only.
///
/// One handle is shared by every per-symbol task of a run, so
/// implementations must tolerate concurrent `fetch_bars` calls.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Open the session. Called once per run before any fetch.
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    /// Release the session. Called once per run on every exit path.
    async fn close(&self) {}

    /// Bars for `symbol` over `window`. Zero records is a validation error.
    async fn fetch_bars(&self, symbol: &str, window: &FetchWindow) -> Result<PriceSeries>;

    /// Symbols quoted in `base_asset`, most liquid first.
    async fn list_liquid_symbols(&self, base_asset: &str, limit: usize) -> Result<Vec<String>>;
}

/// Build the backend selected by `config`
pub fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn MarketDataProvider>> {
    match config.kind {
        ProviderKind::Binance => Ok(Arc::new(BinanceProvider::from_config(config)?)),
        ProviderKind::CsvDir => {
            let dir = config.data_dir.clone().ok_or_else(|| {
                DataLoaderError::Config("provider.data_dir is required for csv_dir".to_string())
            })?;
            Ok(Arc::new(CsvDirProvider::new(dir)))
        }
    }
}
