/// Per-symbol pipeline: cache -> validate -> fetch -> validate -> cache
use std::sync::Arc;

use crate::data::cache::{CacheKey, CacheStore};
use crate::data::observer::LoadObserver;
use crate::data::validator::SeriesValidator;
use crate::error::Result;
use crate::provider::MarketDataProvider;
use crate::types::{FetchWindow, PriceSeries};

/// Where an acquired series came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesSource {
    Cache,
    Provider,
}

pub struct Acquirer {
    provider: Arc<dyn MarketDataProvider>,
    cache: Arc<dyn CacheStore>,
    validator: SeriesValidator,
    observer: Arc<dyn LoadObserver>,
    window: FetchWindow,
}

impl Acquirer {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        cache: Arc<dyn CacheStore>,
        window: FetchWindow,
        observer: Arc<dyn LoadObserver>,
    ) -> Self {
        Acquirer {
            provider,
            cache,
            validator: SeriesValidator::new(),
            observer,
            window,
        }
    }

    pub fn window(&self) -> &FetchWindow {
        &self.window
    }

    pub fn cache_key(&self, symbol: &str) -> CacheKey {
        CacheKey::new(symbol, &self.window)
    }

    /// Acquire a validated series for `symbol`.
    ///
    /// Cache faults never surface here. Provider errors and validation
    /// failures of freshly fetched data do.
    pub async fn acquire(&self, symbol: &str) -> Result<PriceSeries> {
        self.acquire_with_source(symbol).await.map(|(series, _)| series)
    }

    pub async fn acquire_with_source(&self, symbol: &str) -> Result<(PriceSeries, SeriesSource)> {
        let key = self.cache_key(symbol);

        if let Some(series) = self.read_cache(symbol, &key).await {
            return Ok((series, SeriesSource::Cache));
        }

        self.observer.fetch_started(symbol);
        let fresh = self.provider.fetch_bars(symbol, &self.window).await?;
        self.validator.validate(&fresh, symbol)?;
        self.observer.fetch_completed(symbol, fresh.len());

        match self.cache.put(&key, &fresh).await {
            Ok(()) => self.observer.cache_written(symbol),
            Err(e) => self.observer.cache_write_failed(symbol, &e),
        }

        Ok((fresh, SeriesSource::Provider))
    }

    /// A validated cached series, or None on miss, read fault, or invalid entry
    async fn read_cache(&self, symbol: &str, key: &CacheKey) -> Option<PriceSeries> {
        let cached = match self.cache.get(key).await {
            Ok(Some(series)) => series,
            Ok(None) => {
                self.observer.cache_miss(symbol);
                return None;
            }
            Err(e) => {
                self.observer.cache_read_failed(symbol, &e);
                return None;
            }
        };

        match self.validator.validate(&cached, symbol) {
            Ok(()) => {
                self.observer.cache_hit(symbol, cached.len());
                Some(cached)
            }
            Err(e) => {
                self.observer.cached_series_rejected(symbol, &e);
                None
            }
        }
    }
}
