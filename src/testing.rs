/// Shared fixtures and a scripted provider for unit tests
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::data::cache::{CacheKey, CacheStore};
use crate::error::{CacheError, DataLoaderError, Result, ValidationFailure};
use crate::provider::MarketDataProvider;
use crate::types::{FetchWindow, PriceBar, PriceSeries, Timeframe};

pub fn sample_window() -> FetchWindow {
    FetchWindow::new(
        Timeframe::OneMinute,
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        NaiveDate::from_ymd_opt(2025, 3, 2).unwrap(),
    )
}

/// `n` one-minute bars from the window start
pub fn sample_series(symbol: &str, n: usize) -> PriceSeries {
    let window = sample_window();
    let bars = (0..n)
        .map(|i| {
            let base = 100.0 + i as f64;
            PriceBar {
                timestamp: window.start_time() + Duration::minutes(i as i64),
                open: base,
                high: base + 2.0,
                low: base - 1.0,
                close: base + 1.0,
                volume: 10.0 * (i + 1) as f64,
            }
        })
        .collect();
    PriceSeries::new(symbol, &window, bars)
}

/// What the scripted provider answers for a symbol
#[derive(Debug, Clone)]
pub enum Script {
    Bars(usize),
    Invalid,
    NetworkDown,
    NoData,
}

/// Provider double that counts calls per symbol and lifecycle hooks
pub struct ScriptedProvider {
    scripts: HashMap<String, Script>,
    liquid: Vec<String>,
    delay: Option<std::time::Duration>,
    symbol_delays: HashMap<String, std::time::Duration>,
    fail_connect: bool,
    calls: Mutex<HashMap<String, usize>>,
    pub connects: AtomicUsize,
    pub closes: AtomicUsize,
    pub liquidity_queries: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        ScriptedProvider {
            scripts: HashMap::new(),
            liquid: Vec::new(),
            delay: None,
            symbol_delays: HashMap::new(),
            fail_connect: false,
            calls: Mutex::new(HashMap::new()),
            connects: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            liquidity_queries: AtomicUsize::new(0),
        }
    }

    pub fn with(mut self, symbol: &str, script: Script) -> Self {
        self.scripts.insert(symbol.to_string(), script);
        self
    }

    pub fn with_liquid(mut self, symbols: &[&str]) -> Self {
        self.liquid = symbols.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Delay for one symbol only, overriding `with_delay`
    pub fn with_delay_for(mut self, symbol: &str, delay: std::time::Duration) -> Self {
        self.symbol_delays.insert(symbol.to_string(), delay);
        self
    }

    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn calls(&self, symbol: &str) -> usize {
        self.calls.lock().unwrap().get(symbol).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl MarketDataProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn connect(&self) -> Result<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            return Err(DataLoaderError::Network("connection refused".to_string()));
        }
        Ok(())
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }

    async fn fetch_bars(&self, symbol: &str, window: &FetchWindow) -> Result<PriceSeries> {
        *self.calls.lock().unwrap().entry(symbol.to_string()).or_insert(0) += 1;

        if let Some(delay) = self.symbol_delays.get(symbol).copied().or(self.delay) {
            tokio::time::sleep(delay).await;
        }

        match self.scripts.get(symbol).cloned().unwrap_or(Script::NetworkDown) {
            Script::Bars(n) => Ok(PriceSeries::new(symbol, window, sample_series(symbol, n).bars)),
            Script::Invalid => {
                let mut series = sample_series(symbol, 3);
                series.bars[1].volume = -5.0;
                Ok(series)
            }
            Script::NetworkDown => Err(DataLoaderError::Network(format!("{} unreachable", symbol))),
            Script::NoData => Err(DataLoaderError::validation(symbol, ValidationFailure::Empty)),
        }
    }

    async fn list_liquid_symbols(&self, base_asset: &str, limit: usize) -> Result<Vec<String>> {
        self.liquidity_queries.fetch_add(1, Ordering::SeqCst);
        let pairs: Vec<String> = self.liquid.iter().take(limit).cloned().collect();
        if pairs.is_empty() {
            return Err(DataLoaderError::validation(base_asset, ValidationFailure::Empty));
        }
        Ok(pairs)
    }
}

/// Cache store whose reads and writes always fail
pub struct BrokenCacheStore;

#[async_trait]
impl CacheStore for BrokenCacheStore {
    async fn get(&self, key: &CacheKey) -> std::result::Result<Option<PriceSeries>, CacheError> {
        Err(CacheError::Corrupt {
            path: key.file_name(),
            reason: "disk on fire".to_string(),
        })
    }

    async fn put(
        &self,
        key: &CacheKey,
        _series: &PriceSeries,
    ) -> std::result::Result<(), CacheError> {
        Err(CacheError::Io {
            path: key.file_name(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        })
    }
}
