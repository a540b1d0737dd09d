/// Batch coordination: one concurrent acquisition per symbol, partial results tolerated
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::data::acquirer::{Acquirer, SeriesSource};
use crate::data::cache::{CacheStore, FileCacheStore};
use crate::data::observer::LoadObserver;
use crate::error::{DataLoaderError, Result};
use crate::provider::MarketDataProvider;
use crate::types::{FetchWindow, LoaderConfig, PriceSeries};

/// Where the symbol list of a run comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolSelection {
    Explicit(Vec<String>),
    MostLiquid { base_asset: String, limit: usize },
}

impl SymbolSelection {
    pub fn from_config(config: &LoaderConfig) -> Self {
        match config.explicit_symbols() {
            Some(symbols) => SymbolSelection::Explicit(symbols.to_vec()),
            None => SymbolSelection::MostLiquid {
                base_asset: config.base_asset.clone(),
                limit: config.pairs_limit,
            },
        }
    }
}

/// A symbol that produced no series, kept for observability only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolFailure {
    pub symbol: String,
    pub code: String,
    pub message: String,
}

/// Outcome of one run
#[derive(Debug, Clone)]
pub struct AcquisitionResult {
    pub series: HashMap<String, PriceSeries>,
    pub failures: Vec<SymbolFailure>,
    pub requested: Vec<String>,
    pub cache_hits: usize,
    pub fetched: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl AcquisitionResult {
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn get(&self, symbol: &str) -> Option<&PriceSeries> {
        self.series.get(symbol)
    }

    /// Requested symbols absent from the result
    pub fn missing(&self) -> Vec<&str> {
        self.requested
            .iter()
            .filter(|s| !self.series.contains_key(s.as_str()))
            .map(String::as_str)
            .collect()
    }
}

pub struct Orchestrator {
    provider: Arc<dyn MarketDataProvider>,
    acquirer: Arc<Acquirer>,
    observer: Arc<dyn LoadObserver>,
    task_timeout: Option<Duration>,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        cache: Arc<dyn CacheStore>,
        window: FetchWindow,
        observer: Arc<dyn LoadObserver>,
    ) -> Self {
        let acquirer = Acquirer::new(Arc::clone(&provider), cache, window, Arc::clone(&observer));
        Orchestrator {
            provider,
            acquirer: Arc::new(acquirer),
            observer,
            task_timeout: None,
        }
    }

    /// Build with a file cache under `config.cache_dir`
    pub async fn from_config(
        config: &LoaderConfig,
        provider: Arc<dyn MarketDataProvider>,
        observer: Arc<dyn LoadObserver>,
    ) -> Result<Self> {
        let cache = FileCacheStore::open(config.cache_dir.clone()).await?;
        let orchestrator = Orchestrator::new(provider, Arc::new(cache), config.window(), observer)
            .with_task_timeout(config.task_timeout_secs.map(Duration::from_secs));
        Ok(orchestrator)
    }

    /// Per-symbol deadline; `None` waits indefinitely
    pub fn with_task_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn window(&self) -> &FetchWindow {
        self.acquirer.window()
    }

    /// Full run: connect, resolve symbols, load, and close on every exit path
    pub async fn run(&self, selection: &SymbolSelection) -> Result<AcquisitionResult> {
        self.provider.connect().await?;
        self.observer.provider_connected(self.provider.name());

        let outcome = async {
            let symbols = self.resolve_symbols(selection).await?;
            self.load_all(&symbols).await
        }
        .await;

        self.provider.close().await;
        self.observer.provider_closed(self.provider.name());
        outcome
    }

    pub async fn resolve_symbols(&self, selection: &SymbolSelection) -> Result<Vec<String>> {
        match selection {
            SymbolSelection::Explicit(symbols) => Ok(symbols.clone()),
            SymbolSelection::MostLiquid { base_asset, limit } => {
                let symbols = self.provider.list_liquid_symbols(base_asset, *limit).await?;
                self.observer.symbols_resolved(base_asset, &symbols);
                Ok(symbols)
            }
        }
    }

    /// Load every symbol concurrently. Fails only when the input is empty
    /// or no symbol yields a series.
    pub async fn load_all(&self, symbols: &[String]) -> Result<AcquisitionResult> {
        if symbols.is_empty() {
            self.observer.run_started(0);
            return Err(DataLoaderError::NoSymbolsConfigured);
        }

        let started_at = Utc::now();

        // each task owns the slot for its symbol, so duplicates are collapsed up front
        let mut seen = HashSet::new();
        let requested: Vec<String> = symbols
            .iter()
            .filter(|s| seen.insert(s.as_str()))
            .cloned()
            .collect();

        self.observer.run_started(requested.len());

        let handles = requested.iter().map(|symbol| {
            let acquirer = Arc::clone(&self.acquirer);
            let symbol = symbol.clone();
            let timeout = self.task_timeout;
            tokio::spawn(async move { acquire_with_timeout(&acquirer, &symbol, timeout).await })
        });
        let joined = join_all(handles).await;

        let mut result = AcquisitionResult {
            series: HashMap::with_capacity(requested.len()),
            failures: Vec::new(),
            requested,
            cache_hits: 0,
            fetched: 0,
            started_at,
            finished_at: started_at,
        };

        for (symbol, joined) in result.requested.iter().zip(joined) {
            let outcome = joined.unwrap_or_else(|e| {
                Err(DataLoaderError::TaskFailed {
                    symbol: symbol.clone(),
                    message: e.to_string(),
                })
            });

            match outcome {
                Ok((series, source)) => {
                    match source {
                        SeriesSource::Cache => result.cache_hits += 1,
                        SeriesSource::Provider => result.fetched += 1,
                    }
                    result.series.insert(symbol.clone(), series);
                }
                Err(e) => {
                    self.observer.symbol_failed(symbol, &e);
                    result.failures.push(SymbolFailure {
                        symbol: symbol.clone(),
                        code: e.error_code().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        result.finished_at = Utc::now();
        self.observer.run_finished(result.series.len(), result.requested.len());

        if result.series.is_empty() {
            return Err(DataLoaderError::NoValidData {
                requested: result.requested.len(),
            });
        }

        Ok(result)
    }
}

async fn acquire_with_timeout(
    acquirer: &Acquirer,
    symbol: &str,
    timeout: Option<Duration>,
) -> Result<(PriceSeries, SeriesSource)> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, acquirer.acquire_with_source(symbol))
            .await
            .map_err(|_| DataLoaderError::Timeout {
                symbol: symbol.to_string(),
                limit,
            })?,
        None => acquirer.acquire_with_source(symbol).await,
    }
}
