/// Offline provider serving bars from a directory of CSV files
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{DataLoaderError, Result, ValidationFailure};
use crate::provider::MarketDataProvider;
use crate::types::{FetchWindow, PriceBar, PriceSeries};

/// One CSV row: `timestamp,open,high,low,close,volume`, timestamp in epoch ms
#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Reads `{dir}/{symbol}.csv`
pub struct CsvDirProvider {
    dir: PathBuf,
}

impl CsvDirProvider {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        CsvDirProvider { dir: dir.into() }
    }

    fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", symbol))
    }

    async fn read_bars(path: PathBuf) -> Result<Vec<PriceBar>> {
        tokio::task::spawn_blocking(move || read_csv(&path))
            .await
            .map_err(|e| DataLoaderError::Network(format!("CSV reader task failed: {}", e)))?
    }
}

fn read_csv(path: &Path) -> Result<Vec<PriceBar>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| {
            DataLoaderError::Network(format!("Failed to open {}: {}", path.display(), e))
        })?;

    let mut bars = Vec::new();
    for record in reader.deserialize::<CsvRow>() {
        // unparseable rows are dropped, the validator judges what remains
        let Ok(row) = record else { continue };
        let Some(timestamp) = DateTime::<Utc>::from_timestamp_millis(row.timestamp) else {
            continue;
        };

        bars.push(PriceBar {
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }

    Ok(bars)
}

#[async_trait]
impl MarketDataProvider for CsvDirProvider {
    fn name(&self) -> &str {
        "csv_dir"
    }

    async fn connect(&self) -> Result<()> {
        if !tokio::fs::try_exists(&self.dir).await.unwrap_or(false) {
            return Err(DataLoaderError::Network(format!(
                "data directory {} not found",
                self.dir.display()
            )));
        }
        debug!("Serving bars from {}", self.dir.display());
        Ok(())
    }

    async fn fetch_bars(&self, symbol: &str, window: &FetchWindow) -> Result<PriceSeries> {
        let bars: Vec<PriceBar> = Self::read_bars(self.path_for(symbol))
            .await?
            .into_iter()
            .filter(|bar| window.contains(bar.timestamp))
            .collect();

        if bars.is_empty() {
            return Err(DataLoaderError::validation(symbol, ValidationFailure::Empty));
        }

        info!("Loaded {} bars for {} from CSV", bars.len(), symbol);
        Ok(PriceSeries::new(symbol, window, bars))
    }

    async fn list_liquid_symbols(&self, base_asset: &str, limit: usize) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut ranked: Vec<(String, f64)> = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            let Some(symbol) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            if !symbol.ends_with(base_asset) {
                continue;
            }

            let bars = Self::read_bars(path).await?;
            let turnover: f64 = bars.iter().map(|b| b.close * b.volume).sum();
            ranked.push((symbol, turnover));
        }

        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        let pairs: Vec<String> = ranked.into_iter().take(limit).map(|(s, _)| s).collect();

        if pairs.is_empty() {
            return Err(DataLoaderError::validation(base_asset, ValidationFailure::Empty));
        }

        Ok(pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_window;

    fn write_csv(dir: &Path, symbol: &str, rows: &[(i64, f64, f64)]) {
        let mut contents = String::from("timestamp,open,high,low,close,volume\n");
        for (ts, close, volume) in rows {
            contents.push_str(&format!(
                "{},{},{},{},{},{}\n",
                ts, close, close, close, close, volume
            ));
        }
        std::fs::write(dir.join(format!("{}.csv", symbol)), contents).unwrap();
    }

    #[tokio::test]
    async fn test_fetch_filters_to_window() {
        let dir = tempfile::tempdir().unwrap();
        let window = sample_window();
        let start = window.start_time().timestamp_millis();
        let end = window.end_time().timestamp_millis();

        write_csv(
            dir.path(),
            "ETHBTC",
            &[
                (start - 60_000, 1.0, 1.0),
                (start, 2.0, 1.0),
                (start + 60_000, 3.0, 1.0),
                (end, 4.0, 1.0),
            ],
        );

        let provider = CsvDirProvider::new(dir.path());
        provider.connect().await.unwrap();
        let series = provider.fetch_bars("ETHBTC", &window).await.unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series.bars[0].close, 2.0);
        assert_eq!(series.symbol, "ETHBTC");
    }

    #[tokio::test]
    async fn test_missing_file_is_network_error() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CsvDirProvider::new(dir.path());

        let err = provider.fetch_bars("NOPE", &sample_window()).await.unwrap_err();
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn test_liquidity_ranking() {
        let dir = tempfile::tempdir().unwrap();
        let ts = sample_window().start_time().timestamp_millis();

        write_csv(dir.path(), "ETHBTC", &[(ts, 0.05, 1000.0)]);
        write_csv(dir.path(), "SOLBTC", &[(ts, 0.002, 100.0)]);
        write_csv(dir.path(), "LTCBTC", &[(ts, 0.001, 90_000.0)]);
        write_csv(dir.path(), "BTCUSDT", &[(ts, 84000.0, 10.0)]);

        let provider = CsvDirProvider::new(dir.path());
        let pairs = provider.list_liquid_symbols("BTC", 2).await.unwrap();
        assert_eq!(pairs, vec!["LTCBTC".to_string(), "ETHBTC".to_string()]);

        let err = provider.list_liquid_symbols("EUR", 5).await.unwrap_err();
        assert_eq!(err.error_code(), "DATA_001");
    }
}
