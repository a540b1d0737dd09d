/// Binance spot REST market-data client
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{DataLoaderError, Result, ValidationFailure};
use crate::provider::MarketDataProvider;
use crate::types::{FetchWindow, PriceBar, PriceSeries, ProviderConfig};
use crate::utils::RateLimiter;

const TESTNET_URL: &str = "https://testnet.binance.vision";
const KLINES_PAGE_LIMIT: usize = 1000;

#[derive(Debug, Deserialize)]
struct ApiError {
    code: i64,
    msg: String,
}

#[derive(Debug, Deserialize)]
struct Ticker24h {
    symbol: String,
    #[serde(rename = "quoteVolume")]
    quote_volume: String,
}

/// Binance REST client
pub struct BinanceProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    limiter: RateLimiter,
    connected: AtomicBool,
}

impl BinanceProvider {
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        requests_per_second: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DataLoaderError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(BinanceProvider {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            limiter: RateLimiter::new(requests_per_second),
            connected: AtomicBool::new(false),
        })
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let base_url = if config.testnet {
            TESTNET_URL.to_string()
        } else {
            config.base_url.clone()
        };

        BinanceProvider::new(
            base_url,
            config.api_key.clone(),
            config.requests_per_second,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Rate-limited GET returning the raw response after a status check
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Response> {
        self.limiter.acquire().await;

        let mut request = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("Accept", "application/json")
            .query(query);

        if let Some(key) = &self.api_key {
            request = request.header("X-MBX-APIKEY", key);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ApiError>(&body) {
            Ok(api) => format!("{} (code: {})", api.msg, api.code),
            Err(_) => body,
        };

        Err(DataLoaderError::Network(format!(
            "GET {} failed with {}: {}",
            path, status, message
        )))
    }

    /// One klines page starting at `start_ms`
    async fn fetch_page(
        &self,
        symbol: &str,
        window: &FetchWindow,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Vec<serde_json::Value>>> {
        let query = [
            ("symbol", symbol.to_string()),
            ("interval", window.timeframe.as_str().to_string()),
            ("startTime", start_ms.to_string()),
            ("endTime", end_ms.to_string()),
            ("limit", KLINES_PAGE_LIMIT.to_string()),
        ];

        debug!("Fetching klines page for {} from {}", symbol, start_ms);

        let response = self.get("/api/v3/klines", &query).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            let reason = ValidationFailure::Malformed(format!("klines decode: {}", e));
            DataLoaderError::validation(symbol, reason)
        })
    }
}

/// Parse one kline row: [open_time, open, high, low, close, volume, ...]
fn parse_kline(row: &[serde_json::Value]) -> Option<PriceBar> {
    if row.len() < 6 {
        return None;
    }

    let open_time = row[0].as_i64()?;
    let timestamp = DateTime::<Utc>::from_timestamp_millis(open_time)?;

    let number = |value: &serde_json::Value| -> Option<f64> {
        match value {
            serde_json::Value::String(s) => s.parse().ok(),
            serde_json::Value::Number(n) => n.as_f64(),
            _ => None,
        }
    };

    Some(PriceBar {
        timestamp,
        open: number(&row[1])?,
        high: number(&row[2])?,
        low: number(&row[3])?,
        close: number(&row[4])?,
        volume: number(&row[5])?,
    })
}

#[async_trait]
impl MarketDataProvider for BinanceProvider {
    fn name(&self) -> &str {
        "binance"
    }

    async fn connect(&self) -> Result<()> {
        debug!("Establishing Binance API connection to {}", self.base_url);
        self.get("/api/v3/ping", &[]).await.map_err(|e| {
            warn!("Connection failed: {}", e);
            DataLoaderError::Network(format!("API connection error: {}", e))
        })?;

        self.connected.store(true, Ordering::SeqCst);
        info!("Connected to Binance at {}", self.base_url);
        Ok(())
    }

    async fn close(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            debug!("Closing Binance API connection");
        }
    }

    async fn fetch_bars(&self, symbol: &str, window: &FetchWindow) -> Result<PriceSeries> {
        info!("Fetching data for {}", symbol);

        let end_ms = window.end_time().timestamp_millis() - 1;
        let mut cursor = window.start_time().timestamp_millis();
        let mut raw_rows = 0usize;
        let mut bars = Vec::new();

        while cursor <= end_ms {
            let page = self.fetch_page(symbol, window, cursor, end_ms).await?;
            if page.is_empty() {
                break;
            }
            raw_rows += page.len();

            let last_open = page.last().and_then(|row| row.first()).and_then(|v| v.as_i64());
            bars.extend(
                page.iter()
                    .filter_map(|row| parse_kline(row))
                    .filter(|bar| window.contains(bar.timestamp)),
            );

            match last_open {
                Some(open) if page.len() == KLINES_PAGE_LIMIT && open < end_ms => cursor = open + 1,
                _ => break,
            }
        }

        if raw_rows == 0 {
            warn!("No data for {}", symbol);
            return Err(DataLoaderError::validation(symbol, ValidationFailure::Empty));
        }

        if bars.is_empty() {
            return Err(DataLoaderError::validation(
                symbol,
                ValidationFailure::Malformed("all rows unparseable after cleaning".to_string()),
            ));
        }

        debug!("Processed {} of {} records for {}", bars.len(), raw_rows, symbol);
        Ok(PriceSeries::new(symbol, window, bars))
    }

    async fn list_liquid_symbols(&self, base_asset: &str, limit: usize) -> Result<Vec<String>> {
        info!("Fetching top {} {} pairs by liquidity", limit, base_asset);

        let response = self.get("/api/v3/ticker/24hr", &[]).await?;
        let tickers: Vec<Ticker24h> = response
            .json()
            .await
            .map_err(|e| DataLoaderError::Network(format!("Failed to fetch liquid pairs: {}", e)))?;

        let pairs = rank_by_volume(tickers, base_asset, limit);
        if pairs.is_empty() {
            warn!("No pairs found for {}", base_asset);
            return Err(DataLoaderError::validation(base_asset, ValidationFailure::Empty));
        }

        Ok(pairs)
    }
}

fn rank_by_volume(tickers: Vec<Ticker24h>, base_asset: &str, limit: usize) -> Vec<String> {
    let mut relevant: Vec<(String, f64)> = tickers
        .into_iter()
        .filter(|t| t.symbol.ends_with(base_asset))
        .filter_map(|t| t.quote_volume.parse::<f64>().ok().map(|v| (t.symbol, v)))
        .collect();

    relevant.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    relevant.into_iter().take(limit).map(|(symbol, _)| symbol).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_kline_row() {
        let row = json!([
            1740787200000i64, "84000.10", "84100.00", "83950.55", "84050.00", "12.5",
            1740787259999i64, "1050000.0", 420, "6.1", "512000.0", "0"
        ]);
        let bar = parse_kline(row.as_array().unwrap()).unwrap();

        assert_eq!(bar.timestamp.timestamp_millis(), 1740787200000);
        assert_eq!(bar.open, 84000.10);
        assert_eq!(bar.low, 83950.55);
        assert_eq!(bar.volume, 12.5);
    }

    #[test]
    fn test_parse_kline_drops_bad_rows() {
        let short = json!([1740787200000i64, "1.0", "2.0"]);
        assert!(parse_kline(short.as_array().unwrap()).is_none());

        let garbage = json!([1740787200000i64, "abc", "2.0", "0.5", "1.5", "10"]);
        assert!(parse_kline(garbage.as_array().unwrap()).is_none());
    }

    #[test]
    fn test_rank_by_volume() {
        let tickers = vec![
            Ticker24h { symbol: "ETHBTC".to_string(), quote_volume: "150.0".to_string() },
            Ticker24h { symbol: "BTCUSDT".to_string(), quote_volume: "9000.0".to_string() },
            Ticker24h { symbol: "SOLBTC".to_string(), quote_volume: "300.5".to_string() },
            Ticker24h { symbol: "XRPBTC".to_string(), quote_volume: "12.0".to_string() },
            Ticker24h { symbol: "BADBTC".to_string(), quote_volume: "n/a".to_string() },
        ];

        let ranked = rank_by_volume(tickers, "BTC", 2);
        assert_eq!(ranked, vec!["SOLBTC".to_string(), "ETHBTC".to_string()]);
    }

    #[test]
    fn test_testnet_overrides_base_url() {
        let config = ProviderConfig {
            testnet: true,
            ..ProviderConfig::default()
        };
        let provider = BinanceProvider::from_config(&config).unwrap();
        assert_eq!(provider.base_url, TESTNET_URL);
        assert!(!provider.is_connected());
    }
}
