/// Core type definitions for the data loader
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::DataLoaderError;

/// OHLCV Bar data structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    pub fn value(&self, field: Field) -> f64 {
        match field {
            Field::Open => self.open,
            Field::High => self.high,
            Field::Low => self.low,
            Field::Close => self.close,
            Field::Volume => self.volume,
        }
    }
}

/// Numeric columns every bar must carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl Field {
    pub const ALL: [Field; 5] = [Field::Open, Field::High, Field::Low, Field::Close, Field::Volume];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Open => "open",
            Field::High => "high",
            Field::Low => "low",
            Field::Close => "close",
            Field::Volume => "volume",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered bars for one symbol over a half-open window [start, end)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new(symbol: &str, window: &FetchWindow, bars: Vec<PriceBar>) -> Self {
        PriceSeries {
            symbol: symbol.to_string(),
            timeframe: window.timeframe,
            start: window.start_time(),
            end: window.end_time(),
            bars,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

/// Sampling granularity, named the way exchanges name kline intervals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "3m")]
    ThreeMinute,
    #[serde(rename = "5m")]
    FiveMinute,
    #[serde(rename = "15m")]
    FifteenMinute,
    #[serde(rename = "30m")]
    ThirtyMinute,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "2h")]
    TwoHour,
    #[serde(rename = "4h")]
    FourHour,
    #[serde(rename = "6h")]
    SixHour,
    #[serde(rename = "8h")]
    EightHour,
    #[serde(rename = "12h")]
    TwelveHour,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "3d")]
    ThreeDay,
    #[serde(rename = "1w")]
    OneWeek,
    #[serde(rename = "1M")]
    OneMonth,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::OneMinute => "1m",
            Timeframe::ThreeMinute => "3m",
            Timeframe::FiveMinute => "5m",
            Timeframe::FifteenMinute => "15m",
            Timeframe::ThirtyMinute => "30m",
            Timeframe::OneHour => "1h",
            Timeframe::TwoHour => "2h",
            Timeframe::FourHour => "4h",
            Timeframe::SixHour => "6h",
            Timeframe::EightHour => "8h",
            Timeframe::TwelveHour => "12h",
            Timeframe::OneDay => "1d",
            Timeframe::ThreeDay => "3d",
            Timeframe::OneWeek => "1w",
            Timeframe::OneMonth => "1M",
        }
    }

    pub fn all() -> Vec<Timeframe> {
        vec![
            Timeframe::OneMinute,
            Timeframe::ThreeMinute,
            Timeframe::FiveMinute,
            Timeframe::FifteenMinute,
            Timeframe::ThirtyMinute,
            Timeframe::OneHour,
            Timeframe::TwoHour,
            Timeframe::FourHour,
            Timeframe::SixHour,
            Timeframe::EightHour,
            Timeframe::TwelveHour,
            Timeframe::OneDay,
            Timeframe::ThreeDay,
            Timeframe::OneWeek,
            Timeframe::OneMonth,
        ]
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = DataLoaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::all()
            .into_iter()
            .find(|tf| tf.as_str() == s)
            .ok_or_else(|| DataLoaderError::Config(format!("Unknown timeframe: {}", s)))
    }
}

/// Timeframe plus date range; the single source for both cache keys and provider requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchWindow {
    pub timeframe: Timeframe,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl FetchWindow {
    pub fn new(timeframe: Timeframe, start: NaiveDate, end: NaiveDate) -> Self {
        FetchWindow { timeframe, start, end }
    }

    /// Inclusive lower bound (UTC midnight of `start`)
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start.and_time(NaiveTime::MIN).and_utc()
    }

    /// Exclusive upper bound (UTC midnight of `end`)
    pub fn end_time(&self) -> DateTime<Utc> {
        self.end.and_time(NaiveTime::MIN).and_utc()
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start_time() && timestamp < self.end_time()
    }
}

/// Market-data backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Binance,
    CsvDir,
}

/// Provider settings
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub kind: ProviderKind,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub testnet: bool,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Directory of `{symbol}.csv` files for the csv_dir backend
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            kind: ProviderKind::default(),
            base_url: default_base_url(),
            testnet: false,
            api_key: None,
            requests_per_second: default_requests_per_second(),
            request_timeout_secs: default_request_timeout_secs(),
            data_dir: None,
        }
    }
}

/// Configuration for one acquisition run
#[derive(Debug, Clone, Deserialize)]
pub struct LoaderConfig {
    // Symbol Selection
    #[serde(default)]
    pub symbols: Option<Vec<String>>,
    #[serde(default = "default_base_asset")]
    pub base_asset: String,
    #[serde(default = "default_pairs_limit")]
    pub pairs_limit: usize,

    // Window
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default = "default_timeframe")]
    pub timeframe: Timeframe,

    // Cache
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    // Tasks
    #[serde(default)]
    pub task_timeout_secs: Option<u64>,

    // Reporting
    #[serde(default)]
    pub write_summary: bool,

    #[serde(default)]
    pub provider: ProviderConfig,
}

impl LoaderConfig {
    pub fn window(&self) -> FetchWindow {
        FetchWindow::new(self.timeframe, self.start_date, self.end_date)
    }

    /// Explicit symbols, if any were configured
    pub fn explicit_symbols(&self) -> Option<&[String]> {
        self.symbols.as_deref().filter(|s| !s.is_empty())
    }
}

fn default_base_asset() -> String {
    "BTC".to_string()
}

fn default_pairs_limit() -> usize {
    100
}

fn default_timeframe() -> Timeframe {
    Timeframe::OneMinute
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_base_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_requests_per_second() -> u32 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}
