/// Persistent series cache addressed by (symbol, timeframe, start, end)
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::CacheError;
use crate::types::{FetchWindow, PriceBar, PriceSeries, Timeframe};
use crate::utils::payload_digest;

const FORMAT_VERSION: u32 = 1;
const FILE_SUFFIX: &str = ".json.gz";

/// Deterministic cache address. Nothing outside these four fields affects it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl CacheKey {
    pub fn new(symbol: &str, window: &FetchWindow) -> Self {
        CacheKey {
            symbol: symbol.to_string(),
            timeframe: window.timeframe,
            start: window.start,
            end: window.end,
        }
    }

    /// File name under the cache directory; path separators in symbols are replaced
    pub fn file_name(&self) -> String {
        let stem: String = self
            .to_string()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        format!("{}{}", stem, FILE_SUFFIX)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}",
            self.symbol,
            self.timeframe,
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

/// Series persistence. A missing key is `Ok(None)`, never an error.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<PriceSeries>, CacheError>;

    async fn put(&self, key: &CacheKey, series: &PriceSeries) -> Result<(), CacheError>;
}

/// Column-per-field encoding of the bars
#[derive(Debug, Serialize, Deserialize)]
struct BarColumns {
    timestamp_ns: Vec<i64>,
    open: Vec<f64>,
    high: Vec<f64>,
    low: Vec<f64>,
    close: Vec<f64>,
    volume: Vec<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEnvelope {
    version: u32,
    key: String,
    symbol: String,
    timeframe: Timeframe,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    digest: String,
    /// JSON-encoded `BarColumns`; the digest covers these exact bytes
    payload: String,
}

fn encode(key: &CacheKey, series: &PriceSeries, path: &str) -> Result<Vec<u8>, CacheError> {
    let mut columns = BarColumns {
        timestamp_ns: Vec::with_capacity(series.len()),
        open: Vec::with_capacity(series.len()),
        high: Vec::with_capacity(series.len()),
        low: Vec::with_capacity(series.len()),
        close: Vec::with_capacity(series.len()),
        volume: Vec::with_capacity(series.len()),
    };

    for bar in &series.bars {
        let ns = bar.timestamp.timestamp_nanos_opt().ok_or_else(|| CacheError::Corrupt {
            path: path.to_string(),
            reason: format!("timestamp {} not representable in nanoseconds", bar.timestamp),
        })?;
        columns.timestamp_ns.push(ns);
        columns.open.push(bar.open);
        columns.high.push(bar.high);
        columns.low.push(bar.low);
        columns.close.push(bar.close);
        columns.volume.push(bar.volume);
    }

    let payload = serde_json::to_string(&columns).map_err(|source| CacheError::Codec {
        path: path.to_string(),
        source,
    })?;

    let envelope = CacheEnvelope {
        version: FORMAT_VERSION,
        key: key.to_string(),
        symbol: series.symbol.clone(),
        timeframe: series.timeframe,
        start: series.start,
        end: series.end,
        digest: payload_digest(payload.as_bytes()),
        payload,
    };

    let json = serde_json::to_vec(&envelope).map_err(|source| CacheError::Codec {
        path: path.to_string(),
        source,
    })?;

    let io_err = |source| CacheError::Io {
        path: path.to_string(),
        source,
    };
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json).map_err(io_err)?;
    encoder.finish().map_err(io_err)
}

fn decode(key: &CacheKey, bytes: &[u8], path: &str) -> Result<PriceSeries, CacheError> {
    let corrupt = |reason: String| CacheError::Corrupt {
        path: path.to_string(),
        reason,
    };

    let mut json = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut json)
        .map_err(|e| corrupt(format!("gzip: {}", e)))?;

    let envelope: CacheEnvelope = serde_json::from_slice(&json).map_err(|source| CacheError::Codec {
        path: path.to_string(),
        source,
    })?;

    if envelope.version != FORMAT_VERSION {
        return Err(corrupt(format!("unsupported format version {}", envelope.version)));
    }

    let expected = key.to_string();
    if envelope.key != expected {
        return Err(CacheError::KeyMismatch {
            path: path.to_string(),
            expected,
            found: envelope.key,
        });
    }

    if payload_digest(envelope.payload.as_bytes()) != envelope.digest {
        return Err(corrupt("digest mismatch".to_string()));
    }

    let columns: BarColumns =
        serde_json::from_str(&envelope.payload).map_err(|source| CacheError::Codec {
            path: path.to_string(),
            source,
        })?;

    let rows = columns.timestamp_ns.len();
    let lengths = [
        columns.open.len(),
        columns.high.len(),
        columns.low.len(),
        columns.close.len(),
        columns.volume.len(),
    ];
    if lengths.iter().any(|&len| len != rows) {
        return Err(corrupt(format!(
            "column lengths {:?} differ from {} timestamps",
            lengths, rows
        )));
    }

    let bars = (0..rows)
        .map(|i| PriceBar {
            timestamp: DateTime::from_timestamp_nanos(columns.timestamp_ns[i]),
            open: columns.open[i],
            high: columns.high[i],
            low: columns.low[i],
            close: columns.close[i],
            volume: columns.volume[i],
        })
        .collect();

    Ok(PriceSeries {
        symbol: envelope.symbol,
        timeframe: envelope.timeframe,
        start: envelope.start,
        end: envelope.end,
        bars,
    })
}

/// On-disk cache: one gzip-compressed blob per key under `dir`
pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        FileCacheStore { dir: dir.into() }
    }

    /// Create the cache directory if needed
    pub async fn open<P: Into<PathBuf>>(dir: P) -> Result<Self, CacheError> {
        let store = FileCacheStore::new(dir);
        tokio::fs::create_dir_all(&store.dir)
            .await
            .map_err(|source| CacheError::Io {
                path: store.dir.display().to_string(),
                source,
            })?;
        Ok(store)
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }
}

#[async_trait]
impl CacheStore for FileCacheStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<PriceSeries>, CacheError> {
        let path = self.path_for(key);
        let shown = path.display().to_string();

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CacheError::Io { path: shown, source }),
        };

        let series = decode(key, &bytes, &shown)?;
        debug!("Loaded {} bars from {}", series.len(), shown);
        Ok(Some(series))
    }

    async fn put(&self, key: &CacheKey, series: &PriceSeries) -> Result<(), CacheError> {
        let path = self.path_for(key);
        let shown = path.display().to_string();
        let bytes = encode(key, series, &shown)?;

        let io_err = |source| CacheError::Io {
            path: shown.clone(),
            source,
        };

        tokio::fs::create_dir_all(&self.dir).await.map_err(io_err)?;

        // write-then-rename so readers never see a partial blob
        let tmp = path.with_extension("gz.tmp");
        tokio::fs::write(&tmp, &bytes).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &path).await.map_err(io_err)?;

        debug!("Cached {} bars to {} ({} bytes)", series.len(), shown, bytes.len());
        Ok(())
    }
}

/// Process-local cache for tests and ephemeral runs
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<CacheKey, PriceSeries>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        MemoryCacheStore::default()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<PriceSeries>, CacheError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &CacheKey, series: &PriceSeries) -> Result<(), CacheError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.entries.write().await.insert(key.clone(), series.clone());
        Ok(())
    }
}
