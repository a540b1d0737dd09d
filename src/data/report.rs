/// Run summary persisted next to the cache
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use crate::data::orchestrator::{AcquisitionResult, SymbolFailure};
use crate::error::Result;
use crate::types::{FetchWindow, Timeframe};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub timeframe: Timeframe,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub requested: usize,
    pub loaded: usize,
    pub cache_hits: usize,
    pub fetched: usize,
    pub bars: usize,
    pub failures: Vec<SymbolFailure>,
}

impl AcquisitionSummary {
    pub fn from_result(result: &AcquisitionResult, window: &FetchWindow) -> Self {
        AcquisitionSummary {
            run_id: Uuid::new_v4(),
            started_at: result.started_at,
            finished_at: result.finished_at,
            timeframe: window.timeframe,
            start_date: window.start,
            end_date: window.end,
            requested: result.requested.len(),
            loaded: result.series.len(),
            cache_hits: result.cache_hits,
            fetched: result.fetched,
            bars: result.series.values().map(|s| s.len()).sum(),
            failures: result.failures.clone(),
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.requested == 0 {
            return 0.0;
        }
        self.loaded as f64 / self.requested as f64
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    /// Write as pretty JSON under `dir`, named by the run start time
    pub async fn save(&self, dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!(
            "acquisition_summary_{}.json",
            self.started_at.format("%Y%m%d_%H%M%S")
        ));

        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&path, json).await?;

        info!("💾 Saved acquisition summary to {}", path.display());
        Ok(path)
    }
}
