/// Configuration loading from TOML file with environment overrides
use std::path::Path;

use crate::error::{DataLoaderError, Result};
use crate::types::{LoaderConfig, ProviderKind};

const ENV_PREFIX: &str = "HISTLOADER";

/// Load config from `path`, then apply `HISTLOADER__*` environment overrides.
///
/// `HISTLOADER__SYMBOLS=BTCUSDT,ETHUSDT` overrides the symbol list,
/// `HISTLOADER__PROVIDER__API_KEY=...` the provider key. `BINANCE_API_KEY`
/// is used when no key is configured anywhere else.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<LoaderConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path.as_ref()))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("symbols"),
        )
        .build()
        .map_err(|e| DataLoaderError::Config(format!("Failed to read config file: {}", e)))?;

    let mut config: LoaderConfig = settings
        .try_deserialize()
        .map_err(|e| DataLoaderError::Config(format!("Failed to parse config: {}", e)))?;

    if config.provider.api_key.is_none() {
        config.provider.api_key = std::env::var("BINANCE_API_KEY").ok().filter(|k| !k.is_empty());
    }

    validate_config(&config)?;

    Ok(config)
}

pub fn validate_config(config: &LoaderConfig) -> Result<()> {
    // Validate window
    if config.end_date <= config.start_date {
        return Err(DataLoaderError::Config(format!(
            "end_date {} must be after start_date {}",
            config.end_date, config.start_date
        )));
    }

    if config.cache_dir.as_os_str().is_empty() {
        return Err(DataLoaderError::Config("cache_dir is empty".to_string()));
    }

    // Liquidity discovery is only consulted without explicit symbols
    if config.explicit_symbols().is_none() {
        if config.base_asset.trim().is_empty() {
            return Err(DataLoaderError::Config(
                "base_asset is required when symbols are not configured".to_string(),
            ));
        }
        if config.pairs_limit == 0 {
            return Err(DataLoaderError::Config("pairs_limit must be > 0".to_string()));
        }
    }

    if let Some(symbols) = config.explicit_symbols() {
        if symbols.iter().any(|s| s.trim().is_empty()) {
            return Err(DataLoaderError::Config("symbols contains an empty entry".to_string()));
        }
    }

    if config.task_timeout_secs == Some(0) {
        return Err(DataLoaderError::Config("task_timeout_secs must be > 0".to_string()));
    }

    // Validate provider
    if config.provider.requests_per_second == 0 {
        return Err(DataLoaderError::Config(
            "provider.requests_per_second must be > 0".to_string(),
        ));
    }

    if config.provider.kind == ProviderKind::CsvDir && config.provider.data_dir.is_none() {
        return Err(DataLoaderError::Config(
            "provider.data_dir is required for the csv_dir provider".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timeframe;
    use chrono::NaiveDate;
    use std::io::Write;
    use std::sync::{Mutex, MutexGuard};

    // environment variables are process-wide; every test that loads config holds this
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Lock the environment and strip every variable `load_config` reads
    fn clean_env() -> MutexGuard<'static, ()> {
        let guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        for (name, _) in std::env::vars() {
            if name.starts_with("HISTLOADER__") || name == "BINANCE_API_KEY" {
                std::env::remove_var(name);
            }
        }
        guard
    }

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    const MINIMAL: &str = r#"
        start_date = "2025-03-01"
        end_date = "2025-03-02"
        "#;

    #[test]
    fn test_load_config_with_defaults() {
        let _env = clean_env();
        let file = write_config(
            r#"
            symbols = ["BTCUSDT", "ETHUSDT"]
            start_date = "2025-03-01"
            end_date = "2025-03-28"
            "#,
        );

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.explicit_symbols().unwrap().len(), 2);
        assert_eq!(config.timeframe, Timeframe::OneMinute);
        assert_eq!(config.start_date, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert_eq!(config.base_asset, "BTC");
        assert_eq!(config.pairs_limit, 100);
        assert_eq!(config.provider.kind, ProviderKind::Binance);
    }

    #[test]
    fn test_rejects_inverted_window() {
        let _env = clean_env();
        let file = write_config(
            r#"
            start_date = "2025-03-28"
            end_date = "2025-03-01"
            timeframe = "1h"
            "#,
        );

        let err = load_config(file.path()).unwrap_err();
        assert_eq!(err.error_code(), "CFG_001");
    }

    #[test]
    fn test_csv_provider_requires_data_dir() {
        let _env = clean_env();
        let file = write_config(
            r#"
            start_date = "2025-03-01"
            end_date = "2025-03-02"

            [provider]
            kind = "csv_dir"
            "#,
        );

        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_environment_overrides_file() {
        let _env = clean_env();
        std::env::set_var("HISTLOADER__SYMBOLS", "BTCUSDT,ETHUSDT");
        std::env::set_var("HISTLOADER__TIMEFRAME", "1h");
        std::env::set_var("HISTLOADER__PROVIDER__API_KEY", "from-env");
        let file = write_config(MINIMAL);

        let loaded = load_config(file.path());

        std::env::remove_var("HISTLOADER__SYMBOLS");
        std::env::remove_var("HISTLOADER__TIMEFRAME");
        std::env::remove_var("HISTLOADER__PROVIDER__API_KEY");

        let config = loaded.unwrap();
        assert_eq!(
            config.explicit_symbols().unwrap(),
            ["BTCUSDT".to_string(), "ETHUSDT".to_string()]
        );
        assert_eq!(config.timeframe, Timeframe::OneHour);
        assert_eq!(config.provider.api_key.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_binance_api_key_fallback() {
        let _env = clean_env();
        std::env::set_var("BINANCE_API_KEY", "fallback-key");
        let file = write_config(MINIMAL);

        let fallback = load_config(file.path()).map(|c| c.provider.api_key);

        let configured = write_config(
            r#"
            start_date = "2025-03-01"
            end_date = "2025-03-02"

            [provider]
            api_key = "file-key"
            "#,
        );
        let explicit = load_config(configured.path()).map(|c| c.provider.api_key);

        std::env::remove_var("BINANCE_API_KEY");

        assert_eq!(fallback.unwrap().as_deref(), Some("fallback-key"));
        assert_eq!(explicit.unwrap().as_deref(), Some("file-key"));

        let without = load_config(file.path()).unwrap();
        assert!(without.provider.api_key.is_none());
    }
}
