use crate::engine::{RiskParams, ScoringWeights};
use crate::orchestration::AnalysisSettings;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Upper bound for `WINDOW_DAYS` (ten years).
const MAX_WINDOW_DAYS: u32 = 3650;
/// Upper bound for second-valued settings (one year).
const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub wallets: Vec<String>,
    pub window_days: u32,
    pub risk_free_rate: f64,
    pub periods_per_year: u32,
    pub price_cache_ttl: Duration,
    pub batch_time_budget: Duration,
    pub max_concurrent_wallets: usize,
    pub as_of_date: Option<NaiveDate>,
    pub report_path: Option<PathBuf>,
    pub fills_csv: Option<PathBuf>,
    pub prices_csv: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let window_days = parse_positive::<u32>(&env_map, "WINDOW_DAYS", "90")?;
        check_at_most(window_days, MAX_WINDOW_DAYS, "WINDOW_DAYS")?;

        let risk_free_rate = env_map
            .get("RISK_FREE_RATE")
            .map(|s| s.as_str())
            .unwrap_or("0.02")
            .parse::<f64>()
            .ok()
            .filter(|r| r.is_finite())
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "RISK_FREE_RATE".to_string(),
                    "must be a finite number".to_string(),
                )
            })?;

        let periods_per_year = parse_positive::<u32>(&env_map, "PERIODS_PER_YEAR", "365")?;

        let price_cache_ttl = parse_secs(&env_map, "PRICE_CACHE_TTL_SECS", "86400")?;
        let batch_time_budget = parse_secs(&env_map, "BATCH_TIME_BUDGET_SECS", "300")?;

        let max_concurrent_wallets =
            parse_positive::<usize>(&env_map, "MAX_CONCURRENT_WALLETS", "4")?;

        let as_of_date = match env_map.get("AS_OF_DATE") {
            Some(s) => Some(NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
                ConfigError::InvalidValue(
                    "AS_OF_DATE".to_string(),
                    format!("must be YYYY-MM-DD, got {}", s),
                )
            })?),
            None => None,
        };

        let report_path = optional_path(&env_map, "REPORT_PATH");
        let fills_csv = optional_path(&env_map, "FILLS_CSV");
        let prices_csv = optional_path(&env_map, "PRICES_CSV");

        let wallets = parse_wallets_from_map(&env_map)?;

        Ok(Config {
            database_path,
            wallets,
            window_days,
            risk_free_rate,
            periods_per_year,
            price_cache_ttl,
            batch_time_budget,
            max_concurrent_wallets,
            as_of_date,
            report_path,
            fills_csv,
            prices_csv,
        })
    }

    pub fn analysis_settings(&self) -> AnalysisSettings {
        AnalysisSettings {
            window_days: self.window_days,
            as_of: self.as_of_date,
            risk: RiskParams {
                risk_free_rate: self.risk_free_rate,
                periods_per_year: self.periods_per_year,
            },
            weights: ScoringWeights::default(),
        }
    }
}

fn parse_number<T: std::str::FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<T, ConfigError> {
    env_map
        .get(key)
        .map(|s| s.as_str())
        .unwrap_or(default)
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue(key.to_string(), "must be a valid number".to_string()))
}

fn parse_positive<T>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let value = parse_number::<T>(env_map, key, default)?;
    if value <= T::default() {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(value)
}

fn check_at_most<T>(value: T, max: T, key: &str) -> Result<(), ConfigError>
where
    T: PartialOrd + std::fmt::Display,
{
    if value > max {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("must be at most {}", max),
        ));
    }
    Ok(())
}

fn parse_secs(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<Duration, ConfigError> {
    let secs = parse_number::<u64>(env_map, key, default)?;
    check_at_most(secs, MAX_DURATION_SECS, key)?;
    Ok(Duration::from_secs(secs))
}

fn optional_path(env_map: &HashMap<String, String>, key: &str) -> Option<PathBuf> {
    env_map
        .get(key)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

fn parse_wallets_from_map(env_map: &HashMap<String, String>) -> Result<Vec<String>, ConfigError> {
    if let Some(wallets_str) = env_map.get("WALLETS") {
        Ok(wallets_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect())
    } else if let Some(file_path) = env_map.get("WALLETS_FILE") {
        let content = std::fs::read_to_string(file_path).map_err(|_| {
            ConfigError::InvalidValue(
                "WALLETS_FILE".to_string(),
                "file not found or unreadable".to_string(),
            )
        })?;
        Ok(content
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|s| !s.is_empty() && !s.starts_with('#'))
            .collect())
    } else {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.window_days, 90);
        assert_eq!(config.risk_free_rate, 0.02);
        assert_eq!(config.periods_per_year, 365);
        assert_eq!(config.price_cache_ttl, Duration::from_secs(86_400));
        assert_eq!(config.batch_time_budget, Duration::from_secs(300));
        assert_eq!(config.max_concurrent_wallets, 4);
        assert!(config.as_of_date.is_none());
        assert!(config.report_path.is_none());
        assert!(config.fills_csv.is_none());
        assert!(config.prices_csv.is_none());
        assert!(config.wallets.is_empty());
    }

    #[test]
    fn test_missing_database_path() {
        let mut env_map = setup_required_env();
        env_map.remove("DATABASE_PATH");
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_zero_window_rejected() {
        let mut env_map = setup_required_env();
        env_map.insert("WINDOW_DAYS".to_string(), "0".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "WINDOW_DAYS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_oversized_values_rejected() {
        for (key, value) in [
            ("WINDOW_DAYS", "4000000000"),
            ("WINDOW_DAYS", "3651"),
            ("BATCH_TIME_BUDGET_SECS", "18446744073709551615"),
            ("PRICE_CACHE_TTL_SECS", "18446744073709551615"),
        ] {
            let mut env_map = setup_required_env();
            env_map.insert(key.to_string(), value.to_string());
            match Config::from_env_map(env_map) {
                Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, key),
                other => panic!("Expected InvalidValue for {}={}, got {:?}", key, value, other),
            }
        }
    }

    #[test]
    fn test_upper_bounds_accepted() {
        let mut env_map = setup_required_env();
        env_map.insert("WINDOW_DAYS".to_string(), "3650".to_string());
        env_map.insert("BATCH_TIME_BUDGET_SECS".to_string(), "31536000".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.window_days, 3650);
        assert_eq!(config.batch_time_budget, Duration::from_secs(31_536_000));
    }

    #[test]
    fn test_invalid_risk_free_rate() {
        let mut env_map = setup_required_env();
        env_map.insert("RISK_FREE_RATE".to_string(), "NaN".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "RISK_FREE_RATE"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_as_of_date() {
        let mut env_map = setup_required_env();
        env_map.insert("AS_OF_DATE".to_string(), "01/31/2024".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "AS_OF_DATE"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_wallets_from_list() {
        let mut env_map = setup_required_env();
        env_map.insert("WALLETS".to_string(), " 0xA , ,0xB".to_string());
        env_map.insert("AS_OF_DATE".to_string(), "2024-01-31".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.wallets, vec!["0xA".to_string(), "0xB".to_string()]);
        assert_eq!(config.as_of_date, NaiveDate::from_ymd_opt(2024, 1, 31));
    }

    #[test]
    fn test_wallets_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "0x1\n# comment\n\n0x2").unwrap();

        let mut env_map = setup_required_env();
        env_map.insert(
            "WALLETS_FILE".to_string(),
            file.path().to_string_lossy().to_string(),
        );
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.wallets, vec!["0x1".to_string(), "0x2".to_string()]);
    }

    #[test]
    fn test_import_paths() {
        let mut env_map = setup_required_env();
        env_map.insert("FILLS_CSV".to_string(), " data/fills.csv ".to_string());
        env_map.insert("PRICES_CSV".to_string(), "".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.fills_csv, Some(PathBuf::from("data/fills.csv")));
        assert!(config.prices_csv.is_none());
    }

    #[test]
    fn test_analysis_settings_carry_risk_params() {
        let mut env_map = setup_required_env();
        env_map.insert("PERIODS_PER_YEAR".to_string(), "252".to_string());
        let settings = Config::from_env_map(env_map).unwrap().analysis_settings();
        assert_eq!(settings.risk.periods_per_year, 252);
        assert_eq!(settings.window_days, 90);
    }
}
