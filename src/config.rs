use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{AppError, Result};

const APP_DIR: &str = "news-shorts";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub model: ModelConfig,

    pub news_api_key: Option<String>,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub filter: FilterConfig,

    #[serde(default)]
    pub summary: SummaryConfig,

    #[serde(default)]
    pub retention: RetentionConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub api_key: Option<String>,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_filter_model")]
    pub filter_model: String,

    #[serde(default = "default_summary_model")]
    pub summary_model: String,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_max_articles_per_source")]
    pub max_articles_per_source: usize,

    #[serde(default = "default_fetch_delay_ms")]
    pub delay_ms: u64,

    #[serde(default = "default_max_content_length")]
    pub max_content_length: usize,

    #[serde(default = "default_max_description_length")]
    pub max_description_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_filter_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_min_relevance_score")]
    pub min_relevance_score: i64,

    #[serde(default = "default_min_content_length")]
    pub min_content_length: usize,

    /// Pacing interval between consecutive filter model calls.
    #[serde(default = "default_filter_delay_ms")]
    pub rate_limit_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    #[serde(default = "default_summary_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_summary_min_content_length")]
    pub min_content_length: usize,

    #[serde(default = "default_summary_delay_ms")]
    pub rate_limit_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_max_article_age_days")]
    pub max_article_age_days: i64,

    #[serde(default = "default_max_articles_count")]
    pub max_articles_count: usize,

    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: i64,

    #[serde(default = "default_metrics_retention_days")]
    pub metrics_retention_days: i64,

    #[serde(default = "default_purge_batch_size")]
    pub purge_batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_limit_bytes")]
    pub limit_bytes: u64,

    #[serde(default = "default_warning_percent")]
    pub warning_percent: f64,

    #[serde(default = "default_critical_percent")]
    pub critical_percent: f64,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR);
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("news.db").to_string_lossy().to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_api_url() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}

fn default_filter_model() -> String {
    "claude-3-5-haiku-20241022".to_string()
}

fn default_summary_model() -> String {
    "claude-3-5-haiku-20241022".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_articles_per_source() -> usize {
    50
}

fn default_fetch_delay_ms() -> u64 {
    2000
}

fn default_max_content_length() -> usize {
    10_000
}

fn default_max_description_length() -> usize {
    1000
}

fn default_filter_batch_size() -> usize {
    100
}

fn default_min_relevance_score() -> i64 {
    6
}

fn default_min_content_length() -> usize {
    50
}

fn default_filter_delay_ms() -> u64 {
    4500
}

fn default_summary_batch_size() -> usize {
    50
}

fn default_summary_min_content_length() -> usize {
    100
}

fn default_summary_delay_ms() -> u64 {
    1100
}

/// Upper bound for every retention window.
pub const MAX_RETENTION_DAYS: i64 = 36_500;

fn default_max_article_age_days() -> i64 {
    30
}

fn default_max_articles_count() -> usize {
    1000
}

fn default_log_retention_days() -> i64 {
    7
}

fn default_metrics_retention_days() -> i64 {
    30
}

fn default_purge_batch_size() -> usize {
    100
}

fn default_storage_limit_bytes() -> u64 {
    500 * 1024 * 1024
}

fn default_warning_percent() -> f64 {
    80.0
}

fn default_critical_percent() -> f64 {
    90.0
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            filter_model: default_filter_model(),
            summary_model: default_summary_model(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_articles_per_source: default_max_articles_per_source(),
            delay_ms: default_fetch_delay_ms(),
            max_content_length: default_max_content_length(),
            max_description_length: default_max_description_length(),
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            batch_size: default_filter_batch_size(),
            min_relevance_score: default_min_relevance_score(),
            min_content_length: default_min_content_length(),
            rate_limit_delay_ms: default_filter_delay_ms(),
        }
    }
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            batch_size: default_summary_batch_size(),
            min_content_length: default_summary_min_content_length(),
            rate_limit_delay_ms: default_summary_delay_ms(),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_article_age_days: default_max_article_age_days(),
            max_articles_count: default_max_articles_count(),
            log_retention_days: default_log_retention_days(),
            metrics_retention_days: default_metrics_retention_days(),
            purge_batch_size: default_purge_batch_size(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            limit_bytes: default_storage_limit_bytes(),
            warning_percent: default_warning_percent(),
            critical_percent: default_critical_percent(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_level: default_log_level(),
            model: ModelConfig::default(),
            news_api_key: None,
            fetch: FetchConfig::default(),
            filter: FilterConfig::default(),
            summary: SummaryConfig::default(),
            retention: RetentionConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Reads the TOML file (if present) and layers process environment on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::config_path);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml(&content)?
        } else {
            if path.is_some() {
                return Err(AppError::Config(format!(
                    "config file not found: {}",
                    config_path.display()
                )));
            }
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Overrides fields from environment-style variables. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("DATABASE_PATH") {
            self.db_path = v;
        }
        if let Some(v) = get("LOG_LEVEL") {
            self.log_level = v.to_lowercase();
        }
        if let Some(v) = get("MODEL_API_KEY") {
            self.model.api_key = Some(v);
        }
        if let Some(v) = get("MODEL_API_URL") {
            self.model.api_url = v;
        }
        if let Some(v) = get("FILTER_MODEL") {
            self.model.filter_model = v;
        }
        if let Some(v) = get("SUMMARY_MODEL") {
            self.model.summary_model = v;
        }
        if let Some(v) = get("NEWS_API_KEY") {
            self.news_api_key = Some(v);
        }

        set_parsed(&get, "MAX_RETRIES", &mut self.model.max_retries)?;
        set_parsed(&get, "MAX_ARTICLES_PER_SOURCE", &mut self.fetch.max_articles_per_source)?;
        set_parsed(&get, "FETCH_DELAY_MS", &mut self.fetch.delay_ms)?;
        set_parsed(&get, "FILTER_BATCH_SIZE", &mut self.filter.batch_size)?;
        set_parsed(&get, "MIN_RELEVANCE_SCORE", &mut self.filter.min_relevance_score)?;
        set_parsed(&get, "MIN_CONTENT_LENGTH", &mut self.filter.min_content_length)?;
        set_parsed(&get, "FILTER_RATE_LIMIT_DELAY_MS", &mut self.filter.rate_limit_delay_ms)?;
        set_parsed(&get, "SUMMARY_BATCH_SIZE", &mut self.summary.batch_size)?;
        set_parsed(&get, "SUMMARY_MIN_CONTENT_LENGTH", &mut self.summary.min_content_length)?;
        set_parsed(&get, "SUMMARY_RATE_LIMIT_DELAY_MS", &mut self.summary.rate_limit_delay_ms)?;
        set_parsed(&get, "MAX_ARTICLE_AGE_DAYS", &mut self.retention.max_article_age_days)?;
        set_parsed(&get, "MAX_ARTICLES_COUNT", &mut self.retention.max_articles_count)?;
        set_parsed(&get, "LOG_RETENTION_DAYS", &mut self.retention.log_retention_days)?;
        set_parsed(&get, "METRICS_RETENTION_DAYS", &mut self.retention.metrics_retention_days)?;
        set_parsed(&get, "STORAGE_LIMIT_BYTES", &mut self.storage.limit_bytes)?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.db_path.trim().is_empty() {
            errors.push("db_path must not be empty".to_string());
        }
        if self.model.max_retries == 0 {
            errors.push("model.max_retries must be at least 1".to_string());
        }
        if !(0..=10).contains(&self.filter.min_relevance_score) {
            errors.push("filter.min_relevance_score must be between 0 and 10".to_string());
        }
        if self.filter.batch_size == 0 || self.summary.batch_size == 0 {
            errors.push("batch sizes must be positive".to_string());
        }
        for (name, days) in [
            ("max_article_age_days", self.retention.max_article_age_days),
            ("log_retention_days", self.retention.log_retention_days),
            ("metrics_retention_days", self.retention.metrics_retention_days),
        ] {
            if !(1..=MAX_RETENTION_DAYS).contains(&days) {
                errors.push(format!(
                    "retention.{name} must be between 1 and {MAX_RETENTION_DAYS}"
                ));
            }
        }
        if self.retention.purge_batch_size == 0 {
            errors.push("retention.purge_batch_size must be positive".to_string());
        }
        if self.storage.warning_percent > self.storage.critical_percent {
            errors.push("storage.warning_percent must not exceed critical_percent".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Config(errors.join("; ")))
        }
    }

    /// Model-backed stages cannot run without credentials.
    pub fn require_model_api_key(&self) -> Result<&str> {
        self.model
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AppError::Config("MODEL_API_KEY is not set".to_string()))
    }
}

fn set_parsed<T, G>(get: &G, key: &str, slot: &mut T) -> Result<()>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    if let Some(raw) = get(key) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{key} has an invalid value: {raw}")))?;
    }
    Ok(())
}
