use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::trend::DetectorSettings;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub trend: TrendConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    /// Time-series store identifier (sqlite file path).
    #[serde(default)]
    pub table: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArchiveConfig {
    /// Raw payload archive identifier (root directory).
    #[serde(default)]
    pub bucket: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifyConfig {
    /// Webhook URL or alert log path.
    #[serde(default)]
    pub topic: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrendConfig {
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
    #[serde(default = "default_short_period")]
    pub short_period: usize,
    #[serde(default = "default_long_period")]
    pub long_period: usize,
    #[serde(default = "default_window")]
    pub window: String,
    #[serde(default = "default_interval")]
    pub interval: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn default_symbols() -> Vec<String> {
    vec!["AAPL".to_string()]
}

fn default_short_period() -> usize {
    5
}

fn default_long_period() -> usize {
    20
}

fn default_window() -> String {
    "5m".to_string()
}

fn default_interval() -> String {
    "1m".to_string()
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            short_period: default_short_period(),
            long_period: default_long_period(),
            window: default_window(),
            interval: default_interval(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

/// Parse an interval string (e.g. "30s", "5m", "1h", "1d") into milliseconds.
pub fn parse_interval_ms(s: &str) -> Result<u64> {
    let suffix_at = match s.char_indices().last() {
        Some((idx, _)) if idx > 0 => idx,
        _ => bail!("invalid interval '{}': expected format like '5m'", s),
    };

    let (num_str, suffix) = s.split_at(suffix_at);
    let n: u64 = num_str.parse().with_context(|| {
        format!(
            "invalid interval '{}': quantity must be a positive integer",
            s
        )
    })?;
    if n == 0 {
        bail!("invalid interval '{}': quantity must be > 0", s);
    }

    let unit_ms = match suffix {
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        _ => bail!(
            "invalid interval '{}': unsupported suffix '{}', expected one of s/m/h/d",
            s,
            suffix
        ),
    };

    n.checked_mul(unit_ms)
        .with_context(|| format!("invalid interval '{}': value is too large", s))
}

impl TrendConfig {
    /// Trimmed, uppercased, de-duplicated symbols in configured order.
    pub fn tracked_symbols(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for sym in &self.symbols {
            let s = sym.trim().to_ascii_uppercase();
            if !s.is_empty() && !out.iter().any(|v| v == &s) {
                out.push(s);
            }
        }
        out
    }

    pub fn window_duration(&self) -> Result<Duration> {
        Ok(Duration::from_millis(parse_interval_ms(&self.window)?))
    }

    pub fn interval_duration(&self) -> Result<Duration> {
        Ok(Duration::from_millis(parse_interval_ms(&self.interval)?))
    }

    pub fn detector_settings(&self) -> Result<DetectorSettings> {
        Ok(DetectorSettings {
            symbols: self.tracked_symbols(),
            short_period: self.short_period,
            long_period: self.long_period,
            window: self.window_duration().context("trend.window is invalid")?,
        })
    }
}

impl Config {
    /// Load `TICK_TREND_CONFIG` (default `config/default.toml`), then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = std::env::var("TICK_TREND_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        let mut config = Self::from_path(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&config_str).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Deployment settings from the environment win over the file.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("TABLE_NAME") {
            self.store.table = v;
        }
        if let Some(v) = var("BUCKET_NAME") {
            self.archive.bucket = v;
        }
        if let Some(v) = var("SNS_TOPIC_ARN") {
            self.notify.topic = v;
        }
        if let Some(v) = var("TICK_TREND_SYMBOLS") {
            self.trend.symbols = v.split(',').map(str::to_string).collect();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.store.table.trim().is_empty() {
            bail!("store.table (TABLE_NAME) is required");
        }
        if self.archive.bucket.trim().is_empty() {
            bail!("archive.bucket (BUCKET_NAME) is required");
        }
        if self.notify.topic.trim().is_empty() {
            bail!("notify.topic (SNS_TOPIC_ARN) is required");
        }
        if self.trend.short_period == 0 || self.trend.long_period == 0 {
            bail!("trend periods must be >= 1");
        }
        if self.trend.short_period >= self.trend.long_period {
            bail!(
                "trend.short_period ({}) must be less than trend.long_period ({})",
                self.trend.short_period,
                self.trend.long_period
            );
        }
        if self.trend.tracked_symbols().is_empty() {
            bail!("trend.symbols must name at least one symbol");
        }
        self.trend
            .window_duration()
            .context("trend.window is invalid")?;
        self.trend
            .interval_duration()
            .context("trend.interval is invalid")?;
        Ok(())
    }
}
