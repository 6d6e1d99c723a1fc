use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub scraping: ScrapingConfig,
    #[serde(default)]
    pub digest: DigestConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Data directory path
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapingConfig {
    /// Base URL for the kabutan news listings
    #[serde(default = "default_kabutan_base_url")]
    pub kabutan_base_url: String,
    /// Base URL for the traders wire listings
    #[serde(default = "default_traders_base_url")]
    pub traders_base_url: String,
    /// Query filter appended to the market-news listing URL
    #[serde(default)]
    pub market_filter: Option<String>,
    /// Query filter appended to the realtime IR listing URL
    #[serde(default)]
    pub ir_filter: Option<String>,
    /// Market-news poll schedule (5-field cron or `@every <n><s|m|h>`)
    #[serde(default = "default_market_schedule")]
    pub market_schedule: String,
    /// Realtime IR poll schedule
    #[serde(default = "default_ir_schedule")]
    pub ir_schedule: String,
    /// Traders wire poll schedule
    #[serde(default = "default_wire_schedule")]
    pub wire_schedule: String,
    /// Maximum IR articles accepted per poll
    #[serde(default = "default_max_ir_articles")]
    pub max_ir_articles: usize,
    /// Maximum wire articles accepted per poll
    #[serde(default = "default_max_wire_articles")]
    pub max_wire_articles: usize,
    /// Request timeout in seconds for listing and body fetches
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            kabutan_base_url: default_kabutan_base_url(),
            traders_base_url: default_traders_base_url(),
            market_filter: None,
            ir_filter: None,
            market_schedule: default_market_schedule(),
            ir_schedule: default_ir_schedule(),
            wire_schedule: default_wire_schedule(),
            max_ir_articles: default_max_ir_articles(),
            max_wire_articles: default_max_wire_articles(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestConfig {
    /// Digest schedule (top of every hour by default)
    #[serde(default = "default_digest_schedule")]
    pub schedule: String,
    /// Trailing window covered by one digest, in seconds
    #[serde(default = "default_digest_window")]
    pub window_secs: u64,
    /// Articles per digest page
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            schedule: default_digest_schedule(),
            window_secs: default_digest_window(),
            page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Refresh schedule
    #[serde(default = "default_refresh_schedule")]
    pub schedule: String,
    /// Hours after which a stored body counts as stale
    #[serde(default = "default_staleness_hours")]
    pub staleness_hours: u32,
    /// Refresh attempts per article before it is retired
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Articles picked up per refresh pass
    #[serde(default = "default_refresh_batch")]
    pub batch_limit: u32,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            schedule: default_refresh_schedule(),
            staleness_hours: default_staleness_hours(),
            max_retries: default_max_retries(),
            batch_limit: default_refresh_batch(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Enable AI summarization
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Chat-completions endpoint
    #[serde(default = "default_ai_endpoint")]
    pub endpoint: String,
    /// API key (required when enabled)
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model identifier
    #[serde(default = "default_ai_model")]
    pub model: String,
    /// Request timeout in milliseconds
    #[serde(default = "default_ai_timeout")]
    pub timeout_ms: u64,
    /// Max tokens for one summary
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Summarization schedule
    #[serde(default = "default_summarize_schedule")]
    pub schedule: String,
    /// Articles summarized per pass
    #[serde(default = "default_summarize_batch")]
    pub batch_limit: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            endpoint: default_ai_endpoint(),
            api_key: None,
            model: default_ai_model(),
            timeout_ms: default_ai_timeout(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            schedule: default_summarize_schedule(),
            batch_limit: default_summarize_batch(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Bot token for the notification session
    #[serde(default)]
    pub token: Option<String>,
    /// Default destination channel for alerts and digests
    #[serde(default)]
    pub alert_channel: String,
    /// Destination channel for urgent items (falls back to alert_channel)
    #[serde(default)]
    pub urgent_channel: Option<String>,
    /// REST API base
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Delivery timeout in seconds
    #[serde(default = "default_notify_timeout")]
    pub timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            token: None,
            alert_channel: String::new(),
            urgent_channel: None,
            api_base: default_api_base(),
            timeout_secs: default_notify_timeout(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("zaraba")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_kabutan_base_url() -> String {
    "https://kabutan.jp".to_string()
}

fn default_traders_base_url() -> String {
    "https://www.traders.co.jp".to_string()
}

fn default_market_schedule() -> String {
    "@every 5m".to_string()
}

fn default_ir_schedule() -> String {
    "*/1 * * * *".to_string()
}

fn default_wire_schedule() -> String {
    "*/2 * * * *".to_string()
}

fn default_max_ir_articles() -> usize {
    10
}

fn default_max_wire_articles() -> usize {
    10
}

fn default_request_timeout() -> u64 {
    30
}

fn default_digest_schedule() -> String {
    "0 * * * *".to_string()
}

fn default_digest_window() -> u64 {
    3600
}

fn default_page_size() -> usize {
    8
}

fn default_refresh_schedule() -> String {
    "@every 1h".to_string()
}

fn default_staleness_hours() -> u32 {
    24
}

fn default_max_retries() -> u32 {
    3
}

fn default_refresh_batch() -> u32 {
    20
}

fn default_ai_endpoint() -> String {
    "https://api.deepseek.com/chat/completions".to_string()
}

fn default_ai_model() -> String {
    "deepseek-chat".to_string()
}

fn default_ai_timeout() -> u64 {
    10_000
}

fn default_max_tokens() -> u32 {
    500
}

fn default_temperature() -> f32 {
    0.7
}

fn default_summarize_schedule() -> String {
    "@every 10m".to_string()
}

fn default_summarize_batch() -> u32 {
    5
}

fn default_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_notify_timeout() -> u64 {
    10
}

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &std::path::Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if let Some(stripped) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if path_str == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

impl AppConfig {
    /// Load configuration from file or return defaults
    pub fn load() -> crate::Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> crate::Result<()> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    /// Check that everything the daemon cannot run without is present
    pub fn validate(&self) -> crate::Result<()> {
        if self.notify.token.as_deref().unwrap_or("").is_empty() {
            return Err(crate::Error::Config("notify.token is not set".to_string()));
        }
        if self.notify.alert_channel.is_empty() {
            return Err(crate::Error::Config(
                "notify.alert_channel is not set".to_string(),
            ));
        }
        if self.ai.enabled && self.ai.api_key.as_deref().unwrap_or("").is_empty() {
            return Err(crate::Error::Config(
                "ai.api_key is not set (disable ai or provide a key)".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the configuration file path
    /// Always uses ~/.config/zaraba/config.toml on all platforms
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("zaraba")
            .join("config.toml")
    }

    /// Get the database file path
    pub fn database_path(&self) -> PathBuf {
        self.data_dir().join("zaraba.db")
    }

    /// Get the data directory (with tilde expansion)
    pub fn data_dir(&self) -> PathBuf {
        expand_tilde(&self.general.data_dir)
    }
}
