//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote listing source settings
    #[serde(default)]
    pub source: SourceConfig,

    /// Polling and retention settings
    #[serde(default)]
    pub watch: WatchConfig,

    /// Interest filter for SKUs
    #[serde(default)]
    pub filter: FilterConfig,

    /// Telegram delivery settings
    #[serde(default)]
    pub telegram: TelegramConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.source.url.trim().is_empty() {
            return Err(AppError::config("source.url is empty"));
        }
        if self.source.user_agent.trim().is_empty() {
            return Err(AppError::config("source.user_agent is empty"));
        }
        if self.source.timeout_secs == 0 {
            return Err(AppError::config("source.timeout_secs must be > 0"));
        }
        if self.watch.poll_interval_secs == 0 {
            return Err(AppError::config("watch.poll_interval_secs must be > 0"));
        }
        if self.watch.retention_hours == 0 {
            return Err(AppError::config("watch.retention_hours must be > 0"));
        }
        if self.filter.models.is_empty() {
            return Err(AppError::config(
                "filter.models is empty (use [\"*\"] to watch everything)",
            ));
        }
        if self.filter.models.iter().any(|m| m.trim().is_empty()) {
            return Err(AppError::config("filter.models contains an empty entry"));
        }
        Ok(())
    }
}

/// Remote listing source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// URL of the stock listing page
    #[serde(default = "defaults::source_url")]
    pub url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: defaults::source_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Polling loop and ledger retention settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Interval between fetch cycles in seconds
    #[serde(default = "defaults::poll_interval")]
    pub poll_interval_secs: u64,

    /// Upper bound for random jitter added to each interval, in seconds
    #[serde(default = "defaults::jitter")]
    pub jitter_secs: u64,

    /// Hours a ledger entry stays alive after its message was sent
    #[serde(default = "defaults::retention_hours")]
    pub retention_hours: u64,

    /// Optional path for a JSON mirror of the current available set
    #[serde(default)]
    pub mirror_path: Option<std::path::PathBuf>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: defaults::poll_interval(),
            jitter_secs: defaults::jitter(),
            retention_hours: defaults::retention_hours(),
            mirror_path: None,
        }
    }
}

/// Which SKUs to watch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// SKU prefixes to watch; `["*"]` watches everything
    #[serde(default = "defaults::models")]
    pub models: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            models: defaults::models(),
        }
    }
}

impl FilterConfig {
    /// Build the interest filter from the configured model list.
    pub fn interest_filter(&self) -> InterestFilter {
        if self.models.iter().any(|m| m == "*") {
            InterestFilter::All
        } else {
            InterestFilter::Prefixes(self.models.iter().map(|m| m.to_lowercase()).collect())
        }
    }
}

/// Interest filter applied to fetched listings before diffing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterestFilter {
    /// Watch every listing
    All,
    /// Watch listings whose SKU starts with any of these prefixes
    /// (case-insensitive, prefixes stored lowercased)
    Prefixes(Vec<String>),
}

impl InterestFilter {
    /// Whether a SKU matches the filter.
    pub fn matches(&self, sku: &str) -> bool {
        match self {
            InterestFilter::All => true,
            InterestFilter::Prefixes(prefixes) => {
                let sku = sku.to_lowercase();
                prefixes.iter().any(|p| sku.starts_with(p))
            }
        }
    }
}

/// Telegram delivery settings.
///
/// The bot token is read from the `TELEGRAM_TOKEN` environment variable,
/// never from the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Chat that receives stock alerts
    #[serde(default)]
    pub chat_id: String,

    /// Chat that receives operator messages (startup banner, cycle errors)
    #[serde(default)]
    pub admin_chat_id: String,

    /// Link directly to the vendor's product page instead of the source page
    #[serde(default)]
    pub use_direct_link: bool,
}

mod defaults {
    pub fn source_url() -> String {
        "https://rpilocator.com/".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; stockwatch/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn poll_interval() -> u64 {
        60
    }
    pub fn jitter() -> u64 {
        5
    }
    pub fn retention_hours() -> u64 {
        24
    }
    pub fn models() -> Vec<String> {
        vec!["*".into()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.source.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.watch.poll_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_model_entry() {
        let mut config = Config::default();
        config.filter.models = vec!["RPI4".into(), "".into()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_retention_is_24h() {
        assert_eq!(Config::default().watch.retention_hours, 24);
    }

    #[test]
    fn test_wildcard_filter_matches_everything() {
        let filter = FilterConfig::default().interest_filter();
        assert_eq!(filter, InterestFilter::All);
        assert!(filter.matches("RPI4-MODBP-4GB"));
        assert!(filter.matches("anything"));
    }

    #[test]
    fn test_prefix_filter_is_case_insensitive() {
        let config = FilterConfig {
            models: vec!["rpi4".into(), "CM4".into()],
        };
        let filter = config.interest_filter();
        assert!(filter.matches("RPI4-MODBP-4GB"));
        assert!(filter.matches("cm4101000"));
        assert!(!filter.matches("RPI3-MODBP"));
    }

    #[test]
    fn test_parse_toml_config() {
        let toml = r#"
            [source]
            url = "https://rpilocator.com/"

            [watch]
            poll_interval_secs = 120
            retention_hours = 24

            [filter]
            models = ["RPI4", "RPI5"]

            [telegram]
            chat_id = "-100123"
            admin_chat_id = "42"
            use_direct_link = true
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.watch.poll_interval_secs, 120);
        assert_eq!(config.filter.models.len(), 2);
        assert!(config.telegram.use_direct_link);
        // Unset fields fall back to defaults
        assert_eq!(config.source.timeout_secs, 30);
        assert!(config.validate().is_ok());
    }
}
