use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding `enrichment.auto_fetch_full_content`
pub const AUTO_FETCH_ENV: &str = "FEEDMILL_AUTO_FETCH";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub pull: PullConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Data directory path
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log format: "text" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullConfig {
    /// Seconds between pull cycles (0 = scheduler loop disabled)
    #[serde(default = "default_pull_interval")]
    pub interval_secs: u64,
    /// Feeds pulled concurrently within one cycle
    #[serde(default = "default_pull_concurrency")]
    pub concurrency: usize,
    /// Upper bound on reading one feed; running over counts as a failed read
    #[serde(default = "default_feed_timeout")]
    pub feed_timeout_secs: u64,
    /// Timeout for the feed HTTP request itself
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Longest a failing feed is left alone before it is retried
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
    /// HTTP proxy for feed requests (e.g., "http://127.0.0.1:7890" or "socks5://127.0.0.1:1080")
    #[serde(default)]
    pub proxy_url: Option<String>,
}

impl Default for PullConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_pull_interval(),
            concurrency: default_pull_concurrency(),
            feed_timeout_secs: default_feed_timeout(),
            request_timeout_secs: default_request_timeout(),
            max_backoff_secs: default_max_backoff(),
            proxy_url: None,
        }
    }
}

impl PullConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn feed_timeout(&self) -> Duration {
        Duration::from_secs(self.feed_timeout_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// System-wide default for fetching full article content of new items.
    /// Groups and feeds may override it.
    #[serde(default)]
    pub auto_fetch_full_content: bool,
    /// Concurrent content fetches per inserted batch
    #[serde(default = "default_enrichment_concurrency")]
    pub concurrency: usize,
    /// Concurrent content fetches across all feeds (0 = unlimited)
    #[serde(default)]
    pub global_max_concurrency: usize,
    /// Timeout for a single article page fetch
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    /// How long shutdown waits for outstanding enrichment tasks
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            auto_fetch_full_content: false,
            concurrency: default_enrichment_concurrency(),
            global_max_concurrency: 0,
            fetch_timeout_secs: default_fetch_timeout(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

impl EnrichmentConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("feedmill")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_pull_interval() -> u64 {
    1800 // 30 minutes
}

fn default_pull_concurrency() -> usize {
    10
}

fn default_feed_timeout() -> u64 {
    60
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_backoff() -> u64 {
    7 * 24 * 60 * 60
}

fn default_enrichment_concurrency() -> usize {
    3
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_shutdown_grace() -> u64 {
    10
}

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
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

fn parse_bool_env(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl AppConfig {
    /// Load configuration from the default location or return defaults
    pub fn load() -> crate::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from an explicit path; a missing file yields defaults.
    ///
    /// Environment overrides are not applied here; call
    /// [`AppConfig::apply_env_overrides`] once logging is up.
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Apply `FEEDMILL_AUTO_FETCH`; an unparseable value is logged and ignored
    pub fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var(AUTO_FETCH_ENV) {
            if !self.override_auto_fetch(&value) {
                tracing::warn!(
                    "Ignoring {}={:?}: expected true or false",
                    AUTO_FETCH_ENV,
                    value
                );
            }
        }
    }

    fn override_auto_fetch(&mut self, value: &str) -> bool {
        match parse_bool_env(value) {
            Some(enabled) => {
                self.enrichment.auto_fetch_full_content = enabled;
                true
            }
            None => false,
        }
    }

    /// Get the configuration file path
    /// Always uses ~/.config/feedmill/config.toml on all platforms
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("feedmill")
            .join("config.toml")
    }

    /// Get the database file path
    pub fn database_path(&self) -> PathBuf {
        self.data_dir().join("feedmill.db")
    }

    /// Get the data directory (with tilde expansion)
    pub fn data_dir(&self) -> PathBuf {
        expand_tilde(&self.general.data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.pull.interval_secs, 1800);
        assert_eq!(config.pull.concurrency, 10);
        assert_eq!(config.enrichment.concurrency, 3);
        assert_eq!(config.enrichment.fetch_timeout(), Duration::from_secs(30));
        assert!(!config.enrichment.auto_fetch_full_content);
        assert_eq!(config.enrichment.global_max_concurrency, 0);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [pull]
            interval_secs = 600

            [enrichment]
            auto_fetch_full_content = true
            "#,
        )
        .unwrap();

        assert_eq!(config.pull.interval_secs, 600);
        assert_eq!(config.pull.concurrency, 10);
        assert!(config.enrichment.auto_fetch_full_content);
        assert_eq!(config.enrichment.concurrency, 3);
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = AppConfig::from_toml("[pull]\ninterval_secs = \"soon\"").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_parse_bool_env() {
        assert_eq!(parse_bool_env("TRUE"), Some(true));
        assert_eq!(parse_bool_env(" off "), Some(false));
        assert_eq!(parse_bool_env("maybe"), None);
    }

    #[test]
    fn test_auto_fetch_override() {
        let mut config = AppConfig::default();
        assert!(config.override_auto_fetch("on"));
        assert!(config.enrichment.auto_fetch_full_content);

        assert!(!config.override_auto_fetch("sometimes"));
        assert!(config.enrichment.auto_fetch_full_content);
    }

    #[test]
    fn test_load_from_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.pull.interval_secs, 1800);
    }

    #[test]
    fn test_expand_tilde() {
        let plain = Path::new("/var/lib/feedmill");
        assert_eq!(expand_tilde(plain), PathBuf::from("/var/lib/feedmill"));

        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde(Path::new("~/data")), home.join("data"));
        }
    }
}
