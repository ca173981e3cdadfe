//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Source;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Seconds between two poll cycles of the same source
    #[serde(default = "defaults::refresh_interval")]
    pub refresh_interval: u64,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Webhook delivery behavior
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Persisted state location
    #[serde(default)]
    pub storage: StorageConfig,

    /// Forum thread markup selectors
    #[serde(default)]
    pub thread: ThreadConfig,

    /// Monitored sources
    #[serde(default, alias = "sources")]
    pub feeds: Vec<Source>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        for source in &mut config.feeds {
            source.normalize();
        }
        Ok(config)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval == 0 {
            return Err(AppError::validation("refresh_interval must be > 0"));
        }
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.delivery.max_attempts == 0 {
            return Err(AppError::validation("delivery.max_attempts must be > 0"));
        }
        if self.delivery.max_description_length < 4 {
            return Err(AppError::validation(
                "delivery.max_description_length must be >= 4",
            ));
        }
        self.thread.validate()?;

        let mut names = HashSet::new();
        for source in &self.feeds {
            check_http_url(&source.name, "url", &source.url)?;
            check_http_url(&source.name, "webhook", &source.webhook)?;
            if !names.insert(source.key()) {
                return Err(AppError::validation(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
        }
        Ok(())
    }

    /// Poll interval as a duration.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval)
    }

    /// Location of the seen-store file.
    pub fn seen_path(&self) -> PathBuf {
        self.storage.data_dir.join(defaults::SEEN_FILE)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh_interval: defaults::refresh_interval(),
            http: HttpConfig::default(),
            delivery: DeliveryConfig::default(),
            storage: StorageConfig::default(),
            thread: ThreadConfig::default(),
            feeds: Vec::new(),
        }
    }
}

fn check_http_url(name: &str, field: &str, value: &str) -> Result<()> {
    let parsed = url::Url::parse(value)
        .map_err(|e| AppError::validation(format!("source '{name}': {field} '{value}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(AppError::validation(format!(
            "source '{name}': {field} has unsupported scheme '{scheme}'"
        ))),
    }
}

/// HTTP client settings shared by strategies and delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Webhook delivery behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Total attempts for transient failures
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// First backoff delay in milliseconds
    #[serde(default = "defaults::initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Backoff ceiling in milliseconds
    #[serde(default = "defaults::max_backoff")]
    pub max_backoff_ms: u64,

    /// Longest retry-after we are willing to wait, in seconds
    #[serde(default = "defaults::max_rate_limit_wait")]
    pub max_rate_limit_wait_secs: u64,

    /// Pause after each successful post in milliseconds
    #[serde(default = "defaults::send_delay")]
    pub send_delay_ms: u64,

    /// Embed description limit in characters
    #[serde(default = "defaults::max_description_length")]
    pub max_description_length: usize,

    /// Embed color when the source sets none
    #[serde(default = "defaults::default_color")]
    pub default_color: u32,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            initial_backoff_ms: defaults::initial_backoff(),
            max_backoff_ms: defaults::max_backoff(),
            max_rate_limit_wait_secs: defaults::max_rate_limit_wait(),
            send_delay_ms: defaults::send_delay(),
            max_description_length: defaults::max_description_length(),
            default_color: defaults::default_color(),
        }
    }
}

/// Persisted state settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the seen-store file
    #[serde(default = "defaults::data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir(),
        }
    }
}

/// CSS selectors locating posts in a forum thread page.
///
/// Defaults match XenForo 2 markup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadConfig {
    /// Post container
    #[serde(default = "defaults::post_selector")]
    pub post_selector: String,

    /// Attribute on the post container holding the author name
    #[serde(default = "defaults::author_attr")]
    pub author_attr: String,

    /// Author element, used when the attribute is absent
    #[serde(default = "defaults::author_selector")]
    pub author_selector: String,

    /// Time element carrying `datetime` or `data-time`
    #[serde(default = "defaults::time_selector")]
    pub time_selector: String,

    /// Post body
    #[serde(default = "defaults::body_selector")]
    pub body_selector: String,

    /// Anchor linking to the post itself
    #[serde(default = "defaults::permalink_selector")]
    pub permalink_selector: String,

    /// Author avatar image
    #[serde(default = "defaults::avatar_selector")]
    pub avatar_selector: String,

    /// Thread title
    #[serde(default = "defaults::title_selector")]
    pub title_selector: String,

    /// Page navigation links
    #[serde(default = "defaults::page_selector")]
    pub page_selector: String,

    /// Boilerplate removed from post bodies
    #[serde(default = "defaults::strip_phrases")]
    pub strip_phrases: Vec<String>,
}

impl ThreadConfig {
    fn validate(&self) -> Result<()> {
        for selector in [
            &self.post_selector,
            &self.author_selector,
            &self.time_selector,
            &self.body_selector,
            &self.permalink_selector,
            &self.avatar_selector,
            &self.title_selector,
            &self.page_selector,
        ] {
            Selector::parse(selector).map_err(|e| AppError::selector(selector, format!("{e:?}")))?;
        }
        Ok(())
    }
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self {
            post_selector: defaults::post_selector(),
            author_attr: defaults::author_attr(),
            author_selector: defaults::author_selector(),
            time_selector: defaults::time_selector(),
            body_selector: defaults::body_selector(),
            permalink_selector: defaults::permalink_selector(),
            avatar_selector: defaults::avatar_selector(),
            title_selector: defaults::title_selector(),
            page_selector: defaults::page_selector(),
            strip_phrases: defaults::strip_phrases(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    pub const SEEN_FILE: &str = "seen.json";

    pub fn refresh_interval() -> u64 {
        300
    }

    // HTTP defaults
    pub fn user_agent() -> String {
        concat!("feedhook/", env!("CARGO_PKG_VERSION")).into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Delivery defaults
    pub fn max_attempts() -> u32 {
        3
    }
    pub fn initial_backoff() -> u64 {
        1_000
    }
    pub fn max_backoff() -> u64 {
        30_000
    }
    pub fn max_rate_limit_wait() -> u64 {
        60
    }
    pub fn send_delay() -> u64 {
        1_000
    }
    pub fn max_description_length() -> usize {
        2_000
    }
    pub fn default_color() -> u32 {
        5_814_783
    }

    // Storage defaults
    pub fn data_dir() -> PathBuf {
        PathBuf::from("data")
    }

    // XenForo 2 selectors
    pub fn post_selector() -> String {
        "article.message--post".into()
    }
    pub fn author_attr() -> String {
        "data-author".into()
    }
    pub fn author_selector() -> String {
        ".message-name".into()
    }
    pub fn time_selector() -> String {
        "time.u-dt".into()
    }
    pub fn body_selector() -> String {
        ".message-body .bbWrapper".into()
    }
    pub fn permalink_selector() -> String {
        ".message-attribution-main a".into()
    }
    pub fn avatar_selector() -> String {
        ".message-avatar img".into()
    }
    pub fn title_selector() -> String {
        "h1.p-title-value".into()
    }
    pub fn page_selector() -> String {
        ".pageNav-main .pageNav-page a".into()
    }
    pub fn strip_phrases() -> Vec<String> {
        vec!["Click to expand...".into(), "Кликни за повеќе...".into()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
refresh_interval = 120

[delivery]
send_delay_ms = 0

[[feeds]]
name = "Rust Blog"
url = "https://blog.rust-lang.org/feed.xml"
webhook = "https://discord.com/api/webhooks/1/abc"
embed_color = 14427686

[[feeds]]
url = "https://forum.example/threads/topic.42/"
webhook = "https://discord.com/api/webhooks/2/def"
strategy = "thread"
webhook_name = "Forum Bot"
"#;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn parse_sample_config() {
        let config = Config::from_toml(SAMPLE).unwrap();
        assert_eq!(config.refresh_interval, 120);
        assert_eq!(config.delivery.send_delay_ms, 0);
        assert_eq!(config.delivery.max_attempts, 3);
        assert_eq!(config.feeds.len(), 2);
        assert_eq!(config.feeds[0].embed_color, Some(14427686));
        assert_eq!(config.feeds[1].name, "https://forum.example/threads/topic.42/");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.refresh_interval = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicate_names() {
        let mut config = Config::from_toml(SAMPLE).unwrap();
        config.feeds[1].name = "Rust Blog".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_non_http_webhook() {
        let mut config = Config::from_toml(SAMPLE).unwrap();
        config.feeds[0].webhook = "ftp://example.com/hook".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_selector() {
        let mut config = Config::default();
        config.thread.post_selector = "[[invalid".into();
        assert!(matches!(config.validate(), Err(AppError::Selector { .. })));
    }

    #[test]
    fn seen_path_is_under_data_dir() {
        let mut config = Config::default();
        config.storage.data_dir = PathBuf::from("/var/lib/feedhook");
        assert_eq!(config.seen_path(), PathBuf::from("/var/lib/feedhook/seen.json"));
    }
}
