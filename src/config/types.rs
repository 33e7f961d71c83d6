use crate::robots::{DEFAULT_CAPACITY, DEFAULT_EVICTION_FRACTION};
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for robots-warden
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(rename = "crawl-delay", default)]
    pub crawl_delay: CrawlDelayConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// Robots cache sizing
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of hosts whose rulesets are kept
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Share of the capacity removed by one eviction pass
    #[serde(rename = "eviction-fraction", default = "default_eviction_fraction")]
    pub eviction_fraction: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            eviction_fraction: default_eviction_fraction(),
        }
    }
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_eviction_fraction() -> f64 {
    DEFAULT_EVICTION_FRACTION
}

/// Crawl-delay adjustments applied on top of robots.txt (seconds)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrawlDelayConfig {
    /// Delay used when a host's robots.txt declares none
    #[serde(default)]
    pub default: Option<u64>,

    /// Delay used instead of whatever robots.txt declares
    #[serde(rename = "override", default)]
    pub override_delay: Option<u64>,
}

impl CrawlDelayConfig {
    /// Effective delay for a host given what its robots.txt declares
    ///
    /// Only meaningful for hosts that have a ruleset; hosts without one are
    /// never throttled.
    pub fn effective(&self, declared: Option<Duration>) -> Option<Duration> {
        if let Some(seconds) = self.override_delay {
            return Some(Duration::from_secs(seconds));
        }
        declared.or(self.default.map(Duration::from_secs))
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler, also the robots.txt product token
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    ///
    /// Format: `CrawlerName/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Underlying HTTP transport timeouts
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Whole-request timeout in seconds
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connection timeout in seconds
    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}
