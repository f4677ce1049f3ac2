//! Configuration for sitehound

mod crawler;
mod http;
mod logging;

pub use crawler::{CacheConfig, CrawlerConfig, MonitorConfig};
pub use http::HttpConfig;
pub use logging::{LogFormat, LogLevel, LoggingConfig};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default user agent for all outbound HTTP requests
pub const DEFAULT_USER_AGENT: &str = "sitehound/0.3 (+https://github.com/sitehound)";

/// Main configuration for a sitehound instance
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Crawler configuration
    #[serde(default)]
    pub crawler: CrawlerConfig,
    /// Page cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Pool monitor configuration
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// HTTP API server configuration
    #[serde(default)]
    pub http: HttpConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file, apply environment overrides,
    /// and validate the result.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let mut config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration from defaults plus environment overrides,
    /// for running without a config file.
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Environment variables take precedence over the config file, matching
    /// how the service is deployed in containers.
    ///
    /// - `BASE_URL`: crawl origin
    /// - `THREAD_COUNT`: maximum worker pool size
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(base_url) = std::env::var("BASE_URL") {
            self.crawler.base_url = base_url;
        }
        if let Ok(threads) = std::env::var("THREAD_COUNT") {
            let max: usize = threads
                .parse()
                .map_err(|_| anyhow::anyhow!("THREAD_COUNT must be a positive integer, got '{}'", threads))?;
            self.crawler.max_workers = max;
            self.crawler.min_workers = (max / 2).max(1);
        }
        Ok(())
    }

    /// Validate all configuration fields.
    ///
    /// Collects all validation errors and reports them together so the user
    /// can fix everything in one pass rather than playing whack-a-mole.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        // Crawler validation
        if self.crawler.base_url.is_empty() {
            errors.push("crawler base_url is required (set it in the config file or via BASE_URL)".to_string());
        } else {
            match url::Url::parse(&self.crawler.base_url) {
                Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {}
                Ok(parsed) => errors.push(format!(
                    "base_url must use http or https, got scheme '{}'",
                    parsed.scheme()
                )),
                Err(e) => errors.push(format!("base_url is not a valid URL: {}", e)),
            }
        }
        if self.crawler.min_workers == 0 {
            errors.push("min_workers must be positive".to_string());
        }
        if self.crawler.max_workers < self.crawler.min_workers {
            errors.push(format!(
                "max_workers ({}) must be >= min_workers ({})",
                self.crawler.max_workers, self.crawler.min_workers
            ));
        }
        if self.crawler.max_retries == 0 {
            errors.push("max_retries must be positive".to_string());
        }

        // Cache validation
        if self.cache.max_entries == 0 {
            errors.push("cache max_entries must be positive".to_string());
        }
        if self.cache.ttl_secs == 0 {
            errors.push("cache ttl_secs must be positive".to_string());
        }
        if self.cache.sweep_interval_secs == 0 {
            errors.push("cache sweep_interval_secs must be positive".to_string());
        }

        // Monitor validation
        if self.monitor.interval_secs == 0 {
            errors.push("monitor interval_secs must be positive".to_string());
        }
        if self.monitor.grow_cpu_threshold >= self.monitor.shrink_cpu_limit {
            errors.push(format!(
                "monitor grow_cpu_threshold ({}) must be below shrink_cpu_limit ({})",
                self.monitor.grow_cpu_threshold, self.monitor.shrink_cpu_limit
            ));
        }

        // HTTP validation
        if self.http.enabled && self.http.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "http listen_addr '{}' is not a valid socket address",
                self.http.listen_addr
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("Invalid configuration:\n  - {}", errors.join("\n  - "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.crawler.base_url = "http://example.com".to_string();
        config
    }

    #[test]
    fn test_default_config_missing_base_url() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let mut config = valid_config();
        config.crawler.base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_worker_bounds() {
        let mut config = valid_config();
        config.crawler.min_workers = 8;
        config.crawler.max_workers = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_listen_addr() {
        let mut config = valid_config();
        config.http.listen_addr = "not-an-addr".to_string();
        assert!(config.validate().is_err());
    }
}
