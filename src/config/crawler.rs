//! Crawler, cache, and pool-monitor configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::DEFAULT_USER_AGENT;

/// Crawl engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Origin URL the crawl starts from; links outside this prefix are not
    /// followed. Required.
    #[serde(default)]
    pub base_url: String,
    /// Minimum worker pool size
    #[serde(default = "default_min_workers")]
    pub min_workers: usize,
    /// Maximum worker pool size
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Fetch attempts per URL before giving up on transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay between retry attempts (seconds)
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    /// Connect timeout per fetch attempt (seconds)
    #[serde(default = "default_fetch_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Read timeout per fetch attempt (seconds)
    #[serde(default = "default_fetch_timeout_secs")]
    pub read_timeout_secs: u64,
    /// Grace period to wait for worker loops on shutdown (seconds)
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_min_workers() -> usize {
    (num_cpus::get() / 2).max(1)
}

fn default_max_workers() -> usize {
    num_cpus::get().max(1)
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    30
}

fn default_fetch_timeout_secs() -> u64 {
    5
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            min_workers: default_min_workers(),
            max_workers: default_max_workers(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            connect_timeout_secs: default_fetch_timeout_secs(),
            read_timeout_secs: default_fetch_timeout_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl CrawlerConfig {
    /// The origin exactly as configured, used to seed each frontier.
    pub fn origin(&self) -> &str {
        &self.base_url
    }

    /// The origin with any trailing slash trimmed, used for the same-origin
    /// prefix filter so `http://x.test` and `http://x.test/` behave alike.
    pub fn origin_prefix(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Page cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entry time-to-live since last access (seconds)
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    /// How often expired entries are swept out (seconds)
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Maximum number of cached pages; inserts beyond this are dropped
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_cache_ttl_secs() -> u64 {
    300 // 5 minutes
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_max_entries() -> usize {
    2000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            max_entries: default_max_entries(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Pool monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Sampling period (seconds)
    #[serde(default = "default_monitor_interval_secs")]
    pub interval_secs: u64,
    /// CPU usage (percent) below which the pool may grow
    #[serde(default = "default_grow_cpu_threshold")]
    pub grow_cpu_threshold: f32,
    /// CPU usage (percent) above which the pool is shrunk
    #[serde(default = "default_shrink_cpu_limit")]
    pub shrink_cpu_limit: f32,
    /// Queued searches above which the pool may grow
    #[serde(default = "default_grow_queue_threshold")]
    pub grow_queue_threshold: usize,
    /// Queued searches below which the pool is shrunk
    #[serde(default = "default_shrink_queue_threshold")]
    pub shrink_queue_threshold: usize,
}

fn default_monitor_interval_secs() -> u64 {
    30
}

fn default_grow_cpu_threshold() -> f32 {
    70.0
}

fn default_shrink_cpu_limit() -> f32 {
    90.0
}

fn default_grow_queue_threshold() -> usize {
    30
}

fn default_shrink_queue_threshold() -> usize {
    10
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_monitor_interval_secs(),
            grow_cpu_threshold: default_grow_cpu_threshold(),
            shrink_cpu_limit: default_shrink_cpu_limit(),
            grow_queue_threshold: default_grow_queue_threshold(),
            shrink_queue_threshold: default_shrink_queue_threshold(),
        }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_prefix_trims_trailing_slash() {
        let config = CrawlerConfig {
            base_url: "http://x.test/".to_string(),
            ..CrawlerConfig::default()
        };
        assert_eq!(config.origin(), "http://x.test/");
        assert_eq!(config.origin_prefix(), "http://x.test");
    }

    #[test]
    fn test_origin_prefix_unchanged_without_slash() {
        let config = CrawlerConfig {
            base_url: "http://x.test".to_string(),
            ..CrawlerConfig::default()
        };
        assert_eq!(config.origin_prefix(), "http://x.test");
    }

    #[test]
    fn test_default_worker_bounds_are_sane() {
        let config = CrawlerConfig::default();
        assert!(config.min_workers >= 1);
        assert!(config.max_workers >= config.min_workers);
    }
}
