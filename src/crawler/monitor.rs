//! Adaptive worker pool sizing
//!
//! Samples system CPU load and crawl backlog on a fixed interval and nudges
//! the shared worker pool between its configured bounds: grow when the
//! machine has headroom and URLs are piling up, shrink when the CPU is
//! saturated or the backlog has drained.

use std::sync::Arc;

use sysinfo::System;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::MonitorConfig;

use super::scheduler::CrawlScheduler;

pub struct PoolMonitor {
    config: MonitorConfig,
    scheduler: Arc<CrawlScheduler>,
}

impl PoolMonitor {
    pub fn new(config: MonitorConfig, scheduler: Arc<CrawlScheduler>) -> Self {
        Self { config, scheduler }
    }

    /// Spawn the sampling loop. Runs until the shutdown signal fires.
    pub fn spawn(self, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            // CPU usage is a delta between refreshes; take a baseline
            // sample so the first real reading is meaningful.
            let mut system = System::new();
            system.refresh_cpu();

            let mut ticker = tokio::time::interval(self.config.interval());
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;

            info!(interval_secs = self.config.interval_secs, "pool monitor started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        system.refresh_cpu();
                        let cpu = system.global_cpu_info().cpu_usage();
                        self.adjust(cpu);
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("pool monitor stopping");
                        break;
                    }
                }
            }
        })
    }

    fn adjust(&self, cpu: f32) {
        let stats = self.scheduler.stats();
        let pool = self.scheduler.pool();
        let current = pool.size();
        let target = self.target_size(cpu, stats.queued_urls, current, pool.min_size(), pool.max_size());

        debug!(
            cpu = format!("{cpu:.1}"),
            queued = stats.queued_urls,
            busy = stats.busy_workers,
            pool = current,
            target,
            "pool monitor sample"
        );

        if target != current {
            info!(cpu = format!("{cpu:.1}"), queued = stats.queued_urls, current, target, "resizing worker pool");
            pool.request_resize(target);
        }
    }

    /// Sizing policy: grow by two when the CPU has headroom and the URL
    /// backlog is deep; shrink by one when the CPU is saturated or the
    /// backlog has drained. Always stays within the pool's bounds.
    fn target_size(&self, cpu: f32, queued: usize, current: usize, min: usize, max: usize) -> usize {
        if cpu < self.config.grow_cpu_threshold && queued > self.config.grow_queue_threshold {
            (current + 2).min(max)
        } else if cpu > self.config.shrink_cpu_limit || queued < self.config.shrink_queue_threshold {
            current.saturating_sub(1).max(min)
        } else {
            current
        }
    }
}
