use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::broadcast;
use tracing::{error, info};

use sitehound::api::{self, AppState};
use sitehound::config::Config;
use sitehound::crawler::{
    CrawlScheduler, Fetcher, PageCache, PoolMonitor, SubstringMatcher, WorkerPool,
};
use sitehound::store::{MemorySearchStore, SearchStore};

#[derive(Parser, Debug)]
#[command(name = "sitehound", about = "Keyword web crawler with an HTTP API")]
struct Args {
    /// Path to a TOML configuration file; environment variables BASE_URL
    /// and THREAD_COUNT override it
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env()?,
    };
    config.logging.init();

    info!(
        base_url = %config.crawler.base_url,
        min_workers = config.crawler.min_workers,
        max_workers = config.crawler.max_workers,
        "starting sitehound"
    );

    let (shutdown_tx, _) = broadcast::channel(16);

    let store: Arc<dyn SearchStore> = Arc::new(MemorySearchStore::new());
    let cache = Arc::new(PageCache::new(&config.cache));
    let fetcher = Fetcher::new(&config.crawler)?;
    let pool = WorkerPool::new(config.crawler.min_workers, config.crawler.max_workers);

    let scheduler = CrawlScheduler::new(
        config.crawler.clone(),
        Arc::clone(&store),
        Arc::clone(&cache),
        fetcher,
        Arc::new(SubstringMatcher),
        pool,
        shutdown_tx.clone(),
    );

    let sweeper = cache.spawn_sweeper(shutdown_tx.subscribe());
    let monitor = PoolMonitor::new(config.monitor.clone(), Arc::clone(&scheduler))
        .spawn(shutdown_tx.subscribe());

    let server = if config.http.enabled {
        let state = AppState {
            scheduler: Arc::clone(&scheduler),
            store: Arc::clone(&store),
        };
        let http_config = config.http.clone();
        let rx = shutdown_tx.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = api::serve(&http_config, state, rx).await {
                error!("http api failed: {e:#}");
            }
        }))
    } else {
        None
    };

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    let _ = shutdown_tx.send(());
    scheduler.shutdown().await;

    if let Some(server) = server {
        let _ = server.await;
    }
    let _ = monitor.await;
    let _ = sweeper.await;

    info!("sitehound stopped");
    Ok(())
}
