use anyhow::Result;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use fureon::{
    logging, Config, MemoryCatalog, MetadataCache, PlaybackDriver, StreamController,
};

/// How often expired cache entries are swept.
const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

fn main() -> Result<()> {
    let config = match std::env::args().skip_while(|arg| arg != "--config").nth(1) {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };

    if std::env::args().any(|arg| arg == "--check-config") {
        println!("{}", config.summary());
        return Ok(());
    }

    logging::init(&config.console_verbosity)?;

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .enable_all()
        .build()?
        .block_on(run(config))
}

async fn run(config: Config) -> Result<()> {
    info!("🎵 Starting fureon v{}", env!("CARGO_PKG_VERSION"));
    info!("{}", config.summary());

    let catalog = match &config.catalog_path {
        Some(path) => MemoryCatalog::load_json(path).await?,
        None => {
            warn!("No catalog configured, starting with an empty one");
            MemoryCatalog::default()
        }
    };
    let cache = Arc::new(MetadataCache::with_ttl(config.cache_size, config.cache_ttl()));
    let controller = Arc::new(StreamController::new(&config, Arc::new(catalog), cache.clone()));

    if controller.fill_random().await.is_none() {
        warn!("Could not prime the playlist, the driver will keep trying");
    }

    let token = CancellationToken::new();
    let driver = PlaybackDriver::new(Arc::clone(&controller), config.default_song_duration()).spawn(token.clone());

    let sweeper = {
        let token = token.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CACHE_SWEEP_INTERVAL);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => cache.cleanup_old_entries(),
                }
            }
            let stats = cache.stats();
            info!(
                "Cache: {} entries, {:.1}% hit rate, {} evictions",
                stats.entries,
                stats.hit_rate() * 100.0,
                stats.evictions
            );
        })
    };

    info!("🚀 Streaming to {}", if controller.stream_endpoint().is_empty() { "(no endpoint)" } else { controller.stream_endpoint() });

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Could not listen for Ctrl+C: {}", e);
    }
    info!("⚠️ Shutdown signal received, stopping...");

    token.cancel();
    driver.shutdown().await;
    if let Err(e) = sweeper.await {
        error!("Cache sweeper ended abnormally: {}", e);
    }

    Ok(())
}
