use std::future::Future;
use std::sync::Arc;

use chrono_tz::Tz;
use tokio::net::TcpListener;

use crate::cache::ConfigCache;
use crate::config::Config;
use crate::consumer::{poll_snapshots, HttpSnapshotFetcher, SnapshotFetcher};
use crate::router;
use crate::segmenters::Segmenters;
use crate::time::{SystemTime, TimeSource};

pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let cache = Arc::new(ConfigCache::new());

    if config.polling_enabled() {
        let fetcher: Arc<dyn SnapshotFetcher> =
            match HttpSnapshotFetcher::new(&config.management_url, config.request_timeout.0) {
                Ok(fetcher) => Arc::new(fetcher),
                Err(e) => {
                    tracing::error!("Failed to create snapshot fetcher: {}", e);
                    return;
                }
            };
        tokio::spawn(poll_snapshots(
            cache.clone(),
            fetcher,
            config.project_ids.0.clone(),
            config.poll_interval.0,
        ));
    }

    serve_with_cache(config, cache, SystemTime {}, listener, shutdown).await
}

/// Serves treatments from a cache fed by the caller.
pub async fn serve_with_cache<T, F>(
    config: Config,
    cache: Arc<ConfigCache>,
    timesource: T,
    listener: TcpListener,
    shutdown: F,
) where
    T: TimeSource + Send + Sync + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let segmenters = match Segmenters::new(config.s2_min_level, config.s2_max_level) {
        Ok(segmenters) => segmenters,
        Err(e) => {
            tracing::error!("Invalid segmenter configuration: {}", e);
            return;
        }
    };

    let default_timezone = match config.default_timezone.parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            tracing::error!("Invalid default timezone: {}", config.default_timezone);
            return;
        }
    };

    let app = router::router(
        timesource,
        cache,
        segmenters,
        default_timezone,
        config.max_concurrency,
        config.enable_metrics,
    );

    match listener.local_addr() {
        Ok(addr) => tracing::info!("listening on {:?}", addr),
        Err(e) => tracing::warn!("could not read local address: {}", e),
    }
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        tracing::error!("server error: {}", e);
    }
}
