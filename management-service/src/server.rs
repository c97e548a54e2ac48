use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;

use experiments_common::propagation::ConfigPublisher;

use crate::config::Config;
use crate::router;
use crate::services::ManagementService;
use crate::validation::S2Levels;

/// Serves the management API. Committed changes go to `publisher`; treatment
/// servers in other processes pull snapshots instead.
pub async fn serve<F>(
    config: Config,
    publisher: Arc<dyn ConfigPublisher>,
    listener: TcpListener,
    shutdown: F,
) where
    F: Future<Output = ()> + Send + 'static,
{
    if config.s2_min_level > config.s2_max_level {
        tracing::error!(
            "Invalid S2 levels: min {} is above max {}",
            config.s2_min_level,
            config.s2_max_level
        );
        return;
    }
    let levels = S2Levels {
        min: config.s2_min_level,
        max: config.s2_max_level,
    };
    let service = Arc::new(ManagementService::new(publisher, levels));
    let app = router::router(service, config.enable_metrics);

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
