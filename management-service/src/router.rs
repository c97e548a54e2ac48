use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;

use experiments_common::metrics::{setup_metrics_routes, track_metrics};

use crate::handlers;
use crate::services::ManagementService;

pub fn router(service: Arc<ManagementService>, metrics: bool) -> Router {
    let router = handlers::add_routes(Router::new())
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(track_metrics))
        .with_state(service);

    // Global metrics recorders do not play well with tests, only install on request.
    if metrics {
        match setup_metrics_routes(router.clone()) {
            Ok(with_metrics) => with_metrics,
            Err(e) => {
                tracing::error!("failed to install metrics recorder: {}", e);
                router
            }
        }
    } else {
        router
    }
}
