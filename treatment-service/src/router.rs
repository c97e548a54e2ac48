use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use chrono_tz::Tz;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;

use experiments_common::metrics::{setup_metrics_routes, track_metrics};

use crate::cache::ConfigCache;
use crate::request_handler;
use crate::segmenters::Segmenters;
use crate::time::TimeSource;

#[derive(Clone)]
pub struct State {
    pub cache: Arc<ConfigCache>,
    pub segmenters: Arc<Segmenters>,
    pub default_timezone: Tz,
    pub timesource: Arc<dyn TimeSource + Send + Sync>,
}

async fn index() -> &'static str {
    "treatment-service"
}

async fn liveness() -> &'static str {
    "ok"
}

pub fn router<T: TimeSource + Send + Sync + 'static>(
    timesource: T,
    cache: Arc<ConfigCache>,
    segmenters: Segmenters,
    default_timezone: Tz,
    max_concurrency: usize,
    metrics: bool,
) -> Router {
    let state = State {
        cache,
        segmenters: Arc::new(segmenters),
        default_timezone,
        timesource: Arc::new(timesource),
    };

    let status_router = Router::new()
        .route("/", get(index))
        .route("/_liveness", get(liveness))
        .route("/_readiness", get(liveness));

    let treatment_router = Router::new()
        .route(
            "/v1/projects/:project_id/fetch-treatment",
            post(request_handler::fetch_treatment),
        )
        .layer(ConcurrencyLimitLayer::new(max_concurrency));

    let router = Router::new()
        .merge(status_router)
        .merge(treatment_router)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(track_metrics))
        .with_state(state);

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
