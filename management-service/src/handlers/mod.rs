use std::sync::Arc;

use axum::routing::{get, put};
use axum::Router;

use crate::services::ManagementService;

mod experiments;
mod projects;
mod segmenters;
mod segments;
mod treatments;

pub type AppState = Arc<ManagementService>;

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/v1/projects", get(projects::list))
        .route(
            "/v1/projects/:project_id/settings",
            get(projects::get_settings)
                .post(projects::create_settings)
                .put(projects::update_settings),
        )
        .route(
            "/v1/projects/:project_id/settings/history",
            get(projects::settings_history),
        )
        .route(
            "/v1/projects/:project_id/experiment-variables",
            get(projects::experiment_variables),
        )
        .route(
            "/v1/projects/:project_id/segmenters",
            get(segmenters::list).post(segmenters::create),
        )
        .route(
            "/v1/projects/:project_id/segmenters/:name",
            get(segmenters::get)
                .put(segmenters::update)
                .delete(segmenters::delete),
        )
        .route(
            "/v1/projects/:project_id/segments",
            get(segments::list).post(segments::create),
        )
        .route(
            "/v1/projects/:project_id/segments/:id",
            get(segments::get).put(segments::update).delete(segments::delete),
        )
        .route(
            "/v1/projects/:project_id/segments/:id/history",
            get(segments::history),
        )
        .route(
            "/v1/projects/:project_id/segments/:id/history/:version",
            get(segments::version),
        )
        .route(
            "/v1/projects/:project_id/treatments",
            get(treatments::list).post(treatments::create),
        )
        .route(
            "/v1/projects/:project_id/treatments/:id",
            get(treatments::get)
                .put(treatments::update)
                .delete(treatments::delete),
        )
        .route(
            "/v1/projects/:project_id/treatments/:id/history",
            get(treatments::history),
        )
        .route(
            "/v1/projects/:project_id/treatments/:id/history/:version",
            get(treatments::version),
        )
        .route(
            "/v1/projects/:project_id/experiments",
            get(experiments::list).post(experiments::create),
        )
        .route(
            "/v1/projects/:project_id/experiments/:id",
            get(experiments::get).put(experiments::update),
        )
        .route(
            "/v1/projects/:project_id/experiments/:id/enable",
            put(experiments::enable),
        )
        .route(
            "/v1/projects/:project_id/experiments/:id/disable",
            put(experiments::disable),
        )
        .route(
            "/v1/projects/:project_id/experiments/:id/history",
            get(experiments::history),
        )
        .route(
            "/v1/projects/:project_id/experiments/:id/history/:version",
            get(experiments::version),
        )
        .route(
            "/v1/internal/projects/:project_id/snapshot",
            get(projects::snapshot),
        )
        .route("/_liveness", get(|| async { "ok" }))
        .route("/_readiness", get(|| async { "ok" }))
        .route("/", get(|| async { "management-service" }))
}
