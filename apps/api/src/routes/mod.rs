pub mod health;

use axum::{routing::get, Router};

use crate::jobs::handlers as jobs;
use crate::models::version::DocumentKind;
use crate::state::AppState;
use crate::versions::handlers::kind_routes;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Job tracker
        .route(
            "/api/v1/jobs",
            get(jobs::handle_list_jobs).post(jobs::handle_create_job),
        )
        .route(
            "/api/v1/jobs/:id",
            get(jobs::handle_get_job)
                .patch(jobs::handle_update_job)
                .delete(jobs::handle_delete_job),
        )
        // Document version families, one per kind
        .merge(kind_routes("/api/v1/resume-versions", DocumentKind::Resume))
        .merge(kind_routes(
            "/api/v1/cover-letter-versions",
            DocumentKind::CoverLetter,
        ))
        .with_state(state)
}
