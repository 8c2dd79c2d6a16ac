// Route definitions for the judge API

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::{handlers, AppState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/submissions",
            post(handlers::submit).get(handlers::list_all_submissions),
        )
        .route("/api/submissions/run-sample", post(handlers::run_sample))
        .route("/api/submissions/run-custom", post(handlers::run_custom))
        .route(
            "/api/submissions/user/:user_id",
            get(handlers::list_user_submissions),
        )
        .route("/api/drafts", post(handlers::save_draft))
        .route("/api/drafts/:problem_id", get(handlers::load_draft))
        .route("/api/drafts/:problem_id/resolve", get(handlers::resolve_draft))
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
}
