pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::analysis::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/culture-fit/health",
            get(health::culture_fit_health_handler),
        )
        .route("/api/culture-fit/analyze", post(handlers::handle_analyze))
        .route("/api/culture-fit/company", post(handlers::handle_company))
        .route(
            "/api/culture-fit/applicant",
            post(handlers::handle_applicant),
        )
        .route("/api/culture-fit/compare", post(handlers::handle_compare))
        .with_state(state)
}
