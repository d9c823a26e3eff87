//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the board, template, and catalog endpoints under a
//! single Axum router with permissive CORS and request tracing.

pub mod boards;
pub mod search;
pub mod templates;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// All API routes.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/boards", post(boards::create_board))
        .route("/api/boards/{id}", get(boards::get_board))
        .route("/api/boards/{id}/actions", post(boards::dispatch_action))
        .route("/api/boards/{id}/drag/start", post(boards::drag_start))
        .route("/api/boards/{id}/drag/end", post(boards::drag_end))
        .route("/api/boards/{id}/drag/cancel", post(boards::drag_cancel))
        .route("/api/boards/{id}/hover", post(boards::hover))
        .route("/api/boards/{id}/confirm", post(boards::confirm))
        .route("/api/boards/{id}/search", get(boards::search))
        .route(
            "/api/boards/{id}/templates/{template_id}/import",
            post(boards::import_template),
        )
        .route("/api/templates", get(templates::list_templates).post(templates::publish_template))
        .route("/api/catalog/search", get(search::catalog_search))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
