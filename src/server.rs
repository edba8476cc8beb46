use axum::{
    http::StatusCode,
    middleware as axum_mw,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::handlers;
use crate::middleware::request_tracker;
use crate::AppState;

/// Builds the full Axum `Router` with all routes and middleware.
pub fn create_router(state: Arc<AppState>) -> Router {
    let counters = state.counters.clone();

    Router::new()
        // ── Auth ────────────────────────────────────────────────
        .route(
            "/api/auth",
            post(handlers::auth::register)
                .put(handlers::auth::login)
                .delete(handlers::auth::logout),
        )
        // ── Menu & orders ───────────────────────────────────────
        .route(
            "/api/order/menu",
            get(handlers::order::get_menu).put(handlers::order::add_menu_item),
        )
        .route(
            "/api/order",
            get(handlers::order::get_orders).post(handlers::order::create_order),
        )
        // ── Franchises ──────────────────────────────────────────
        .route(
            "/api/franchise",
            get(handlers::franchise::list_franchises).post(handlers::franchise::create_franchise),
        )
        .route(
            "/api/franchise/:id",
            get(handlers::franchise::user_franchises).delete(handlers::franchise::delete_franchise),
        )
        .route(
            "/api/franchise/:id/store",
            post(handlers::franchise::create_store),
        )
        .route(
            "/api/franchise/:id/store/:store_id",
            delete(handlers::franchise::delete_store),
        )
        // ── Metrics ─────────────────────────────────────────────
        .route("/api/metrics", get(handlers::metrics::get_metrics))
        .fallback(not_found)
        // ── Provide shared state to all routes above ────────────
        .with_state(state)
        // ── Global middleware (applied bottom-up) ───────────────
        .layer(axum_mw::from_fn_with_state(
            counters,
            request_tracker::track_requests,
        ))
        .layer(CorsLayer::permissive())
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "unknown endpoint", "status": 404 })),
    )
}
