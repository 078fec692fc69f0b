use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::request_id::{make_span_with_request_id, request_id_middleware};
use super::AppState;

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api_routes())
        .layer(
            ServiceBuilder::new()
                // Outermost, so the trace span already sees the id
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id)),
        )
        .with_state(state)
}

/// API routes under /api/v1
fn api_routes() -> Router<AppState> {
    Router::new()
        // Recommendation runs
        .route("/recommendations", post(handlers::create_recommendations))
        .route(
            "/recommendations/:run_id/pages/:page",
            get(handlers::get_page),
        )
        // Playlists
        .route(
            "/recommendations/:run_id/playlist",
            post(handlers::create_playlist),
        )
}
