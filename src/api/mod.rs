//! API module for handling HTTP requests and responses

#[cfg(feature = "api")]
pub(crate) mod handlers;
#[cfg(feature = "api")]
pub(crate) mod responses;

#[cfg(feature = "api")]
use axum::{
    routing::{get, post},
    Router,
};
#[cfg(feature = "api")]
use std::sync::Arc;
#[cfg(feature = "api")]
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
#[cfg(feature = "api")]
use crate::state::AppState;

#[cfg(feature = "api")]
pub(crate) use handlers::*;

#[cfg(feature = "api")]
/// Create the application router with all routes
pub fn create_router() -> Router<Arc<AppState>> {
    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Public health check
        .route("/api/health", get(health_check))
        // Image upload + similarity search
        .route("/api/search", post(search_image))
        // Thread management
        .route("/api/threads", get(list_threads).post(create_thread))
        // Chat with the assistant on one thread
        .route(
            "/api/threads/:thread_id/messages",
            get(get_history).post(send_message),
        )
        // Submitted orders
        .route("/api/orders", get(list_orders))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(feature = "api")]
/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}
