//! API Routes
//!
//! Configures the Axum router with all hoard server endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_records_handler, delete_record_handler, excludes_handler, get_record_handler,
    get_records_handler, health_handler, latest_handler, lookup_records_handler, put_record_handler,
    put_records_handler, stats_handler, version_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Health check endpoint
/// - `PUT /hoards/:namespace/records` - Store a batch of keyed values
/// - `GET /hoards/:namespace/records?keys=a,b` - Retrieve values in key order
/// - `DELETE /hoards/:namespace/records` - Clear the namespace
/// - `GET|PUT|DELETE /hoards/:namespace/records/:key` - Single record access
/// - `POST /hoards/:namespace/lookup` - Retrieve values for a JSON list of keys
/// - `POST /hoards/:namespace/excludes` - Keys with no live record
/// - `GET /hoards/:namespace/latest?limit=n` - Most recently updated values
/// - `GET /hoards/:namespace/version` - Stored schema version
/// - `GET /hoards/:namespace/stats` - Namespace statistics
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/hoards/:namespace/records",
            get(get_records_handler)
                .put(put_records_handler)
                .delete(clear_records_handler),
        )
        .route(
            "/hoards/:namespace/records/:key",
            get(get_record_handler)
                .put(put_record_handler)
                .delete(delete_record_handler),
        )
        .route("/hoards/:namespace/lookup", post(lookup_records_handler))
        .route("/hoards/:namespace/excludes", post(excludes_handler))
        .route("/hoards/:namespace/latest", get(latest_handler))
        .route("/hoards/:namespace/version", get(version_handler))
        .route("/hoards/:namespace/stats", get(stats_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
