//! Router setup with all API routes and middleware.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use guru_core::config::GuruConfig;
use guru_core::error::GuruError;

use crate::auth::{require_allowed_user, USER_HEADER};
use crate::handlers;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins(&state.config)))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(USER_HEADER),
        ]);

    // Routes that do NOT require authentication.
    let public_routes = Router::new().route("/health", get(handlers::health));

    let protected_routes = Router::new()
        .route(
            "/api/business-intelligence",
            post(handlers::business_intelligence),
        )
        .route("/api/ai-chat", post(handlers::ai_chat))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_allowed_user,
        ));

    public_routes
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB global limit
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Configured origins, or the local server address when none are set.
fn allowed_origins(config: &GuruConfig) -> Vec<HeaderValue> {
    let configured: Vec<String> = if config.server.allowed_origins.is_empty() {
        let port = config.server.port;
        vec![
            format!("http://127.0.0.1:{}", port),
            format!("http://localhost:{}", port),
        ]
    } else {
        config.server.allowed_origins.clone()
    };

    configured
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect()
}

/// Serve the API on the configured host and port until the listener fails.
pub async fn start_server(config: &GuruConfig, state: AppState) -> Result<(), GuruError> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| GuruError::Api(format!("Failed to bind: {}", e)))?;

    axum::serve(listener, router)
        .await
        .map_err(|e| GuruError::Api(format!("Server error: {}", e)))?;

    Ok(())
}
