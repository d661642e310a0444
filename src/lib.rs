use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

pub mod auth;
pub mod config;
pub mod database;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

use crate::{
    config::StorageType,
    handlers::{health, images, metrics, AppState},
    middleware::metrics_middleware,
    storage::local::FILES_ROUTE,
};

/// Room for the non-file multipart fields and boundaries on top of the
/// image size limit.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

fn cors_layer(frontend_url: &str) -> CorsLayer {
    let origin = match HeaderValue::from_str(frontend_url.trim_end_matches('/')) {
        Ok(origin) => AllowOrigin::exact(origin),
        Err(e) => {
            tracing::warn!(frontend_url, error = %e, "FRONTEND_URL is not a valid origin; cross-origin requests are refused");
            AllowOrigin::list(Vec::<HeaderValue>::new())
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    let api = Router::new()
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/images/upload", post(images::upload_image))
        .route("/api/images/history", get(images::get_history))
        .route("/api/images/delete/:id", delete(images::delete_image))
        .route("/health", get(health::liveness))
        .route("/ready", get(health::readiness))
        .route("/metrics", get(metrics::metrics_handler));

    let app = if config.storage.storage_type == StorageType::Local {
        api.nest_service(FILES_ROUTE, ServeDir::new(&config.storage.local_path))
    } else {
        api
    };

    app.fallback_service(ServeDir::new(&config.static_dir))
        .layer(from_fn_with_state(state.clone(), metrics_middleware))
        .layer(DefaultBodyLimit::max(config.max_file_size + FORM_OVERHEAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.frontend_url))
        .with_state(state)
}
