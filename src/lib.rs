pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod storage;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::{Config, HostKind};
use crate::db::Database;
use crate::error::AppError;
use crate::storage::MediaHost;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub media_host: Arc<dyn MediaHost>,
}

pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    // Public routes (no session required)
    let public_routes = Router::new()
        .route("/auth/signup", post(handlers::auth::signup))
        .route("/auth/signin", post(handlers::auth::signin))
        .route("/auth/google", post(handlers::auth::google))
        .route("/auth/signout", post(handlers::auth::signout))
        .route(
            "/upload/upload",
            post(handlers::upload::upload)
                .layer(DefaultBodyLimit::max(config.upload.max_request_bytes)),
        )
        .route("/upload/all", get(handlers::upload::list_media))
        .route(
            "/upload/delete/*public_id",
            delete(handlers::upload::delete_media),
        )
        .route(
            "/upload/:id",
            get(handlers::upload::get_media).patch(handlers::upload::update_media),
        )
        .route("/dashboard/stats", get(handlers::dashboard::stats))
        .route("/contact", post(handlers::contact::submit));

    // Protected routes (session required)
    let protected_routes = Router::new()
        .route("/user/me", get(handlers::user::me))
        .route("/user/profile", patch(handlers::user::update_profile))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    let mut app = Router::new()
        .nest("/api", public_routes.merge(protected_routes))
        .route("/health", get(handlers::health::health));

    if config.storage.provider == HostKind::Local {
        app = app.nest_service("/media", ServeDir::new(&config.storage.local_path));
    }

    app.fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config))
        .with_state(state)
}

async fn not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .server
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    // Credentialed requests need explicit origins, methods and headers
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
