//! # API REST
//!
//! REST API implementation for the image store.
//!
//! Handles:
//! - HTTP endpoints with axum, one store operation per request
//! - Multipart upload decoding
//! - Mapping store errors onto HTTP statuses
//! - OpenAPI documentation
//!
//! Storage semantics live in `imgstore_files`; this crate only translates between HTTP and
//! [`FolderStore`] calls.

#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
mod handlers;
pub mod health;
pub mod openapi;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use imgstore_files::FolderStore;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use config::{ConfigError, ServerConfig};
pub use error::ApiError;
pub use handlers::IMAGE_FIELD;

/// Application state shared across REST API handlers
#[derive(Clone)]
pub struct AppState {
    store: FolderStore,
}

impl AppState {
    pub fn new(store: FolderStore) -> Self {
        Self { store }
    }
}

/// Builds the REST router.
///
/// `GET /images/{folder}/count` takes priority over `GET /images/{folder}/{filename}`, so a file
/// named `count` cannot be fetched.
pub fn router(store: FolderStore, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api-docs/openapi.json", get(handlers::openapi_json))
        .route("/upload/:folder", post(handlers::upload))
        .route(
            "/upload/:folder/:filename",
            put(handlers::replace).delete(handlers::delete_entry),
        )
        .route("/images/:folder", delete(handlers::delete_folder))
        .route("/images/:folder/count", get(handlers::count))
        .route("/images/:folder/:filename", get(handlers::fetch))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .with_state(AppState::new(store))
}
