//! HTTP interface - axum router over the core operations.
//!
//! Handlers stay thin: extract, call into `core`, serialize. Public shop
//! routes live under `/api`, back-office routes under `/api/admin` behind a
//! bearer token.

pub mod admin;
pub mod error;
pub mod storefront;

use crate::{
    config::AppConfig,
    core::{cart, pagination::Pagination},
    errors::{Error, Result},
};
use axum::{
    Json, Router,
    extract::{Request, State},
    http::{HeaderMap, Method, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use sea_orm::DatabaseConnection;
use serde_json::json;
use std::{sync::Arc, time::Duration};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

/// Header carrying the anonymous cart token.
pub const CART_TOKEN_HEADER: &str = "x-cart-token";
/// Header carrying the signed-in user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    db: Arc<DatabaseConnection>,
    /// Loaded configuration
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Wraps a connection and configuration.
    #[must_use]
    pub fn new(db: DatabaseConnection, config: AppConfig) -> Self {
        Self::shared(Arc::new(db), config)
    }

    /// Builds state around a connection the caller keeps a handle to.
    #[must_use]
    pub fn shared(db: Arc<DatabaseConnection>, config: AppConfig) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    /// The database connection pool.
    #[must_use]
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Resolves a page request against the configured sizes.
    #[must_use]
    pub fn page(&self, request: Pagination) -> (u64, u64) {
        request.resolve(self.config.store.page_size, self.config.store.max_page_size)
    }
}

/// The user id sent in `x-user-id`, if any.
///
/// # Errors
/// Returns `Validation` when the header is present but not a number.
pub fn user_id_from_headers(headers: &HeaderMap) -> Result<Option<i64>> {
    headers
        .get(USER_ID_HEADER)
        .map(|value| {
            value
                .to_str()
                .ok()
                .and_then(|v| v.trim().parse::<i64>().ok())
                .ok_or_else(|| Error::validation("user_id", "User id header is invalid"))
        })
        .transpose()
}

/// Cart key for the request: the signed-in user's cart if `x-user-id` is
/// set, otherwise the session cart named by `x-cart-token`.
///
/// # Errors
/// Returns `Validation` when neither header identifies a cart.
pub fn cart_key_from_headers(headers: &HeaderMap) -> Result<String> {
    if let Some(user_id) = user_id_from_headers(headers)? {
        return Ok(cart::user_cart_key(user_id));
    }
    let token = headers
        .get(CART_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| Error::validation("cart_token", "A cart token is required"))?;
    cart::session_cart_key(token)
}

/// Rejects admin requests without the configured bearer token.
///
/// An empty configured token disables the admin API entirely.
async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let expected = state.config.admin.token.as_str();
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);

    match presented {
        Some(token) if !expected.is_empty() && token == expected => next.run(request).await,
        _ => {
            warn!("Rejected admin request to {}", request.uri().path());
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "message": "Unauthorized" })),
            )
                .into_response()
        }
    }
}

async fn health() -> &'static str {
    "ok"
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::HeaderName::from_static(CART_TOKEN_HEADER),
            header::HeaderName::from_static(USER_ID_HEADER),
        ])
        .max_age(Duration::from_secs(60 * 60));

    let admin_routes = admin::routes()
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    let api = storefront::routes().nest("/admin", admin_routes);

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
