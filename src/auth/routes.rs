//! Route Policy
//! Mission: Classify routes as public or protected and wire the layers

use crate::auth::{
    api::{self, AuthState},
    middleware::{authentication_gate, require_authentication},
};
use axum::{
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the full application router.
///
/// Every route is classified exactly once: public routes (health plus the
/// signin/signup endpoints) skip the policy layer, protected routes require
/// a principal. The authentication gate wraps both so it runs once per
/// request regardless of outcome.
pub fn create_router(state: AuthState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/auth/signin", post(api::signin))
        .route("/api/v1/auth/signup", post(api::signup))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/v1/auth/me", get(api::me))
        .route("/api/v1/admin/users", get(api::list_users))
        .route_layer(middleware::from_fn(require_authentication))
        .with_state(state.clone());

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(middleware::from_fn_with_state(state, authentication_gate))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
