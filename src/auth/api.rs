//! Authentication API Endpoints
//! Mission: Provide signin, signup, and user management endpoints

use crate::auth::{
    jwt::JwtHandler,
    middleware::extract_context,
    models::{LoginRequest, LoginResponse, MessageResponse, SignUpRequest, UserSummary},
    service::{AuthError, AuthService},
    user_store::UserStore,
};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub user_store: Arc<UserStore>,
    pub jwt_handler: Arc<JwtHandler>,
    pub auth_service: Arc<AuthService>,
}

impl AuthState {
    pub fn new(user_store: Arc<UserStore>, jwt_handler: Arc<JwtHandler>) -> Self {
        let auth_service = Arc::new(AuthService::new(user_store.clone(), jwt_handler.clone()));
        Self {
            user_store,
            jwt_handler,
            auth_service,
        }
    }
}

/// Signin endpoint - POST /api/v1/auth/signin
pub async fn signin(
    State(state): State<AuthState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthApiError> {
    info!("Login attempt: {}", payload.username);

    let response = state
        .auth_service
        .authenticate(&payload.username, &payload.password)?;

    Ok(Json(response))
}

/// Signup endpoint - POST /api/v1/auth/signup
pub async fn signup(
    State(state): State<AuthState>,
    Json(payload): Json<SignUpRequest>,
) -> Result<Json<MessageResponse>, AuthApiError> {
    state.auth_service.register(&payload)?;

    Ok(Json(MessageResponse {
        message: "User registered successfully!".to_string(),
    }))
}

/// Current principal - GET /api/v1/auth/me (protected)
pub async fn me(req: Request) -> Result<Json<UserSummary>, AuthApiError> {
    let context = extract_context(&req).ok_or(AuthApiError::Unauthorized)?;
    Ok(Json(UserSummary::from_user(&context.user)))
}

/// List all users - GET /api/v1/admin/users (protected, ROLE_ADMIN only)
pub async fn list_users(
    State(state): State<AuthState>,
    req: Request,
) -> Result<Json<Vec<UserSummary>>, AuthApiError> {
    let context = extract_context(&req).ok_or(AuthApiError::Unauthorized)?;

    if !context.authorities.iter().any(|a| a == "ROLE_ADMIN") {
        warn!("User {} denied admin access", context.user.username);
        return Err(AuthApiError::Forbidden);
    }

    let users = state.user_store.list_users().map_err(|e| {
        error!("Failed to list users: {}", e);
        AuthApiError::InternalError
    })?;

    Ok(Json(users.iter().map(UserSummary::from_user).collect()))
}

/// HTTP-facing auth errors
#[derive(Debug)]
pub enum AuthApiError {
    Validation(String),
    InvalidCredentials,
    Unauthorized,
    Forbidden,
    UsernameTaken,
    EmailTaken,
    RoleNotSeeded,
    InternalError,
}

impl From<AuthError> for AuthApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(msg) => AuthApiError::Validation(msg),
            AuthError::InvalidCredentials => AuthApiError::InvalidCredentials,
            AuthError::DuplicateUsername => AuthApiError::UsernameTaken,
            AuthError::DuplicateEmail => AuthApiError::EmailTaken,
            AuthError::RoleNotSeeded => AuthApiError::RoleNotSeeded,
            AuthError::Internal(e) => {
                // Internal detail stays in the log, never in the response
                error!("Auth internal error: {}", e);
                AuthApiError::InternalError
            }
        }
    }
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AuthApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "Invalid username or password".to_string(),
            ),
            AuthApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Authentication required".to_string(),
            ),
            AuthApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "Insufficient permissions".to_string(),
            ),
            AuthApiError::UsernameTaken => (
                StatusCode::CONFLICT,
                "Error: Username is already taken!".to_string(),
            ),
            AuthApiError::EmailTaken => (
                StatusCode::CONFLICT,
                "Error: Email is already in use!".to_string(),
            ),
            AuthApiError::RoleNotSeeded => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error: Role not found. Initial data may not be seeded.".to_string(),
            ),
            AuthApiError::InternalError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
