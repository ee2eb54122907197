//! Authentication Middleware
//! Mission: Attach principals to requests and enforce the route policy

use crate::auth::api::AuthState;
use crate::auth::models::User;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::{debug, warn};

/// Request-scoped authentication context attached by the gate
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: User,
    pub authorities: Vec<String>,
}

/// Authentication gate, run exactly once per request.
///
/// Attempts to authenticate from the `Authorization: Bearer` header and
/// attaches an [`AuthContext`] on success. It never rejects: a missing,
/// malformed, or invalid token just leaves the request unauthenticated and
/// the downstream policy layer decides whether that matters. Failures are
/// logged server-side only.
pub async fn authentication_gate(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    if let Some(token) = parse_bearer(&req) {
        if state.jwt_handler.validate(&token) && req.extensions().get::<AuthContext>().is_none() {
            match resolve_context(&state, &token) {
                Ok(Some(context)) => {
                    debug!("Authenticated request for {}", context.user.username);
                    req.extensions_mut().insert(context);
                }
                Ok(None) => warn!("Token subject has no matching user"),
                Err(e) => warn!("Cannot set user authentication: {}", e),
            }
        }
    }

    next.run(req).await
}

/// Load the principal named by a validated token, roles included
fn resolve_context(state: &AuthState, token: &str) -> anyhow::Result<Option<AuthContext>> {
    let username = state.jwt_handler.subject(token)?;
    let user = state.user_store.find_by_username(&username)?;

    Ok(user.map(|user| AuthContext {
        authorities: user.authorities(),
        user,
    }))
}

/// Policy layer for protected routes: 401 unless the gate attached a principal
pub async fn require_authentication(req: Request, next: Next) -> Response {
    if req.extensions().get::<AuthContext>().is_none() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Authentication required" })),
        )
            .into_response();
    }

    next.run(req).await
}

/// Extract the token from the Authorization header.
///
/// Anything without the literal `Bearer ` prefix counts as no token.
fn parse_bearer(req: &Request) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|t| t.to_string())
}

/// Extract the authentication context from a request (set by the gate)
pub fn extract_context(req: &Request) -> Option<&AuthContext> {
    req.extensions().get::<AuthContext>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::RoleName;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;

    fn request_with_auth_header(value: &str) -> Request {
        HttpRequest::builder()
            .uri("/api/v1/auth/me")
            .header(header::AUTHORIZATION, value)
            .body(Body::empty())
            .unwrap()
    }

    fn test_user() -> User {
        User {
            id: 1,
            username: "johndoe".to_string(),
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            email: "johndoe@example.com".to_string(),
            phone_number: "+15551234567".to_string(),
            password_hash: "hash".to_string(),
            roles: vec![RoleName::RoleUser],
            created_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_parse_bearer_requires_prefix() {
        let req = request_with_auth_header("Bearer abc.def.ghi");
        assert_eq!(parse_bearer(&req), Some("abc.def.ghi".to_string()));

        let req = request_with_auth_header("bearer abc.def.ghi");
        assert_eq!(parse_bearer(&req), None);

        let req = request_with_auth_header("Basic dXNlcjpwYXNz");
        assert_eq!(parse_bearer(&req), None);

        let req = HttpRequest::new(Body::empty());
        assert_eq!(parse_bearer(&req), None);
    }

    #[test]
    fn test_extract_context_from_request() {
        let mut req = HttpRequest::new(Body::empty());
        assert!(extract_context(&req).is_none());

        let user = test_user();
        req.extensions_mut().insert(AuthContext {
            authorities: user.authorities(),
            user,
        });

        let context = extract_context(&req).unwrap();
        assert_eq!(context.user.username, "johndoe");
        assert_eq!(context.authorities, vec!["ROLE_USER"]);
    }
}
