//! Authentication Module
//! Mission: Secure API access with JWT tokens and RBAC

pub mod api;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod service;
pub mod user_store;

pub use api::AuthState;
pub use jwt::JwtHandler;
pub use middleware::{authentication_gate, require_authentication, AuthContext};
pub use routes::create_router;
pub use service::{AuthError, AuthService};
pub use user_store::UserStore;
