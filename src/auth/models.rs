//! Authentication Models
//! Mission: Define secure user, role, and token data structures

use serde::{Deserialize, Serialize};

/// User account (principal) with its eagerly loaded role set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    pub roles: Vec<RoleName>,
    pub created_at: String,
}

impl User {
    /// Role names in store iteration order, as embedded in token claims
    pub fn authorities(&self) -> Vec<String> {
        self.roles.iter().map(|r| r.as_str().to_string()).collect()
    }
}

/// Fixed role enumeration for RBAC
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum RoleName {
    #[serde(rename = "ROLE_USER")]
    RoleUser,
    #[serde(rename = "ROLE_ADMIN")]
    RoleAdmin,
}

impl RoleName {
    pub const ALL: [RoleName; 2] = [RoleName::RoleUser, RoleName::RoleAdmin];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleName::RoleUser => "ROLE_USER",
            RoleName::RoleAdmin => "ROLE_ADMIN",
        }
    }

    /// Parse a stored role name back into the enum
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ROLE_USER" => Some(RoleName::RoleUser),
            "ROLE_ADMIN" => Some(RoleName::RoleAdmin),
            _ => None,
        }
    }
}

/// JWT Claims payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // subject (username)
    pub roles: Vec<String>,
    pub iat: usize,
    pub exp: usize, // iat + configured TTL
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String, // always "Bearer"
    pub id: i64,
    pub username: String,
    pub email: String,
    pub roles: Vec<String>,
    pub login_message: String,
}

/// Registration request body
#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub password: String,
    /// Requested role tokens ("admin", "user", ...); defaults to user
    pub role: Option<Vec<String>>,
}

/// Generic message response
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// User response (sanitized)
#[derive(Debug, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub roles: Vec<String>,
}

impl UserSummary {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            roles: user.authorities(),
        }
    }
}
