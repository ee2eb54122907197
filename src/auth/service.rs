//! Authentication Orchestrator
//! Mission: Credential verification, token issuance, and registration

use crate::auth::jwt::JwtHandler;
use crate::auth::models::{LoginResponse, RoleName, SignUpRequest};
use crate::auth::user_store::{InsertError, NewUser, UserStore};
use bcrypt::{hash, verify, DEFAULT_COST};
use std::sync::Arc;
use tracing::{info, warn};

/// Domain-level authentication errors.
///
/// Callers branch on the kind; the HTTP mapping lives at the API boundary.
#[derive(Debug)]
pub enum AuthError {
    /// Malformed or missing required input
    Validation(String),
    /// Unknown username or wrong password, deliberately indistinguishable
    InvalidCredentials,
    DuplicateUsername,
    DuplicateEmail,
    /// An expected seed role is missing: a deployment defect, not a client error
    RoleNotSeeded,
    Internal(anyhow::Error),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::Validation(msg) => write!(f, "validation failed: {}", msg),
            AuthError::InvalidCredentials => write!(f, "invalid username or password"),
            AuthError::DuplicateUsername => write!(f, "username is already taken"),
            AuthError::DuplicateEmail => write!(f, "email is already in use"),
            AuthError::RoleNotSeeded => write!(f, "role not found, initial data may not be seeded"),
            AuthError::Internal(e) => write!(f, "internal error: {}", e),
        }
    }
}

impl std::error::Error for AuthError {}

/// Login and registration flows over the user store and token handler
pub struct AuthService {
    store: Arc<UserStore>,
    jwt: Arc<JwtHandler>,
}

impl AuthService {
    pub fn new(store: Arc<UserStore>, jwt: Arc<JwtHandler>) -> Self {
        Self { store, jwt }
    }

    /// Authenticate a user and issue a token.
    ///
    /// Unknown username and wrong password both collapse to
    /// `InvalidCredentials` so the response never reveals which one it was.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<LoginResponse, AuthError> {
        let user = self
            .store
            .find_by_username(username)
            .map_err(AuthError::Internal)?
            .ok_or_else(|| {
                warn!("Failed login attempt: {}", username);
                AuthError::InvalidCredentials
            })?;

        let valid = verify(password, &user.password_hash)
            .map_err(|e| AuthError::Internal(e.into()))?;
        if !valid {
            warn!("Failed login attempt: {}", username);
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.jwt.issue(&user).map_err(AuthError::Internal)?;
        let roles = user.authorities();

        info!("Login successful: {}", user.username);

        Ok(LoginResponse {
            token,
            token_type: "Bearer".to_string(),
            id: user.id,
            username: user.username,
            email: user.email,
            roles: roles.clone(),
            login_message: login_message(&roles).to_string(),
        })
    }

    /// Register a new user.
    ///
    /// Username and email are checked independently up front; the store's
    /// UNIQUE constraints re-surface the same duplicate kinds if a
    /// concurrent registration wins the race between check and insert.
    pub fn register(&self, request: &SignUpRequest) -> Result<(), AuthError> {
        validate_sign_up(request)?;

        if self
            .store
            .exists_by_username(&request.username)
            .map_err(AuthError::Internal)?
        {
            return Err(AuthError::DuplicateUsername);
        }

        if self
            .store
            .exists_by_email(&request.email)
            .map_err(AuthError::Internal)?
        {
            return Err(AuthError::DuplicateEmail);
        }

        let password_hash =
            hash(&request.password, DEFAULT_COST).map_err(|e| AuthError::Internal(e.into()))?;

        let roles = resolve_roles(request.role.as_deref());
        let mut role_ids = Vec::with_capacity(roles.len());
        for role in &roles {
            let id = self
                .store
                .find_role(*role)
                .map_err(AuthError::Internal)?
                .ok_or(AuthError::RoleNotSeeded)?;
            role_ids.push(id);
        }

        let new_user = NewUser {
            username: request.username.clone(),
            first_name: request.first_name.clone(),
            last_name: request.last_name.clone(),
            email: request.email.clone(),
            phone_number: request.phone_number.clone(),
            password_hash,
        };

        self.store
            .create_user(&new_user, &role_ids)
            .map_err(|e| match e {
                InsertError::DuplicateUsername => AuthError::DuplicateUsername,
                InsertError::DuplicateEmail => AuthError::DuplicateEmail,
                InsertError::Db(e) => AuthError::Internal(e),
            })?;

        info!("Registered user: {}", request.username);

        Ok(())
    }
}

/// Map requested role tokens onto the fixed role set.
///
/// No roles requested means exactly {ROLE_USER}. "admin" grants ROLE_ADMIN;
/// any other string falls back to ROLE_USER. The fallback is kept for wire
/// compatibility with existing clients and is intentional, not an accident.
fn resolve_roles(requested: Option<&[String]>) -> Vec<RoleName> {
    let mut roles = Vec::new();

    match requested {
        None => roles.push(RoleName::RoleUser),
        Some(tokens) if tokens.is_empty() => roles.push(RoleName::RoleUser),
        Some(tokens) => {
            for token in tokens {
                let role = match token.as_str() {
                    "admin" => RoleName::RoleAdmin,
                    _ => RoleName::RoleUser,
                };
                if !roles.contains(&role) {
                    roles.push(role);
                }
            }
        }
    }

    roles.sort();
    roles
}

/// Greeting chosen by role precedence: admin first, then user, then generic
fn login_message(roles: &[String]) -> &'static str {
    if roles.iter().any(|r| r == "ROLE_ADMIN") {
        "Login successful. Welcome, Admin!"
    } else if roles.iter().any(|r| r == "ROLE_USER") {
        "Login successful. Welcome, User!"
    } else {
        "Login successful."
    }
}

fn validate_sign_up(request: &SignUpRequest) -> Result<(), AuthError> {
    if request.username.trim().is_empty() {
        return Err(AuthError::Validation("Username is required.".to_string()));
    }
    if request.username.len() < 3 || request.username.len() > 50 {
        return Err(AuthError::Validation(
            "Username must be between 3 and 50 characters.".to_string(),
        ));
    }
    if request.email.trim().is_empty() || !request.email.contains('@') {
        return Err(AuthError::Validation(
            "Email should be in a valid format.".to_string(),
        ));
    }
    if request.password.len() < 8 || request.password.len() > 100 {
        return Err(AuthError::Validation(
            "Password must be between 8 and 100 characters.".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use tempfile::NamedTempFile;

    fn test_service() -> (AuthService, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let store = Arc::new(UserStore::new(temp_file.path().to_str().unwrap()).unwrap());
        let secret = BASE64.encode(b"service-test-secret-with-enough-bytes!!");
        let jwt = Arc::new(JwtHandler::from_base64_secret(&secret, 60_000).unwrap());
        (AuthService::new(store, jwt), temp_file)
    }

    fn sign_up(username: &str, email: &str, role: Option<Vec<&str>>) -> SignUpRequest {
        SignUpRequest {
            username: username.to_string(),
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            email: email.to_string(),
            phone_number: "+15551234567".to_string(),
            password: "password123".to_string(),
            role: role.map(|r| r.into_iter().map(String::from).collect()),
        }
    }

    #[test]
    fn test_register_and_authenticate() {
        let (service, _temp) = test_service();

        service
            .register(&sign_up("johndoe", "a@x.com", None))
            .unwrap();

        let response = service.authenticate("johndoe", "password123").unwrap();
        assert_eq!(response.username, "johndoe");
        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.roles, vec!["ROLE_USER"]);
        assert_eq!(response.login_message, "Login successful. Welcome, User!");
        assert!(!response.token.is_empty());
    }

    #[test]
    fn test_wrong_password_and_unknown_user_look_the_same() {
        let (service, _temp) = test_service();

        service
            .register(&sign_up("johndoe", "a@x.com", None))
            .unwrap();

        let wrong = service.authenticate("johndoe", "nope-nope").unwrap_err();
        let unknown = service.authenticate("ghost", "password123").unwrap_err();

        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert!(matches!(unknown, AuthError::InvalidCredentials));
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let (service, _temp) = test_service();

        service
            .register(&sign_up("johndoe", "a@x.com", None))
            .unwrap();

        let err = service
            .register(&sign_up("johndoe", "b@x.com", None))
            .unwrap_err();
        assert!(matches!(err, AuthError::DuplicateUsername));
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let (service, _temp) = test_service();

        service
            .register(&sign_up("johndoe", "a@x.com", None))
            .unwrap();

        let err = service
            .register(&sign_up("janedoe", "a@x.com", None))
            .unwrap_err();
        assert!(matches!(err, AuthError::DuplicateEmail));
    }

    #[test]
    fn test_default_role_is_user() {
        assert_eq!(resolve_roles(None), vec![RoleName::RoleUser]);

        let empty: Vec<String> = Vec::new();
        assert_eq!(resolve_roles(Some(&empty)), vec![RoleName::RoleUser]);
    }

    #[test]
    fn test_admin_role_mapping() {
        let requested = vec!["admin".to_string()];
        assert_eq!(resolve_roles(Some(&requested)), vec![RoleName::RoleAdmin]);
    }

    #[test]
    fn test_unrecognized_role_falls_back_to_user() {
        // Documented compatibility fallback: typos become plain users
        let requested = vec!["moderator".to_string()];
        assert_eq!(resolve_roles(Some(&requested)), vec![RoleName::RoleUser]);
    }

    #[test]
    fn test_mixed_roles_deduplicated() {
        let requested = vec![
            "admin".to_string(),
            "user".to_string(),
            "admin".to_string(),
        ];
        assert_eq!(
            resolve_roles(Some(&requested)),
            vec![RoleName::RoleUser, RoleName::RoleAdmin]
        );
    }

    #[test]
    fn test_admin_greeting_takes_precedence() {
        let both = vec!["ROLE_USER".to_string(), "ROLE_ADMIN".to_string()];
        assert_eq!(login_message(&both), "Login successful. Welcome, Admin!");

        let user = vec!["ROLE_USER".to_string()];
        assert_eq!(login_message(&user), "Login successful. Welcome, User!");

        assert_eq!(login_message(&[]), "Login successful.");
    }

    #[test]
    fn test_registered_admin_gets_admin_greeting() {
        let (service, _temp) = test_service();

        service
            .register(&sign_up("admin1", "admin@x.com", Some(vec!["admin"])))
            .unwrap();

        let response = service.authenticate("admin1", "password123").unwrap();
        assert_eq!(response.roles, vec!["ROLE_ADMIN"]);
        assert_eq!(response.login_message, "Login successful. Welcome, Admin!");
    }

    #[test]
    fn test_validation_rejects_bad_input() {
        let (service, _temp) = test_service();

        let short_name = sign_up("jd", "a@x.com", None);
        assert!(matches!(
            service.register(&short_name).unwrap_err(),
            AuthError::Validation(_)
        ));

        let bad_email = sign_up("johndoe", "not-an-email", None);
        assert!(matches!(
            service.register(&bad_email).unwrap_err(),
            AuthError::Validation(_)
        ));

        let mut weak = sign_up("johndoe", "a@x.com", None);
        weak.password = "short".to_string();
        assert!(matches!(
            service.register(&weak).unwrap_err(),
            AuthError::Validation(_)
        ));
    }
}
