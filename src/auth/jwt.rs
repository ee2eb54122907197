//! JWT Token Handler
//! Mission: Issue and validate HMAC-signed bearer tokens

use crate::auth::models::{Claims, User};
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use jsonwebtoken::errors::ErrorKind;
use tracing::{debug, warn};

/// JWT handler for token operations.
///
/// The signing key is decoded once at construction and never mutated,
/// so a single handler can be shared across all request tasks.
pub struct JwtHandler {
    key: Vec<u8>,
    ttl_ms: i64,
}

impl JwtHandler {
    /// Create a handler from a base64-encoded secret and a TTL in milliseconds
    pub fn from_base64_secret(secret_b64: &str, ttl_ms: i64) -> Result<Self> {
        let key = BASE64
            .decode(secret_b64.trim())
            .context("JWT secret is not valid base64")?;
        Ok(Self { key, ttl_ms })
    }

    /// Issue a signed token for a user.
    ///
    /// Claims: subject = username, roles = role names in store iteration
    /// order, iat = now, exp = now + TTL.
    pub fn issue(&self, user: &User) -> Result<String> {
        let now = Utc::now();
        let exp_ms = now.timestamp_millis() + self.ttl_ms;

        let claims = Claims {
            sub: user.username.clone(),
            roles: user.authorities(),
            iat: now.timestamp() as usize,
            exp: (exp_ms / 1000) as usize,
        };

        debug!("Issuing JWT for {}, ttl {}ms", user.username, self.ttl_ms);

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(&self.key),
        )
        .context("Failed to sign JWT")
    }

    /// Validate signature and expiry.
    ///
    /// Never fails loudly: every failure class collapses to `false` for the
    /// caller and is only distinguished in the log output.
    pub fn validate(&self, token: &str) -> bool {
        match decode::<Claims>(
            token,
            &DecodingKey::from_secret(&self.key),
            &self.validation(),
        ) {
            Ok(_) => true,
            Err(e) => {
                match e.kind() {
                    ErrorKind::ExpiredSignature => warn!("JWT is expired: {}", e),
                    ErrorKind::InvalidSignature => warn!("Invalid JWT signature: {}", e),
                    ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                        warn!("JWT uses an unsupported algorithm: {}", e)
                    }
                    _ => warn!("Malformed JWT: {}", e),
                }
                false
            }
        }
    }

    /// Extract the subject (username) claim.
    ///
    /// Callers must have validated the token first; an invalid token just
    /// yields an error here.
    pub fn subject(&self, token: &str) -> Result<String> {
        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(&self.key),
            &self.validation(),
        )
        .context("Invalid or expired token")?;

        Ok(decoded.claims.sub)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        // Exact expiry: a token whose exp has passed is invalid immediately
        validation.leeway = 0;
        validation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::RoleName;

    fn test_handler(ttl_ms: i64) -> JwtHandler {
        let secret = BASE64.encode(b"test-secret-key-with-enough-bytes-12345");
        JwtHandler::from_base64_secret(&secret, ttl_ms).unwrap()
    }

    fn test_user(roles: Vec<RoleName>) -> User {
        User {
            id: 1,
            username: "johndoe".to_string(),
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            email: "johndoe@example.com".to_string(),
            phone_number: "+15551234567".to_string(),
            password_hash: "hash".to_string(),
            roles,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn test_round_trip() {
        let handler = test_handler(60_000);
        let user = test_user(vec![RoleName::RoleUser, RoleName::RoleAdmin]);

        let token = handler.issue(&user).unwrap();
        assert!(handler.validate(&token));
        assert_eq!(handler.subject(&token).unwrap(), "johndoe");
    }

    #[test]
    fn test_roles_claim_matches_user_roles() {
        let handler = test_handler(60_000);
        let user = test_user(vec![RoleName::RoleUser, RoleName::RoleAdmin]);

        let token = handler.issue(&user).unwrap();
        let decoded = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(&handler.key),
            &handler.validation(),
        )
        .unwrap();

        assert_eq!(decoded.claims.roles, vec!["ROLE_USER", "ROLE_ADMIN"]);
        assert_eq!(decoded.claims.exp, decoded.claims.iat + 60);
    }

    #[test]
    fn test_expired_token_rejected() {
        let handler = test_handler(-5_000);
        let user = test_user(vec![RoleName::RoleUser]);

        let token = handler.issue(&user).unwrap();
        assert!(!handler.validate(&token));
    }

    #[test]
    fn test_garbage_input_rejected() {
        let handler = test_handler(60_000);

        assert!(!handler.validate(""));
        assert!(!handler.validate("not-a-token"));
        assert!(!handler.validate("a.b.c"));
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let handler = test_handler(60_000);
        let user = test_user(vec![RoleName::RoleUser]);

        let token = handler.issue(&user).unwrap();

        // Corrupt one character of the signature segment
        let mut tampered = token.clone();
        let flipped = if tampered.ends_with('A') { 'B' } else { 'A' };
        tampered.pop();
        tampered.push(flipped);

        assert_ne!(token, tampered);
        assert!(!handler.validate(&tampered));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let handler = test_handler(60_000);
        let other_secret = BASE64.encode(b"a-completely-different-secret-material!");
        let other = JwtHandler::from_base64_secret(&other_secret, 60_000).unwrap();
        let user = test_user(vec![RoleName::RoleUser]);

        let token = handler.issue(&user).unwrap();
        assert!(!other.validate(&token));
    }

    #[test]
    fn test_unsupported_algorithm_rejected() {
        let handler = test_handler(60_000);
        let user = test_user(vec![RoleName::RoleUser]);

        // Sign with HS384 using the same key; only HS256 is accepted
        let now = Utc::now();
        let claims = Claims {
            sub: user.username.clone(),
            roles: user.authorities(),
            iat: now.timestamp() as usize,
            exp: now.timestamp() as usize + 60,
        };
        let token = encode(
            &Header::new(Algorithm::HS384),
            &claims,
            &EncodingKey::from_secret(&handler.key),
        )
        .unwrap();

        assert!(!handler.validate(&token));
    }

    #[test]
    fn test_invalid_base64_secret_rejected() {
        assert!(JwtHandler::from_base64_secret("not base64 !!!", 60_000).is_err());
    }
}
