//! Bearer-token authentication and role checks.
//!
//! Tokens are HS256 JWTs issued at login/registration. Handlers take an
//! [`AuthUser`] argument to require a valid token.

use crate::config::AuthConfig;
use crate::error::{AppError, AppResult};
use crate::models::UserRole;
use crate::repositories::UserRepository;
use crate::AppState;
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, SaltString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and verifies access tokens
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry_hours: i64,
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            expiry_hours: config.jwt_expiry_hours,
        }
    }

    /// Issue a token for a user
    pub fn issue(&self, user_id: Uuid, role: UserRole) -> AppResult<String> {
        let now = chrono::Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            role: role.as_str().to_string(),
            iat: now.timestamp(),
            exp: (now + chrono::Duration::hours(self.expiry_hours)).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Message(format!("Failed to sign token: {}", e)))
    }

    /// Verify a token and return the caller it identifies
    pub fn verify(&self, token: &str) -> AppResult<AuthUser> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;

        let id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| AppError::Unauthorized("Invalid token subject".to_string()))?;
        let role = UserRole::from_str(&data.claims.role)
            .map_err(|_| AppError::Unauthorized("Invalid token role".to_string()))?;

        Ok(AuthUser { id, role })
    }
}

/// Hash a password with Argon2id and a random salt
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Message(format!("Failed to hash password: {}", e)))
}

/// Check a password against a stored Argon2 hash
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    PasswordHash::new(password_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Map a stored `is_active` flag to an access decision
pub fn account_access(active: Option<bool>) -> AppResult<()> {
    match active {
        Some(true) => Ok(()),
        Some(false) => Err(AppError::Forbidden("Account is deactivated".to_string())),
        None => Err(AppError::Unauthorized("Account no longer exists".to_string())),
    }
}

/// Re-checks the account behind a token before state-changing operations,
/// since tokens stay valid until they expire.
#[derive(Clone)]
pub struct AccountGuard {
    user_repo: Arc<UserRepository>,
}

impl AccountGuard {
    pub fn new(user_repo: Arc<UserRepository>) -> Self {
        Self { user_repo }
    }

    pub async fn ensure_active(&self, user_id: Uuid) -> AppResult<()> {
        account_access(self.user_repo.is_active(user_id).await?)
    }
}

/// Authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: UserRole,
}

impl AuthUser {
    /// Fail with 403 unless the caller has one of `roles`
    pub fn require_role(&self, roles: &[UserRole]) -> AppResult<()> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "Role '{}' is not allowed to perform this action",
                self.role.as_str()
            )))
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing authorization token".to_string()))?;

        let token = bearer_token(header)
            .ok_or_else(|| AppError::Unauthorized("Malformed authorization header".to_string()))?;

        state.tokens.verify(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens() -> TokenService {
        TokenService::new(&AuthConfig::default())
    }

    #[test]
    fn test_token_round_trip() {
        let id = Uuid::new_v4();
        let token = tokens().issue(id, UserRole::Helper).unwrap();
        let user = tokens().verify(&token).unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.role, UserRole::Helper);
    }

    #[test]
    fn test_token_wrong_secret_rejected() {
        let token = tokens().issue(Uuid::new_v4(), UserRole::User).unwrap();
        let other = TokenService::new(&AuthConfig {
            jwt_secret: "another-secret".to_string(),
            jwt_expiry_hours: 1,
        });
        assert!(matches!(other.verify(&token), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_account_access() {
        assert!(account_access(Some(true)).is_ok());
        assert!(matches!(account_access(Some(false)), Err(AppError::Forbidden(_))));
        assert!(matches!(account_access(None), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer   xyz "), Some("xyz"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer"), None);
    }

    #[test]
    fn test_password_hash_verify() {
        let hash = hash_password("s3cret-pass").unwrap();
        assert!(verify_password("s3cret-pass", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("s3cret-pass", "not-a-hash"));
    }

    #[test]
    fn test_require_role() {
        let user = AuthUser {
            id: Uuid::new_v4(),
            role: UserRole::User,
        };
        assert!(user.require_role(&[UserRole::User, UserRole::Admin]).is_ok());
        assert!(matches!(
            user.require_role(&[UserRole::Helper]),
            Err(AppError::Forbidden(_))
        ));
    }
}
