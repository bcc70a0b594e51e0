//! Authentication and session credential service.
//!
//! Sessions are signed HS256 tokens carrying the user's identity, email,
//! role, and display name, valid for the configured number of days. The
//! token travels in an HTTP-only cookie (or a bearer header for API use);
//! verification failures all collapse into one generic authentication error
//! so callers cannot distinguish a bad signature from an expired session.

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::user::User;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Name of the session cookie set on login and cleared on logout.
pub const SESSION_COOKIE: &str = "cd_session";

/// Claims carried by a session credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    pub email: String,
    /// Role id, resolved at login time
    pub role: String,
    pub name: String,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiration (unix seconds)
    pub exp: i64,
}

/// Authentication service: password checks and session codec.
#[derive(Clone)]
pub struct AuthService {
    db: PgPool,
    config: Arc<Config>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AuthService {
    pub fn new(db: PgPool, config: Arc<Config>) -> Self {
        let secret = config.session_secret.as_bytes();
        Self {
            db,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            config,
        }
    }

    /// Verify credentials against the user table and issue a session.
    ///
    /// Unknown email, deactivated user, and wrong password all fail with the
    /// same message and without revealing which check failed.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<(User, String)> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE LOWER(email) = LOWER($1) AND is_active = true",
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::Authentication("Invalid credentials".to_string()))?;

        if !Self::verify_password(password, &user.password_hash)? {
            return Err(AppError::Authentication("Invalid credentials".to_string()));
        }

        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(user.id)
            .execute(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let token = self.issue_session(&user)?;
        Ok((user, token))
    }

    /// Sign a session credential for the given user.
    pub fn issue_session(&self, user: &User) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role_id.clone(),
            name: user.display_name.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::days(self.config.session_ttl_days)).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign session: {}", e)))
    }

    /// Verify a session credential and return its claims.
    pub fn verify_session(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AppError::Authentication("Invalid or expired session".to_string()))
    }

    /// Hash a password with bcrypt.
    pub fn hash_password(password: &str) -> Result<String> {
        bcrypt::hash(password, bcrypt::DEFAULT_COST)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
    }

    /// Verify a password against a bcrypt hash.
    pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
        bcrypt::verify(password, hash)
            .map_err(|e| AppError::Internal(format!("Failed to verify password: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_service(secret: &str, ttl_days: i64) -> AuthService {
        let config = Config {
            database_url: "postgresql://cd:cd@127.0.0.1:1/contentdesk".to_string(),
            bind_address: "127.0.0.1:0".to_string(),
            environment: "development".to_string(),
            cors_origins: String::new(),
            session_secret: secret.to_string(),
            encryption_key: "test-cipher-key".to_string(),
            session_ttl_days: ttl_days,
            webhook_schedule_post_url: None,
            webhook_edit_media_url: None,
            webhook_update_post_url: None,
            webhook_remove_post_url: None,
            webhook_engagement_url: None,
            media_upload_url: None,
            admin_email: "admin@localhost".to_string(),
            admin_password: None,
        };
        let db = PgPool::connect_lazy(&config.database_url).expect("lazy pool");
        AuthService::new(db, Arc::new(config))
    }

    fn test_user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "ops@example.com".to_string(),
            password_hash: String::new(),
            display_name: "Ops".to_string(),
            role_id: "editor".to_string(),
            is_active: true,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    // -----------------------------------------------------------------------
    // Password hashing
    // -----------------------------------------------------------------------

    #[test]
    fn test_password_hashing() {
        let hash = AuthService::hash_password("correct horse battery").expect("hash");
        assert_ne!(hash, "correct horse battery");
        assert!(AuthService::verify_password("correct horse battery", &hash).expect("verify"));
        assert!(!AuthService::verify_password("wrong password", &hash).expect("verify"));
    }

    // -----------------------------------------------------------------------
    // Session codec
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_session_round_trip() {
        let service = test_service("round-trip-secret", 7);
        let user = test_user();
        let token = service.issue_session(&user).expect("issue");
        let claims = service.verify_session(&token).expect("verify");
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, user.email);
        assert_eq!(claims.role, "editor");
        assert_eq!(claims.name, "Ops");
        assert!(claims.exp > claims.iat);
    }

    #[tokio::test]
    async fn test_session_lifetime_matches_config() {
        let service = test_service("ttl-secret", 7);
        let token = service.issue_session(&test_user()).expect("issue");
        let claims = service.verify_session(&token).expect("verify");
        let seven_days = 7 * 24 * 60 * 60;
        let lifetime = claims.exp - claims.iat;
        assert!((lifetime - seven_days).abs() <= 1, "lifetime was {lifetime}");
    }

    #[tokio::test]
    async fn test_tampered_session_rejected() {
        let service = test_service("tamper-secret", 7);
        let token = service.issue_session(&test_user()).expect("issue");
        let mut tampered = token.clone();
        tampered.pop();
        tampered.push(if token.ends_with('A') { 'B' } else { 'A' });
        let err = service.verify_session(&tampered).expect_err("should fail");
        assert!(matches!(err, AppError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_wrong_secret_rejected() {
        let issuer = test_service("secret-one", 7);
        let verifier = test_service("secret-two", 7);
        let token = issuer.issue_session(&test_user()).expect("issue");
        assert!(verifier.verify_session(&token).is_err());
    }

    #[tokio::test]
    async fn test_expired_session_rejected() {
        // Negative lifetime puts the expiry a day in the past, beyond the
        // validator's default leeway.
        let service = test_service("expired-secret", -1);
        let token = service.issue_session(&test_user()).expect("issue");
        let err = service.verify_session(&token).expect_err("should fail");
        assert!(matches!(err, AppError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_malformed_token_rejected() {
        let service = test_service("malformed-secret", 7);
        for garbage in ["", "not-a-token", "a.b", "a.b.c.d"] {
            assert!(service.verify_session(garbage).is_err(), "{garbage:?} should fail");
        }
    }

    #[tokio::test]
    async fn test_failure_message_is_generic() {
        let service = test_service("generic-secret", 7);
        let err = service.verify_session("garbage").expect_err("should fail");
        let message = err.to_string();
        assert!(!message.to_lowercase().contains("signature"));
        assert!(message.contains("Invalid or expired session"));
    }
}
