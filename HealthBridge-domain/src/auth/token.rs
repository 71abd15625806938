use std::env;
use std::sync::Arc;
use std::time::{Duration as StdDuration, SystemTime, UNIX_EPOCH};

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

#[cfg(feature = "with-api")]
use utoipa::ToSchema;

use crate::auth::token_blacklist::TokenBlacklist;
use crate::auth::Claims;
use health_bridge_data::models::Role;

/// Security errors for authentication and token operations
#[derive(Debug, Error)]
pub enum SecurityError {
    /// JWT validation error
    #[error("Token validation error: {0}")]
    TokenValidation(String),

    /// Expired token
    #[error("Token has expired")]
    TokenExpired,

    /// Invalid token structure
    #[error("Invalid token format")]
    InvalidToken,

    /// Token has been revoked
    #[error("Token has been revoked")]
    TokenRevoked,

    /// Access token presented where a refresh token is required, or the reverse
    #[error("Expected a {expected:?} token")]
    WrongTokenType { expected: TokenType },

    /// Invalid issuer
    #[error("Invalid token issuer")]
    InvalidIssuer,

    /// Configuration error
    #[error("Security configuration error: {0}")]
    ConfigError(String),

    /// Token could not be signed
    #[error("Token encoding error: {0}")]
    Encoding(String),
}

/// Token types for authentication
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived access token
    Access,
    /// Long-lived refresh token
    Refresh,
}

/// Token settings loaded from the environment
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub issuer: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl TokenConfig {
    /// Config with default lifetimes (15 minute access, 7 day refresh)
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: "health-bridge-api".to_string(),
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(7),
        }
    }

    /// Load from `JWT_SECRET`, `JWT_ISSUER`, `ACCESS_TOKEN_EXPIRATION_MINUTES`
    /// and `REFRESH_TOKEN_EXPIRATION_DAYS`
    pub fn from_env() -> Result<Self, SecurityError> {
        let secret = env::var("JWT_SECRET").map_err(|e| {
            error!("JWT_SECRET environment variable not found: {}", e);
            SecurityError::ConfigError("JWT_SECRET environment variable not found".to_string())
        })?;
        if secret.trim().is_empty() {
            return Err(SecurityError::ConfigError("JWT_SECRET must not be empty".to_string()));
        }

        let mut config = Self::new(secret);
        if let Ok(issuer) = env::var("JWT_ISSUER") {
            config.issuer = issuer;
        }

        let access_minutes = env::var("ACCESS_TOKEN_EXPIRATION_MINUTES")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(15);
        let refresh_days = env::var("REFRESH_TOKEN_EXPIRATION_DAYS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(7);

        config.access_ttl = Duration::minutes(access_minutes);
        config.refresh_ttl = Duration::days(refresh_days);
        Ok(config)
    }

    fn ttl(&self, token_type: TokenType) -> Duration {
        match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        }
    }
}

/// Access and refresh token issued together
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Always "Bearer"
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// Signs, validates and revokes HS256 JWTs
#[derive(Clone)]
pub struct TokenService {
    config: TokenConfig,
    blacklist: Arc<TokenBlacklist>,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("issuer", &self.config.issuer)
            .field("revoked", &self.blacklist.size())
            .finish()
    }
}

impl TokenService {
    pub fn new(config: TokenConfig) -> Self {
        Self::with_blacklist(config, Arc::new(TokenBlacklist::new()))
    }

    pub fn with_blacklist(config: TokenConfig, blacklist: Arc<TokenBlacklist>) -> Self {
        Self { config, blacklist }
    }

    pub fn blacklist(&self) -> Arc<TokenBlacklist> {
        self.blacklist.clone()
    }

    /// Access token lifetime in seconds
    pub fn access_ttl_seconds(&self) -> i64 {
        self.config.access_ttl.num_seconds()
    }

    /// Generate a new JWT token
    pub fn generate_token(&self, user_id: &str, role: Role, token_type: TokenType) -> Result<String, SecurityError> {
        let now = Utc::now();
        let expiration = now + self.config.ttl(token_type);

        let claims = Claims {
            sub: user_id.to_string(),
            iss: self.config.issuer.clone(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            role,
            token_type,
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.secret.as_bytes()),
        )
        .map_err(|e| {
            error!("Failed to encode JWT token: {}", e);
            SecurityError::Encoding(e.to_string())
        })?;

        // Log token generation (but not the token itself)
        info!("Generated {:?} token for user {}", token_type, user_id);
        debug!("Token expiration: {}", expiration);

        Ok(token)
    }

    /// Issue an access token and a refresh token
    pub fn issue_pair(&self, user_id: &str, role: Role) -> Result<TokenPair, SecurityError> {
        Ok(TokenPair {
            access_token: self.generate_token(user_id, role, TokenType::Access)?,
            refresh_token: self.generate_token(user_id, role, TokenType::Refresh)?,
            token_type: "Bearer".to_string(),
            expires_in: self.access_ttl_seconds(),
        })
    }

    /// Validate a JWT token of either type and return the decoded claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, SecurityError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_issuer(&[self.config.issuer.as_str()]);

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => SecurityError::TokenExpired,
            jsonwebtoken::errors::ErrorKind::InvalidIssuer => SecurityError::InvalidIssuer,
            jsonwebtoken::errors::ErrorKind::InvalidToken => SecurityError::InvalidToken,
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                SecurityError::TokenValidation("Invalid signature".to_string())
            }
            _ => SecurityError::TokenValidation(e.to_string()),
        })?;

        if self.blacklist.is_revoked(&token_data.claims.jti) {
            debug!("Token {} for user {} is revoked", token_data.claims.jti, token_data.claims.sub);
            return Err(SecurityError::TokenRevoked);
        }

        Ok(token_data.claims)
    }

    /// Validate a token and require it to be an access token
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, SecurityError> {
        self.validate_typed(token, TokenType::Access)
    }

    /// Validate a token and require it to be a refresh token
    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, SecurityError> {
        self.validate_typed(token, TokenType::Refresh)
    }

    fn validate_typed(&self, token: &str, expected: TokenType) -> Result<Claims, SecurityError> {
        let claims = self.validate_token(token)?;
        if claims.token_type != expected {
            return Err(SecurityError::WrongTokenType { expected });
        }
        Ok(claims)
    }

    /// Revoke a single token until it would have expired anyway
    pub fn revoke(&self, claims: &Claims) {
        let expiration = UNIX_EPOCH + StdDuration::from_secs(claims.exp.max(0) as u64);
        let expiration = expiration.max(SystemTime::now());
        self.blacklist.revoke_token(&claims.jti, expiration);
        info!("Revoked {:?} token {} for user {}", claims.token_type, claims.jti, claims.sub);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(TokenConfig::new("unit-test-secret"))
    }

    #[test]
    fn test_generate_and_validate_access_token() {
        let tokens = service();
        let token = tokens.generate_token("user-1", Role::Provider, TokenType::Access).unwrap();

        let claims = tokens.validate_access_token(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.role, Role::Provider);
        assert_eq!(claims.iss, "health-bridge-api");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_token_type_is_enforced() {
        let tokens = service();
        let pair = tokens.issue_pair("user-1", Role::Patient).unwrap();

        assert!(matches!(
            tokens.validate_access_token(&pair.refresh_token),
            Err(SecurityError::WrongTokenType { expected: TokenType::Access })
        ));
        assert!(tokens.validate_refresh_token(&pair.refresh_token).is_ok());
        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 15 * 60);
    }

    #[test]
    fn test_revocation_is_per_token() {
        let tokens = service();
        let first = tokens.generate_token("user-1", Role::Patient, TokenType::Access).unwrap();
        let second = tokens.generate_token("user-1", Role::Patient, TokenType::Access).unwrap();

        let claims = tokens.validate_token(&first).unwrap();
        tokens.revoke(&claims);

        assert!(matches!(tokens.validate_token(&first), Err(SecurityError::TokenRevoked)));
        assert!(tokens.validate_token(&second).is_ok());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let mut config = TokenConfig::new("unit-test-secret");
        config.access_ttl = Duration::seconds(-10);
        let tokens = TokenService::new(config);

        let token = tokens.generate_token("user-1", Role::Patient, TokenType::Access).unwrap();
        assert!(matches!(tokens.validate_token(&token), Err(SecurityError::TokenExpired)));
    }

    #[test]
    fn test_wrong_secret_and_issuer_rejected() {
        let token = service().generate_token("user-1", Role::Admin, TokenType::Access).unwrap();

        let other_secret = TokenService::new(TokenConfig::new("another-secret"));
        assert!(matches!(
            other_secret.validate_token(&token),
            Err(SecurityError::TokenValidation(_))
        ));

        let mut config = TokenConfig::new("unit-test-secret");
        config.issuer = "someone-else".to_string();
        assert!(matches!(
            TokenService::new(config).validate_token(&token),
            Err(SecurityError::InvalidIssuer)
        ));

        assert!(service().validate_token("not-a-jwt").is_err());
    }
}
