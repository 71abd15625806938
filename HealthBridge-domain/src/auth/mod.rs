//! Authentication for the HealthBridge API
//!
//! JWT access/refresh tokens, a revocation list, role-based route guards,
//! password hashing and auth event logging.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

#[cfg(feature = "with-api")]
use utoipa::ToSchema;

use crate::auth::logging::{log_auth_event, AuthEvent, AuthEventType};
use crate::auth::token::{SecurityError, TokenService, TokenType};
use health_bridge_data::models::Role;

// JWT signing and validation
pub mod token;

// Token blacklist for revocation
pub mod token_blacklist;

// Role-based route guards
pub mod authorize;

// Argon2 password hashing
pub mod password;

// Auth event logging
pub mod logging;

/// Claims carried by every HealthBridge JWT
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Issuer
    pub iss: String,
    /// Issued at (as timestamp)
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
    pub role: Role,
    pub token_type: TokenType,
    /// Unique token id, used for revocation
    pub jti: String,
}

/// Authenticated caller, inserted into request extensions by [`auth_middleware`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct UserInfo {
    pub user_id: String,
    pub role: Role,
    /// Authentication source, "jwt" for bearer tokens
    pub auth_source: String,
}

impl UserInfo {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            auth_source: "jwt".to_string(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }
}

impl From<&Claims> for UserInfo {
    fn from(claims: &Claims) -> Self {
        Self::new(claims.sub.clone(), claims.role)
    }
}

/// Pull the bearer token out of an `Authorization` header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, &'static str> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or("Missing Authorization header")?
        .to_str()
        .map_err(|_| "Invalid Authorization header format")?;

    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err("Authorization header does not contain Bearer token"),
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": "unauthorized",
            "message": message
        })),
    )
        .into_response()
}

fn failure_message(error: &SecurityError) -> &'static str {
    match error {
        SecurityError::TokenExpired => "Token has expired",
        SecurityError::TokenRevoked => "Token has been revoked",
        SecurityError::WrongTokenType { .. } => "An access token is required",
        _ => "Invalid token",
    }
}

/// Authentication middleware for protected routes.
///
/// Requires `Authorization: Bearer <access token>`. On success the request
/// carries [`UserInfo`] and [`Claims`] extensions.
pub async fn auth_middleware(
    State(tokens): State<Arc<TokenService>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let request_path = req.uri().path().to_string();
    let start_time = std::time::Instant::now();

    let token = match bearer_token(req.headers()) {
        Ok(token) => token.to_string(),
        Err(reason) => {
            debug!("Rejected request to {}: {}", request_path, reason);

            let event = AuthEvent::new(AuthEventType::TokenValidation, None, false)
                .with_details(reason)
                .with_resource(request_path)
                .with_duration(start_time.elapsed().as_millis() as u64)
                .with_auth_method("jwt");
            log_auth_event(event);

            return unauthorized(reason);
        }
    };

    match tokens.validate_access_token(&token) {
        Ok(claims) => {
            debug!("Token validated for user: {}", claims.sub);

            let user_info = UserInfo::from(&claims);
            req.extensions_mut().insert(user_info);
            req.extensions_mut().insert(claims);

            next.run(req).await
        }
        Err(e) => {
            warn!("Token validation failed for {}: {}", request_path, e);

            let event = AuthEvent::new(AuthEventType::TokenValidation, None, false)
                .with_details(e.to_string())
                .with_resource(request_path)
                .with_duration(start_time.elapsed().as_millis() as u64)
                .with_auth_method("jwt");
            log_auth_event(event);

            unauthorized(failure_message(&e))
        }
    }
}

/// Apply CORS and security headers to the application
pub fn configure_security(app: axum::Router) -> axum::Router {
    use axum::http::{HeaderName, HeaderValue, Method};
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::set_header::SetResponseHeaderLayer;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(std::time::Duration::from_secs(3600));

    let security_headers = tower::ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::if_not_present(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=63072000; includeSubDomains; preload"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(
                "default-src 'self'; script-src 'self'; connect-src 'self'; img-src 'self' data:; style-src 'self' 'unsafe-inline'; frame-ancestors 'none'; base-uri 'self'",
            ),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("permissions-policy"),
            HeaderValue::from_static("camera=(self), microphone=(self), geolocation=()"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("cross-origin-opener-policy"),
            HeaderValue::from_static("same-origin"),
        ));

    app.layer(cors).layer(security_headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::TokenConfig;
    use axum::{middleware, routing::get, Extension, Router};
    use tower::ServiceExt;

    fn app(tokens: Arc<TokenService>) -> Router {
        Router::new()
            .route(
                "/me",
                get(|Extension(user): Extension<UserInfo>| async move { user.user_id }),
            )
            .layer(middleware::from_fn_with_state(tokens, auth_middleware))
    }

    fn request(token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/me");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert!(bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, "Bearer abc.def".parse().unwrap());
        assert_eq!(bearer_token(&headers), Ok("abc.def"));
    }

    #[tokio::test]
    async fn test_middleware_accepts_access_token() {
        let tokens = Arc::new(TokenService::new(TokenConfig::new("middleware-secret")));
        let token = tokens.generate_token("user-42", Role::Patient, TokenType::Access).unwrap();

        let response = app(tokens).oneshot(request(Some(&token))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"user-42");
    }

    #[tokio::test]
    async fn test_middleware_rejects_missing_refresh_and_revoked_tokens() {
        let tokens = Arc::new(TokenService::new(TokenConfig::new("middleware-secret")));

        let response = app(tokens.clone()).oneshot(request(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let refresh = tokens.generate_token("user-42", Role::Patient, TokenType::Refresh).unwrap();
        let response = app(tokens.clone()).oneshot(request(Some(&refresh))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let access = tokens.generate_token("user-42", Role::Patient, TokenType::Access).unwrap();
        let claims = tokens.validate_token(&access).unwrap();
        tokens.revoke(&claims);
        let response = app(tokens).oneshot(request(Some(&access))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_security_headers_are_applied() {
        let router = configure_security(Router::new().route("/ping", get(|| async { "pong" })));
        let response = router
            .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.headers().get(header::X_FRAME_OPTIONS).unwrap(), "DENY");
        assert_eq!(response.headers().get(header::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
    }
}
