use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use futures::future::BoxFuture;
use serde_json::json;
use tracing::{debug, warn};

use crate::auth::logging::{log_access_denied, log_auth_event, AuthEvent, AuthEventType};
use crate::auth::UserInfo;
use health_bridge_data::models::Role;

/// Middleware for role-based access control.
///
/// Lets the request through when the authenticated user holds one of
/// `required_roles`, otherwise responds 403. Must run after `auth_middleware`.
pub async fn require_roles(req: Request<Body>, next: Next, required_roles: Vec<Role>) -> Response {
    let request_path = req.uri().path().to_string();

    match req.extensions().get::<UserInfo>() {
        Some(user) if user.has_any_role(&required_roles) => {
            debug!("User {} has required role for {}", user.user_id, request_path);
            next.run(req).await
        }
        Some(user) => {
            let required: Vec<String> = required_roles.iter().map(|r| r.to_string()).collect();
            warn!(
                "User {} ({}) lacks required roles {:?} for {}",
                user.user_id, user.role, required, request_path
            );
            log_access_denied(&user.user_id, &request_path, &required);

            (
                StatusCode::FORBIDDEN,
                Json(json!({
                    "error": "forbidden",
                    "message": "You don't have the required permissions to access this resource",
                    "required_roles": required
                })),
            )
                .into_response()
        }
        None => {
            // auth_middleware was not layered in front of this route
            warn!("No user info found in request extensions for path: {}", request_path);

            let event = AuthEvent::new(AuthEventType::AccessDenied, None, false)
                .with_details("Authentication context missing in request extensions")
                .with_resource(request_path)
                .with_auth_method("rbac");
            log_auth_event(event);

            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "internal_error",
                    "message": "Authentication context missing"
                })),
            )
                .into_response()
        }
    }
}

/// Middleware factory that requires a specific role, for `middleware::from_fn`
///
/// ```ignore
/// let admin_routes = Router::new()
///     .route("/stats", get(stats))
///     .layer(middleware::from_fn(require_role(Role::Admin)));
/// ```
pub fn require_role(
    role: Role,
) -> impl Fn(Request<Body>, Next) -> BoxFuture<'static, Response> + Clone + Send + Sync + 'static {
    require_any_role(&[role])
}

/// Middleware factory that requires any of the given roles
pub fn require_any_role(
    roles: &[Role],
) -> impl Fn(Request<Body>, Next) -> BoxFuture<'static, Response> + Clone + Send + Sync + 'static {
    let roles: Vec<Role> = roles.to_vec();
    move |req, next| {
        let roles = roles.clone();
        Box::pin(async move { require_roles(req, next, roles).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::get, Extension, Router};
    use tower::ServiceExt;

    fn guarded(roles: &[Role]) -> Router {
        Router::new()
            .route("/reports", get(|| async { "ok" }))
            .layer(middleware::from_fn(require_any_role(roles)))
    }

    fn request() -> Request<Body> {
        Request::builder().uri("/reports").body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_require_roles_with_matching_role() {
        let app = guarded(&[Role::Admin, Role::Researcher])
            .layer(Extension(UserInfo::new("researcher-1", Role::Researcher)));

        let response = app.oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_require_roles_with_no_matching_role() {
        let app = Router::new()
            .route("/reports", get(|| async { "ok" }))
            .layer(middleware::from_fn(require_role(Role::Admin)))
            .layer(Extension(UserInfo::new("patient-1", Role::Patient)));

        let response = app.oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "forbidden");
        assert_eq!(json["required_roles"][0], "admin");
    }

    #[tokio::test]
    async fn test_missing_auth_context_is_internal_error() {
        let response = guarded(&[Role::Admin]).oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
