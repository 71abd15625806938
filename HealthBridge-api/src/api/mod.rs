pub mod handlers;
pub mod routes;

use std::sync::Arc;

use axum::Router;

use health_bridge_domain::auth::token::TokenService;
use health_bridge_domain::health::HealthServiceTrait;
use health_bridge_domain::services::Services;

/// Health service as stored in request extensions
pub type SharedHealthService = Arc<dyn HealthServiceTrait>;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub tokens: Arc<TokenService>,
    pub health: SharedHealthService,
}

impl AppState {
    pub fn new(services: Services, tokens: Arc<TokenService>, health: SharedHealthService) -> Self {
        Self {
            services,
            tokens,
            health,
        }
    }
}

/// Create the application router
pub fn create_application(state: AppState) -> Router {
    routes::create_app(state)
}
