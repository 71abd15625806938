use axum::{
    middleware,
    routing::{get, patch, post},
    Extension, Router,
};
use tracing::debug;

use crate::api::handlers::{
    appointments, auth, billing, consultations, health, learning, monitoring, policies, surveys, sync, users,
    wellness,
};
use crate::api::AppState;
use crate::openapi::configure_swagger_routes;
use health_bridge_domain::auth::authorize::require_role;
use health_bridge_domain::auth::{auth_middleware, configure_security};
use health_bridge_domain::models::Role;

/// Create the application router
pub fn create_app(state: AppState) -> Router {
    debug!("Creating application router");

    let authenticated = middleware::from_fn_with_state(state.tokens.clone(), auth_middleware);

    // Admin-only routes; the role guard runs after authentication
    let admin_routes = Router::new()
        .route("/admin/users", get(users::list_users).post(users::create_user))
        .route("/admin/users/:id/status", patch(users::update_user_status))
        .route("/admin/monitoring/stats", get(monitoring::system_stats))
        .route("/admin/monitoring/audit", get(monitoring::audit_log))
        .route("/admin/sync/process", post(sync::process_sync_queue))
        .route("/admin/policies/acknowledgements", get(policies::acknowledgement_counts))
        .layer(middleware::from_fn(require_role(Role::Admin)));

    debug!("Admin routes configured");

    // Set up API routes that require authentication
    let api_routes = Router::new()
        .route("/users/me", get(users::get_me).patch(users::update_me))
        .route("/providers", get(users::list_providers))
        .route(
            "/appointments",
            get(appointments::list_appointments).post(appointments::book_appointment),
        )
        .route("/appointments/:id", get(appointments::get_appointment))
        .route("/appointments/:id/status", patch(appointments::update_appointment_status))
        .route("/appointments/:id/reschedule", post(appointments::reschedule_appointment))
        .route("/invoices", get(billing::list_invoices).post(billing::create_invoice))
        .route("/invoices/:id", get(billing::get_invoice))
        .route("/invoices/:id/pay", post(billing::pay_invoice))
        .route("/invoices/:id/cancel", post(billing::cancel_invoice))
        .route("/consultations", post(consultations::create_consultation))
        .route(
            "/consultations/:id",
            get(consultations::get_consultation).patch(consultations::update_consultation),
        )
        .route("/patients/:id/consultations", get(consultations::list_patient_consultations))
        .route("/wellness", get(wellness::list_content).post(wellness::create_content))
        .route(
            "/wellness/:id",
            get(wellness::get_content)
                .patch(wellness::update_content)
                .delete(wellness::delete_content),
        )
        .route("/wellness/:id/publish", post(wellness::publish_content))
        .route("/wellness/:id/unpublish", post(wellness::unpublish_content))
        .route(
            "/assignments",
            get(learning::list_assignments).post(learning::create_assignment),
        )
        .route(
            "/assignments/:id",
            get(learning::get_assignment).patch(learning::update_assignment),
        )
        .route(
            "/assignments/:id/submissions",
            get(learning::list_assignment_submissions).post(learning::submit_assignment),
        )
        // Define specific routes before parametrized routes to avoid conflicts
        .route("/submissions/mine", get(learning::list_my_submissions))
        .route("/submissions/:id", get(learning::get_submission))
        .route("/submissions/:id/grade", post(learning::grade_submission))
        .route("/surveys", get(surveys::list_surveys).post(surveys::create_survey))
        .route("/surveys/:id", get(surveys::get_survey))
        .route("/surveys/:id/activate", post(surveys::activate_survey))
        .route("/surveys/:id/close", post(surveys::close_survey))
        .route("/surveys/:id/responses", post(surveys::respond_to_survey))
        .route("/surveys/:id/results", get(surveys::survey_results))
        .route("/policies", get(policies::list_policies).post(policies::create_policy))
        .route("/policies/pending", get(policies::pending_policies))
        .route("/policies/:id", get(policies::get_policy))
        .route("/policies/:id/acknowledge", post(policies::acknowledge_policy))
        .route("/sync/batch", post(sync::upload_batch))
        .route("/sync/status", get(sync::sync_status))
        .merge(admin_routes)
        .layer(authenticated.clone());

    debug!("API routes configured");

    // Set up public routes that don't require authentication
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh_token))
        .layer(Extension(state.health.clone()));

    debug!("Public routes configured");

    let auth_routes = Router::new()
        .route("/auth/info", get(auth::auth_info))
        .route("/auth/logout", post(auth::logout))
        .layer(authenticated);

    debug!("Auth routes configured");

    let app = Router::new()
        .merge(public_routes)
        .merge(auth_routes)
        .nest("/api/v1", api_routes)
        .with_state(state);

    debug!("Base routes merged");

    // Configure the Swagger UI using the helper function
    let app = add_swagger_ui(app);

    // Apply security configuration
    let app = configure_security(app);
    debug!("Security configuration applied");

    // Initialize health check service startup time
    health::initialize_server_start_time();

    app
}

/// Add Swagger UI to the router
pub fn add_swagger_ui(app: Router) -> Router {
    app.merge(configure_swagger_routes())
}
