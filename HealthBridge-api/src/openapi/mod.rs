use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

/// Configure Swagger UI endpoints
pub fn configure_swagger_routes() -> SwaggerUi {
    SwaggerUi::new("/api-docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}

/// Registers the bearer JWT scheme referenced by `security(("bearer" = []))`
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

// API Documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        // Health endpoints
        crate::api::handlers::health::health_check,

        // Auth endpoints
        crate::api::handlers::auth::register,
        crate::api::handlers::auth::login,
        crate::api::handlers::auth::refresh_token,
        crate::api::handlers::auth::logout,
        crate::api::handlers::auth::auth_info,

        // Users
        crate::api::handlers::users::get_me,
        crate::api::handlers::users::update_me,
        crate::api::handlers::users::list_providers,
        crate::api::handlers::users::create_user,
        crate::api::handlers::users::list_users,
        crate::api::handlers::users::update_user_status,

        // Appointments
        crate::api::handlers::appointments::book_appointment,
        crate::api::handlers::appointments::list_appointments,
        crate::api::handlers::appointments::get_appointment,
        crate::api::handlers::appointments::update_appointment_status,
        crate::api::handlers::appointments::reschedule_appointment,

        // Billing
        crate::api::handlers::billing::create_invoice,
        crate::api::handlers::billing::list_invoices,
        crate::api::handlers::billing::get_invoice,
        crate::api::handlers::billing::pay_invoice,
        crate::api::handlers::billing::cancel_invoice,

        // Consultations
        crate::api::handlers::consultations::create_consultation,
        crate::api::handlers::consultations::get_consultation,
        crate::api::handlers::consultations::update_consultation,
        crate::api::handlers::consultations::list_patient_consultations,

        // Wellness
        crate::api::handlers::wellness::create_content,
        crate::api::handlers::wellness::list_content,
        crate::api::handlers::wellness::get_content,
        crate::api::handlers::wellness::update_content,
        crate::api::handlers::wellness::publish_content,
        crate::api::handlers::wellness::unpublish_content,
        crate::api::handlers::wellness::delete_content,

        // Learning
        crate::api::handlers::learning::create_assignment,
        crate::api::handlers::learning::list_assignments,
        crate::api::handlers::learning::get_assignment,
        crate::api::handlers::learning::update_assignment,
        crate::api::handlers::learning::submit_assignment,
        crate::api::handlers::learning::list_assignment_submissions,
        crate::api::handlers::learning::list_my_submissions,
        crate::api::handlers::learning::get_submission,
        crate::api::handlers::learning::grade_submission,

        // Surveys
        crate::api::handlers::surveys::create_survey,
        crate::api::handlers::surveys::list_surveys,
        crate::api::handlers::surveys::get_survey,
        crate::api::handlers::surveys::activate_survey,
        crate::api::handlers::surveys::close_survey,
        crate::api::handlers::surveys::respond_to_survey,
        crate::api::handlers::surveys::survey_results,

        // Policies
        crate::api::handlers::policies::create_policy,
        crate::api::handlers::policies::list_policies,
        crate::api::handlers::policies::pending_policies,
        crate::api::handlers::policies::get_policy,
        crate::api::handlers::policies::acknowledge_policy,
        crate::api::handlers::policies::acknowledgement_counts,

        // Monitoring
        crate::api::handlers::monitoring::system_stats,
        crate::api::handlers::monitoring::audit_log,

        // Offline sync
        crate::api::handlers::sync::upload_batch,
        crate::api::handlers::sync::sync_status,
        crate::api::handlers::sync::process_sync_queue
    ),
    components(
        schemas(
            // API entities
            crate::entities::ErrorResponse,
            crate::entities::AppointmentPaginatedResponse,
            crate::entities::auth::LogoutRequest,
            crate::entities::auth::MessageResponse,
            crate::entities::auth::AuthInfoResponse,
            crate::entities::queries::UserListQuery,
            crate::entities::queries::SyncProcessQuery,

            // Health handlers
            crate::api::handlers::health::HealthResponse,
            crate::api::handlers::health::ComponentHealthStatus,

            // Auth and users
            health_bridge_domain::auth::UserInfo,
            health_bridge_domain::auth::token::TokenPair,
            health_bridge_domain::entities::RegisterRequest,
            health_bridge_domain::entities::LoginRequest,
            health_bridge_domain::entities::RefreshRequest,
            health_bridge_domain::entities::AuthResponse,
            health_bridge_domain::entities::UserProfile,
            health_bridge_domain::entities::ProviderSummary,
            health_bridge_domain::entities::UpdateProfileRequest,
            health_bridge_domain::entities::CreateUserRequest,
            health_bridge_domain::entities::UpdateUserStatusRequest,
            health_bridge_domain::models::Role,

            // Appointments and billing
            health_bridge_domain::entities::BookAppointmentRequest,
            health_bridge_domain::entities::PaymentDetails,
            health_bridge_domain::entities::BookingOutcome,
            health_bridge_domain::entities::PaymentStatus,
            health_bridge_domain::entities::UpdateAppointmentStatusRequest,
            health_bridge_domain::entities::RescheduleRequest,
            health_bridge_domain::entities::AppointmentListQuery,
            health_bridge_domain::entities::CreateInvoiceRequest,
            health_bridge_domain::entities::PayInvoiceRequest,
            health_bridge_domain::entities::InvoiceQuery,
            health_bridge_domain::models::Appointment,
            health_bridge_domain::models::AppointmentStatus,
            health_bridge_domain::models::AppointmentMode,
            health_bridge_domain::models::Invoice,
            health_bridge_domain::models::InvoiceStatus,

            // Consultations
            health_bridge_domain::entities::CreateConsultationRequest,
            health_bridge_domain::entities::UpdateConsultationRequest,
            health_bridge_domain::entities::ConsultationView,

            // Wellness
            health_bridge_domain::entities::CreateWellnessRequest,
            health_bridge_domain::entities::UpdateWellnessRequest,
            health_bridge_domain::entities::WellnessQuery,
            health_bridge_domain::models::WellnessContent,
            health_bridge_domain::models::ContentStatus,

            // Learning
            health_bridge_domain::entities::CreateAssignmentRequest,
            health_bridge_domain::entities::UpdateAssignmentRequest,
            health_bridge_domain::entities::SubmitAssignmentRequest,
            health_bridge_domain::entities::GradeSubmissionRequest,
            health_bridge_domain::models::Assignment,
            health_bridge_domain::models::Submission,

            // Surveys
            health_bridge_domain::entities::CreateSurveyRequest,
            health_bridge_domain::entities::SubmitSurveyResponseRequest,
            health_bridge_domain::entities::SurveyQuery,
            health_bridge_domain::entities::SurveyResults,
            health_bridge_domain::entities::QuestionResult,
            health_bridge_domain::models::Survey,
            health_bridge_domain::models::SurveyQuestion,
            health_bridge_domain::models::SurveyResponse,
            health_bridge_domain::models::SurveyStatus,
            health_bridge_domain::models::QuestionType,

            // Policies
            health_bridge_domain::entities::CreatePolicyRequest,
            health_bridge_domain::models::Policy,
            health_bridge_domain::models::PolicyAcknowledgement,
            health_bridge_domain::models::PolicyAcknowledgementCount,

            // Monitoring
            health_bridge_domain::entities::AuditQuery,
            health_bridge_domain::models::SystemStats,
            health_bridge_domain::models::GroupCount,
            health_bridge_domain::models::InvoiceTotal,
            health_bridge_domain::models::AuditLog,

            // Offline sync
            health_bridge_domain::entities::SyncOperationRequest,
            health_bridge_domain::entities::SyncBatchRequest,
            health_bridge_domain::entities::SyncBatchResponse,
            health_bridge_domain::entities::SyncReport,
            health_bridge_domain::models::SyncEntry,
            health_bridge_domain::models::SyncStatus
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoint"),
        (name = "Authentication", description = "Registration, login and token management"),
        (name = "users", description = "Profiles and provider directory"),
        (name = "appointments", description = "Booking and appointment lifecycle"),
        (name = "billing", description = "Invoices and payments"),
        (name = "consultations", description = "Encrypted consultation notes"),
        (name = "wellness", description = "Wellness articles and media"),
        (name = "learning", description = "Assignments and submissions"),
        (name = "surveys", description = "Research surveys"),
        (name = "policies", description = "Policies and acknowledgements"),
        (name = "sync", description = "Offline operation upload"),
        (name = "admin", description = "Administration and monitoring")
    ),
    info(
        title = "HealthBridge Namibia API",
        version = "0.1.0",
        description = "Telehealth, wellness and health education platform API",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        ),
    ),
    servers(
        (url = "/", description = "Local development server")
    )
)]
pub struct ApiDoc;
