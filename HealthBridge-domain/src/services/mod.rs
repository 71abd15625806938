// Business services. Each takes the caller's `UserInfo` and enforces its own
// access rules, so HTTP handlers and the sync worker share one code path.

pub mod appointments;
pub mod billing;
pub mod booking;
pub mod consultations;
pub mod learning;
pub mod monitoring;
pub mod payments;
pub mod policies;
pub mod surveys;
pub mod sync;
pub mod users;
pub mod wellness;

use std::sync::Arc;

use crate::access::AccessControl;
use crate::auth::token::TokenService;
use crate::crypto::FieldEncryptor;
use health_bridge_data::database::DatabasePool;
use health_bridge_data::repository::{
    AppointmentRepository, AuditRepository, ConsultationRepository, InvoiceRepository, LearningRepository,
    PolicyRepository, SqliteAppointmentRepository, SqliteAuditRepository, SqliteConsultationRepository,
    SqliteInvoiceRepository, SqliteLearningRepository, SqlitePolicyRepository, SqliteStatsRepository,
    SqliteSurveyRepository, SqliteSyncRepository, SqliteUserRepository, SqliteWellnessRepository,
    StatsRepository, SurveyRepository, SyncRepository, UserRepository, WellnessRepository,
};

pub use appointments::AppointmentService;
pub use billing::{BillingConfig, BillingService, PaymentAttempt};
pub use booking::{BookingService, PAYMENT_FAILED_MESSAGE};
pub use consultations::ConsultationService;
pub use learning::LearningService;
pub use monitoring::MonitoringService;
pub use payments::{PaymentError, PaymentGateway, SimulatedPaymentGateway};
pub use policies::PolicyService;
pub use surveys::SurveyService;
pub use sync::{SyncConfig, SyncService};
pub use users::UserService;
pub use wellness::WellnessService;

/// Tunables for the services that have any
#[derive(Debug, Clone, Default)]
pub struct ServicesConfig {
    pub billing: BillingConfig,
    pub sync: SyncConfig,
}

impl ServicesConfig {
    pub fn from_env() -> Self {
        Self {
            billing: BillingConfig::from_env(),
            sync: SyncConfig::from_env(),
        }
    }
}

/// Every service, wired to SQLite repositories over one pool
#[derive(Clone)]
pub struct Services {
    pub users: Arc<UserService>,
    pub appointments: Arc<AppointmentService>,
    pub billing: Arc<BillingService>,
    pub booking: Arc<BookingService>,
    pub consultations: Arc<ConsultationService>,
    pub wellness: Arc<WellnessService>,
    pub learning: Arc<LearningService>,
    pub surveys: Arc<SurveyService>,
    pub policies: Arc<PolicyService>,
    pub monitoring: Arc<MonitoringService>,
    pub sync: Arc<SyncService>,
}

impl Services {
    pub fn new(
        pool: DatabasePool,
        tokens: Arc<TokenService>,
        encryptor: FieldEncryptor,
        gateway: Arc<dyn PaymentGateway>,
        config: ServicesConfig,
    ) -> Self {
        let user_repo: Arc<dyn UserRepository> = Arc::new(SqliteUserRepository::new(pool.clone()));
        let appointment_repo: Arc<dyn AppointmentRepository> = Arc::new(SqliteAppointmentRepository::new(pool.clone()));
        let invoice_repo: Arc<dyn InvoiceRepository> = Arc::new(SqliteInvoiceRepository::new(pool.clone()));
        let consultation_repo: Arc<dyn ConsultationRepository> =
            Arc::new(SqliteConsultationRepository::new(pool.clone()));
        let wellness_repo: Arc<dyn WellnessRepository> = Arc::new(SqliteWellnessRepository::new(pool.clone()));
        let learning_repo: Arc<dyn LearningRepository> = Arc::new(SqliteLearningRepository::new(pool.clone()));
        let survey_repo: Arc<dyn SurveyRepository> = Arc::new(SqliteSurveyRepository::new(pool.clone()));
        let policy_repo: Arc<dyn PolicyRepository> = Arc::new(SqlitePolicyRepository::new(pool.clone()));
        let stats_repo: Arc<dyn StatsRepository> = Arc::new(SqliteStatsRepository::new(pool.clone()));
        let audit_repo: Arc<dyn AuditRepository> = Arc::new(SqliteAuditRepository::new(pool.clone()));
        let sync_repo: Arc<dyn SyncRepository> = Arc::new(SqliteSyncRepository::new(pool));

        let users = Arc::new(UserService::new(user_repo.clone(), tokens));
        let appointments = Arc::new(AppointmentService::new(
            appointment_repo.clone(),
            user_repo.clone(),
            invoice_repo.clone(),
        ));
        let billing = Arc::new(BillingService::new(
            invoice_repo,
            appointment_repo.clone(),
            user_repo.clone(),
            gateway,
            config.billing,
        ));
        let booking = Arc::new(BookingService::new(appointments.clone(), billing.clone()));
        let consultations = Arc::new(ConsultationService::new(
            consultation_repo,
            appointment_repo.clone(),
            AccessControl::new(appointment_repo),
            Arc::new(encryptor),
        ));
        let wellness = Arc::new(WellnessService::new(wellness_repo));
        let learning = Arc::new(LearningService::new(learning_repo));
        let surveys = Arc::new(SurveyService::new(survey_repo));
        let policies = Arc::new(PolicyService::new(policy_repo));
        let monitoring = Arc::new(MonitoringService::new(stats_repo, audit_repo));
        let sync = Arc::new(SyncService::new(
            sync_repo,
            user_repo,
            appointments.clone(),
            surveys.clone(),
            learning.clone(),
            policies.clone(),
            config.sync,
        ));

        Self {
            users,
            appointments,
            billing,
            booking,
            consultations,
            wellness,
            learning,
            surveys,
            policies,
            monitoring,
            sync,
        }
    }
}
