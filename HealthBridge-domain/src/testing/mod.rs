// Testing utilities and mock implementations for the domain layer
// This module is only available in tests or when the "mock" feature is enabled

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use once_cell::sync::Lazy;

use crate::auth::password::hash_password;
use crate::auth::token::{TokenConfig, TokenService};
use crate::auth::UserInfo;
use crate::crypto::{EncryptionConfig, FieldEncryptor};
use crate::health::{ComponentStatus, HealthComponent, HealthServiceTrait, SystemHealth, SystemStatus};
use crate::services::payments::{ChargeRequest, PaymentError, PaymentGateway, PaymentReceipt, SimulatedPaymentGateway};
use crate::services::{Services, ServicesConfig};
use health_bridge_data::database::DatabasePool;
use health_bridge_data::models::{Appointment, AppointmentMode, NewAppointment, NewUser, Role, User};
use health_bridge_data::repository::{
    AppointmentRepository, AuditRepository, ConsultationRepository, SqliteAppointmentRepository,
    SqliteAuditRepository, SqliteConsultationRepository, SqliteUserRepository, UserRepository,
};

/// Password of every user created through [`TestContext::user`]
pub const TEST_PASSWORD: &str = "Windhoek2024";
pub const TEST_JWT_SECRET: &str = "test-secret-key-for-health-bridge";
pub const TEST_ENCRYPTION_KEY: &str = "test-field-encryption-key";

/// Argon2 is slow on purpose; hash the shared test password once
static TEST_PASSWORD_HASH: Lazy<String> =
    Lazy::new(|| hash_password(TEST_PASSWORD).expect("hash test password"));

pub fn test_token_service() -> Arc<TokenService> {
    Arc::new(TokenService::new(TokenConfig::new(TEST_JWT_SECRET)))
}

/// Encryptor with a low iteration count to keep tests fast
pub fn test_encryptor() -> FieldEncryptor {
    let config = EncryptionConfig {
        secret: TEST_ENCRYPTION_KEY.to_string(),
        iterations: 1000,
    };
    FieldEncryptor::new(config).expect("test encryptor")
}

/// Gateway that declines every charge
#[derive(Debug, Clone, Default)]
pub struct FailingPaymentGateway;

#[async_trait]
impl PaymentGateway for FailingPaymentGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<PaymentReceipt, PaymentError> {
        Err(PaymentError::Declined(format!("card for invoice {} declined", request.invoice_id)))
    }
}

/// In-memory database with every service wired up
pub struct TestContext {
    pub pool: DatabasePool,
    pub tokens: Arc<TokenService>,
    pub services: Services,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_gateway(Arc::new(SimulatedPaymentGateway::new()))
    }

    pub fn with_gateway(gateway: Arc<dyn PaymentGateway>) -> Self {
        let pool = DatabasePool::in_memory().expect("in-memory database");
        let tokens = test_token_service();
        let services = Services::new(
            pool.clone(),
            tokens.clone(),
            test_encryptor(),
            gateway,
            ServicesConfig::default(),
        );
        Self { pool, tokens, services }
    }

    async fn create_user(&self, email: &str, role: Role, fee: Option<i64>) -> User {
        SqliteUserRepository::new(self.pool.clone())
            .create(NewUser {
                email: email.to_string(),
                password_hash: TEST_PASSWORD_HASH.clone(),
                full_name: email.split('@').next().unwrap_or(email).to_string(),
                role,
                phone: None,
                region: Some("Khomas".to_string()),
                consultation_fee_cents: fee,
            })
            .await
            .expect("seed user")
    }

    /// Active user with [`TEST_PASSWORD`]
    pub async fn user(&self, email: &str, role: Role) -> User {
        self.create_user(email, role, None).await
    }

    pub async fn provider_with_fee(&self, email: &str, fee_cents: i64) -> User {
        self.create_user(email, Role::Provider, Some(fee_cents)).await
    }

    pub fn info(&self, user: &User) -> UserInfo {
        UserInfo::new(user.id.clone(), user.role)
    }

    /// Bearer token for `user`
    pub fn access_token(&self, user: &User) -> String {
        self.tokens
            .issue_pair(&user.id, user.role)
            .expect("issue tokens")
            .access_token
    }

    /// Scheduled video appointment starting tomorrow
    pub async fn appointment_between(&self, patient: &User, provider: &User) -> Appointment {
        self.appointment_repo()
            .create(NewAppointment {
                patient_id: patient.id.clone(),
                provider_id: provider.id.clone(),
                scheduled_at: Utc::now() + Duration::days(1),
                duration_minutes: 30,
                mode: AppointmentMode::Video,
                reason: Some("Follow-up".to_string()),
            })
            .await
            .expect("seed appointment")
    }

    pub fn appointment_repo(&self) -> Arc<dyn AppointmentRepository> {
        Arc::new(SqliteAppointmentRepository::new(self.pool.clone()))
    }

    pub fn consultation_repo(&self) -> Arc<dyn ConsultationRepository> {
        Arc::new(SqliteConsultationRepository::new(self.pool.clone()))
    }

    pub fn audit_repo(&self) -> Arc<dyn AuditRepository> {
        Arc::new(SqliteAuditRepository::new(self.pool.clone()))
    }
}

/// Mock implementation of health services for testing system health
#[derive(Debug)]
pub struct MockHealthService {
    database_status: ComponentStatus,
    system_status: SystemStatus,
    /// Additional components
    components: HashMap<String, HealthComponent>,
}

impl Default for MockHealthService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHealthService {
    /// All components healthy
    pub fn new() -> Self {
        Self {
            database_status: ComponentStatus::Healthy,
            system_status: SystemStatus::Healthy,
            components: HashMap::new(),
        }
    }

    pub fn with_degraded_database(mut self) -> Self {
        self.database_status = ComponentStatus::Degraded;
        self.system_status = SystemStatus::Degraded;
        self
    }

    pub fn with_unhealthy_database(mut self) -> Self {
        self.database_status = ComponentStatus::Unhealthy;
        self.system_status = SystemStatus::Unhealthy;
        self
    }

    pub fn with_component(mut self, name: &str, status: ComponentStatus, details: Option<String>) -> Self {
        self.components.insert(name.to_string(), HealthComponent::new(status, details));
        self
    }
}

#[async_trait]
impl HealthServiceTrait for MockHealthService {
    async fn get_system_health(&self) -> SystemHealth {
        let mut components = self.components.clone();
        let details = match self.database_status {
            ComponentStatus::Healthy => None,
            ComponentStatus::Degraded => Some("Database is experiencing high load".to_string()),
            ComponentStatus::Unhealthy => Some("Database connection failed".to_string()),
        };
        components.insert(
            "database".to_string(),
            HealthComponent::new(self.database_status.clone(), details),
        );

        SystemHealth {
            status: self.system_status.clone(),
            components,
        }
    }

    async fn check_database_status(&self) -> Result<bool, String> {
        match self.database_status {
            ComponentStatus::Healthy | ComponentStatus::Degraded => Ok(true),
            ComponentStatus::Unhealthy => Err("Database connection failed".to_string()),
        }
    }
}
