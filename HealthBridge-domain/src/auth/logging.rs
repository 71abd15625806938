use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

#[cfg(feature = "db-logging")]
use tracing::{debug, error};

/// Types of authentication events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthEventType {
    /// User login attempt
    Login,
    /// User logout
    Logout,
    /// Token refresh
    TokenRefresh,
    /// Token revocation
    TokenRevocation,
    /// User registration
    Registration,
    /// Failed login attempt
    FailedLogin,
    /// Access denied to resource
    AccessDenied,
    /// Token validation
    TokenValidation,
    /// Account created or changed by an admin
    AccountChange,
}

impl std::fmt::Display for AuthEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthEventType::Login => write!(f, "LOGIN"),
            AuthEventType::Logout => write!(f, "LOGOUT"),
            AuthEventType::TokenRefresh => write!(f, "TOKEN_REFRESH"),
            AuthEventType::TokenRevocation => write!(f, "TOKEN_REVOCATION"),
            AuthEventType::Registration => write!(f, "REGISTRATION"),
            AuthEventType::FailedLogin => write!(f, "FAILED_LOGIN"),
            AuthEventType::AccessDenied => write!(f, "ACCESS_DENIED"),
            AuthEventType::TokenValidation => write!(f, "TOKEN_VALIDATION"),
            AuthEventType::AccountChange => write!(f, "ACCOUNT_CHANGE"),
        }
    }
}

/// Authentication event record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthEvent {
    pub event_type: AuthEventType,
    /// User ID (if available)
    pub user_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub success: bool,
    pub details: Option<String>,
    /// The resource being accessed (if applicable)
    pub resource: Option<String>,
    /// Duration of the operation in milliseconds
    pub duration_ms: Option<u64>,
    /// Authentication method used (password, jwt, refresh_token)
    pub auth_method: Option<String>,
}

impl AuthEvent {
    pub fn new(event_type: AuthEventType, user_id: Option<&str>, success: bool) -> Self {
        Self {
            event_type,
            user_id: user_id.map(String::from),
            timestamp: Utc::now(),
            ip_address: None,
            user_agent: None,
            success,
            details: None,
            resource: None,
            duration_ms: None,
            auth_method: None,
        }
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_auth_method(mut self, auth_method: impl Into<String>) -> Self {
        self.auth_method = Some(auth_method.into());
        self
    }
}

/// Log an authentication event to tracing and, with `db-logging`, to `audit_logs`
pub fn log_auth_event(event: AuthEvent) {
    let user_id_str = event.user_id.as_deref().unwrap_or("anonymous");
    let status = if event.success { "SUCCESS" } else { "FAILURE" };
    let details = event.details.as_deref().unwrap_or("");

    info!(
        "AUTH-LOG [{}] [{}] [{}] [{}] {}",
        event.event_type,
        user_id_str,
        status,
        event.timestamp.to_rfc3339(),
        details
    );

    #[cfg(feature = "db-logging")]
    store_auth_event_in_database(&event);
}

#[cfg(feature = "db-logging")]
fn store_auth_event_in_database(event: &AuthEvent) {
    use health_bridge_data::database::get_db_pool;
    use health_bridge_data::models::NewAuditLog;
    use health_bridge_data::repository::SqliteAuditRepository;

    // Before start-up (and in unit tests) there is no global pool
    let pool = match get_db_pool() {
        Ok(pool) => pool,
        Err(_) => {
            debug!("Database pool not initialised, auth event not persisted");
            return;
        }
    };

    let record = NewAuditLog {
        event_type: event.event_type.to_string(),
        user_id: event.user_id.clone(),
        success: event.success,
        resource: event.resource.clone(),
        details: event.details.clone(),
        auth_method: event.auth_method.clone(),
        created_at: event.timestamp,
    };

    if let Err(e) = SqliteAuditRepository::new(pool).insert_blocking(record) {
        error!("Failed to store auth event in database: {}", e);
    }
}

pub fn log_successful_login(user_id: &str, ip_address: Option<&str>, user_agent: Option<&str>) {
    let mut event = AuthEvent::new(AuthEventType::Login, Some(user_id), true).with_auth_method("password");

    if let Some(ip) = ip_address {
        event = event.with_ip(ip);
    }
    if let Some(ua) = user_agent {
        event = event.with_user_agent(ua);
    }

    log_auth_event(event);
}

/// Log a failed login attempt. `username` is the email that was tried.
pub fn log_failed_login(username: &str, ip_address: Option<&str>, reason: &str) {
    let mut event = AuthEvent::new(AuthEventType::FailedLogin, Some(username), false)
        .with_details(reason)
        .with_auth_method("password");

    if let Some(ip) = ip_address {
        event = event.with_ip(ip);
    }

    log_auth_event(event);
}

pub fn log_registration(user_id: &str, role: &str) {
    let event = AuthEvent::new(AuthEventType::Registration, Some(user_id), true)
        .with_details(format!("Registered with role {}", role))
        .with_auth_method("password");
    log_auth_event(event);
}

pub fn log_token_refresh(user_id: &str, success: bool, details: Option<&str>) {
    let mut event = AuthEvent::new(AuthEventType::TokenRefresh, Some(user_id), success)
        .with_auth_method("refresh_token");

    if let Some(d) = details {
        event = event.with_details(d);
    }

    log_auth_event(event);
}

pub fn log_logout(user_id: &str) {
    let event = AuthEvent::new(AuthEventType::Logout, Some(user_id), true);
    log_auth_event(event);
}

pub fn log_token_revocation(user_id: &str, reason: Option<&str>) {
    let mut event = AuthEvent::new(AuthEventType::TokenRevocation, Some(user_id), true);

    if let Some(r) = reason {
        event = event.with_details(r);
    }

    log_auth_event(event);
}

pub fn log_account_change(admin_id: &str, target_user_id: &str, details: &str) {
    let event = AuthEvent::new(AuthEventType::AccountChange, Some(admin_id), true)
        .with_resource(format!("user:{}", target_user_id))
        .with_details(details);
    log_auth_event(event);
}

pub fn log_access_denied(user_id: &str, resource: &str, required_roles: &[String]) {
    let details = format!("Required roles: {}", required_roles.join(", "));

    let event = AuthEvent::new(AuthEventType::AccessDenied, Some(user_id), false)
        .with_resource(resource)
        .with_details(details);

    log_auth_event(event);
}
