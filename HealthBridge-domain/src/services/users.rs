use std::sync::Arc;

use tracing::{error, info, instrument, warn};
use validator::Validate;

use crate::access::ensure_role;
use crate::auth::logging::{
    log_account_change, log_failed_login, log_logout, log_registration, log_successful_login, log_token_refresh,
    log_token_revocation,
};
use crate::auth::password::{hash_password, validate_password_strength, verify_password};
use crate::auth::token::TokenService;
use crate::auth::{Claims, UserInfo};
use crate::entities::{
    AuthResponse, CreateUserRequest, LoginRequest, ProviderSummary, RegisterRequest, UpdateProfileRequest,
    UserProfile,
};
use crate::errors::ServiceError;
use health_bridge_data::models::{NewUser, Role, User, UserProfileUpdate};
use health_bridge_data::repository::UserRepository;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Accounts, credentials and tokens
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
    tokens: Arc<TokenService>,
}

fn hash(password: &str) -> Result<String, ServiceError> {
    validate_password_strength(password).map_err(ServiceError::Validation)?;
    hash_password(password).map_err(|e| {
        error!("Password hashing failed: {}", e);
        ServiceError::Internal("Could not hash password".to_string())
    })
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>, tokens: Arc<TokenService>) -> Self {
        Self { users, tokens }
    }

    fn auth_response(&self, user: User) -> Result<AuthResponse, ServiceError> {
        let tokens = self.tokens.issue_pair(&user.id, user.role)?;
        Ok(AuthResponse::new(tokens, user.into()))
    }

    async fn require_user(&self, id: &str) -> Result<User, ServiceError> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", id))
    }

    /// Self-registration for patients and students
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, ServiceError> {
        request.validate()?;

        let role = request.role.unwrap_or(Role::Patient);
        if !role.is_self_registrable() {
            return Err(ServiceError::Forbidden(format!(
                "{} accounts are created by an administrator",
                role
            )));
        }

        let user = self
            .users
            .create(NewUser {
                email: request.email,
                password_hash: hash(&request.password)?,
                full_name: request.full_name.trim().to_string(),
                role,
                phone: request.phone,
                region: request.region,
                consultation_fee_cents: None,
            })
            .await?;

        log_registration(&user.id, role.as_str());
        self.auth_response(user)
    }

    /// Password login. Unknown email, wrong password and inactive accounts
    /// all produce the same error.
    #[instrument(skip(self, request))]
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, ServiceError> {
        request.validate()?;

        let user = match self.users.find_by_email(&request.email).await? {
            Some(user) => user,
            None => {
                log_failed_login(&request.email, None, "Unknown email");
                return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()));
            }
        };

        let password_ok = verify_password(&request.password, &user.password_hash).unwrap_or_else(|e| {
            error!("Stored password hash for user {} is unreadable: {}", user.id, e);
            false
        });
        if !password_ok {
            log_failed_login(&request.email, None, "Wrong password");
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }
        if !user.is_active {
            log_failed_login(&request.email, None, "Account deactivated");
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        log_successful_login(&user.id, None, None);
        self.auth_response(user)
    }

    /// Exchange a refresh token for a new pair. The presented refresh token is revoked.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthResponse, ServiceError> {
        let claims = match self.tokens.validate_refresh_token(refresh_token) {
            Ok(claims) => claims,
            Err(e) => {
                warn!("Invalid refresh token: {}", e);
                log_token_refresh("unknown", false, Some(&e.to_string()));
                return Err(e.into());
            }
        };

        let user = match self.users.find_by_id(&claims.sub).await? {
            Some(user) if user.is_active => user,
            _ => {
                log_token_refresh(&claims.sub, false, Some("Account missing or deactivated"));
                return Err(ServiceError::Unauthorized("Account is not active".to_string()));
            }
        };

        self.tokens.revoke(&claims);
        log_token_refresh(&user.id, true, None);
        self.auth_response(user)
    }

    /// Revoke the access token of the current request, and the refresh token
    /// if one is supplied for the same user
    pub fn logout(&self, claims: &Claims, refresh_token: Option<&str>) {
        self.tokens.revoke(claims);

        if let Some(token) = refresh_token {
            match self.tokens.validate_refresh_token(token) {
                Ok(refresh) if refresh.sub == claims.sub => {
                    self.tokens.revoke(&refresh);
                    log_token_revocation(&claims.sub, Some("Refresh token revoked at logout"));
                }
                Ok(_) => warn!("Ignoring refresh token of another user at logout"),
                Err(e) => warn!("Ignoring invalid refresh token at logout: {}", e),
            }
        }

        log_logout(&claims.sub);
    }

    pub async fn me(&self, actor: &UserInfo) -> Result<UserProfile, ServiceError> {
        Ok(self.require_user(&actor.user_id).await?.into())
    }

    pub async fn update_profile(
        &self,
        actor: &UserInfo,
        request: UpdateProfileRequest,
    ) -> Result<UserProfile, ServiceError> {
        request.validate()?;
        let update = UserProfileUpdate {
            full_name: request.full_name.map(|n| n.trim().to_string()),
            phone: request.phone,
            region: request.region,
        };
        Ok(self.users.update_profile(&actor.user_id, update).await?.into())
    }

    /// Active providers, for the booking screen
    pub async fn list_providers(&self) -> Result<Vec<ProviderSummary>, ServiceError> {
        let providers = self.users.list(Some(Role::Provider), true).await?;
        Ok(providers.into_iter().map(ProviderSummary::from).collect())
    }

    pub async fn create_user(&self, actor: &UserInfo, request: CreateUserRequest) -> Result<UserProfile, ServiceError> {
        ensure_role(actor, &[Role::Admin])?;
        request.validate()?;

        let user = self
            .users
            .create(NewUser {
                email: request.email,
                password_hash: hash(&request.password)?,
                full_name: request.full_name.trim().to_string(),
                role: request.role,
                phone: request.phone,
                region: request.region,
                consultation_fee_cents: request.consultation_fee_cents,
            })
            .await?;

        log_account_change(&actor.user_id, &user.id, &format!("Created {} account", user.role));
        Ok(user.into())
    }

    pub async fn list_users(&self, actor: &UserInfo, role: Option<Role>) -> Result<Vec<UserProfile>, ServiceError> {
        ensure_role(actor, &[Role::Admin])?;
        let users = self.users.list(role, false).await?;
        Ok(users.into_iter().map(UserProfile::from).collect())
    }

    pub async fn set_user_status(&self, actor: &UserInfo, id: &str, active: bool) -> Result<UserProfile, ServiceError> {
        ensure_role(actor, &[Role::Admin])?;
        if actor.user_id == id && !active {
            return Err(ServiceError::Validation("You cannot deactivate your own account".to_string()));
        }

        let user = self.users.set_active(id, active).await?;
        let action = if active { "Activated" } else { "Deactivated" };
        log_account_change(&actor.user_id, id, &format!("{} account", action));
        Ok(user.into())
    }

    /// Create the first admin account. Does nothing once any admin exists.
    pub async fn ensure_admin_seed(&self, email: &str, password: &str) -> Result<Option<UserProfile>, ServiceError> {
        if self.users.count_by_role(Role::Admin).await? > 0 {
            return Ok(None);
        }

        let user = self
            .users
            .create(NewUser {
                email: email.to_string(),
                password_hash: hash(password)?,
                full_name: "Administrator".to_string(),
                role: Role::Admin,
                phone: None,
                region: None,
                consultation_fee_cents: None,
            })
            .await?;

        info!("Seeded initial admin account {}", user.email);
        Ok(Some(user.into()))
    }
}
