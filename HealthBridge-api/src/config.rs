//! Server configuration, read from the environment once at start-up.

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use thiserror::Error;

use health_bridge_domain::auth::token::{SecurityError, TokenConfig};
use health_bridge_domain::crypto::{EncryptionConfig, EncryptionError};
use health_bridge_domain::database::{DatabaseConfig, DatabaseError};
use health_bridge_domain::services::ServicesConfig;

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Token(#[from] SecurityError),

    #[error(transparent)]
    Encryption(#[from] EncryptionError),
}

/// Credentials for the one-time admin seed
#[derive(Clone)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for AdminSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSeed").field("email", &self.email).finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: IpAddr,
    pub port: u16,
    /// development, staging or production
    pub environment: String,
    pub data_dir: PathBuf,
    pub database: DatabaseConfig,
    pub tokens: TokenConfig,
    pub encryption: EncryptionConfig,
    pub services: ServicesConfig,
    pub admin_seed: Option<AdminSeed>,
}

impl AppConfig {
    /// Load every setting. `JWT_SECRET` and `FIELD_ENCRYPTION_KEY` are required.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match env::var("PORT") {
            Ok(value) => value
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidValue { name: "PORT", value })?,
            Err(_) => 3000,
        };

        let host = match env::var("HOST") {
            Ok(value) => value
                .parse::<IpAddr>()
                .map_err(|_| ConfigError::InvalidValue { name: "HOST", value })?,
            Err(_) => IpAddr::from([0, 0, 0, 0]),
        };

        let admin_seed = match (env::var("ADMIN_EMAIL"), env::var("ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) if !email.trim().is_empty() && !password.is_empty() => Some(AdminSeed {
                email: email.trim().to_lowercase(),
                password,
            }),
            _ => None,
        };

        Ok(Self {
            host,
            port,
            environment: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            data_dir: PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string())),
            database: DatabaseConfig::from_env()?,
            tokens: TokenConfig::from_env()?,
            encryption: EncryptionConfig::from_env()?,
            services: ServicesConfig::from_env(),
            admin_seed,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
