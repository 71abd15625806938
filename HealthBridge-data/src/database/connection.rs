//! Database connection module for the HealthBridge application
//!
//! SQLite is accessed through an r2d2 connection pool. Every connection has
//! foreign key enforcement switched on. When the configured database file
//! cannot be opened, the pool falls back to an in-memory database so the
//! server can still start (data will not survive a restart).

use std::env;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;
use thiserror::Error;
use tracing::{error, info, warn};

use super::migrations::run_sqlite_migrations;

/// Global database pool used by the server binary and audit logging
static DB_POOL: OnceCell<DatabasePool> = OnceCell::new();

/// Pooled SQLite connection
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Database error
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Environment variable not found
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    /// SQLite error
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// SQLite connection pool error
    #[error("SQLite connection pool error: {0}")]
    SqlitePoolError(#[from] r2d2::Error),

    /// Database pool already initialized
    #[error("Database pool is already initialized")]
    PoolAlreadyInitialized,

    /// Database pool not initialized
    #[error("Database pool is not initialized")]
    PoolNotInitialized,

    /// Configuration error
    #[error("Database configuration error: {0}")]
    ConfigError(String),

    /// Migration error
    #[error("Database migration error: {0}")]
    MigrationError(String),
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub sqlite_path: String,
    /// Maximum number of connections
    pub max_connections: u32,
    /// Connection timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite_path: "./data/health_bridge.db".to_string(),
            max_connections: 10,
            timeout_seconds: 30,
        }
    }
}

impl DatabaseConfig {
    /// Create a new database configuration from environment variables
    pub fn from_env() -> Result<Self, DatabaseError> {
        let defaults = Self::default();

        let sqlite_path = match env::var("DB_SQLITE_PATH") {
            Ok(path) => path,
            Err(_) => {
                let data_dir = env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string());
                Path::new(&data_dir)
                    .join("health_bridge.db")
                    .to_string_lossy()
                    .to_string()
            }
        };

        let max_connections = match env::var("DB_MAX_CONNECTIONS") {
            Ok(value) => value.parse::<u32>().map_err(|_| {
                DatabaseError::ConfigError(format!("DB_MAX_CONNECTIONS must be a number, got '{}'", value))
            })?,
            Err(_) => defaults.max_connections,
        };

        if max_connections == 0 {
            return Err(DatabaseError::ConfigError(
                "DB_MAX_CONNECTIONS must be greater than zero".to_string(),
            ));
        }

        let timeout_seconds = env::var("DB_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(defaults.timeout_seconds);

        info!(
            "Database configuration: path={}, max_connections={}, timeout={}s",
            sqlite_path, max_connections, timeout_seconds
        );

        Ok(DatabaseConfig {
            sqlite_path,
            max_connections,
            timeout_seconds,
        })
    }
}

/// SQLite connection pool shared by all repositories
#[derive(Debug, Clone)]
pub struct DatabasePool {
    pool: Arc<r2d2::Pool<SqliteConnectionManager>>,
    in_memory: bool,
}

impl DatabasePool {
    /// Open (or create) the file database described by the configuration and
    /// run migrations. Falls back to an in-memory database if the file cannot
    /// be used.
    pub fn from_config(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        info!("Initializing SQLite database at: {}", config.sqlite_path);

        if let Some(parent) = Path::new(&config.sqlite_path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                info!("Creating parent directory: {:?}", parent);
                if let Err(e) = std::fs::create_dir_all(parent) {
                    warn!("Failed to create directory: {}, falling back to in-memory database", e);
                    return Self::in_memory();
                }
            }
        }

        let manager = SqliteConnectionManager::file(&config.sqlite_path)
            .with_flags(OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE)
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;"));

        let pool = match r2d2::Pool::builder()
            .max_size(config.max_connections)
            .connection_timeout(Duration::from_secs(config.timeout_seconds))
            .build(manager)
        {
            Ok(pool) => pool,
            Err(e) => {
                error!("Failed to create SQLite connection pool: {}", e);
                warn!("Falling back to in-memory SQLite database");
                return Self::in_memory();
            }
        };

        let pool = Self {
            pool: Arc::new(pool),
            in_memory: false,
        };
        pool.migrate()?;

        info!("SQLite connection pool created successfully");
        Ok(pool)
    }

    /// Create a migrated in-memory database.
    ///
    /// Each in-memory SQLite connection is its own database, so the pool is
    /// capped at a single connection. Callers must not hold a connection while
    /// requesting another one.
    pub fn in_memory() -> Result<Self, DatabaseError> {
        info!("Initializing in-memory SQLite database");

        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));

        let pool = r2d2::Pool::builder()
            .max_size(1)
            .connection_timeout(Duration::from_secs(5))
            .build(manager)?;

        let pool = Self {
            pool: Arc::new(pool),
            in_memory: true,
        };
        pool.migrate()?;

        Ok(pool)
    }

    /// Check out a connection from the pool
    pub fn get(&self) -> Result<DbConnection, DatabaseError> {
        Ok(self.pool.get()?)
    }

    /// Whether this pool is backed by an in-memory database
    pub fn is_in_memory(&self) -> bool {
        self.in_memory
    }

    /// Current (total, idle) connection counts
    pub fn state(&self) -> (u32, u32) {
        let state = self.pool.state();
        (state.connections, state.idle_connections)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        info!("Running database migrations");
        let conn = self.get()?;
        run_sqlite_migrations(&conn).map_err(DatabaseError::MigrationError)?;
        info!("Database migrations completed successfully");
        Ok(())
    }
}

/// Initialize the global database connection pool from the environment
pub fn initialize_database_pool() -> Result<DatabasePool, DatabaseError> {
    let config = DatabaseConfig::from_env()?;
    initialize_database_pool_with(&config)
}

/// Initialize the global database connection pool from an explicit configuration
pub fn initialize_database_pool_with(config: &DatabaseConfig) -> Result<DatabasePool, DatabaseError> {
    if DB_POOL.get().is_some() {
        return Err(DatabaseError::PoolAlreadyInitialized);
    }

    let pool = DatabasePool::from_config(config)?;

    DB_POOL
        .set(pool.clone())
        .map_err(|_| DatabaseError::PoolAlreadyInitialized)?;

    Ok(pool)
}

/// Get the global database connection pool
pub fn get_db_pool() -> Result<DatabasePool, DatabaseError> {
    DB_POOL.get().cloned().ok_or(DatabaseError::PoolNotInitialized)
}

/// Get information about a pool's database connection
pub fn get_connection_info(pool: &DatabasePool) -> Result<String, DatabaseError> {
    let conn = pool.get()?;

    let path: String = conn
        .query_row("PRAGMA database_list", [], |row| row.get::<_, String>(2))
        .unwrap_or_default();
    drop(conn);

    let description = if pool.is_in_memory() || path.is_empty() {
        "SQLite in-memory database".to_string()
    } else {
        format!("SQLite database at {}", path)
    };

    let (connections, idle) = pool.state();
    Ok(format!(
        "{} (connections: active={}, idle={})",
        description, connections, idle
    ))
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn test_database_config_default() {
        let config = DatabaseConfig::default();
        assert!(config.sqlite_path.ends_with("health_bridge.db"));
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.timeout_seconds, 30);
    }

    #[test]
    fn test_in_memory_pool_is_migrated() {
        let pool = DatabasePool::in_memory().unwrap();
        assert!(pool.is_in_memory());

        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'users'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_connection_info_mentions_in_memory() {
        let pool = DatabasePool::in_memory().unwrap();
        let info = get_connection_info(&pool).unwrap();
        assert!(info.contains("in-memory"));
    }
}
