//! Connection pool setup.
//!
//! The rest of the core treats the pool as opaque: it is built once from
//! `DatabaseConfig`, bounded by max-open / warm-idle / lifetime settings, and
//! shared by every concurrent operation.

use crate::config::DatabaseConfig;
use crate::error::{StoreError, StoreResult};
use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;
use tracing::{debug, info, warn};

/// Supported store backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Postgres,
    Sqlite,
}

impl Backend {
    /// Parse a driver name as used in configuration.
    pub fn from_driver_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pgx" => Some(Self::Postgres),
            "sqlite" | "sqlite3" => Some(Self::Sqlite),
            _ => None,
        }
    }

    /// Get the display name for this backend.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Postgres => "PostgreSQL",
            Self::Sqlite => "SQLite",
        }
    }

    fn version_query(&self) -> &'static str {
        match self {
            Self::Postgres => "SELECT version()",
            Self::Sqlite => "SELECT sqlite_version()",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Open a bounded connection pool for the configured backend.
pub async fn connect(config: &DatabaseConfig) -> StoreResult<AnyPool> {
    config.validate().map_err(StoreError::config)?;
    let backend = config.backend().map_err(StoreError::config)?;
    let url = config.connection_url().map_err(StoreError::config)?;

    sqlx::any::install_default_drivers();

    info!(
        backend = %backend,
        url = %config.masked_connection_url(),
        max_open = config.max_open_conns,
        max_idle = config.max_idle_conns,
        lifetime_ms = config.conn_max_lifetime_ms,
        "Connecting to database"
    );

    let pool = AnyPoolOptions::new()
        .max_connections(config.max_open_conns)
        .min_connections(config.max_idle_conns)
        .max_lifetime(config.conn_max_lifetime())
        .acquire_timeout(config.acquire_timeout())
        .test_before_acquire(true)
        .connect(&url)
        .await
        .map_err(|e| {
            StoreError::connection(
                format!("Failed to connect: {}", e),
                connection_suggestion(backend, &e),
            )
        })?;

    match sqlx::query_scalar::<_, String>(backend.version_query())
        .fetch_one(&pool)
        .await
    {
        Ok(version) => debug!(version = %version, "Got server version"),
        Err(e) => warn!(error = %e, "Failed to get server version"),
    }

    info!(backend = %backend, "Connected successfully");
    Ok(pool)
}

/// Generate a helpful suggestion for connection errors.
fn connection_suggestion(backend: Backend, error: &sqlx::Error) -> String {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") {
        return format!("Check that the {} server is running and accessible", backend);
    }

    if error_str.contains("authentication") || error_str.contains("password") {
        return "Verify the database user and password".to_string();
    }

    if error_str.contains("does not exist") {
        return "Check that the database name exists".to_string();
    }

    if error_str.contains("tls") || error_str.contains("ssl") {
        return "Check ssl_mode or try disabling it".to_string();
    }

    match backend {
        Backend::Postgres => "Verify host, port and dbname of the PostgreSQL server".to_string(),
        Backend::Sqlite => "Verify the database file path is writable".to_string(),
    }
}
