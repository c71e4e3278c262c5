//! Configuration handling for the persistence core.
//!
//! The core consumes typed configuration only; values come from command line
//! arguments with environment variable fallbacks.

use crate::db::connection::Backend;
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_DB_HOST: &str = "localhost";
pub const DEFAULT_DB_PORT: u16 = 5432;
pub const DEFAULT_DB_NAME: &str = "hr";
pub const DEFAULT_SSL_MODE: &str = "disable";
pub const DEFAULT_DRIVER: &str = "postgres";

// Connection pool defaults
pub const DEFAULT_MAX_OPEN_CONNS: u32 = 16;
pub const DEFAULT_MAX_IDLE_CONNS: u32 = 8;
pub const DEFAULT_CONN_MAX_LIFETIME_MS: u64 = 0;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

// Object pool defaults
pub const DEFAULT_MAX_IDLE_OBJECTS: usize = 1024;
pub const DEFAULT_POOLED_BUFFER_SIZE: usize = 4096;
pub const DEFAULT_MAX_IDLE_BUFFERS: usize = 256;

/// Connection settings for the relational store.
#[derive(Debug, Clone, Args, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database server host
    #[arg(long = "db-host", default_value = DEFAULT_DB_HOST, env = "HR_DB_HOST")]
    pub host: String,

    /// Database server port
    #[arg(long = "db-port", default_value_t = DEFAULT_DB_PORT, env = "HR_DB_PORT")]
    pub port: u16,

    /// Database name (file path for the sqlite driver)
    #[arg(long = "db-name", default_value = DEFAULT_DB_NAME, env = "HR_DB_NAME")]
    pub dbname: String,

    /// PostgreSQL sslmode (disable, prefer, require, verify-ca, verify-full)
    #[arg(long = "db-ssl-mode", default_value = DEFAULT_SSL_MODE, env = "HR_DB_SSL_MODE")]
    pub ssl_mode: String,

    /// Database user
    #[arg(long = "db-user", default_value = "", env = "HR_DB_USER")]
    pub user: String,

    /// Contains sensitive data - never log
    #[arg(long = "db-password", default_value = "", env = "HR_DB_PASSWORD", hide_env_values = true)]
    #[serde(skip_serializing)]
    pub password: String,

    /// Driver name: postgres, pgx or sqlite
    #[arg(long = "db-driver", default_value = DEFAULT_DRIVER, env = "HR_DB_DRIVER")]
    pub driver_name: String,

    /// Maximum open connections in the pool
    #[arg(long = "db-max-open", default_value_t = DEFAULT_MAX_OPEN_CONNS, env = "HR_DB_MAX_OPEN")]
    pub max_open_conns: u32,

    /// Connections kept warm in the pool
    #[arg(long = "db-max-idle", default_value_t = DEFAULT_MAX_IDLE_CONNS, env = "HR_DB_MAX_IDLE")]
    pub max_idle_conns: u32,

    /// Connection lifetime in milliseconds (0 = unlimited)
    #[arg(
        long = "db-conn-lifetime-ms",
        default_value_t = DEFAULT_CONN_MAX_LIFETIME_MS,
        env = "HR_DB_CONN_LIFETIME_MS"
    )]
    pub conn_max_lifetime_ms: u64,

    /// Timeout for acquiring a pooled connection in seconds
    #[arg(
        long = "db-acquire-timeout",
        default_value_t = DEFAULT_ACQUIRE_TIMEOUT_SECS,
        env = "HR_DB_ACQUIRE_TIMEOUT"
    )]
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DB_HOST.to_string(),
            port: DEFAULT_DB_PORT,
            dbname: DEFAULT_DB_NAME.to_string(),
            ssl_mode: DEFAULT_SSL_MODE.to_string(),
            user: String::new(),
            password: String::new(),
            driver_name: DEFAULT_DRIVER.to_string(),
            max_open_conns: DEFAULT_MAX_OPEN_CONNS,
            max_idle_conns: DEFAULT_MAX_IDLE_CONNS,
            conn_max_lifetime_ms: DEFAULT_CONN_MAX_LIFETIME_MS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl DatabaseConfig {
    /// Configuration for an embedded SQLite database file.
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            dbname: path.into(),
            driver_name: "sqlite".to_string(),
            max_open_conns: 1,
            max_idle_conns: 1,
            ..Self::default()
        }
    }

    /// Backend selected by `driver_name`.
    pub fn backend(&self) -> Result<Backend, String> {
        Backend::from_driver_name(&self.driver_name)
            .ok_or_else(|| format!("Unknown driver '{}'", self.driver_name))
    }

    /// Validate pool settings and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        self.backend()?;
        if self.max_open_conns == 0 {
            return Err("max_open_conns must be greater than 0".to_string());
        }
        if self.max_idle_conns > self.max_open_conns {
            return Err(format!(
                "max_idle_conns ({}) cannot exceed max_open_conns ({})",
                self.max_idle_conns, self.max_open_conns
            ));
        }
        if self.dbname.is_empty() {
            return Err("dbname must not be empty".to_string());
        }
        Ok(())
    }

    /// Connection lifetime, `None` when unlimited.
    pub fn conn_max_lifetime(&self) -> Option<Duration> {
        (self.conn_max_lifetime_ms > 0).then(|| Duration::from_millis(self.conn_max_lifetime_ms))
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Build the driver connection URL (sensitive - not logged).
    pub fn connection_url(&self) -> Result<String, String> {
        match self.backend()? {
            Backend::Sqlite => {
                if self.dbname == ":memory:" {
                    Ok("sqlite::memory:".to_string())
                } else {
                    Ok(format!("sqlite:{}?mode=rwc", self.dbname))
                }
            }
            Backend::Postgres => self.postgres_url(Some(&self.password)),
        }
    }

    /// Connection URL with the password masked, safe for logs.
    pub fn masked_connection_url(&self) -> String {
        match self.backend() {
            Ok(Backend::Postgres) => self
                .postgres_url(if self.password.is_empty() { None } else { Some("****") })
                .unwrap_or_else(|e| format!("<invalid: {e}>")),
            _ => self.connection_url().unwrap_or_else(|e| format!("<invalid: {e}>")),
        }
    }

    fn postgres_url(&self, password: Option<&str>) -> Result<String, String> {
        let mut url = Url::parse("postgres://localhost").map_err(|e| e.to_string())?;
        url.set_host(Some(&self.host))
            .map_err(|e| format!("Invalid host '{}': {e}", self.host))?;
        url.set_port(Some(self.port))
            .map_err(|_| "Cannot set port".to_string())?;
        if !self.user.is_empty() {
            url.set_username(&self.user)
                .map_err(|_| "Cannot set user".to_string())?;
        }
        if let Some(password) = password.filter(|p| !p.is_empty()) {
            url.set_password(Some(password))
                .map_err(|_| "Cannot set password".to_string())?;
        }
        url.set_path(&format!("/{}", self.dbname));
        url.query_pairs_mut().append_pair("sslmode", &self.ssl_mode);
        Ok(url.to_string())
    }
}

/// Sizing of the object and buffer pools.
#[derive(Debug, Clone, Args, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Idle entity structs kept per free list
    #[arg(long, default_value_t = DEFAULT_MAX_IDLE_OBJECTS, env = "HR_MAX_IDLE_OBJECTS")]
    pub max_idle_objects: usize,

    /// Capacity of pooled response buffers; smaller buffers are not retained
    #[arg(long, default_value_t = DEFAULT_POOLED_BUFFER_SIZE, env = "HR_POOLED_BUFFER_SIZE")]
    pub pooled_buffer_size: usize,

    /// Idle response buffers kept
    #[arg(long, default_value_t = DEFAULT_MAX_IDLE_BUFFERS, env = "HR_MAX_IDLE_BUFFERS")]
    pub max_idle_buffers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_objects: DEFAULT_MAX_IDLE_OBJECTS,
            pooled_buffer_size: DEFAULT_POOLED_BUFFER_SIZE,
            max_idle_buffers: DEFAULT_MAX_IDLE_BUFFERS,
        }
    }
}

/// Operation to run against the store.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print a department with its employees
    GetDepartment { id: i64 },
    /// Print all departments without employees
    ListDepartments,
    /// Create a department (and its employees) from a JSON file, "-" for stdin
    CreateDepartment { input: PathBuf },
    /// Update a department from a JSON file, creating missing employees
    UpdateDepartment { input: PathBuf },
    /// Print an employee
    GetEmployee { id: i64 },
    /// Create an employee from a JSON file
    CreateEmployee { input: PathBuf },
    /// Update an employee from a JSON file
    UpdateEmployee { input: PathBuf },
}

/// Configuration for the hr-store binary.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "hr-store",
    about = "Department/Employee store with transactional cascades",
    version,
    author
)]
pub struct Config {
    #[command(flatten)]
    pub database: DatabaseConfig,

    #[command(flatten)]
    pub pools: PoolConfig,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "HR_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "HR_JSON_LOGS")]
    pub json_logs: bool,

    /// Create the dept/emp tables if they are missing
    #[arg(long, env = "HR_INIT_SCHEMA")]
    pub init_schema: bool,

    #[command(subcommand)]
    pub command: Command,
}
