//! Error types for the persistence core.
//!
//! Every failure leaves the core as a single `StoreError` carrying a stable
//! code, a readable message, the causing driver error when there is one, and
//! the correlation fields (request id, statement name) needed to trace it.
//! Absence of a row on read is not an error and never appears here.

use thiserror::Error;

/// Coarse classification of a `StoreError`, used by callers to pick a
/// transport-level response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller defect: bad arguments, undefined statement, misused transaction.
    Input,
    /// Natural-key collision.
    Conflict,
    /// A row required by an update does not exist.
    Missing,
    /// Row counts or re-fetches disagree with what was just written.
    Consistency,
    /// Query, exec, connection or transaction-control failure in the driver.
    Driver,
    /// A panic converted into an error.
    RecoveredFault,
    /// The request context was cancelled.
    Cancelled,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid input: {message} (request: {request_id})")]
    InvalidInput { message: String, request_id: u64 },

    #[error("SQL statement '{name}' is not defined")]
    StatementNotDefined { name: String },

    #[error("Failed to prepare SQL statement '{statement}': {source}")]
    Prepare {
        statement: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Row already exists: {statement} key={key} (request: {request_id})")]
    Conflict {
        statement: String,
        key: String,
        request_id: u64,
    },

    #[error("Row does not exist: {statement} key={key} (request: {request_id})")]
    DoesNotExist {
        statement: String,
        key: String,
        request_id: u64,
    },

    #[error("Consistency violation in '{statement}': {message} (request: {request_id})")]
    Consistency {
        statement: String,
        message: String,
        request_id: u64,
    },

    #[error(
        "Statement '{statement}' affected {actual} rows, expected {expected} (request: {request_id})"
    )]
    RowCount {
        statement: String,
        expected: u64,
        actual: u64,
        request_id: u64,
    },

    #[error("Database error in '{statement}': {message} (request: {request_id}, sql: {sql_id})")]
    Database {
        statement: String,
        message: String,
        /// e.g. "23505" for unique violation
        sql_state: Option<String>,
        request_id: u64,
        sql_id: u64,
        #[source]
        source: sqlx::Error,
    },

    #[error("Transaction error: {message} (request: {request_id})")]
    Transaction { message: String, request_id: u64 },

    #[error("Recovered from panic in {operation}: {message} (request: {request_id})")]
    Recovered {
        operation: String,
        message: String,
        request_id: u64,
    },

    #[error("Request {request_id} cancelled before {operation}")]
    Cancelled { operation: String, request_id: u64 },

    #[error("JSON codec error: {source}")]
    Codec {
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>, request_id: u64) -> Self {
        Self::InvalidInput {
            message: message.into(),
            request_id,
        }
    }

    /// Create a statement-not-defined error.
    pub fn statement_not_defined(name: impl Into<String>) -> Self {
        Self::StatementNotDefined { name: name.into() }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a natural-key conflict error.
    pub fn conflict(statement: impl Into<String>, key: impl Into<String>, request_id: u64) -> Self {
        Self::Conflict {
            statement: statement.into(),
            key: key.into(),
            request_id,
        }
    }

    /// Create a row-does-not-exist error.
    pub fn does_not_exist(
        statement: impl Into<String>,
        key: impl Into<String>,
        request_id: u64,
    ) -> Self {
        Self::DoesNotExist {
            statement: statement.into(),
            key: key.into(),
            request_id,
        }
    }

    /// Create a consistency violation error.
    pub fn consistency(
        statement: impl Into<String>,
        message: impl Into<String>,
        request_id: u64,
    ) -> Self {
        Self::Consistency {
            statement: statement.into(),
            message: message.into(),
            request_id,
        }
    }

    /// Create a row-count mismatch error.
    pub fn row_count(statement: impl Into<String>, expected: u64, actual: u64, request_id: u64) -> Self {
        Self::RowCount {
            statement: statement.into(),
            expected,
            actual,
            request_id,
        }
    }

    /// Wrap a driver error raised while running a named statement.
    pub fn driver(
        statement: impl Into<String>,
        request_id: u64,
        sql_id: u64,
        source: sqlx::Error,
    ) -> Self {
        let (message, sql_state) = match &source {
            sqlx::Error::Database(db_err) => (
                db_err.message().to_string(),
                db_err.code().map(|c| c.to_string()),
            ),
            other => (other.to_string(), None),
        };
        Self::Database {
            statement: statement.into(),
            message,
            sql_state,
            request_id,
            sql_id,
            source,
        }
    }

    /// Create a transaction state error.
    pub fn transaction(message: impl Into<String>, request_id: u64) -> Self {
        Self::Transaction {
            message: message.into(),
            request_id,
        }
    }

    /// Create a recovered-panic error.
    pub fn recovered(
        operation: impl Into<String>,
        message: impl Into<String>,
        request_id: u64,
    ) -> Self {
        Self::Recovered {
            operation: operation.into(),
            message: message.into(),
            request_id,
        }
    }

    /// Create a cancellation error.
    pub fn cancelled(operation: impl Into<String>, request_id: u64) -> Self {
        Self::Cancelled {
            operation: operation.into(),
            request_id,
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput { .. }
            | Self::StatementNotDefined { .. }
            | Self::Config { .. }
            | Self::Transaction { .. }
            | Self::Codec { .. } => ErrorKind::Input,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::DoesNotExist { .. } => ErrorKind::Missing,
            Self::Consistency { .. } | Self::RowCount { .. } => ErrorKind::Consistency,
            Self::Prepare { .. } | Self::Connection { .. } | Self::Database { .. } => {
                ErrorKind::Driver
            }
            Self::Recovered { .. } => ErrorKind::RecoveredFault,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// Stable code for this error, safe to match on across releases.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "E_INPUT",
            Self::StatementNotDefined { .. } => "E_STATEMENT_UNDEFINED",
            Self::Prepare { .. } => "E_PREPARE",
            Self::Config { .. } => "E_CONFIG",
            Self::Connection { .. } => "E_CONNECTION",
            Self::Conflict { .. } => "E_CONFLICT",
            Self::DoesNotExist { .. } => "E_DOES_NOT_EXIST",
            Self::Consistency { .. } => "E_CONSISTENCY",
            Self::RowCount { .. } => "E_ROW_COUNT",
            Self::Database { .. } => "E_DATABASE",
            Self::Transaction { .. } => "E_TRANSACTION",
            Self::Recovered { .. } => "E_RECOVERED",
            Self::Cancelled { .. } => "E_CANCELLED",
            Self::Codec { .. } => "E_CODEC",
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// Request id the error was raised under (0 when unknown).
    pub fn request_id(&self) -> u64 {
        match self {
            Self::InvalidInput { request_id, .. }
            | Self::Conflict { request_id, .. }
            | Self::DoesNotExist { request_id, .. }
            | Self::Consistency { request_id, .. }
            | Self::RowCount { request_id, .. }
            | Self::Database { request_id, .. }
            | Self::Transaction { request_id, .. }
            | Self::Recovered { request_id, .. }
            | Self::Cancelled { request_id, .. } => *request_id,
            _ => 0,
        }
    }

    /// Check if this error is retryable.
    ///
    /// Serialization failures and deadlocks reported by PostgreSQL are
    /// retryable along with connection-level failures.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection { .. } => true,
            Self::Database { sql_state, .. } => {
                matches!(sql_state.as_deref(), Some("40001") | Some("40P01"))
            }
            _ => false,
        }
    }
}

/// Convert connection-level sqlx errors to StoreError.
///
/// Statement-level failures go through [`StoreError::driver`] instead so the
/// statement name and correlation ids are kept.
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => StoreError::connection(
                msg.to_string(),
                "Check the connection settings and credentials",
            ),
            sqlx::Error::PoolTimedOut => StoreError::connection(
                "Timed out acquiring a connection from the pool",
                "Increase max_open_conns or acquire_timeout_secs",
            ),
            sqlx::Error::PoolClosed => {
                StoreError::connection("Connection pool is closed", "Reconnect to the database")
            }
            sqlx::Error::Io(io_err) => StoreError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => StoreError::connection(
                format!("TLS error: {}", tls_err),
                "Verify ssl_mode and certificates",
            ),
            other => StoreError::driver("", 0, 0, other),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(source: serde_json::Error) -> Self {
        Self::Codec { source }
    }
}

/// Result type alias for persistence operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::conflict("DeptExists", "10", 7);
        assert!(err.to_string().contains("Row already exists"));
        assert!(err.to_string().contains("request: 7"));
    }

    #[test]
    fn test_kinds() {
        assert_eq!(StoreError::invalid_input("x", 1).kind(), ErrorKind::Input);
        assert_eq!(StoreError::statement_not_defined("Nope").kind(), ErrorKind::Input);
        assert_eq!(StoreError::transaction("twice", 1).kind(), ErrorKind::Input);
        assert_eq!(StoreError::conflict("s", "1", 1).kind(), ErrorKind::Conflict);
        assert_eq!(StoreError::does_not_exist("s", "1", 1).kind(), ErrorKind::Missing);
        assert_eq!(StoreError::row_count("s", 1, 0, 1).kind(), ErrorKind::Consistency);
        assert_eq!(StoreError::consistency("s", "gone", 1).kind(), ErrorKind::Consistency);
        assert_eq!(StoreError::recovered("op", "boom", 1).kind(), ErrorKind::RecoveredFault);
        assert_eq!(StoreError::cancelled("begin", 1).kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_codes_are_distinct_for_consistency_errors() {
        assert_eq!(StoreError::row_count("s", 1, 0, 1).code(), "E_ROW_COUNT");
        assert_eq!(StoreError::consistency("s", "m", 1).code(), "E_CONSISTENCY");
    }

    #[test]
    fn test_driver_error_keeps_source() {
        use std::error::Error as _;
        let err = StoreError::driver("GetDept", 3, 9, sqlx::Error::RowNotFound);
        assert_eq!(err.kind(), ErrorKind::Driver);
        assert_eq!(err.request_id(), 3);
        assert!(err.source().is_some());
        assert!(err.to_string().contains("GetDept"));
    }

    #[test]
    fn test_pool_timeout_is_retryable_connection_error() {
        let err: StoreError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, StoreError::Connection { .. }));
        assert!(err.is_retryable());
        assert!(err.suggestion().is_some());
    }

    #[test]
    fn test_not_retryable() {
        assert!(!StoreError::conflict("s", "1", 1).is_retryable());
        assert!(!StoreError::invalid_input("bad", 1).is_retryable());
    }
}
