//! Database access layer.
//!
//! This module provides:
//! - Connection pool setup for PostgreSQL and SQLite
//! - The statement registry and the statement catalog
//! - Transaction coordination with panic recovery
//! - Generic data-access primitives
//! - Schema creation

pub mod catalog;
pub mod connection;
pub mod executor;
pub mod params;
pub mod schema;
pub mod statements;
pub mod transaction;

pub use connection::Backend;
pub use executor::{ExistenceCheck, Scan, SqlExecutor};
pub use params::{DmlParams, SqlParam};
pub use statements::{StatementDescriptor, StatementRegistry};
pub use transaction::{TransactionCoordinator, Tx, TxState};

use crate::config::DatabaseConfig;
use crate::error::StoreResult;
use crate::models::pool::ModelPool;
use crate::repository::{DepartmentRepository, EmployeeRepository};
use sqlx::AnyPool;
use std::sync::Arc;
use tracing::info;

/// A connected store: pool, prepared statements and transaction control.
pub struct Database {
    pool: AnyPool,
    executor: Arc<SqlExecutor>,
    coordinator: TransactionCoordinator,
}

impl Database {
    /// Connect, optionally create the schema, then prepare the catalog.
    ///
    /// Fails if any read statement does not prepare.
    pub async fn connect(
        config: &DatabaseConfig,
        models: Arc<ModelPool>,
        init_schema: bool,
    ) -> StoreResult<Self> {
        let pool = connection::connect(config).await?;
        Self::from_pool(pool, models, init_schema).await
    }

    /// Build on an existing pool.
    pub async fn from_pool(
        pool: AnyPool,
        models: Arc<ModelPool>,
        init_schema: bool,
    ) -> StoreResult<Self> {
        if init_schema {
            schema::ensure_schema(&pool).await?;
        }
        let statements = catalog::statements().prepare(&pool).await?;
        let executor = Arc::new(SqlExecutor::new(pool.clone(), Arc::new(statements), models));
        let coordinator = TransactionCoordinator::new(pool.clone());
        Ok(Self {
            pool,
            executor,
            coordinator,
        })
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn executor(&self) -> &Arc<SqlExecutor> {
        &self.executor
    }

    pub fn coordinator(&self) -> &TransactionCoordinator {
        &self.coordinator
    }

    pub fn models(&self) -> &Arc<ModelPool> {
        self.executor.models()
    }

    pub fn employees(&self) -> EmployeeRepository {
        EmployeeRepository::new(Arc::clone(&self.executor), self.coordinator.clone())
    }

    pub fn departments(&self) -> DepartmentRepository {
        DepartmentRepository::new(
            Arc::clone(&self.executor),
            self.coordinator.clone(),
            self.employees(),
        )
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }
}
