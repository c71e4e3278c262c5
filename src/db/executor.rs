//! Generic data-access primitives.
//!
//! `get`, `select` and `exec` run one named statement from the registry;
//! `create` and `update` wrap `exec` with an existence check and an
//! exactly-one-row assertion. Every call checks the request's cancellation
//! token before its round trip and logs under a fresh sql id.

use crate::context::RequestContext;
use crate::db::params::{DmlParams, SqlParam, build_query, format_key};
use crate::db::statements::{StatementDescriptor, StatementRegistry};
use crate::db::transaction::Tx;
use crate::error::{StoreError, StoreResult};
use crate::models::pool::{ModelPool, Poolable};
use futures_util::TryStreamExt;
use sqlx::AnyPool;
use sqlx::any::AnyRow;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Copies one result row into an existing value, reusing its allocations.
pub trait Scan: Send {
    fn scan(&mut self, row: &AnyRow) -> Result<(), sqlx::Error>;
}

impl Scan for i64 {
    fn scan(&mut self, row: &AnyRow) -> Result<(), sqlx::Error> {
        use sqlx::Row;
        *self = row.try_get(0)?;
        Ok(())
    }
}

/// Pre-condition lookup for `create`/`update`.
pub struct ExistenceCheck<'a> {
    pub statement: &'static str,
    pub dest: &'a mut (dyn Scan + Send),
    pub key: &'a [SqlParam<'a>],
}

impl<'a> ExistenceCheck<'a> {
    pub fn new(
        statement: &'static str,
        dest: &'a mut (dyn Scan + Send),
        key: &'a [SqlParam<'a>],
    ) -> Self {
        Self {
            statement,
            dest,
            key,
        }
    }
}

/// Runs registered statements on the pool or inside a transaction.
pub struct SqlExecutor {
    pool: AnyPool,
    statements: Arc<StatementRegistry>,
    models: Arc<ModelPool>,
    sql_ids: AtomicU64,
}

impl SqlExecutor {
    pub fn new(pool: AnyPool, statements: Arc<StatementRegistry>, models: Arc<ModelPool>) -> Self {
        Self {
            pool,
            statements,
            models,
            sql_ids: AtomicU64::new(0),
        }
    }

    pub fn statements(&self) -> &StatementRegistry {
        &self.statements
    }

    pub fn models(&self) -> &Arc<ModelPool> {
        &self.models
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Fetch at most one row into `dest`.
    ///
    /// Returns `Ok(false)` when no row matches; absence is not an error.
    pub async fn get<T: Scan + ?Sized>(
        &self,
        ctx: &RequestContext,
        tx: Option<&mut Tx>,
        statement: &str,
        dest: &mut T,
        key: &[SqlParam<'_>],
    ) -> StoreResult<bool> {
        let request_id = ctx.request_id();
        let descriptor = self.prepare_call(ctx, statement, key.len())?;
        let sql_id = self.next_sql_id();
        debug!(
            request_id,
            sql_id,
            statement = descriptor.name(),
            key = %format_key(key),
            "Fetching row"
        );

        let query = build_query(descriptor.sql(), key);
        let row = match tx {
            Some(tx) => query.fetch_optional(tx.connection()?).await,
            None => query.fetch_optional(&self.pool).await,
        }
        .map_err(|e| StoreError::driver(descriptor.name(), request_id, sql_id, e))?;

        match row {
            Some(row) => {
                dest.scan(&row)
                    .map_err(|e| StoreError::driver(descriptor.name(), request_id, sql_id, e))?;
                Ok(true)
            }
            None => {
                debug!(request_id, sql_id, statement = descriptor.name(), "No row");
                Ok(false)
            }
        }
    }

    /// Fetch every matching row into `dest`, replacing its contents.
    ///
    /// Previous items go back to the model pool and each row is scanned into
    /// a pooled instance. Zero rows leaves `dest` empty.
    pub async fn select<T: Scan + Poolable>(
        &self,
        ctx: &RequestContext,
        tx: Option<&mut Tx>,
        statement: &str,
        dest: &mut Vec<T>,
        args: &[SqlParam<'_>],
    ) -> StoreResult<()> {
        let request_id = ctx.request_id();
        self.models.release_all(dest, true);
        let descriptor = self.prepare_call(ctx, statement, args.len())?;
        let sql_id = self.next_sql_id();
        debug!(
            request_id,
            sql_id,
            statement = descriptor.name(),
            args = %format_key(args),
            "Selecting rows"
        );

        let query = build_query(descriptor.sql(), args);
        let mut rows = match tx {
            Some(tx) => query.fetch(tx.connection()?),
            None => query.fetch(&self.pool),
        };
        let to_error = |e: sqlx::Error| StoreError::driver(descriptor.name(), request_id, sql_id, e);

        while let Some(row) = rows.try_next().await.map_err(to_error)? {
            let mut item = self.models.acquire::<T>();
            if let Err(e) = item.scan(&row) {
                self.models.release(item, true);
                return Err(to_error(e));
            }
            dest.push(item);
        }

        debug!(request_id, sql_id, rows = dest.len(), "Rows selected");
        Ok(())
    }

    /// Run a DML statement inside `tx` and return the affected row count.
    pub async fn exec<P: DmlParams + ?Sized>(
        &self,
        ctx: &RequestContext,
        tx: Option<&mut Tx>,
        statement: &str,
        input: &P,
    ) -> StoreResult<u64> {
        let request_id = ctx.request_id();
        let tx = tx.ok_or_else(|| {
            StoreError::invalid_input(format!("'{statement}' requires a transaction"), request_id)
        })?;
        let params = input.dml_params();
        let descriptor = self.prepare_call(ctx, statement, params.len())?;
        let sql_id = self.next_sql_id();
        debug!(
            request_id,
            sql_id,
            statement = descriptor.name(),
            params = %format_key(&params),
            "Executing statement"
        );

        let result = build_query(descriptor.sql(), &params)
            .execute(tx.connection()?)
            .await
            .map_err(|e| StoreError::driver(descriptor.name(), request_id, sql_id, e))?;

        let rows = result.rows_affected();
        debug!(request_id, sql_id, rows, "Statement executed");
        Ok(rows)
    }

    /// Insert one row. With a `check`, an existing row is a `Conflict`.
    pub async fn create<P: DmlParams + ?Sized>(
        &self,
        ctx: &RequestContext,
        mut tx: Option<&mut Tx>,
        check: Option<ExistenceCheck<'_>>,
        statement: &str,
        input: &P,
    ) -> StoreResult<()> {
        let request_id = ctx.request_id();
        if let Some(check) = check {
            let found = self
                .get(ctx, tx.as_deref_mut(), check.statement, check.dest, check.key)
                .await?;
            if found {
                return Err(StoreError::conflict(
                    check.statement,
                    format_key(check.key),
                    request_id,
                ));
            }
        }

        let rows = self.exec(ctx, tx, statement, input).await?;
        expect_one_row(statement, rows, request_id)
    }

    /// Update one row. With a `check`, a missing row is `DoesNotExist`.
    pub async fn update<P: DmlParams + ?Sized>(
        &self,
        ctx: &RequestContext,
        mut tx: Option<&mut Tx>,
        check: Option<ExistenceCheck<'_>>,
        statement: &str,
        input: &P,
    ) -> StoreResult<()> {
        let request_id = ctx.request_id();
        if let Some(check) = check {
            let found = self
                .get(ctx, tx.as_deref_mut(), check.statement, check.dest, check.key)
                .await?;
            if !found {
                return Err(StoreError::does_not_exist(
                    check.statement,
                    format_key(check.key),
                    request_id,
                ));
            }
        }

        let rows = self.exec(ctx, tx, statement, input).await?;
        expect_one_row(statement, rows, request_id)
    }

    fn prepare_call(
        &self,
        ctx: &RequestContext,
        statement: &str,
        supplied: usize,
    ) -> StoreResult<&StatementDescriptor> {
        let descriptor = self.statements.lookup(statement)?;
        if supplied != descriptor.param_count() {
            return Err(StoreError::invalid_input(
                format!(
                    "'{}' takes {} parameters, got {}",
                    descriptor.name(),
                    descriptor.param_count(),
                    supplied
                ),
                ctx.request_id(),
            ));
        }
        ctx.ensure_active(descriptor.name())?;
        Ok(descriptor)
    }

    fn next_sql_id(&self) -> u64 {
        self.sql_ids.fetch_add(1, Ordering::Relaxed) + 1
    }
}

fn expect_one_row(statement: &str, rows: u64, request_id: u64) -> StoreResult<()> {
    if rows != 1 {
        return Err(StoreError::row_count(statement, 1, rows, request_id));
    }
    Ok(())
}
