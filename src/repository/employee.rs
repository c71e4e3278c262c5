//! Employee persistence.

use crate::context::RequestContext;
use crate::db::catalog::{
    CREATE_EMP, EMP_EXISTS, GET_EMP, GET_EMP_UK, GET_EMPS_BY_DEPT, GET_EMPS_PK_BY_DEPT, UPDATE_EMP,
};
use crate::db::executor::{ExistenceCheck, SqlExecutor};
use crate::db::params::SqlParam;
use crate::db::transaction::{TransactionCoordinator, Tx, recover};
use crate::error::{StoreError, StoreResult};
use crate::models::{Employee, EmployeeKey};
use std::sync::Arc;
use tracing::debug;

/// Reads and transactional writes of `emp` rows.
#[derive(Clone)]
pub struct EmployeeRepository {
    exec: Arc<SqlExecutor>,
    txs: TransactionCoordinator,
}

impl EmployeeRepository {
    pub fn new(exec: Arc<SqlExecutor>, txs: TransactionCoordinator) -> Self {
        Self { exec, txs }
    }

    /// Load employee `id` into `out`. Returns `false` when it does not exist.
    pub async fn get(&self, ctx: &RequestContext, id: i64, out: &mut Employee) -> StoreResult<bool> {
        recover(ctx, "get employee", self.get_in(ctx, None, id, out)).await
    }

    /// All employees of a department, ordered by id.
    pub async fn list_by_department(
        &self,
        ctx: &RequestContext,
        department_id: i64,
        out: &mut Vec<Employee>,
    ) -> StoreResult<()> {
        recover(
            ctx,
            "list employees",
            self.exec.select(
                ctx,
                None,
                GET_EMPS_BY_DEPT,
                out,
                &[SqlParam::int(department_id)],
            ),
        )
        .await
    }

    /// Ids of a department's employees, ordered.
    pub async fn keys_by_department(
        &self,
        ctx: &RequestContext,
        department_id: i64,
        out: &mut Vec<EmployeeKey>,
    ) -> StoreResult<()> {
        recover(
            ctx,
            "list employee keys",
            self.exec.select(
                ctx,
                None,
                GET_EMPS_PK_BY_DEPT,
                out,
                &[SqlParam::int(department_id)],
            ),
        )
        .await
    }

    /// Insert `input` in its own transaction and load the stored row into `out`.
    pub async fn create(
        &self,
        ctx: &RequestContext,
        input: &Employee,
        out: &mut Employee,
    ) -> StoreResult<()> {
        let mut tx = self.txs.begin(ctx).await?;
        let result = recover(
            ctx,
            "create employee",
            self.create_in(ctx, &mut tx, input, Some(out)),
        )
        .await;
        self.txs.finish(ctx, &mut tx, result).await
    }

    /// Update from `input` in its own transaction. Returns `false`, with
    /// nothing changed, when the employee does not exist.
    pub async fn update(
        &self,
        ctx: &RequestContext,
        input: &Employee,
        out: &mut Employee,
    ) -> StoreResult<bool> {
        let mut tx = self.txs.begin(ctx).await?;
        let result = recover(
            ctx,
            "update employee",
            self.update_in(ctx, &mut tx, input, Some(out)),
        )
        .await;
        match result {
            Ok(false) => {
                self.txs.rollback(ctx, Some(&mut tx)).await?;
                Ok(false)
            }
            other => self.txs.finish(ctx, &mut tx, other).await,
        }
    }

    pub(crate) async fn get_in(
        &self,
        ctx: &RequestContext,
        tx: Option<&mut Tx>,
        id: i64,
        out: &mut Employee,
    ) -> StoreResult<bool> {
        self.exec
            .get(ctx, tx, GET_EMP, out, &[SqlParam::int(id)])
            .await
    }

    /// Insert inside `tx`. `out`, when given, receives the stored row.
    pub(crate) async fn create_in(
        &self,
        ctx: &RequestContext,
        tx: &mut Tx,
        input: &Employee,
        out: Option<&mut Employee>,
    ) -> StoreResult<()> {
        let request_id = ctx.request_id();
        input.validate(request_id)?;
        debug!(request_id, id = input.id, "Creating employee");

        let key = input.key();
        let mut probe = 0_i64;
        self.exec
            .create(
                ctx,
                Some(&mut *tx),
                Some(ExistenceCheck::new(EMP_EXISTS, &mut probe, &key)),
                CREATE_EMP,
                input,
            )
            .await?;

        // Cascaded children are re-read by the parent; the read here only
        // confirms the row landed.
        let mut scratch;
        let dest: &mut Employee = match out {
            Some(out) => out,
            None => {
                scratch = self.exec.models().guard::<Employee>();
                &mut *scratch
            }
        };
        if !self
            .exec
            .get(ctx, Some(&mut *tx), GET_EMP_UK, dest, &key)
            .await?
        {
            return Err(StoreError::consistency(
                CREATE_EMP,
                format!("employee {} missing after insert", input.id),
                request_id,
            ));
        }
        Ok(())
    }

    /// Update inside `tx`. Returns `false` when the employee does not exist.
    pub(crate) async fn update_in(
        &self,
        ctx: &RequestContext,
        tx: &mut Tx,
        input: &Employee,
        out: Option<&mut Employee>,
    ) -> StoreResult<bool> {
        let request_id = ctx.request_id();
        input.validate(request_id)?;
        debug!(request_id, id = input.id, "Updating employee");

        let key = input.key();
        let models = self.exec.models();
        let mut prior = models.guard::<Employee>();
        let updated = self
            .exec
            .update(
                ctx,
                Some(&mut *tx),
                Some(ExistenceCheck::new(GET_EMP, &mut *prior, &key)),
                UPDATE_EMP,
                input,
            )
            .await;
        match updated {
            Ok(()) => {}
            Err(StoreError::DoesNotExist { .. }) => {
                debug!(request_id, id = input.id, "Employee does not exist");
                return Ok(false);
            }
            Err(e) => return Err(e),
        }

        if let Some(out) = out {
            self.require(ctx, tx, input.id, out).await?;
        }
        Ok(true)
    }

    /// Re-fetch a row that must exist after a write.
    async fn require(
        &self,
        ctx: &RequestContext,
        tx: &mut Tx,
        id: i64,
        out: &mut Employee,
    ) -> StoreResult<()> {
        if self.get_in(ctx, Some(tx), id, out).await? {
            return Ok(());
        }
        Err(StoreError::consistency(
            GET_EMP,
            format!("employee {id} missing after write"),
            ctx.request_id(),
        ))
    }
}
