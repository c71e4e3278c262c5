//! Department persistence with cascading employee writes.
//!
//! Creating or updating a department writes its employees in the same
//! transaction: either the whole graph is stored or none of it is. Every
//! write ends by re-reading the graph, so `out` holds what the database
//! stored rather than an echo of the input.

use crate::context::RequestContext;
use crate::db::catalog::{
    CREATE_DEPT, DEPT_EXISTS, GET_DEPT, GET_DEPT_UK, GET_DEPTS, GET_DEPTS_PK, GET_EMPS_BY_DEPT,
    UPDATE_DEPT,
};
use crate::db::executor::{ExistenceCheck, SqlExecutor};
use crate::db::params::SqlParam;
use crate::db::transaction::{TransactionCoordinator, Tx, recover};
use crate::error::{StoreError, StoreResult};
use crate::models::{Department, DepartmentKey, Employee};
use crate::repository::employee::EmployeeRepository;
use std::sync::Arc;
use tracing::debug;

/// Reads and transactional writes of `dept` rows and their employees.
#[derive(Clone)]
pub struct DepartmentRepository {
    exec: Arc<SqlExecutor>,
    txs: TransactionCoordinator,
    employees: EmployeeRepository,
}

impl DepartmentRepository {
    pub fn new(
        exec: Arc<SqlExecutor>,
        txs: TransactionCoordinator,
        employees: EmployeeRepository,
    ) -> Self {
        Self {
            exec,
            txs,
            employees,
        }
    }

    /// Load department `id` and its employees into `out`.
    ///
    /// Returns `false` when the department does not exist.
    pub async fn get(
        &self,
        ctx: &RequestContext,
        id: i64,
        out: &mut Department,
    ) -> StoreResult<bool> {
        recover(ctx, "get department", self.get_in(ctx, None, id, out)).await
    }

    /// Every department id, ordered.
    pub async fn list_keys(
        &self,
        ctx: &RequestContext,
        out: &mut Vec<DepartmentKey>,
    ) -> StoreResult<()> {
        recover(
            ctx,
            "list department keys",
            self.exec.select(ctx, None, GET_DEPTS_PK, out, &[]),
        )
        .await
    }

    /// Every department without employees, ordered by id.
    pub async fn list(&self, ctx: &RequestContext, out: &mut Vec<Department>) -> StoreResult<()> {
        recover(
            ctx,
            "list departments",
            self.exec.select(ctx, None, GET_DEPTS, out, &[]),
        )
        .await
    }

    /// Insert `input` and its employees in one transaction, then load the
    /// stored graph into `out`.
    pub async fn create(
        &self,
        ctx: &RequestContext,
        input: &Department,
        out: &mut Department,
    ) -> StoreResult<()> {
        let mut tx = self.txs.begin(ctx).await?;
        let result = recover(
            ctx,
            "create department",
            self.create_in(ctx, &mut tx, input, out),
        )
        .await;
        self.txs.finish(ctx, &mut tx, result).await
    }

    /// Update `input` in one transaction. Employees are updated, or created
    /// when they do not exist yet; employees missing from `input` are left
    /// untouched.
    ///
    /// Returns `false`, with nothing changed, when the department does not
    /// exist.
    pub async fn update(
        &self,
        ctx: &RequestContext,
        input: &Department,
        out: &mut Department,
    ) -> StoreResult<bool> {
        let mut tx = self.txs.begin(ctx).await?;
        let result = recover(
            ctx,
            "update department",
            self.update_in(ctx, &mut tx, input, out),
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

    async fn get_in(
        &self,
        ctx: &RequestContext,
        mut tx: Option<&mut Tx>,
        id: i64,
        out: &mut Department,
    ) -> StoreResult<bool> {
        let key = [SqlParam::int(id)];
        if !self
            .exec
            .get(ctx, tx.as_deref_mut(), GET_DEPT, out, &key)
            .await?
        {
            return Ok(false);
        }
        self.exec
            .select(ctx, tx, GET_EMPS_BY_DEPT, &mut out.employees, &key)
            .await?;
        Ok(true)
    }

    async fn create_in(
        &self,
        ctx: &RequestContext,
        tx: &mut Tx,
        input: &Department,
        out: &mut Department,
    ) -> StoreResult<()> {
        let request_id = ctx.request_id();
        input.validate(request_id)?;
        debug!(
            request_id,
            id = input.id,
            employees = input.employees.len(),
            "Creating department"
        );

        let key = input.key();
        let mut probe = 0_i64;
        self.exec
            .create(
                ctx,
                Some(&mut *tx),
                Some(ExistenceCheck::new(DEPT_EXISTS, &mut probe, &key)),
                CREATE_DEPT,
                input,
            )
            .await?;

        let models = self.exec.models();
        let mut created = models.guard::<Department>();
        if !self
            .exec
            .get(ctx, Some(&mut *tx), GET_DEPT_UK, &mut *created, &key)
            .await?
        {
            return Err(StoreError::consistency(
                CREATE_DEPT,
                format!("department {} missing after insert", input.id),
                request_id,
            ));
        }

        for child in &input.employees {
            let mut employee = models.guard::<Employee>();
            employee.copy_from(child);
            employee.department_id = Some(created.id);
            self.employees
                .create_in(ctx, tx, &employee, None)
                .await?;
        }

        self.require(ctx, tx, created.id, out).await
    }

    async fn update_in(
        &self,
        ctx: &RequestContext,
        tx: &mut Tx,
        input: &Department,
        out: &mut Department,
    ) -> StoreResult<bool> {
        let request_id = ctx.request_id();
        input.validate(request_id)?;
        debug!(
            request_id,
            id = input.id,
            employees = input.employees.len(),
            "Updating department"
        );

        let models = self.exec.models();
        let mut prior = models.guard::<Department>();
        if !self.get_in(ctx, Some(&mut *tx), input.id, &mut *prior).await? {
            debug!(request_id, id = input.id, "Department does not exist");
            return Ok(false);
        }

        let key = input.key();
        // Unreachable while deptno is both the lookup key and the unique key;
        // kept for a natural key that differs from the primary key.
        if prior.id != input.id {
            let mut probe = 0_i64;
            if self
                .exec
                .get(ctx, Some(&mut *tx), DEPT_EXISTS, &mut probe, &key)
                .await?
            {
                return Err(StoreError::conflict(
                    DEPT_EXISTS,
                    input.id.to_string(),
                    request_id,
                ));
            }
        }
        self.exec
            .update(ctx, Some(&mut *tx), None, UPDATE_DEPT, input)
            .await?;

        let mut updated = models.guard::<Department>();
        if !self
            .exec
            .get(ctx, Some(&mut *tx), GET_DEPT, &mut *updated, &key)
            .await?
        {
            return Err(StoreError::consistency(
                UPDATE_DEPT,
                format!("department {} missing after update", input.id),
                request_id,
            ));
        }

        for child in &input.employees {
            let mut employee = models.guard::<Employee>();
            employee.copy_from(child);
            employee.department_id = Some(input.id);
            if !self
                .employees
                .update_in(ctx, tx, &employee, None)
                .await?
            {
                self.employees
                    .create_in(ctx, tx, &employee, None)
                    .await?;
            }
        }

        self.require(ctx, tx, input.id, out).await?;
        Ok(true)
    }

    /// Re-read a graph that must exist after a write.
    async fn require(
        &self,
        ctx: &RequestContext,
        tx: &mut Tx,
        id: i64,
        out: &mut Department,
    ) -> StoreResult<()> {
        if self.get_in(ctx, Some(tx), id, out).await? {
            return Ok(());
        }
        Err(StoreError::consistency(
            GET_DEPT,
            format!("department {id} missing after write"),
            ctx.request_id(),
        ))
    }
}
