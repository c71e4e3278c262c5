//! Table definitions for `dept` and `emp`.
//!
//! The DDL is portable between PostgreSQL and SQLite. Integer columns are
//! `BIGINT` so both drivers decode them as `i64`; the hire date is stored as
//! ISO `YYYY-MM-DD` text.

use crate::error::{StoreError, StoreResult};
use sqlx::{AnyPool, Executor};
use tracing::info;

const CREATE_DEPT_TABLE: &str = "CREATE TABLE IF NOT EXISTS dept (
    deptno BIGINT PRIMARY KEY,
    dname VARCHAR(64) NOT NULL,
    loc VARCHAR(64)
)";

const CREATE_EMP_TABLE: &str = "CREATE TABLE IF NOT EXISTS emp (
    empno BIGINT PRIMARY KEY,
    ename VARCHAR(64),
    job VARCHAR(64),
    mgr BIGINT,
    hiredate VARCHAR(10),
    sal BIGINT CHECK (sal >= 0),
    comm BIGINT CHECK (comm >= 0),
    deptno BIGINT REFERENCES dept (deptno)
)";

const CREATE_EMP_DEPT_INDEX: &str = "CREATE INDEX IF NOT EXISTS emp_deptno_idx ON emp (deptno)";

/// Create the tables if they do not exist.
pub async fn ensure_schema(pool: &AnyPool) -> StoreResult<()> {
    for (name, ddl) in [
        ("dept", CREATE_DEPT_TABLE),
        ("emp", CREATE_EMP_TABLE),
        ("emp_deptno_idx", CREATE_EMP_DEPT_INDEX),
    ] {
        pool.execute(ddl)
            .await
            .map_err(|source| StoreError::driver(name, 0, 0, source))?;
    }
    info!("Schema is ready");
    Ok(())
}
