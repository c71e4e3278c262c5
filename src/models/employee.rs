//! Employee entity.

use crate::db::executor::Scan;
use crate::db::params::{DmlParams, SqlParam};
use crate::error::{StoreError, StoreResult};
use crate::models::pool::{FreeList, ModelPool, Poolable};
use crate::models::assign_opt_text;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::any::AnyRow;

/// Accepted hire date format.
pub const HIRE_DATE_FORMAT: &str = "%Y-%m-%d";

/// A row of `emp`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    #[serde(rename = "empNo")]
    pub id: i64,
    #[serde(rename = "empName", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<String>,
    /// Manager's employee id
    #[serde(rename = "mgr", default, skip_serializing_if = "Option::is_none")]
    pub manager: Option<i64>,
    /// ISO `YYYY-MM-DD`
    #[serde(rename = "hiredate", default, skip_serializing_if = "Option::is_none")]
    pub hire_date: Option<String>,
    #[serde(rename = "sal", default, skip_serializing_if = "Option::is_none")]
    pub salary: Option<i64>,
    #[serde(rename = "comm", default, skip_serializing_if = "Option::is_none")]
    pub commission: Option<i64>,
    /// Owning department
    #[serde(rename = "deptNumber", default, skip_serializing_if = "Option::is_none")]
    pub department_id: Option<i64>,
}

impl Employee {
    /// Check field constraints before a write.
    pub fn validate(&self, request_id: u64) -> StoreResult<()> {
        if let Some(salary) = self.salary
            && salary < 0
        {
            return Err(StoreError::invalid_input(
                format!("employee {}: salary must not be negative", self.id),
                request_id,
            ));
        }
        if let Some(commission) = self.commission
            && commission < 0
        {
            return Err(StoreError::invalid_input(
                format!("employee {}: commission must not be negative", self.id),
                request_id,
            ));
        }
        if let Some(hire_date) = &self.hire_date
            && NaiveDate::parse_from_str(hire_date, HIRE_DATE_FORMAT).is_err()
        {
            return Err(StoreError::invalid_input(
                format!("employee {}: hire date '{hire_date}' is not YYYY-MM-DD", self.id),
                request_id,
            ));
        }
        Ok(())
    }

    /// Copy every field from `other`, reusing this value's allocations.
    pub fn copy_from(&mut self, other: &Employee) {
        self.id = other.id;
        assign_opt_text(&mut self.name, other.name.as_deref());
        assign_opt_text(&mut self.job, other.job.as_deref());
        self.manager = other.manager;
        assign_opt_text(&mut self.hire_date, other.hire_date.as_deref());
        self.salary = other.salary;
        self.commission = other.commission;
        self.department_id = other.department_id;
    }

    /// Key parameters for lookups by id.
    pub fn key(&self) -> [SqlParam<'static>; 1] {
        [SqlParam::int(self.id)]
    }
}

impl Scan for Employee {
    fn scan(&mut self, row: &AnyRow) -> Result<(), sqlx::Error> {
        self.id = row.try_get("empno")?;
        assign_opt_text(&mut self.name, row.try_get("ename")?);
        assign_opt_text(&mut self.job, row.try_get("job")?);
        self.manager = row.try_get("mgr")?;
        assign_opt_text(&mut self.hire_date, row.try_get("hiredate")?);
        self.salary = row.try_get("sal")?;
        self.commission = row.try_get("comm")?;
        self.department_id = row.try_get("deptno")?;
        Ok(())
    }
}

impl DmlParams for Employee {
    /// `empno, ename, job, mgr, hiredate, sal, comm, deptno`
    fn dml_params(&self) -> Vec<SqlParam<'_>> {
        vec![
            SqlParam::int(self.id),
            SqlParam::Text(self.name.as_deref()),
            SqlParam::Text(self.job.as_deref()),
            SqlParam::Int(self.manager),
            SqlParam::Text(self.hire_date.as_deref()),
            SqlParam::Int(self.salary),
            SqlParam::Int(self.commission),
            SqlParam::Int(self.department_id),
        ]
    }
}

impl Poolable for Employee {
    fn reset(&mut self, _models: &ModelPool, _cascade: bool) {
        self.id = 0;
        self.name = None;
        self.job = None;
        self.manager = None;
        self.hire_date = None;
        self.salary = None;
        self.commission = None;
        self.department_id = None;
    }

    fn free_list(models: &ModelPool) -> Option<&FreeList<Self>> {
        Some(models.employees())
    }
}

/// Primary key of `emp`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeKey {
    #[serde(rename = "empNo")]
    pub id: i64,
}

impl Scan for EmployeeKey {
    fn scan(&mut self, row: &AnyRow) -> Result<(), sqlx::Error> {
        self.id = row.try_get(0)?;
        Ok(())
    }
}

impl Poolable for EmployeeKey {
    fn reset(&mut self, _models: &ModelPool, _cascade: bool) {
        self.id = 0;
    }

    fn free_list(models: &ModelPool) -> Option<&FreeList<Self>> {
        Some(models.employee_keys())
    }
}
