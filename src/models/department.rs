//! Department entity.

use crate::db::executor::Scan;
use crate::db::params::{DmlParams, SqlParam};
use crate::error::{StoreError, StoreResult};
use crate::models::employee::Employee;
use crate::models::pool::{FreeList, ModelPool, Poolable};
use crate::models::{assign_opt_text, assign_text};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::any::AnyRow;

/// A row of `dept`, optionally with its employees.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    #[serde(rename = "deptNumber")]
    pub id: i64,
    #[serde(rename = "deptName")]
    pub name: String,
    #[serde(rename = "deptLocation", default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Populated only by cascading reads and writes
    #[serde(rename = "emps", default, skip_serializing_if = "Vec::is_empty")]
    pub employees: Vec<Employee>,
}

impl Department {
    /// Check field constraints before a write. Employees validate themselves.
    pub fn validate(&self, request_id: u64) -> StoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(StoreError::invalid_input(
                format!("department {}: name is required", self.id),
                request_id,
            ));
        }
        Ok(())
    }

    /// Copy the scalar fields of `other`; employees are left alone.
    pub fn copy_fields_from(&mut self, other: &Department) {
        self.id = other.id;
        assign_text(&mut self.name, &other.name);
        assign_opt_text(&mut self.location, other.location.as_deref());
    }

    /// Key parameters for lookups by id.
    pub fn key(&self) -> [SqlParam<'static>; 1] {
        [SqlParam::int(self.id)]
    }
}

impl Scan for Department {
    fn scan(&mut self, row: &AnyRow) -> Result<(), sqlx::Error> {
        self.id = row.try_get("deptno")?;
        assign_text(&mut self.name, row.try_get("dname")?);
        assign_opt_text(&mut self.location, row.try_get("loc")?);
        Ok(())
    }
}

impl DmlParams for Department {
    /// `deptno, dname, loc`
    fn dml_params(&self) -> Vec<SqlParam<'_>> {
        vec![
            SqlParam::int(self.id),
            SqlParam::text(&self.name),
            SqlParam::Text(self.location.as_deref()),
        ]
    }
}

impl Poolable for Department {
    fn reset(&mut self, models: &ModelPool, cascade: bool) {
        self.id = 0;
        self.name.clear();
        self.location = None;
        if cascade {
            models.release_all(&mut self.employees, true);
        } else {
            self.employees.clear();
        }
    }

    fn free_list(models: &ModelPool) -> Option<&FreeList<Self>> {
        Some(models.departments())
    }
}

/// Primary key of `dept`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentKey {
    #[serde(rename = "deptNumber")]
    pub id: i64,
}

impl Scan for DepartmentKey {
    fn scan(&mut self, row: &AnyRow) -> Result<(), sqlx::Error> {
        self.id = row.try_get(0)?;
        Ok(())
    }
}

impl Poolable for DepartmentKey {
    fn reset(&mut self, _models: &ModelPool, _cascade: bool) {
        self.id = 0;
    }

    fn free_list(models: &ModelPool) -> Option<&FreeList<Self>> {
        Some(models.department_keys())
    }
}
