//! Entity models and their pools.
//!
//! Field names follow the domain; the JSON names follow the wire format used
//! by the request handlers (`deptNumber`, `empNo`, ...).

pub mod department;
pub mod employee;
pub mod pool;

pub use department::{Department, DepartmentKey};
pub use employee::{Employee, EmployeeKey};
pub use pool::{FreeList, ModelPool, PoolStats, PoolStatsSnapshot, Poolable, Pooled};

/// Overwrite `dest` with `value`, keeping its allocation.
pub(crate) fn assign_text(dest: &mut String, value: &str) {
    dest.clear();
    dest.push_str(value);
}

/// Overwrite an optional string, keeping the allocation when both sides are
/// present.
pub(crate) fn assign_opt_text(dest: &mut Option<String>, value: Option<&str>) {
    match (dest.as_mut(), value) {
        (Some(current), Some(value)) => assign_text(current, value),
        (_, value) => *dest = value.map(str::to_owned),
    }
}
