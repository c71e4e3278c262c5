//! Entity repositories.
//!
//! Public operations each run behind their own panic boundary; writes also
//! own their transaction from begin to commit or rollback.

pub mod department;
pub mod employee;

pub use department::DepartmentRepository;
pub use employee::EmployeeRepository;
